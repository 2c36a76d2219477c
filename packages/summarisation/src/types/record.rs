//! Source dataset types - the input side of the pipeline.
//!
//! Records are built once per dataset by ingestion/processing and treated as
//! a read-only universe by every reconciliation call.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single survey column with a deduplicated name.
///
/// `unique_name` carries a `__N` suffix when the raw header text repeats,
/// so row values stay addressable by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Deduplicated column name used as row key
    pub unique_name: String,

    /// Normalized header text as it appears in the file
    pub raw_name: String,

    /// Zero-based column position in the source file
    pub index: usize,
}

/// A logical consultation question inferred from the survey columns.
///
/// A question owns one primary column (the categorical or free-text answer)
/// and any number of supplemental columns (reasoning text, "if yes, ..."
/// follow-ups) that belong to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionDefinition {
    /// Stable identifier, e.g. `Q01`
    pub question_id: String,

    /// Canonical display text
    pub question_text: String,

    /// Section the question belongs to
    pub section: String,

    /// The main answer column
    pub primary_column: ColumnSpec,

    /// Free-text follow-up columns attached to this question
    #[serde(default)]
    pub supplemental_columns: Vec<ColumnSpec>,
}

/// One atomic response record: one organisation answering one question.
///
/// `record_id` has the format `<response_id>:<question_id>` and is the unit
/// of evidence linking throughout the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRecord {
    /// Unique identifier, `<response_id>:<question_id>`
    pub record_id: String,

    /// Submission identifier shared by all of one organisation's records
    pub response_id: String,

    /// Organisation display name
    pub organisation_name: String,

    /// Self-reported organisation category
    pub organisation_type: String,

    /// Nation or region of the organisation
    pub region: String,

    /// Question this record answers
    pub question_id: String,

    /// Question display text
    pub question_text: String,

    /// Section the question belongs to
    pub section: String,

    /// Structured choice label when the answer was categorical
    pub choice_value: Option<String>,

    /// Full assembled answer text (choice prefix plus free text)
    pub answer_text: String,

    /// Bounded excerpt of the answer for prompts and evidence display
    pub excerpt: String,
}

/// Raw parsed dataset: normalized columns plus row values keyed by
/// `ColumnSpec::unique_name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultationData {
    pub columns: Vec<ColumnSpec>,
    pub rows: Vec<HashMap<String, String>>,
}

/// Fully preprocessed dataset, ready for slicing and summarisation.
///
/// Built once by the orchestration layer and passed explicitly into the
/// service - there is no process-wide lazily-loaded state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparedData {
    pub consultation_data: ConsultationData,
    pub questions: Vec<QuestionDefinition>,
    pub response_records: Vec<ResponseRecord>,
}

/// All records for one organisation, plus coverage metadata.
///
/// The Approach 1 input object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganisationCatalog {
    pub response_id: String,
    pub organisation_name: String,
    pub organisation_type: String,
    pub region: String,

    /// Distinct questions this organisation answered
    pub answered_questions: usize,

    /// Total questions in the dataset
    pub total_questions: usize,

    /// The record universe for this organisation
    pub records: Vec<ResponseRecord>,
}

/// All records for one question across organisations.
///
/// The Approach 2 input object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionSlice {
    pub question: QuestionDefinition,

    /// The record universe for this question
    pub records: Vec<ResponseRecord>,
}
