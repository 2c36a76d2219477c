//! Summary output types - the result side of the pipeline.
//!
//! Bullets, clusters, and evidence refs are transient entities rebuilt on
//! every reconciliation call; the result objects are what the orchestration
//! layer serializes for display and caching.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stance of a record or cluster toward the consulted proposal.
///
/// A closed set internally; raw model/choice strings are mapped at the
/// boundary via [`Stance::from_raw`] and serialized back as lower-case
/// strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stance {
    Support,
    Concern,
    Neutral,
    Other,
}

impl Default for Stance {
    fn default() -> Self {
        Self::Neutral
    }
}

impl Stance {
    /// All variants in their fixed enumeration order.
    ///
    /// This order breaks ties when fallback clusters are ranked by size.
    pub const ALL: [Stance; 4] = [
        Stance::Support,
        Stance::Concern,
        Stance::Neutral,
        Stance::Other,
    ];

    /// Map a raw stance string to the closed set.
    ///
    /// Empty or whitespace-only input defaults to `Neutral`; unrecognized
    /// labels map to `Other`.
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "" => Stance::Neutral,
            "support" => Stance::Support,
            "concern" => Stance::Concern,
            "neutral" => Stance::Neutral,
            "other" => Stance::Other,
            _ => Stance::Other,
        }
    }

    /// Lower-case serialization label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stance::Support => "support",
            Stance::Concern => "concern",
            Stance::Neutral => "neutral",
            Stance::Other => "other",
        }
    }

    /// Title-cased label for display.
    pub fn title(&self) -> &'static str {
        match self {
            Stance::Support => "Support",
            Stance::Concern => "Concern",
            Stance::Neutral => "Neutral",
            Stance::Other => "Other",
        }
    }
}

impl std::fmt::Display for Stance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single evidence-linked claim extracted from model output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bullet {
    /// The claim text (non-empty after boundary parsing)
    pub text: String,

    /// Record IDs cited as support; every ID exists in the record universe
    #[serde(default)]
    pub evidence_ids: Vec<String>,

    /// Declared or derived support count
    #[serde(default)]
    pub count: usize,

    /// Sorted unique response IDs behind the evidence
    #[serde(default)]
    pub supporting_response_ids: Vec<String>,

    /// Sorted unique organisation names behind the evidence
    #[serde(default)]
    pub supporting_organisations: Vec<String>,
}

/// A named, stance-tagged group of records representing a shared viewpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    /// Unique within its list; defaulted to `<prefix>_<i>` when missing
    pub cluster_id: String,

    /// Display label; defaulted when missing, never a drop reason
    pub label: String,

    /// Declared stance, defaulting to neutral
    #[serde(default)]
    pub stance: Stance,

    /// Validated member record IDs
    #[serde(default)]
    pub member_record_ids: Vec<String>,

    /// Citation-suitable subset of members (first 8 when defaulted)
    #[serde(default)]
    pub evidence_ids: Vec<String>,

    /// Model-supplied significance note
    #[serde(default)]
    pub significance: String,

    /// Display description; generated from counts when absent
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub member_count: usize,

    #[serde(default)]
    pub response_count: usize,

    #[serde(default)]
    pub organisation_count: usize,

    #[serde(default)]
    pub supporting_response_ids: Vec<String>,

    #[serde(default)]
    pub supporting_organisations: Vec<String>,
}

/// A referenced record ID joined to its source excerpt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRef {
    pub record_id: String,
    pub excerpt: String,
}

/// One section of an organisation summary (Approach 1).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionSummary {
    pub section: String,

    #[serde(default)]
    pub main_points: Vec<Bullet>,

    #[serde(default)]
    pub concerns: Vec<Bullet>,

    #[serde(default)]
    pub asks: Vec<Bullet>,

    #[serde(default)]
    pub nuances: Vec<Bullet>,

    #[serde(default)]
    pub records_summarised: usize,

    #[serde(default)]
    pub total_records: usize,
}

/// Token usage for one model interaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl LlmUsage {
    /// Total tokens consumed by one interaction.
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    /// Sum two usage figures (per-call accumulation).
    pub fn add(&self, other: LlmUsage) -> LlmUsage {
        LlmUsage {
            input_tokens: self.input_tokens + other.input_tokens,
            output_tokens: self.output_tokens + other.output_tokens,
        }
    }
}

/// Deterministic quality and cost KPIs for one summary run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryMetrics {
    /// Scope covered by the summary, 0..=1
    pub coverage: f64,

    /// Share of output bullets carrying evidence links, 0..=1
    pub evidence_coverage: f64,

    /// Input chars over output chars
    pub compression_ratio: f64,

    /// Quality warnings, e.g. `low_sample_size`
    #[serde(default)]
    pub uncertainty_flags: Vec<String>,

    pub latency_seconds: f64,
    pub cost_estimate_usd: f64,
    pub input_chars: usize,
    pub output_chars: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Approach 1 result: one organisation summarised across all its answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganisationSummary {
    /// Always `approach_1`
    pub approach: String,

    pub response_id: String,
    pub organisation_name: String,
    pub organisation_type: String,
    pub region: String,

    /// Model-declared overall stance, defaulting to `mixed`
    pub overall_stance: String,

    pub key_supports: Vec<Bullet>,
    pub key_concerns: Vec<Bullet>,
    pub asks_or_recommendations: Vec<Bullet>,
    pub section_summaries: Vec<SectionSummary>,
    pub evidence_index: Vec<EvidenceRef>,
    pub metrics: SummaryMetrics,
}

/// Approach 2 result: one question summarised across organisations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionSummary {
    /// Always `approach_2`
    pub approach: String,

    pub question_id: String,
    pub question_text: String,
    pub section: String,
    pub headline: String,
    pub narrative: String,

    pub majority_view: Vec<Bullet>,
    pub minority_view: Vec<Bullet>,
    pub key_arguments_for: Vec<Bullet>,
    pub key_arguments_against: Vec<Bullet>,

    /// Percentage distribution of normalized categorical answers
    #[serde(default)]
    pub distribution: BTreeMap<String, f64>,

    pub mainstream_clusters: Vec<Cluster>,
    pub minority_clusters: Vec<Cluster>,
    pub evidence_index: Vec<EvidenceRef>,
    pub metrics: SummaryMetrics,
}
