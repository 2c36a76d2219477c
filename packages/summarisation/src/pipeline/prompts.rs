//! Prompt construction for the two summarisation approaches.
//!
//! Prompts list source records as `record_id | ... | excerpt` lines so the
//! model can cite evidence by ID; reconciliation validates whatever comes
//! back.

use std::collections::BTreeMap;

use serde_json::json;

use crate::types::record::{OrganisationCatalog, QuestionSlice, ResponseRecord};
use crate::types::summary::SectionSummary;

/// System prompt for per-section organisation summaries.
pub const SECTION_SYSTEM_PROMPT: &str =
    "You are a policy consultation summariser. Output valid JSON only. \
     No markdown. No prose outside JSON.";

/// System prompt for the organisation roll-up call.
pub const ROLLUP_SYSTEM_PROMPT: &str =
    "You summarise consultation responses. Output JSON only with explicit evidence linking. \
     No extra keys.";

/// System prompt for the cross-organisation question summary.
pub const QUESTION_SYSTEM_PROMPT: &str =
    "You summarise policy consultation responses across organisations. \
     Preserve minority perspectives. Output valid JSON only.";

/// Build the user prompt for one organisation section.
pub fn section_user_prompt(
    catalog: &OrganisationCatalog,
    section_name: &str,
    section_records: &[&ResponseRecord],
) -> String {
    let lines: Vec<String> = section_records
        .iter()
        .map(|record| {
            format!(
                "{} | {} | {}",
                record.record_id, record.question_text, record.excerpt
            )
        })
        .collect();

    format!(
        "Organisation: {}\n\
         Section: {}\n\
         Summarise the section. Preserve minority, conditional, and nuanced points.\n\
         Source responses:\n{}\n\n\
         Return JSON with keys: main_points, concerns, asks, nuances.\n\
         Each key maps to a list of objects: {{text, evidence_ids}}.\n\
         Use only record IDs provided above as evidence_ids.",
        catalog.organisation_name,
        section_name,
        lines.join("\n")
    )
}

/// Build the user prompt for the organisation roll-up from section output.
pub fn rollup_user_prompt(
    catalog: &OrganisationCatalog,
    section_summaries: &[SectionSummary],
) -> String {
    let section_payload: Vec<serde_json::Value> = section_summaries
        .iter()
        .map(|summary| {
            let texts = |bullets: &[crate::types::summary::Bullet]| {
                bullets.iter().map(|b| b.text.clone()).collect::<Vec<_>>()
            };
            let record_ids: std::collections::BTreeSet<String> = summary
                .main_points
                .iter()
                .chain(summary.concerns.iter())
                .chain(summary.asks.iter())
                .chain(summary.nuances.iter())
                .flat_map(|b| b.evidence_ids.iter().cloned())
                .collect();

            json!({
                "section": summary.section,
                "main_points": texts(&summary.main_points),
                "concerns": texts(&summary.concerns),
                "asks": texts(&summary.asks),
                "nuances": texts(&summary.nuances),
                "record_ids": record_ids,
            })
        })
        .collect();

    format!(
        "Organisation: {}\n\
         Type: {}\n\
         Region: {}\n\
         Answered questions: {}/{}\n\n\
         Create a hybrid organisation summary from section summaries.\n\
         Preserve minority and nuanced points and include evidence IDs.\n\
         Section summaries JSON:\n{}\n\n\
         Return JSON with keys: overall_stance, key_supports, key_concerns, asks_or_recommendations.\n\
         For bullet lists, each entry must be {{text, evidence_ids}}.",
        catalog.organisation_name,
        catalog.organisation_type,
        catalog.region,
        catalog.answered_questions,
        catalog.total_questions,
        serde_json::Value::Array(section_payload)
    )
}

/// Build the user prompt for one question across organisations.
pub fn question_user_prompt(
    slice: &QuestionSlice,
    distribution: &BTreeMap<String, f64>,
) -> String {
    let lines: Vec<String> = slice
        .records
        .iter()
        .map(|record| {
            format!(
                "{} | {} | {} | {}",
                record.record_id,
                record.organisation_name,
                record.choice_value.as_deref().unwrap_or(""),
                record.excerpt
            )
        })
        .collect();

    format!(
        "Question ID: {}\n\
         Question text: {}\n\
         Section: {}\n\
         Distribution (if available): {}\n\
         Summarise claims, cluster mainstream positions, capture minority/outlier views, and include evidence IDs.\n\
         Responses:\n{}\n\n\
         Return JSON with keys:\n\
         headline (str), narrative (str), majority_view (list), minority_view (list), \
         key_arguments_for (list), key_arguments_against (list), mainstream_clusters (list), minority_clusters (list).\n\
         For list bullets: [{{text, evidence_ids}}]\n\
         For clusters: [{{cluster_id, label, stance, member_record_ids, evidence_ids, significance}}]\n\
         Use only record IDs from the provided responses.",
        slice.question.question_id,
        slice.question.question_text,
        slice.question.section,
        serde_json::to_string(distribution).unwrap_or_else(|_| "{}".to_string()),
        lines.join("\n")
    )
}
