//! Approach 1: per-organisation hybrid summary.
//!
//! Flow: group the organisation's records by section, summarise each
//! section with evidence IDs, roll the sections up into an organisation
//! narrative, then build the evidence index and metrics.

use std::collections::HashSet;
use std::time::Instant;

use indexmap::IndexMap;
use tracing::debug;

use crate::error::Result;
use crate::evaluation::{build_metrics, detect_conflicting_signals, MetricsInput};
use crate::llm::LlmProvider;
use crate::pipeline::prompts;
use crate::pipeline::reconcile::{
    build_evidence_index, parse_bullets, referenced_ids_from_bullets,
};
use crate::types::config::Settings;
use crate::types::record::{OrganisationCatalog, ResponseRecord};
use crate::types::summary::{Bullet, LlmUsage, OrganisationSummary, SectionSummary};

/// Generate the Approach 1 organisation-level summary.
pub async fn summarise_organisation(
    llm: &dyn LlmProvider,
    settings: &Settings,
    catalog: &OrganisationCatalog,
) -> Result<OrganisationSummary> {
    let start = Instant::now();

    let mut by_section: IndexMap<&str, Vec<&ResponseRecord>> = IndexMap::new();
    for record in &catalog.records {
        by_section
            .entry(record.section.as_str())
            .or_default()
            .push(record);
    }

    let allowed: HashSet<String> = catalog
        .records
        .iter()
        .map(|record| record.record_id.clone())
        .collect();

    let mut total_usage = LlmUsage::default();
    let mut total_input_chars = 0usize;
    let mut total_output_chars = 0usize;
    let mut section_summaries: Vec<SectionSummary> = Vec::new();

    for (section_name, section_records) in &by_section {
        let user_prompt = prompts::section_user_prompt(catalog, section_name, section_records);
        let completion = llm
            .complete_json(prompts::SECTION_SYSTEM_PROMPT, &user_prompt, 0.1)
            .await?;

        total_usage = total_usage.add(completion.usage);
        total_input_chars += user_prompt.len();
        total_output_chars += serde_json::to_string(&completion.payload)?.len();

        let payload = &completion.payload;
        section_summaries.push(SectionSummary {
            section: (*section_name).to_string(),
            main_points: parse_bullets(payload.get("main_points"), &allowed),
            concerns: parse_bullets(payload.get("concerns"), &allowed),
            asks: parse_bullets(payload.get("asks"), &allowed),
            nuances: parse_bullets(payload.get("nuances"), &allowed),
            records_summarised: section_records.len(),
            total_records: section_records.len(),
        });
    }

    let rollup_prompt = prompts::rollup_user_prompt(catalog, &section_summaries);
    let rollup = llm
        .complete_json(prompts::ROLLUP_SYSTEM_PROMPT, &rollup_prompt, 0.1)
        .await?;

    total_usage = total_usage.add(rollup.usage);
    total_input_chars += rollup_prompt.len();
    total_output_chars += serde_json::to_string(&rollup.payload)?.len();

    let key_supports = parse_bullets(rollup.payload.get("key_supports"), &allowed);
    let key_concerns = parse_bullets(rollup.payload.get("key_concerns"), &allowed);
    let asks = parse_bullets(rollup.payload.get("asks_or_recommendations"), &allowed);

    let mut all_bullets: Vec<Bullet> = Vec::new();
    all_bullets.extend(key_supports.iter().cloned());
    all_bullets.extend(key_concerns.iter().cloned());
    all_bullets.extend(asks.iter().cloned());
    for section in &section_summaries {
        all_bullets.extend(section.main_points.iter().cloned());
        all_bullets.extend(section.concerns.iter().cloned());
        all_bullets.extend(section.asks.iter().cloned());
        all_bullets.extend(section.nuances.iter().cloned());
    }

    let referenced_ids = referenced_ids_from_bullets(&all_bullets);
    let evidence_index = build_evidence_index(&catalog.records, &referenced_ids);

    let overall_stance = {
        let declared = rollup
            .payload
            .get("overall_stance")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim();
        if declared.is_empty() {
            "mixed".to_string()
        } else {
            declared.to_string()
        }
    };

    let metrics = build_metrics(MetricsInput {
        coverage_numerator: catalog.answered_questions,
        coverage_denominator: catalog.total_questions,
        bullets: &all_bullets,
        input_chars: total_input_chars,
        output_chars: total_output_chars,
        input_tokens: total_usage.input_tokens,
        output_tokens: total_usage.output_tokens,
        latency_seconds: start.elapsed().as_secs_f64(),
        low_sample_threshold: settings.low_sample_threshold,
        high_missingness_threshold: settings.high_missingness_threshold,
        cost_per_1k_input: settings.input_cost_per_1k_tokens,
        cost_per_1k_output: settings.output_cost_per_1k_tokens,
        conflicting_signals: detect_conflicting_signals(&catalog.records),
    });

    debug!(
        response_id = %catalog.response_id,
        sections = section_summaries.len(),
        evidence_refs = evidence_index.len(),
        "organisation summary generated"
    );

    Ok(OrganisationSummary {
        approach: "approach_1".to_string(),
        response_id: catalog.response_id.clone(),
        organisation_name: catalog.organisation_name.clone(),
        organisation_type: catalog.organisation_type.clone(),
        region: catalog.region.clone(),
        overall_stance,
        key_supports,
        key_concerns,
        asks_or_recommendations: asks,
        section_summaries,
        evidence_index,
        metrics,
    })
}
