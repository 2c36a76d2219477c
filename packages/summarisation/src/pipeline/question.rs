//! Approach 2: per-question cross-organisation summary.
//!
//! One model call produces headline, narrative, viewpoint bullets, and
//! clusters; reconciliation repairs whatever came back. A failed provider
//! call degrades to a deterministic local payload, so the result is still
//! coherent (if generic) with fallback clusters built from stance signals.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::Instant;

use serde_json::{json, Value};
use tracing::warn;

use crate::error::{LlmError, Result};
use crate::evaluation::{build_metrics, detect_conflicting_signals, MetricsInput};
use crate::llm::LlmProvider;
use crate::pipeline::prompts;
use crate::pipeline::reconcile::{
    build_evidence_index, parse_bullets, parse_clusters, reconcile_bullets, reconcile_clusters,
    referenced_ids_from_bullets, referenced_ids_from_clusters,
};
use crate::processing::calculate_distribution;
use crate::types::config::Settings;
use crate::types::record::QuestionSlice;
use crate::types::summary::{Bullet, Cluster, LlmUsage, QuestionSummary, Stance};

/// Generate the Approach 2 question-level summary.
pub async fn summarise_question(
    llm: &dyn LlmProvider,
    settings: &Settings,
    slice: &QuestionSlice,
    total_organisations: usize,
) -> Result<QuestionSummary> {
    let start = Instant::now();

    let distribution = calculate_distribution(&slice.records);
    let allowed: HashSet<String> = slice
        .records
        .iter()
        .map(|record| record.record_id.clone())
        .collect();

    let user_prompt = prompts::question_user_prompt(slice, &distribution);

    let (payload, usage) = match llm
        .complete_json(prompts::QUESTION_SYSTEM_PROMPT, &user_prompt, 0.1)
        .await
    {
        Ok(completion) => (completion.payload, completion.usage),
        Err(err) => {
            warn!(
                question_id = %slice.question.question_id,
                error = %err,
                "provider call failed, substituting deterministic fallback payload"
            );
            (fallback_payload(&distribution, &err), LlmUsage::default())
        }
    };

    let majority_view = reconcile_bullets(
        parse_bullets(payload.get("majority_view"), &allowed),
        &slice.records,
    );
    let minority_view = reconcile_bullets(
        parse_bullets(payload.get("minority_view"), &allowed),
        &slice.records,
    );
    let key_for = reconcile_bullets(
        parse_bullets(payload.get("key_arguments_for"), &allowed),
        &slice.records,
    );
    let key_against = reconcile_bullets(
        parse_bullets(payload.get("key_arguments_against"), &allowed),
        &slice.records,
    );

    let mainstream_clusters = reconcile_clusters(
        parse_clusters(payload.get("mainstream_clusters"), &allowed, "mainstream"),
        &slice.records,
        "mainstream",
    );
    let minority_clusters = reconcile_clusters(
        parse_clusters(payload.get("minority_clusters"), &allowed, "minority"),
        &slice.records,
        "minority",
    );

    // Viewpoint lists borrow from clusters when the model returned none.
    let majority_view = if majority_view.is_empty() {
        mainstream_clusters
            .first()
            .map(|cluster| {
                vec![bullet_from_cluster(
                    cluster,
                    &format!("Mainstream view: {}", cluster.label),
                )]
            })
            .unwrap_or(majority_view)
    } else {
        majority_view
    };
    let minority_view = if minority_view.is_empty() {
        minority_clusters
            .first()
            .map(|cluster| {
                vec![bullet_from_cluster(
                    cluster,
                    &format!("Minority view: {}", cluster.label),
                )]
            })
            .unwrap_or(minority_view)
    } else {
        minority_view
    };
    let key_for = if key_for.is_empty() {
        mainstream_clusters
            .iter()
            .find(|cluster| cluster.stance == Stance::Support)
            .map(|cluster| vec![bullet_from_cluster(cluster, &cluster.label)])
            .unwrap_or(key_for)
    } else {
        key_for
    };
    let key_against = if key_against.is_empty() {
        minority_clusters
            .iter()
            .find(|cluster| cluster.stance == Stance::Concern)
            .map(|cluster| vec![bullet_from_cluster(cluster, &cluster.label)])
            .unwrap_or(key_against)
    } else {
        key_against
    };

    let mut referenced_ids: BTreeSet<String> = BTreeSet::new();
    referenced_ids.extend(referenced_ids_from_bullets(&majority_view));
    referenced_ids.extend(referenced_ids_from_bullets(&minority_view));
    referenced_ids.extend(referenced_ids_from_bullets(&key_for));
    referenced_ids.extend(referenced_ids_from_bullets(&key_against));
    referenced_ids.extend(referenced_ids_from_clusters(&mainstream_clusters));
    referenced_ids.extend(referenced_ids_from_clusters(&minority_clusters));

    let evidence_index = build_evidence_index(&slice.records, &referenced_ids);

    let mut all_bullets: Vec<Bullet> = Vec::new();
    all_bullets.extend(majority_view.iter().cloned());
    all_bullets.extend(minority_view.iter().cloned());
    all_bullets.extend(key_for.iter().cloned());
    all_bullets.extend(key_against.iter().cloned());

    let output_chars = serde_json::to_string(&payload)?.len();

    let metrics = build_metrics(MetricsInput {
        coverage_numerator: slice.records.len(),
        coverage_denominator: total_organisations,
        bullets: &all_bullets,
        input_chars: user_prompt.len(),
        output_chars,
        input_tokens: usage.input_tokens,
        output_tokens: usage.output_tokens,
        latency_seconds: start.elapsed().as_secs_f64(),
        low_sample_threshold: settings.low_sample_threshold,
        high_missingness_threshold: settings.high_missingness_threshold,
        cost_per_1k_input: settings.input_cost_per_1k_tokens,
        cost_per_1k_output: settings.output_cost_per_1k_tokens,
        conflicting_signals: detect_conflicting_signals(&slice.records),
    });

    Ok(QuestionSummary {
        approach: "approach_2".to_string(),
        question_id: slice.question.question_id.clone(),
        question_text: slice.question.question_text.clone(),
        section: slice.question.section.clone(),
        headline: string_field(&payload, "headline"),
        narrative: string_field(&payload, "narrative"),
        majority_view,
        minority_view,
        key_arguments_for: key_for,
        key_arguments_against: key_against,
        distribution,
        mainstream_clusters,
        minority_clusters,
        evidence_index,
        metrics,
    })
}

fn string_field(payload: &Value, key: &str) -> String {
    payload
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim()
        .to_string()
}

fn bullet_from_cluster(cluster: &Cluster, fallback_text: &str) -> Bullet {
    let text = if !cluster.description.is_empty() {
        cluster.description.clone()
    } else if !cluster.significance.is_empty() {
        cluster.significance.clone()
    } else {
        fallback_text.to_string()
    };

    Bullet {
        text,
        evidence_ids: cluster.evidence_ids.clone(),
        count: if cluster.response_count != 0 {
            cluster.response_count
        } else {
            cluster.member_count
        },
        supporting_response_ids: cluster.supporting_response_ids.clone(),
        supporting_organisations: cluster.supporting_organisations.clone(),
    }
}

/// Build the deterministic payload used when the provider call fails.
fn fallback_payload(distribution: &BTreeMap<String, f64>, error: &LlmError) -> Value {
    let dominant = distribution
        .iter()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal));

    let headline = match dominant {
        Some((label, pct)) => format!(
            "Fallback summary (LLM unavailable): dominant stance is {} at {:.1}%.",
            label, pct
        ),
        None => "Fallback summary (LLM unavailable): no structured distribution available."
            .to_string(),
    };

    let narrative = format!(
        "Generated without model response due to: {}. \
         Viewpoints and clusters are inferred from local response signals.",
        error
    );

    json!({
        "headline": headline,
        "narrative": narrative,
        "majority_view": [],
        "minority_view": [],
        "key_arguments_for": [],
        "key_arguments_against": [],
        "mainstream_clusters": [],
        "minority_clusters": [],
    })
}
