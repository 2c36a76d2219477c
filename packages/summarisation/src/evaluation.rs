//! Deterministic quality and cost KPIs for summary runs.

use crate::processing::normalize_choice;
use crate::types::record::ResponseRecord;
use crate::types::summary::{Bullet, SummaryMetrics};

/// Inputs for one metrics computation.
pub struct MetricsInput<'a> {
    /// Scope covered by the summary (answered questions, or records seen)
    pub coverage_numerator: usize,

    /// Total scope available
    pub coverage_denominator: usize,

    /// Output bullets, used for evidence-link coverage
    pub bullets: &'a [Bullet],

    pub input_chars: usize,
    pub output_chars: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub latency_seconds: f64,

    /// Below this many covered records, flag `low_sample_size`
    pub low_sample_threshold: usize,

    /// At or above this missingness ratio, flag `high_missingness`
    pub high_missingness_threshold: f64,

    pub cost_per_1k_input: f64,
    pub cost_per_1k_output: f64,

    /// Precomputed stance-conflict indicator
    pub conflicting_signals: bool,
}

/// Compute quality and operational KPIs for one summary run.
pub fn build_metrics(input: MetricsInput<'_>) -> SummaryMetrics {
    let coverage = ratio(input.coverage_numerator, input.coverage_denominator);

    let bullet_count = input.bullets.len();
    let with_evidence = input
        .bullets
        .iter()
        .filter(|b| !b.evidence_ids.is_empty())
        .count();
    let evidence_coverage = ratio(with_evidence, bullet_count);

    let compression_ratio =
        round3(input.input_chars as f64 / input.output_chars.max(1) as f64);
    let missingness = 1.0 - coverage;

    let mut flags = Vec::new();
    if input.coverage_numerator < input.low_sample_threshold {
        flags.push("low_sample_size".to_string());
    }
    if input.conflicting_signals {
        flags.push("conflicting_stance_signals".to_string());
    }
    if missingness >= input.high_missingness_threshold {
        flags.push("high_missingness".to_string());
    }

    let cost_estimate = (input.input_tokens as f64 / 1000.0) * input.cost_per_1k_input
        + (input.output_tokens as f64 / 1000.0) * input.cost_per_1k_output;

    SummaryMetrics {
        coverage,
        evidence_coverage,
        compression_ratio,
        uncertainty_flags: flags,
        latency_seconds: round3(input.latency_seconds),
        cost_estimate_usd: round6(cost_estimate),
        input_chars: input.input_chars,
        output_chars: input.output_chars,
        input_tokens: input.input_tokens,
        output_tokens: input.output_tokens,
    }
}

/// Flag mixed stance signals where support and concern are both material.
///
/// True when both the supportive and concern shares of categorical answers
/// are at least 25%.
pub fn detect_conflicting_signals(records: &[ResponseRecord]) -> bool {
    const SUPPORT_LABELS: &[&str] = &["Strongly agree", "Somewhat agree", "Agree", "Yes"];
    const CONCERN_LABELS: &[&str] = &["Strongly disagree", "Somewhat disagree", "Disagree", "No"];

    let mut supportive = 0usize;
    let mut concern = 0usize;

    for record in records {
        let Some(label) = record.choice_value.as_deref().and_then(normalize_choice) else {
            continue;
        };
        if SUPPORT_LABELS.contains(&label) {
            supportive += 1;
        } else if CONCERN_LABELS.contains(&label) {
            concern += 1;
        }
    }

    let total = supportive + concern;
    if total == 0 {
        return false;
    }

    let supportive_ratio = supportive as f64 / total as f64;
    let concern_ratio = concern as f64 / total as f64;
    supportive_ratio >= 0.25 && concern_ratio >= 0.25
}

/// Safe rounded ratio in [0, 1], guarding divide-by-zero.
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    round3(numerator as f64 / denominator as f64)
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}
