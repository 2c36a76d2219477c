//! Lexical record matcher.
//!
//! Token-overlap scoring used as the deterministic fallback when model
//! output declares no usable evidence links. This is a bounded-quality
//! heuristic, not a retrieval engine.

use std::collections::HashSet;

use crate::types::record::ResponseRecord;

/// Minimum overlap score a record must reach to be selected.
const MIN_SCORE: f64 = 0.08;

/// Common and survey-domain words excluded from matching.
const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "into", "our", "your", "you", "are",
    "was", "were", "have", "has", "had", "what", "when", "where", "which", "would", "could",
    "should", "their", "them", "they", "about", "please", "provide", "reasoning", "approach",
    "agree", "disagree", "question", "response", "option", "page",
];

/// Tokenize free text for overlap scoring.
///
/// Lower-cases, treats every non-alphanumeric character as a separator, and
/// drops short tokens and stopwords.
pub fn tokenize(text: &str) -> HashSet<String> {
    let mut normalized = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            normalized.extend(ch.to_lowercase());
        } else {
            normalized.push(' ');
        }
    }

    normalized
        .split_whitespace()
        .filter(|token| token.len() > 2 && !STOPWORDS.contains(token))
        .map(|token| token.to_string())
        .collect()
}

/// Score a document token set against a query token set.
///
/// Returns `|query ∩ doc| / |query|`, or 0.0 when either set is empty.
pub fn overlap_score(query_tokens: &HashSet<String>, doc_tokens: &HashSet<String>) -> f64 {
    if query_tokens.is_empty() || doc_tokens.is_empty() {
        return 0.0;
    }

    let overlap = query_tokens.intersection(doc_tokens).count();
    if overlap == 0 {
        return 0.0;
    }

    overlap as f64 / query_tokens.len() as f64
}

/// Find the record IDs whose answer text best matches a query string.
///
/// Records scoring at least the threshold are returned in descending score
/// order (stable on insertion order for ties), capped at `top_k`. If the
/// threshold filters everything out but some record scored above zero, the
/// top `min(top_k, 3)` are returned anyway so a weak lexical signal still
/// yields evidence.
pub fn match_records(text: &str, records: &[ResponseRecord], top_k: usize) -> Vec<String> {
    let query_tokens = tokenize(text);
    if query_tokens.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(f64, &str)> = records
        .iter()
        .filter_map(|record| {
            let score = overlap_score(&query_tokens, &tokenize(&record.answer_text));
            (score > 0.0).then_some((score, record.record_id.as_str()))
        })
        .collect();

    // Stable sort keeps insertion order for equal scores.
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let selected: Vec<String> = scored
        .iter()
        .filter(|(score, _)| *score >= MIN_SCORE)
        .take(top_k)
        .map(|(_, id)| (*id).to_string())
        .collect();

    if selected.is_empty() && !scored.is_empty() {
        return scored
            .iter()
            .take(top_k.min(3))
            .map(|(_, id)| (*id).to_string())
            .collect();
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::record;

    #[test]
    fn test_tokenize_drops_short_and_stopwords() {
        let tokens = tokenize("Please provide the reasoning for an increase in funding!");
        assert!(tokens.contains("increase"));
        assert!(tokens.contains("funding"));
        assert!(!tokens.contains("the"));
        assert!(!tokens.contains("please"));
        assert!(!tokens.contains("an"));
        assert!(!tokens.contains("in"));
    }

    #[test]
    fn test_tokenize_empty_text() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("a an the").is_empty());
    }

    #[test]
    fn test_overlap_score() {
        let query = tokenize("increase funding");
        let doc = tokenize("we strongly welcome increasing the funding levels");
        // "funding" overlaps, "increase" != "increasing"
        let score = overlap_score(&query, &doc);
        assert!((score - 0.5).abs() < 1e-9);

        assert_eq!(overlap_score(&query, &HashSet::new()), 0.0);
        assert_eq!(overlap_score(&HashSet::new(), &doc), 0.0);
    }

    #[test]
    fn test_match_records_orders_by_score() {
        let records = vec![
            record("R1:Q01", "R1", "Org A", "Q01", None, "nothing relevant here"),
            record(
                "R2:Q01",
                "R2",
                "Org B",
                "Q01",
                None,
                "increase funding substantially",
            ),
            record("R3:Q01", "R3", "Org C", "Q01", None, "funding matters"),
        ];

        let ids = match_records("increase funding", &records, 8);
        assert_eq!(ids, vec!["R2:Q01".to_string(), "R3:Q01".to_string()]);
    }

    #[test]
    fn test_match_records_empty_query_gives_nothing() {
        let records = vec![record("R1:Q01", "R1", "Org A", "Q01", None, "any text")];
        assert!(match_records("the and for", &records, 8).is_empty());
    }

    #[test]
    fn test_match_records_rescues_weak_signal() {
        // Long query: single-token overlap lands below the 0.08 threshold.
        let query = "alpha beta gamma delta epsilon zeta eta theta iota kappa \
                     lambda omicron sigma upsilon";
        let records = vec![
            record("R1:Q01", "R1", "Org A", "Q01", None, "completely unrelated words"),
            record("R2:Q01", "R2", "Org B", "Q01", None, "sigma was mentioned once"),
        ];

        let ids = match_records(query, &records, 8);
        assert_eq!(ids, vec!["R2:Q01".to_string()]);
    }

    #[test]
    fn test_match_records_respects_top_k() {
        let records: Vec<_> = (0..10)
            .map(|i| {
                record(
                    &format!("R{i}:Q01"),
                    &format!("R{i}"),
                    "Org",
                    "Q01",
                    None,
                    "shared funding phrase",
                )
            })
            .collect();

        let ids = match_records("funding", &records, 4);
        assert_eq!(ids.len(), 4);
        // Ties resolve in insertion order.
        assert_eq!(ids[0], "R0:Q01");
    }
}
