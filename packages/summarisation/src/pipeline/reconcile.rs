//! Bullet and cluster reconciliation.
//!
//! Takes loosely-structured model payloads, validates every claimed
//! evidence link against the record universe, repairs missing links via
//! lexical matching, and guarantees cluster membership through successively
//! weaker fallback tiers. Malformed input never fails - it degrades.
//!
//! Untyped `serde_json::Value` payloads stop at this boundary: everything
//! downstream works with the typed [`Bullet`] and [`Cluster`] entities.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde_json::Value;

use crate::pipeline::matcher::match_records;
use crate::pipeline::stance::classify_stance;
use crate::types::record::ResponseRecord;
use crate::types::summary::{Bullet, Cluster, EvidenceRef, Stance};

/// Evidence links filled by lexical matching per bullet.
const BULLET_MATCH_TOP_K: usize = 8;

/// Members filled by lexical or stance matching per cluster.
const CLUSTER_MATCH_TOP_K: usize = 14;

/// Citation list size when evidence defaults to cluster members.
const MAX_EVIDENCE_IDS: usize = 8;

/// Arbitrary-sample size for the last cluster membership tier.
const SAMPLE_MEMBERS: usize = 8;

/// Filter an ID list down to those present in the record universe,
/// preserving input order. Idempotent.
pub fn validate_ids(ids: &[String], allowed: &HashSet<String>) -> Vec<String> {
    ids.iter()
        .filter(|id| allowed.contains(*id))
        .cloned()
        .collect()
}

/// Coerce a raw JSON value into an ID list.
///
/// Accepts strings and integers; every other element type is dropped before
/// coercion. Non-array input yields an empty list.
pub fn coerce_ids(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect()
}

fn coerce_strings(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| item.as_str().map(str::to_string))
        .collect()
}

fn string_of(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn count_of(value: Option<&Value>) -> usize {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().map(|f| f.max(0.0) as u64))
            .unwrap_or(0) as usize,
        _ => 0,
    }
}

/// Parse a raw payload value into bullets with validated evidence links.
///
/// Tolerates a non-list value (treated as empty), non-object elements
/// (coerced to bare-text bullets with no evidence), and missing fields.
/// Candidates whose text is empty after trimming are dropped.
pub fn parse_bullets(raw: Option<&Value>, allowed: &HashSet<String>) -> Vec<Bullet> {
    let Some(Value::Array(items)) = raw else {
        return Vec::new();
    };

    let mut bullets = Vec::new();
    for item in items {
        let bullet = match item {
            Value::Object(fields) => Bullet {
                text: string_of(fields.get("text")).trim().to_string(),
                evidence_ids: validate_ids(&coerce_ids(fields.get("evidence_ids")), allowed),
                count: count_of(fields.get("count")),
                supporting_response_ids: coerce_ids(fields.get("supporting_response_ids")),
                supporting_organisations: coerce_strings(fields.get("supporting_organisations")),
            },
            other => Bullet {
                text: string_of(Some(other)).trim().to_string(),
                ..Bullet::default()
            },
        };

        if !bullet.text.is_empty() {
            bullets.push(bullet);
        }
    }

    bullets
}

/// Parse a raw payload value into clusters with validated ID lists.
///
/// Non-object elements are skipped. Clusters with an empty label are kept;
/// [`reconcile_clusters`] assigns the default label.
pub fn parse_clusters(
    raw: Option<&Value>,
    allowed: &HashSet<String>,
    fallback_prefix: &str,
) -> Vec<Cluster> {
    let Some(Value::Array(items)) = raw else {
        return Vec::new();
    };

    let mut clusters = Vec::new();
    for (idx, item) in items.iter().enumerate() {
        let Value::Object(fields) = item else {
            continue;
        };

        let cluster_id = {
            let declared = string_of(fields.get("cluster_id"));
            if declared.is_empty() {
                format!("{}_{}", fallback_prefix, idx + 1)
            } else {
                declared
            }
        };

        clusters.push(Cluster {
            cluster_id,
            label: string_of(fields.get("label")).trim().to_string(),
            stance: Stance::from_raw(&string_of(fields.get("stance"))),
            member_record_ids: validate_ids(&coerce_ids(fields.get("member_record_ids")), allowed),
            evidence_ids: validate_ids(&coerce_ids(fields.get("evidence_ids")), allowed),
            significance: string_of(fields.get("significance")).trim().to_string(),
            description: string_of(fields.get("description")).trim().to_string(),
            member_count: count_of(fields.get("member_count")),
            response_count: count_of(fields.get("response_count")),
            organisation_count: count_of(fields.get("organisation_count")),
            supporting_response_ids: coerce_ids(fields.get("supporting_response_ids")),
            supporting_organisations: coerce_strings(fields.get("supporting_organisations")),
        });
    }

    clusters
}

/// Fill missing evidence and support metadata for viewpoint bullets.
///
/// Bullets with no valid evidence get lexical matches against the record
/// universe; support sets are rederived from the final evidence list either
/// way. A bullet whose text matches nothing keeps empty evidence and a
/// zero count - that is its correct terminal state.
pub fn reconcile_bullets(bullets: Vec<Bullet>, records: &[ResponseRecord]) -> Vec<Bullet> {
    let record_map = record_map(records);

    bullets
        .into_iter()
        .map(|bullet| {
            let mut evidence_ids: Vec<String> = bullet
                .evidence_ids
                .iter()
                .filter(|id| record_map.contains_key(id.as_str()))
                .cloned()
                .collect();
            if evidence_ids.is_empty() {
                evidence_ids = match_records(&bullet.text, records, BULLET_MATCH_TOP_K);
            }

            let (response_ids, organisations) = support_sets(&evidence_ids, &record_map);
            let count = if bullet.count != 0 {
                bullet.count
            } else {
                response_ids.len()
            };

            Bullet {
                text: bullet.text,
                evidence_ids,
                count,
                supporting_response_ids: response_ids,
                supporting_organisations: organisations,
            }
        })
        .collect()
}

/// Normalize clusters into validated, evidence-linked, count-annotated form.
///
/// When the candidate list is empty the stance-based fallback clusters are
/// reconciled instead. Membership falls through three tiers - lexical match
/// on the label text, stance bucket, arbitrary sample - so any cluster ends
/// up with at least one member whenever the universe is non-empty. The last
/// tier can attach records with no semantic connection to the label; that
/// is a known quality limitation of degraded input, kept deliberately.
pub fn reconcile_clusters(
    clusters: Vec<Cluster>,
    records: &[ResponseRecord],
    fallback_prefix: &str,
) -> Vec<Cluster> {
    let record_map = record_map(records);

    let source_clusters = if clusters.is_empty() {
        build_fallback_clusters(records, fallback_prefix)
    } else {
        clusters
    };

    source_clusters
        .into_iter()
        .enumerate()
        .map(|(idx, cluster)| {
            let index = idx + 1;

            let mut member_ids: Vec<String> = cluster
                .member_record_ids
                .iter()
                .filter(|id| record_map.contains_key(id.as_str()))
                .cloned()
                .collect();

            if member_ids.is_empty() {
                let context = if cluster.significance.is_empty() {
                    &cluster.description
                } else {
                    &cluster.significance
                };
                let query = format!("{}. {}", cluster.label, context);
                member_ids = match_records(query.trim(), records, CLUSTER_MATCH_TOP_K);
            }
            if member_ids.is_empty() {
                member_ids = records
                    .iter()
                    .filter(|record| classify_stance(record) == cluster.stance)
                    .take(CLUSTER_MATCH_TOP_K)
                    .map(|record| record.record_id.clone())
                    .collect();
            }
            if member_ids.is_empty() && !records.is_empty() {
                member_ids = records
                    .iter()
                    .take(SAMPLE_MEMBERS)
                    .map(|record| record.record_id.clone())
                    .collect();
            }

            let mut evidence_ids: Vec<String> = cluster
                .evidence_ids
                .iter()
                .filter(|id| record_map.contains_key(id.as_str()))
                .cloned()
                .collect();
            if evidence_ids.is_empty() {
                evidence_ids = member_ids.iter().take(MAX_EVIDENCE_IDS).cloned().collect();
            }

            let (response_ids, organisations) = support_sets(&member_ids, &record_map);

            let member_count = nonzero_or(cluster.member_count, member_ids.len());
            let response_count = nonzero_or(cluster.response_count, response_ids.len());
            let organisation_count = nonzero_or(cluster.organisation_count, organisations.len());

            let description = if !cluster.description.is_empty() {
                cluster.description
            } else if !cluster.significance.is_empty() {
                cluster.significance.clone()
            } else {
                format!(
                    "{} responses from {} organisations with {} stance.",
                    response_count, organisation_count, cluster.stance
                )
            };

            let cluster_id = if cluster.cluster_id.is_empty() {
                format!("{}_{}", fallback_prefix, index)
            } else {
                cluster.cluster_id
            };
            let label = if cluster.label.is_empty() {
                format!("{} cluster {}", title_case(fallback_prefix), index)
            } else {
                cluster.label
            };

            Cluster {
                cluster_id,
                label,
                stance: cluster.stance,
                member_record_ids: member_ids,
                evidence_ids,
                significance: cluster.significance,
                description,
                member_count,
                response_count,
                organisation_count,
                supporting_response_ids: response_ids,
                supporting_organisations: organisations,
            }
        })
        .collect()
}

/// Build deterministic stance-based clusters when the model supplies none.
///
/// Records partition into the four stance buckets; empty buckets are
/// dropped and the rest are ordered by descending size, ties resolving in
/// the fixed stance enumeration order.
pub fn build_fallback_clusters(records: &[ResponseRecord], prefix: &str) -> Vec<Cluster> {
    let mut buckets: Vec<(Stance, Vec<&ResponseRecord>)> =
        Stance::ALL.iter().map(|s| (*s, Vec::new())).collect();

    for record in records {
        let stance = classify_stance(record);
        if let Some((_, bucket)) = buckets.iter_mut().find(|(s, _)| *s == stance) {
            bucket.push(record);
        }
    }

    // Stable sort: equal-sized buckets keep the enumeration order.
    buckets.sort_by(|a, b| b.1.len().cmp(&a.1.len()));

    buckets
        .into_iter()
        .filter(|(_, bucket)| !bucket.is_empty())
        .enumerate()
        .map(|(idx, (stance, bucket))| {
            let ids: Vec<String> = bucket.iter().map(|r| r.record_id.clone()).collect();
            Cluster {
                cluster_id: format!("{}_{}", prefix, idx + 1),
                label: format!("{} viewpoint", stance.title()),
                stance,
                evidence_ids: ids.iter().take(MAX_EVIDENCE_IDS).cloned().collect(),
                member_record_ids: ids,
                significance: format!("Auto-clustered by stance: {}.", stance),
                description: String::new(),
                member_count: 0,
                response_count: 0,
                organisation_count: 0,
                supporting_response_ids: Vec::new(),
                supporting_organisations: Vec::new(),
            }
        })
        .collect()
}

/// Collect every evidence ID referenced across bullets.
pub fn referenced_ids_from_bullets(bullets: &[Bullet]) -> BTreeSet<String> {
    bullets
        .iter()
        .flat_map(|b| b.evidence_ids.iter().cloned())
        .collect()
}

/// Collect every member/evidence ID referenced across clusters.
pub fn referenced_ids_from_clusters(clusters: &[Cluster]) -> BTreeSet<String> {
    clusters
        .iter()
        .flat_map(|c| {
            c.member_record_ids
                .iter()
                .chain(c.evidence_ids.iter())
                .cloned()
        })
        .collect()
}

/// Join referenced record IDs to their source excerpts, sorted by ID.
///
/// IDs absent from the universe are silently skipped - upstream validation
/// should have removed them, but the index must not fail if it did not.
pub fn build_evidence_index(
    records: &[ResponseRecord],
    referenced_ids: &BTreeSet<String>,
) -> Vec<EvidenceRef> {
    let record_map = record_map(records);

    referenced_ids
        .iter()
        .filter_map(|id| {
            record_map.get(id.as_str()).map(|record| EvidenceRef {
                record_id: id.clone(),
                excerpt: record.excerpt.clone(),
            })
        })
        .collect()
}

fn record_map(records: &[ResponseRecord]) -> HashMap<&str, &ResponseRecord> {
    records
        .iter()
        .map(|record| (record.record_id.as_str(), record))
        .collect()
}

fn support_sets(
    ids: &[String],
    record_map: &HashMap<&str, &ResponseRecord>,
) -> (Vec<String>, Vec<String>) {
    let mut response_ids = BTreeSet::new();
    let mut organisations = BTreeSet::new();

    for id in ids {
        if let Some(record) = record_map.get(id.as_str()) {
            response_ids.insert(record.response_id.clone());
            organisations.insert(record.organisation_name.clone());
        }
    }

    (
        response_ids.into_iter().collect(),
        organisations.into_iter().collect(),
    )
}

fn nonzero_or(declared: usize, computed: usize) -> usize {
    if declared != 0 {
        declared
    } else {
        computed
    }
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::record;
    use serde_json::json;

    fn universe() -> Vec<ResponseRecord> {
        vec![
            record(
                "R1:Q01",
                "R1",
                "Alpha Energy",
                "Q01",
                Some("Strongly agree"),
                "We strongly support increasing funding for this programme",
            ),
            record(
                "R2:Q01",
                "R2",
                "Beta Networks",
                "Q01",
                Some("Strongly disagree"),
                "We oppose the proposal because of delivery risk",
            ),
            record(
                "R3:Q01",
                "R3",
                "Gamma Council",
                "Q01",
                None,
                "Further clarification would be helpful before deciding",
            ),
        ]
    }

    fn allowed(records: &[ResponseRecord]) -> HashSet<String> {
        records.iter().map(|r| r.record_id.clone()).collect()
    }

    #[test]
    fn test_validate_ids_preserves_order_and_filters() {
        let allowed: HashSet<String> =
            ["R1:Q01", "R2:Q01"].iter().map(|s| s.to_string()).collect();
        let ids = vec![
            "R2:Q01".to_string(),
            "unknown:Q99".to_string(),
            "R1:Q01".to_string(),
        ];

        let filtered = validate_ids(&ids, &allowed);
        assert_eq!(filtered, vec!["R2:Q01".to_string(), "R1:Q01".to_string()]);
    }

    #[test]
    fn test_validate_ids_idempotent() {
        let allowed: HashSet<String> =
            ["R1:Q01", "R2:Q01"].iter().map(|s| s.to_string()).collect();
        let ids = vec!["R2:Q01".to_string(), "bogus".to_string(), "R1:Q01".to_string()];

        let once = validate_ids(&ids, &allowed);
        let twice = validate_ids(&once, &allowed);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_coerce_ids_drops_wrong_types() {
        let raw = json!(["R1:Q01", 7, true, null, {"x": 1}, ["nested"], "R2:Q01"]);
        let ids = coerce_ids(Some(&raw));
        assert_eq!(
            ids,
            vec!["R1:Q01".to_string(), "7".to_string(), "R2:Q01".to_string()]
        );

        assert!(coerce_ids(Some(&json!("not a list"))).is_empty());
        assert!(coerce_ids(None).is_empty());
    }

    #[test]
    fn test_parse_bullets_shape_tolerance() {
        let records = universe();
        let ids = allowed(&records);

        let raw = json!([
            {"text": "Increase funding", "evidence_ids": ["R1:Q01", "unknown:Q99"]},
            "Bare text bullet",
            {"text": "   "},
            {"evidence_ids": ["R1:Q01"]},
            42,
        ]);

        let bullets = parse_bullets(Some(&raw), &ids);
        assert_eq!(bullets.len(), 3);
        assert_eq!(bullets[0].text, "Increase funding");
        assert_eq!(bullets[0].evidence_ids, vec!["R1:Q01".to_string()]);
        assert_eq!(bullets[1].text, "Bare text bullet");
        assert!(bullets[1].evidence_ids.is_empty());
        assert_eq!(bullets[2].text, "42");
    }

    #[test]
    fn test_parse_bullets_non_list_is_empty() {
        let ids = HashSet::new();
        assert!(parse_bullets(Some(&json!({"not": "a list"})), &ids).is_empty());
        assert!(parse_bullets(None, &ids).is_empty());
    }

    // Scenario B: declared evidence empty, lexical match fills it.
    #[test]
    fn test_bullet_lexical_fallback() {
        let records = universe();
        let raw = json!([{"text": "Increase funding", "evidence_ids": []}]);
        let bullets = reconcile_bullets(parse_bullets(Some(&raw), &allowed(&records)), &records);

        assert_eq!(bullets.len(), 1);
        assert!(bullets[0].evidence_ids.contains(&"R1:Q01".to_string()));
        assert_eq!(bullets[0].supporting_response_ids, vec!["R1".to_string()]);
        assert_eq!(
            bullets[0].supporting_organisations,
            vec!["Alpha Energy".to_string()]
        );
        assert_eq!(bullets[0].count, 1);
    }

    // Scenario C: unknown evidence plus no lexical overlap leaves the
    // bullet evidence-free with a zero count.
    #[test]
    fn test_bullet_no_match_stays_empty() {
        let records = universe();
        let raw = json!([{"text": "Quantum widgets everywhere", "evidence_ids": ["unknown:Q99"]}]);
        let bullets = reconcile_bullets(parse_bullets(Some(&raw), &allowed(&records)), &records);

        assert_eq!(bullets.len(), 1);
        assert!(bullets[0].evidence_ids.is_empty());
        assert_eq!(bullets[0].count, 0);
    }

    // Scenario E: identical bullets reconcile independently.
    #[test]
    fn test_bullets_not_deduplicated() {
        let records = universe();
        let raw = json!([
            {"text": "Same claim", "evidence_ids": ["R1:Q01"]},
            {"text": "Same claim", "evidence_ids": ["R2:Q01"]},
        ]);
        let bullets = reconcile_bullets(parse_bullets(Some(&raw), &allowed(&records)), &records);

        assert_eq!(bullets.len(), 2);
        assert_eq!(bullets[0].evidence_ids, vec!["R1:Q01".to_string()]);
        assert_eq!(bullets[1].evidence_ids, vec!["R2:Q01".to_string()]);
    }

    #[test]
    fn test_bullet_declared_count_wins() {
        let records = universe();
        let raw = json!([{"text": "Increase funding", "evidence_ids": ["R1:Q01"], "count": 12}]);
        let bullets = reconcile_bullets(parse_bullets(Some(&raw), &allowed(&records)), &records);
        assert_eq!(bullets[0].count, 12);
    }

    #[test]
    fn test_parse_clusters_keeps_missing_label() {
        let records = universe();
        let raw = json!([
            {"stance": "support", "member_record_ids": ["R1:Q01"]},
            "not an object",
        ]);
        let clusters = parse_clusters(Some(&raw), &allowed(&records), "mainstream");

        assert_eq!(clusters.len(), 1);
        assert!(clusters[0].label.is_empty());
        assert_eq!(clusters[0].cluster_id, "mainstream_1");

        let reconciled = reconcile_clusters(clusters, &records, "mainstream");
        assert_eq!(reconciled[0].label, "Mainstream cluster 1");
    }

    #[test]
    fn test_cluster_lexical_member_fallback() {
        let records = universe();
        let raw = json!([{
            "cluster_id": "C1",
            "label": "Funding support",
            "stance": "support",
            "member_record_ids": [],
            "evidence_ids": [],
            "significance": "Organisations backing increased funding",
        }]);
        let clusters = reconcile_clusters(
            parse_clusters(Some(&raw), &allowed(&records), "mainstream"),
            &records,
            "mainstream",
        );

        assert_eq!(clusters.len(), 1);
        assert!(clusters[0]
            .member_record_ids
            .contains(&"R1:Q01".to_string()));
        assert!(!clusters[0].evidence_ids.is_empty());
        assert_eq!(clusters[0].member_count, clusters[0].member_record_ids.len());
    }

    // Scenario D: no lexical match, no stance-bucket match, arbitrary
    // sample keeps the cluster populated.
    #[test]
    fn test_cluster_sample_fallback() {
        let records = vec![record(
            "R1:Q01",
            "R1",
            "Gamma Council",
            "Q01",
            Some("Neutral"),
            "xyzzy plugh",
        )];
        let raw = json!([{
            "cluster_id": "C1",
            "label": "qqq",
            "stance": "support",
            "member_record_ids": [],
            "evidence_ids": [],
        }]);
        let clusters = reconcile_clusters(
            parse_clusters(Some(&raw), &allowed(&records), "mainstream"),
            &records,
            "mainstream",
        );

        assert_eq!(clusters[0].member_record_ids, vec!["R1:Q01".to_string()]);
    }

    #[test]
    fn test_cluster_stance_bucket_fallback() {
        let records = universe();
        let raw = json!([{
            "cluster_id": "C1",
            "label": "zzz",
            "stance": "concern",
            "member_record_ids": [],
            "evidence_ids": [],
        }]);
        let clusters = reconcile_clusters(
            parse_clusters(Some(&raw), &allowed(&records), "minority"),
            &records,
            "minority",
        );

        // "zzz" matches nothing lexically; the concern bucket holds R2.
        assert_eq!(clusters[0].member_record_ids, vec!["R2:Q01".to_string()]);
    }

    #[test]
    fn test_cluster_empty_universe_stays_empty() {
        let records: Vec<ResponseRecord> = Vec::new();
        let raw = json!([{
            "cluster_id": "C1",
            "label": "Anything",
            "stance": "support",
        }]);
        let clusters = reconcile_clusters(
            parse_clusters(Some(&raw), &HashSet::new(), "mainstream"),
            &records,
            "mainstream",
        );

        assert_eq!(clusters.len(), 1);
        assert!(clusters[0].member_record_ids.is_empty());
        assert!(clusters[0].evidence_ids.is_empty());
    }

    #[test]
    fn test_cluster_generated_description() {
        let records = universe();
        let raw = json!([{
            "cluster_id": "C1",
            "label": "Funding support",
            "stance": "support",
            "member_record_ids": ["R1:Q01"],
        }]);
        let clusters = reconcile_clusters(
            parse_clusters(Some(&raw), &allowed(&records), "mainstream"),
            &records,
            "mainstream",
        );

        assert_eq!(
            clusters[0].description,
            "1 responses from 1 organisations with support stance."
        );
    }

    // Scenario A: empty payload, stance-balanced universe.
    #[test]
    fn test_fallback_clusters_from_empty_payload() {
        let mut records = Vec::new();
        for i in 0..5 {
            records.push(record(
                &format!("S{i}:Q01"),
                &format!("S{i}"),
                &format!("Support Org {i}"),
                "Q01",
                Some("Agree"),
                "Choice: Agree.",
            ));
        }
        for i in 0..5 {
            records.push(record(
                &format!("C{i}:Q01"),
                &format!("C{i}"),
                &format!("Concern Org {i}"),
                "Q01",
                Some("Disagree"),
                "Choice: Disagree.",
            ));
        }

        let clusters = reconcile_clusters(Vec::new(), &records, "mainstream");

        assert_eq!(clusters.len(), 2);
        // Equal sizes: the enumeration order puts support first.
        assert_eq!(clusters[0].stance, Stance::Support);
        assert_eq!(clusters[1].stance, Stance::Concern);
        assert_eq!(clusters[0].cluster_id, "mainstream_1");
        assert_eq!(clusters[0].label, "Support viewpoint");
        assert_eq!(clusters[0].member_count, 5);
        assert_eq!(clusters[1].member_count, 5);
        assert!(clusters[0].evidence_ids.len() <= 8);
        assert_eq!(
            clusters[0].significance,
            "Auto-clustered by stance: support."
        );
    }

    #[test]
    fn test_fallback_clusters_order_by_size() {
        let mut records = vec![record(
            "S0:Q01",
            "S0",
            "Support Org",
            "Q01",
            Some("Agree"),
            "Choice: Agree.",
        )];
        for i in 0..3 {
            records.push(record(
                &format!("C{i}:Q01"),
                &format!("C{i}"),
                &format!("Concern Org {i}"),
                "Q01",
                Some("Disagree"),
                "Choice: Disagree.",
            ));
        }

        let clusters = build_fallback_clusters(&records, "auto");
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].stance, Stance::Concern);
        assert_eq!(clusters[0].cluster_id, "auto_1");
        assert_eq!(clusters[1].stance, Stance::Support);
    }

    #[test]
    fn test_fallback_determinism() {
        let records = universe();
        let raw = json!([{
            "label": "Funding support",
            "stance": "support",
            "significance": "Backing increased funding",
        }]);

        let run = || {
            reconcile_clusters(
                parse_clusters(Some(&raw), &allowed(&records), "mainstream"),
                &records,
                "mainstream",
            )
        };

        let first = serde_json::to_value(run()).unwrap();
        let second = serde_json::to_value(run()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_evidence_validity_invariant() {
        let records = universe();
        let ids = allowed(&records);
        let raw_bullets = json!([
            {"text": "Increase funding", "evidence_ids": ["R1:Q01", "fake:Q01"]},
            {"text": "Risk concerns"},
        ]);
        let raw_clusters = json!([
            {"label": "Support", "stance": "support", "member_record_ids": ["nope:Q01"]},
        ]);

        let bullets = reconcile_bullets(parse_bullets(Some(&raw_bullets), &ids), &records);
        let clusters = reconcile_clusters(
            parse_clusters(Some(&raw_clusters), &ids, "mainstream"),
            &records,
            "mainstream",
        );

        for bullet in &bullets {
            for id in &bullet.evidence_ids {
                assert!(ids.contains(id));
            }
        }
        for cluster in &clusters {
            assert!(!cluster.member_record_ids.is_empty());
            for id in cluster
                .member_record_ids
                .iter()
                .chain(cluster.evidence_ids.iter())
            {
                assert!(ids.contains(id));
            }
        }
    }

    #[test]
    fn test_evidence_index_sorted_and_skips_unknown() {
        let records = universe();
        let referenced: BTreeSet<String> = [
            "R3:Q01".to_string(),
            "R1:Q01".to_string(),
            "ghost:Q09".to_string(),
        ]
        .into_iter()
        .collect();

        let index = build_evidence_index(&records, &referenced);
        assert_eq!(index.len(), 2);
        assert_eq!(index[0].record_id, "R1:Q01");
        assert_eq!(index[1].record_id, "R3:Q01");
        assert!(!index[0].excerpt.is_empty());
    }

    #[test]
    fn test_referenced_id_collectors() {
        let bullets = vec![Bullet {
            text: "b".into(),
            evidence_ids: vec!["R1:Q01".into(), "R2:Q01".into()],
            ..Bullet::default()
        }];
        let ids = referenced_ids_from_bullets(&bullets);
        assert_eq!(ids.len(), 2);

        let clusters = vec![Cluster {
            cluster_id: "c1".into(),
            label: "l".into(),
            stance: Stance::Support,
            member_record_ids: vec!["R1:Q01".into()],
            evidence_ids: vec!["R3:Q01".into()],
            significance: String::new(),
            description: String::new(),
            member_count: 0,
            response_count: 0,
            organisation_count: 0,
            supporting_response_ids: Vec::new(),
            supporting_organisations: Vec::new(),
        }];
        let ids = referenced_ids_from_clusters(&clusters);
        assert!(ids.contains("R1:Q01"));
        assert!(ids.contains("R3:Q01"));
    }
}
