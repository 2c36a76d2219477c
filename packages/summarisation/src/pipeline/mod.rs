//! Summarisation pipeline - the core of the library.
//!
//! The pipeline covers:
//! - Stance classification (rule cascade over choice values and text)
//! - Lexical matching (token-overlap evidence fallback)
//! - Bullet/cluster reconciliation against the record universe
//! - Approach 1 (per-organisation) and Approach 2 (per-question) flows
//! - Prompt construction for both approaches

pub mod matcher;
pub mod organisation;
pub mod prompts;
pub mod question;
pub mod reconcile;
pub mod stance;

pub use matcher::match_records;
pub use organisation::summarise_organisation;
pub use question::summarise_question;
pub use reconcile::{
    build_evidence_index, build_fallback_clusters, parse_bullets, parse_clusters,
    reconcile_bullets, reconcile_clusters, referenced_ids_from_bullets,
    referenced_ids_from_clusters, validate_ids,
};
pub use stance::classify_stance;
