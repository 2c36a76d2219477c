//! Consultation Response Summarisation Library
//!
//! Ingests a tabular consultation-response dataset and produces two kinds
//! of LLM-backed narrative summaries: per-organisation (Approach 1) and
//! per-question (Approach 2).
//!
//! # Design Philosophy
//!
//! **Trust nothing the model says about evidence.**
//!
//! - Every evidence link is validated against the known record universe
//! - Missing links are repaired by deterministic lexical matching
//! - Cluster membership degrades through successive fallback tiers rather
//!   than failing
//! - Malformed model output never raises - partial payloads are expected
//!
//! # Usage
//!
//! ```rust,ignore
//! use summarisation::{
//!     build_provider, load_prepared_data, ConsultationService, Settings, SummaryCache,
//! };
//!
//! let settings = Settings::from_env();
//! let llm = build_provider(&settings, true)?;
//! let cache = Some(SummaryCache::open(&settings.cache_path).await?);
//! let prepared = load_prepared_data(&settings)?;
//!
//! let service = ConsultationService::new(settings, llm, cache, prepared);
//! let summary = service.summarise_question("Q01", true).await?;
//! ```
//!
//! # Modules
//!
//! - [`ingestion`] - CSV loading and section-mapping alignment
//! - [`processing`] - question inference and record assembly
//! - [`pipeline`] - reconciliation core and the two summary approaches
//! - [`llm`] - provider trait and OpenAI/Azure implementations
//! - [`cache`] - SQLite summary cache
//! - [`evaluation`] - quality and cost KPIs
//! - [`service`] - orchestration facade for CLI layers
//! - [`testing`] - mock providers and record builders

pub mod cache;
pub mod error;
pub mod evaluation;
pub mod ingestion;
pub mod llm;
pub mod pipeline;
pub mod processing;
pub mod service;
pub mod testing;
pub mod types;

// Re-export core types at crate root
pub use error::{CacheError, IngestError, LlmError, Result, SummariseError};
pub use types::{
    config::Settings,
    record::{
        ColumnSpec, ConsultationData, OrganisationCatalog, PreparedData, QuestionDefinition,
        QuestionSlice, ResponseRecord,
    },
    summary::{
        Bullet, Cluster, EvidenceRef, LlmUsage, OrganisationSummary, QuestionSummary,
        SectionSummary, Stance, SummaryMetrics,
    },
};

// Re-export pipeline components
pub use pipeline::{
    build_evidence_index, build_fallback_clusters, classify_stance, match_records, parse_bullets,
    parse_clusters, reconcile_bullets, reconcile_clusters, referenced_ids_from_bullets,
    referenced_ids_from_clusters, summarise_organisation, summarise_question, validate_ids,
};

// Re-export providers and orchestration
pub use cache::{data_fingerprint, SummaryCache};
pub use llm::{build_provider, JsonCompletion, LlmProvider};
pub use service::{load_prepared_data, ConsultationService};
