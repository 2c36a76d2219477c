//! Typed errors for the summarisation library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during summarisation operations.
#[derive(Debug, Error)]
pub enum SummariseError {
    /// Dataset ingestion failed
    #[error("ingestion failed: {0}")]
    Ingest(#[from] IngestError),

    /// Model provider call failed
    #[error("LLM provider error: {0}")]
    Llm(#[from] LlmError),

    /// Summary cache operation failed
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// No records exist for the requested submission
    #[error("no records found for response ID: {id}")]
    UnknownResponseId { id: String },

    /// The requested question is not part of the dataset
    #[error("unknown question ID: {id}")]
    UnknownQuestionId { id: String },

    /// Result serialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors that can occur while loading the source dataset.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Source file does not exist
    #[error("source file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// File read failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing failed
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    /// A required column is missing from the dataset
    #[error("column not found: {header}")]
    MissingColumn { header: String },

    /// The dataset has no header row
    #[error("source file has no header row")]
    EmptyDataset,
}

/// Errors raised by model providers.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Provider credentials or selection are missing/invalid
    #[error("provider not configured: {0}")]
    NotConfigured(String),

    /// HTTP transport failed
    #[error("provider network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Provider returned a non-success status
    #[error("provider HTTP error {status}: {body}")]
    Http { status: u16, body: String },

    /// Provider response did not have the expected shape
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// All attempts timed out or failed transiently
    #[error("provider request failed after {attempts} attempts: {reason}")]
    Exhausted { attempts: u32, reason: String },
}

/// Errors raised by the summary cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Underlying SQLite operation failed
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Payload (de)serialization failed
    #[error("payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Cache directory could not be created
    #[error("cache path error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for summarisation operations.
pub type Result<T> = std::result::Result<T, SummariseError>;

/// Result type alias for ingestion operations.
pub type IngestResult<T> = std::result::Result<T, IngestError>;

/// Result type alias for provider operations.
pub type LlmResult<T> = std::result::Result<T, LlmError>;

/// Result type alias for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;
