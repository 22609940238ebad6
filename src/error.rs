//! Typed error kinds for every core seam
//!
//! Batch operations return `(successes, failures)` pairs; individual
//! operations fail fast with one of these kinds.

use thiserror::Error;

/// Normalization failures, one per raw record.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NormalizeError {
    /// Raw record fails a field constraint
    #[error("validation failure: {0}")]
    ValidationFailure(String),
    /// No registered normalizer recognizes the source
    #[error("no normalizer found for source '{0}'")]
    NoNormalizerFound(String),
}

/// Aggregation failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AggregateError {
    #[error("empty input: no quotes supplied")]
    EmptyInput,
    #[error("invalid options: {0}")]
    InvalidOptions(String),
    #[error("insufficient sources: have {have}, need {need}")]
    InsufficientSources { have: usize, need: usize },
    #[error("insufficient recent sources: {have} inside the window, need {need}")]
    InsufficientRecentSources { have: usize, need: usize },
    #[error("symbol mismatch: expected '{expected}', found '{found}'")]
    SymbolMismatch { expected: String, found: String },
    #[error("invalid price value: {0}")]
    InvalidPriceValue(f64),
    #[error("unknown aggregation method '{0}'")]
    UnknownMethod(String),
    #[error("zero total weight across all quotes")]
    ZeroTotalWeight,
}

/// Ingestion failures, retried per policy before surfacing.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IngestError {
    #[error("ingestion timeout after {millis}ms from '{source_id}'")]
    Timeout { source_id: String, millis: u64 },
    #[error("provider error from '{source_id}': {message}")]
    Provider { source_id: String, message: String },
}

/// Downstream publish failures; the cycle continues and counts them.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PublishError {
    #[error("publish rejected: {0}")]
    Rejected(String),
    #[error("publish transport error: {0}")]
    Transport(String),
}

/// Startup configuration failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
    #[error("failed to load configuration: {0}")]
    Load(String),
}
