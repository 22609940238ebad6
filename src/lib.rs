//! pricefuse
//!
//! Multi-source consensus price feed: scheduled ingestion, per-source
//! normalization into canonical quotes, and confidence-scored
//! aggregation over a sliding window.

pub mod aggregate;
pub mod cache;
pub mod commitment;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod normalize;
pub mod publish;
pub mod retry;
pub mod scheduler;
pub mod stats;
pub mod types;
