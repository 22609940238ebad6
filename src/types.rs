//! Core types used throughout pricefuse
//!
//! Defines the raw/canonical quote records, consensus output, and the
//! per-call aggregation options.

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::AggregateError;

/// Provider-native price record, exactly as ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawQuote {
    /// Free-form identifier from the provider (e.g. "AAPL.US", "US-GOOGL")
    pub symbol: String,
    /// Quote in provider units
    pub price: f64,
    /// Epoch milliseconds
    pub timestamp: i64,
    /// Free-form provider name (e.g. "alpha-vantage")
    pub source: String,
}

/// Canonical price source identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    AlphaVantage,
    Finnhub,
    YahooFinance,
    Mock,
    Unknown,
}

impl SourceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::AlphaVantage => "alpha_vantage",
            SourceId::Finnhub => "finnhub",
            SourceId::YahooFinance => "yahoo_finance",
            SourceId::Mock => "mock",
            SourceId::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit metadata recorded by the canonical record builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditInfo {
    /// Provider name as received
    pub original_source: String,
    /// Symbol as received
    pub original_symbol: String,
    /// Epoch ms when normalization ran
    pub normalized_at: i64,
    /// Version tag of the normalizer variant that handled the record
    pub normalizer_version: String,
    /// True iff `transformations` is non-empty
    pub was_transformed: bool,
    /// Human-readable change log, e.g. "symbol: AAPL.US -> AAPL"
    pub transformations: Vec<String>,
}

/// Validated internal price record with standard symbol, rounded price
/// and ISO timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalQuote {
    /// Trimmed, upper-cased, provider affix stripped
    pub symbol: String,
    /// Rounded to four decimal places, half away from zero
    pub price: f64,
    /// ISO-8601 UTC with millisecond precision, parses back to
    /// `original_timestamp`
    pub iso_timestamp: String,
    /// Unchanged epoch ms from the raw record
    pub original_timestamp: i64,
    pub source: SourceId,
    pub audit: AuditInfo,
}

/// Aggregation law selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AggregationMethod {
    WeightedMean,
    Median,
    TrimmedMean,
}

impl Default for AggregationMethod {
    fn default() -> Self {
        AggregationMethod::WeightedMean
    }
}

impl AggregationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationMethod::WeightedMean => "weighted-mean",
            AggregationMethod::Median => "median",
            AggregationMethod::TrimmedMean => "trimmed-mean",
        }
    }
}

impl fmt::Display for AggregationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregationMethod {
    type Err = AggregateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "weighted-mean" | "weighted_mean" => Ok(AggregationMethod::WeightedMean),
            "median" => Ok(AggregationMethod::Median),
            "trimmed-mean" | "trimmed_mean" => Ok(AggregationMethod::TrimmedMean),
            other => Err(AggregateError::UnknownMethod(other.to_string())),
        }
    }
}

/// Quality metrics attached to every consensus price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceMetrics {
    pub standard_deviation: f64,
    /// 100 * (max - min) / mean; 0 when the mean is 0
    pub spread_percent: f64,
    pub source_count: usize,
    pub variance: f64,
}

/// Aggregated consensus price with provenance and quality metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusPrice {
    pub symbol: String,
    pub price: f64,
    pub method: AggregationMethod,
    /// Bounded score in [0, 100] from source count, spread and dispersion
    pub confidence: f64,
    pub metrics: PriceMetrics,
    /// Epoch ms of the earliest quote used
    pub window_start: i64,
    /// Epoch ms of the latest quote used
    pub window_end: i64,
    /// Distinct contributing source identifiers, sorted
    pub sources: Vec<String>,
    /// Epoch ms at emission
    pub computed_at: i64,
}

/// Per-call aggregation configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationOptions {
    /// Minimum distinct quotes required, before and after window filtering
    pub min_sources: usize,
    /// Sliding window length in milliseconds
    pub window_millis: i64,
    pub method: AggregationMethod,
    /// Fraction trimmed from each tail by the trimmed mean, in [0, 0.5)
    pub trim_fraction: f64,
    /// Per-source weight overrides applied on top of the registry
    pub source_weight_overrides: Option<HashMap<String, f64>>,
}

impl Default for AggregationOptions {
    fn default() -> Self {
        Self {
            min_sources: 3,
            window_millis: 30_000,
            method: AggregationMethod::WeightedMean,
            trim_fraction: 0.20,
            source_weight_overrides: None,
        }
    }
}

/// Current epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Format an epoch-ms timestamp as ISO-8601 UTC with millisecond
/// precision ("2026-08-02T09:15:30.123Z").
pub fn format_iso_millis(epoch_ms: i64) -> Option<String> {
    let dt = Utc.timestamp_millis_opt(epoch_ms).single()?;
    Some(dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
}

/// Parse an ISO-8601 timestamp back to epoch milliseconds.
pub fn parse_iso_millis(iso: &str) -> Option<i64> {
    chrono::DateTime::parse_from_rfc3339(iso)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_parses_kebab_and_snake() {
        assert_eq!(
            "weighted-mean".parse::<AggregationMethod>().unwrap(),
            AggregationMethod::WeightedMean
        );
        assert_eq!(
            "trimmed_mean".parse::<AggregationMethod>().unwrap(),
            AggregationMethod::TrimmedMean
        );
        assert!(matches!(
            "harmonic".parse::<AggregationMethod>(),
            Err(AggregateError::UnknownMethod(_))
        ));
    }

    #[test]
    fn iso_round_trip_preserves_millis() {
        let ts = 1_754_100_000_123_i64;
        let iso = format_iso_millis(ts).unwrap();
        assert!(iso.ends_with('Z'));
        assert_eq!(parse_iso_millis(&iso), Some(ts));
    }

    #[test]
    fn source_id_serializes_snake_case() {
        let json = serde_json::to_string(&SourceId::AlphaVantage).unwrap();
        assert_eq!(json, "\"alpha_vantage\"");
    }
}
