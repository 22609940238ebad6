//! Aggregator strategies
//!
//! Three pluggable laws under one contract: weighted mean, median and
//! trimmed mean. Inputs are non-empty canonical quotes sharing one
//! symbol; the output is the consensus numeric price.

use std::collections::HashMap;

use crate::error::AggregateError;
use crate::stats;
use crate::types::{AggregationMethod, CanonicalQuote};

/// Common contract for all aggregation laws.
pub trait AggregationStrategy: Send + Sync {
    fn method(&self) -> AggregationMethod;

    /// Compute the consensus price. `weights` maps source identifiers
    /// to effective weights; absent entries default to 1.0.
    fn aggregate(
        &self,
        quotes: &[CanonicalQuote],
        weights: Option<&HashMap<String, f64>>,
    ) -> Result<f64, AggregateError>;
}

/// Effective weight for one quote: the map entry for its source, else 1.0.
fn effective_weight(quote: &CanonicalQuote, weights: Option<&HashMap<String, f64>>) -> f64 {
    weights
        .and_then(|w| w.get(quote.source.as_str()).copied())
        .unwrap_or(1.0)
}

fn weighted_mean_of(
    quotes: &[CanonicalQuote],
    weights: Option<&HashMap<String, f64>>,
) -> Result<f64, AggregateError> {
    if quotes.is_empty() {
        return Err(AggregateError::EmptyInput);
    }
    let prices: Vec<f64> = quotes.iter().map(|q| q.price).collect();
    let quote_weights: Vec<f64> = quotes.iter().map(|q| effective_weight(q, weights)).collect();
    stats::weighted_mean(&prices, &quote_weights).ok_or(AggregateError::ZeroTotalWeight)
}

/// Weighted arithmetic mean over source trust weights.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedMean;

impl AggregationStrategy for WeightedMean {
    fn method(&self) -> AggregationMethod {
        AggregationMethod::WeightedMean
    }

    fn aggregate(
        &self,
        quotes: &[CanonicalQuote],
        weights: Option<&HashMap<String, f64>>,
    ) -> Result<f64, AggregateError> {
        weighted_mean_of(quotes, weights)
    }
}

/// Sorted median. Weights are ignored by contract; stable against a
/// single outlier regardless of magnitude.
#[derive(Debug, Clone, Copy, Default)]
pub struct Median;

impl AggregationStrategy for Median {
    fn method(&self) -> AggregationMethod {
        AggregationMethod::Median
    }

    fn aggregate(
        &self,
        quotes: &[CanonicalQuote],
        _weights: Option<&HashMap<String, f64>>,
    ) -> Result<f64, AggregateError> {
        if quotes.is_empty() {
            return Err(AggregateError::EmptyInput);
        }
        let prices: Vec<f64> = quotes.iter().map(|q| q.price).collect();
        stats::median(&prices).ok_or(AggregateError::EmptyInput)
    }
}

/// Trimmed mean: drop floor(n * fraction) quotes from each tail of the
/// price-sorted set, then weighted-mean the remainder. Falls back to the
/// plain weighted mean below three elements.
#[derive(Debug, Clone, Copy)]
pub struct TrimmedMean {
    fraction: f64,
}

impl TrimmedMean {
    /// Construct with a trim fraction in [0, 0.5).
    pub fn new(fraction: f64) -> Result<Self, AggregateError> {
        if !fraction.is_finite() || !(0.0..0.5).contains(&fraction) {
            return Err(AggregateError::InvalidOptions(format!(
                "trim fraction must be in [0, 0.5), got {fraction}"
            )));
        }
        Ok(Self { fraction })
    }

    pub fn fraction(&self) -> f64 {
        self.fraction
    }
}

impl AggregationStrategy for TrimmedMean {
    fn method(&self) -> AggregationMethod {
        AggregationMethod::TrimmedMean
    }

    fn aggregate(
        &self,
        quotes: &[CanonicalQuote],
        weights: Option<&HashMap<String, f64>>,
    ) -> Result<f64, AggregateError> {
        if quotes.is_empty() {
            return Err(AggregateError::EmptyInput);
        }
        if quotes.len() < 3 {
            return weighted_mean_of(quotes, weights);
        }

        // Stable sort keeps equal prices position-stable.
        let mut sorted: Vec<&CanonicalQuote> = quotes.iter().collect();
        sorted.sort_by(|a, b| {
            a.price
                .partial_cmp(&b.price)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let n = sorted.len();
        let k = (n as f64 * self.fraction).floor() as usize;
        let kept = &sorted[k..n - k];

        let prices: Vec<f64> = kept.iter().map(|q| q.price).collect();
        let kept_weights: Vec<f64> = kept.iter().map(|q| effective_weight(q, weights)).collect();
        stats::weighted_mean(&prices, &kept_weights).ok_or(AggregateError::ZeroTotalWeight)
    }
}

/// Build the strategy for a method; the trimmed mean binds the given
/// fraction at construction.
pub fn strategy_for(
    method: AggregationMethod,
    trim_fraction: f64,
) -> Result<Box<dyn AggregationStrategy>, AggregateError> {
    match method {
        AggregationMethod::WeightedMean => Ok(Box::new(WeightedMean)),
        AggregationMethod::Median => Ok(Box::new(Median)),
        AggregationMethod::TrimmedMean => Ok(Box::new(TrimmedMean::new(trim_fraction)?)),
    }
}
