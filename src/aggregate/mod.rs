//! Aggregation engine
//!
//! Fuses canonical quotes for one symbol into a consensus price:
//! window filtering, validation, strategy selection, weight resolution,
//! confidence scoring. The engine is stateless apart from writing the
//! last-value cache.

mod strategies;
mod weights;

pub use strategies::{strategy_for, AggregationStrategy, Median, TrimmedMean, WeightedMean};
pub use weights::{SourceWeightRegistry, DEFAULT_WEIGHT};

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::LastValueCache;
use crate::error::AggregateError;
use crate::stats;
use crate::types::{
    now_millis, AggregationOptions, CanonicalQuote, ConsensusPrice, PriceMetrics,
};

/// Deterministic confidence score in [0, 100].
///
/// sourceScore = min(40, 10 + 3 * sourceCount)
/// spreadScore = max(0, 30 - 3 * spreadPercent)
/// stdDevScore = max(0, 30 - 0.3 * stdDev)
pub fn confidence_score(source_count: usize, spread_percent: f64, std_dev: f64) -> f64 {
    let source_score = (10.0 + 3.0 * source_count as f64).min(40.0);
    let spread_score = (30.0 - 3.0 * spread_percent).max(0.0);
    let std_dev_score = (30.0 - 0.3 * std_dev).max(0.0);
    (source_score + spread_score + std_dev_score).clamp(0.0, 100.0)
}

#[derive(Clone)]
pub struct AggregationEngine {
    weights: Arc<SourceWeightRegistry>,
    cache: Arc<LastValueCache>,
}

impl AggregationEngine {
    pub fn new(weights: Arc<SourceWeightRegistry>, cache: Arc<LastValueCache>) -> Self {
        Self { weights, cache }
    }

    pub fn cache(&self) -> &Arc<LastValueCache> {
        &self.cache
    }

    /// Fuse quotes for one symbol into a consensus price.
    pub fn aggregate(
        &self,
        symbol: &str,
        quotes: &[CanonicalQuote],
        options: &AggregationOptions,
    ) -> Result<ConsensusPrice, AggregateError> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(AggregateError::InvalidOptions("symbol is empty".into()));
        }
        if quotes.is_empty() {
            return Err(AggregateError::EmptyInput);
        }
        if options.min_sources == 0 {
            return Err(AggregateError::InvalidOptions(
                "min_sources must be at least 1".into(),
            ));
        }
        if quotes.len() < options.min_sources {
            return Err(AggregateError::InsufficientSources {
                have: quotes.len(),
                need: options.min_sources,
            });
        }
        for quote in quotes {
            if quote.symbol != symbol {
                return Err(AggregateError::SymbolMismatch {
                    expected: symbol.to_string(),
                    found: quote.symbol.clone(),
                });
            }
            if !quote.price.is_finite() || quote.price <= 0.0 {
                return Err(AggregateError::InvalidPriceValue(quote.price));
            }
        }

        // Window filter: keep quotes no older than now - window.
        let now = now_millis();
        let cutoff = now - options.window_millis;
        let survivors: Vec<CanonicalQuote> = quotes
            .iter()
            .filter(|q| q.original_timestamp >= cutoff)
            .cloned()
            .collect();
        if survivors.len() < options.min_sources {
            return Err(AggregateError::InsufficientRecentSources {
                have: survivors.len(),
                need: options.min_sources,
            });
        }

        let strategy = strategy_for(options.method, options.trim_fraction)?;

        // Resolve one effective weight per distinct source: the
        // caller's override if present, else the registry entry.
        let mut resolved: HashMap<String, f64> = HashMap::new();
        for quote in &survivors {
            let source = quote.source.as_str().to_string();
            if resolved.contains_key(&source) {
                continue;
            }
            let weight = options
                .source_weight_overrides
                .as_ref()
                .and_then(|o| o.get(&source).copied())
                .unwrap_or_else(|| self.weights.weight_of(&source));
            resolved.insert(source, weight);
        }

        let price = strategy.aggregate(&survivors, Some(&resolved))?;

        let prices: Vec<f64> = survivors.iter().map(|q| q.price).collect();
        let variance = stats::variance(&prices);
        let std_dev = variance.sqrt();
        let spread_percent = stats::spread_percent(&prices);

        let mut sources: Vec<String> = survivors
            .iter()
            .map(|q| q.source.as_str().to_string())
            .collect();
        sources.sort();
        sources.dedup();

        let window_start = survivors
            .iter()
            .map(|q| q.original_timestamp)
            .min()
            .unwrap_or(now);
        let window_end = survivors
            .iter()
            .map(|q| q.original_timestamp)
            .max()
            .unwrap_or(now);

        let consensus = ConsensusPrice {
            symbol: symbol.to_string(),
            price,
            method: strategy.method(),
            confidence: confidence_score(survivors.len(), spread_percent, std_dev),
            metrics: PriceMetrics {
                standard_deviation: std_dev,
                spread_percent,
                source_count: survivors.len(),
                variance,
            },
            window_start,
            window_end,
            sources,
            computed_at: now,
        };

        self.cache.update(symbol, consensus.clone(), survivors);
        debug!(
            symbol,
            price = consensus.price,
            confidence = consensus.confidence,
            sources = consensus.metrics.source_count,
            "consensus computed"
        );

        Ok(consensus)
    }

    /// Batch form over a symbol -> quotes mapping. Failing symbols are
    /// logged and omitted; other symbols proceed.
    pub fn aggregate_many(
        &self,
        grouped: &HashMap<String, Vec<CanonicalQuote>>,
        options: &AggregationOptions,
    ) -> HashMap<String, ConsensusPrice> {
        let mut results = HashMap::new();
        for (symbol, quotes) in grouped {
            match self.aggregate(symbol, quotes, options) {
                Ok(consensus) => {
                    results.insert(symbol.clone(), consensus);
                }
                Err(err) => {
                    warn!(symbol = %symbol, error = %err, "skipping symbol");
                }
            }
        }
        results
    }
}
