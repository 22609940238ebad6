//! Normalizer registry and dispatch
//!
//! Turns heterogeneous provider records into canonical quotes. Each
//! registered variant carries a recognition predicate and a symbol
//! rewrite rule; the dispatcher picks the first variant that
//! recognizes a raw record and runs the shared canonical builder.

mod canonical;
mod rules;

pub use canonical::{build_canonical, round_price};
pub use rules::Normalizer;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::NormalizeError;
use crate::types::{now_millis, CanonicalQuote, RawQuote, SourceId};

/// A raw record that failed normalization, with the error kind and the
/// emission time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizeFailure {
    pub raw: RawQuote,
    pub error: String,
    pub failed_at: i64,
}

/// Registry of normalizer variants in fixed dispatch order.
#[derive(Debug, Clone)]
pub struct NormalizerRegistry {
    variants: Vec<Normalizer>,
}

impl Default for NormalizerRegistry {
    fn default() -> Self {
        Self {
            variants: vec![
                Normalizer::AlphaVantage,
                Normalizer::Finnhub,
                Normalizer::YahooFinance,
                Normalizer::Mock,
            ],
        }
    }
}

impl NormalizerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick the first variant whose recognition predicate matches.
    pub fn resolve(&self, raw: &RawQuote) -> Option<Normalizer> {
        self.variants.iter().copied().find(|n| n.recognizes(raw))
    }

    /// Normalize one raw quote into its canonical form.
    pub fn normalize(&self, raw: &RawQuote) -> Result<CanonicalQuote, NormalizeError> {
        let normalizer = self
            .resolve(raw)
            .ok_or_else(|| NormalizeError::NoNormalizerFound(raw.source.clone()))?;
        build_canonical(raw, normalizer)
    }

    /// Normalize a batch, returning successes and failures separately.
    /// Failing quotes never abort the batch.
    pub fn normalize_batch(
        &self,
        raws: &[RawQuote],
    ) -> (Vec<CanonicalQuote>, Vec<NormalizeFailure>) {
        let mut successes = Vec::with_capacity(raws.len());
        let mut failures = Vec::new();

        for raw in raws {
            match self.normalize(raw) {
                Ok(canonical) => successes.push(canonical),
                Err(err) => {
                    debug!(source = %raw.source, symbol = %raw.symbol, error = %err, "dropping quote");
                    failures.push(NormalizeFailure {
                        raw: raw.clone(),
                        error: err.to_string(),
                        failed_at: now_millis(),
                    });
                }
            }
        }

        (successes, failures)
    }

    /// Normalize a batch and group the successes by canonical source.
    pub fn normalize_grouped(
        &self,
        raws: &[RawQuote],
    ) -> (HashMap<SourceId, Vec<CanonicalQuote>>, Vec<NormalizeFailure>) {
        let (successes, failures) = self.normalize_batch(raws);
        let mut grouped: HashMap<SourceId, Vec<CanonicalQuote>> = HashMap::new();
        for quote in successes {
            grouped.entry(quote.source).or_default().push(quote);
        }
        (grouped, failures)
    }
}
