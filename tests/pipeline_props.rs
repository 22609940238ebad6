//! Property-based tests for the normalization and aggregation pipeline
//!
//! Universal invariants checked across randomly generated inputs with
//! the `proptest` crate.

use std::sync::Arc;

use proptest::prelude::*;

use pricefuse::aggregate::{
    confidence_score, AggregationEngine, AggregationStrategy, Median, SourceWeightRegistry,
    TrimmedMean, WeightedMean,
};
use pricefuse::cache::LastValueCache;
use pricefuse::normalize::NormalizerRegistry;
use pricefuse::types::{
    format_iso_millis, now_millis, parse_iso_millis, AggregationOptions, CanonicalQuote, RawQuote,
};

// =============================================================================
// Generators
// =============================================================================

/// A provider-shaped raw quote: one of the four recognized sources with
/// a symbol in that provider's native convention.
fn arb_raw_quote() -> impl Strategy<Value = RawQuote> {
    let base_symbol = "[A-Z]{1,6}";
    (
        base_symbol,
        0..4usize,
        0.0001f64..1.0e6,
        1_000_000_000_000i64..2_000_000_000_000,
        any::<bool>(),
    )
        .prop_map(|(base, variant, price, timestamp, decorate)| {
            let (symbol, source) = match variant {
                0 => (
                    if decorate { format!("{base}.US") } else { base },
                    "alpha-vantage".to_string(),
                ),
                1 => (
                    if decorate { format!("US-{base}") } else { base },
                    "finnhub".to_string(),
                ),
                2 => (
                    if decorate { format!("^{base}") } else { base },
                    "yahoo_finance".to_string(),
                ),
                _ => (base, "mock".to_string()),
            };
            RawQuote {
                symbol,
                price,
                timestamp,
                source,
            }
        })
}

/// Positive price set with size in [min_len, 12].
fn arb_prices(min_len: usize) -> impl Strategy<Value = Vec<f64>> {
    proptest::collection::vec(0.01f64..1.0e5, min_len..=12)
}

fn quotes_from_prices(symbol: &str, prices: &[f64]) -> Vec<CanonicalQuote> {
    let registry = NormalizerRegistry::new();
    let now = now_millis();
    prices
        .iter()
        .map(|price| {
            registry
                .normalize(&RawQuote {
                    symbol: symbol.to_string(),
                    price: *price,
                    timestamp: now - 500,
                    source: "mock".to_string(),
                })
                .expect("valid quote")
        })
        .collect()
}

fn engine() -> AggregationEngine {
    AggregationEngine::new(
        Arc::new(SourceWeightRegistry::new()),
        Arc::new(LastValueCache::new()),
    )
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Normalizing a normalized record changes nothing.
    #[test]
    fn normalization_is_idempotent(raw in arb_raw_quote()) {
        let registry = NormalizerRegistry::new();
        let first = registry.normalize(&raw).unwrap();

        let second = registry.normalize(&RawQuote {
            symbol: first.symbol.clone(),
            price: first.price,
            timestamp: first.original_timestamp,
            source: first.source.to_string(),
        }).unwrap();

        prop_assert_eq!(&second.symbol, &first.symbol);
        prop_assert_eq!(second.price, first.price);
        prop_assert_eq!(&second.iso_timestamp, &first.iso_timestamp);
        prop_assert_eq!(second.source, first.source);
        prop_assert!(!second.audit.was_transformed);
    }

    /// The ISO timestamp written by normalization parses back to the
    /// original epoch milliseconds.
    #[test]
    fn iso_timestamp_round_trips(raw in arb_raw_quote()) {
        let registry = NormalizerRegistry::new();
        let canonical = registry.normalize(&raw).unwrap();
        prop_assert_eq!(parse_iso_millis(&canonical.iso_timestamp), Some(raw.timestamp));
        let formatted = format_iso_millis(raw.timestamp);
        prop_assert_eq!(
            formatted.as_deref(),
            Some(canonical.iso_timestamp.as_str())
        );
    }

    /// Equal-price inputs collapse to that price under every law, and
    /// confidence stays within [0, 100].
    #[test]
    fn equal_prices_are_a_fixed_point(
        price in 0.01f64..1.0e5,
        count in 1usize..10,
    ) {
        let price = (price * 10_000.0).round() / 10_000.0;
        let quotes = quotes_from_prices("AAPL", &vec![price; count]);

        let mean = WeightedMean.aggregate(&quotes, None).unwrap();
        let median = Median.aggregate(&quotes, None).unwrap();
        let trimmed = TrimmedMean::new(0.2).unwrap().aggregate(&quotes, None).unwrap();

        prop_assert!((mean - price).abs() <= price * 1e-12);
        prop_assert_eq!(median, price);
        prop_assert!((trimmed - price).abs() <= price * 1e-12);

        let consensus = engine().aggregate("AAPL", &quotes, &AggregationOptions {
            min_sources: 1,
            ..Default::default()
        }).unwrap();
        prop_assert!((0.0..=100.0).contains(&consensus.confidence));
    }

    /// Median is invariant under input permutation.
    #[test]
    fn median_ignores_input_order(prices in arb_prices(1), seed in any::<u64>()) {
        let quotes = quotes_from_prices("AAPL", &prices);
        let baseline = Median.aggregate(&quotes, None).unwrap();

        let mut shuffled = quotes.clone();
        // Deterministic Fisher-Yates driven by the seed.
        let mut state = seed | 1;
        for i in (1..shuffled.len()).rev() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let j = (state >> 33) as usize % (i + 1);
            shuffled.swap(i, j);
        }

        prop_assert_eq!(Median.aggregate(&shuffled, None).unwrap(), baseline);
    }

    /// A trim fraction of zero reduces the trimmed mean to the weighted
    /// mean over the same inputs.
    #[test]
    fn zero_trim_equals_weighted_mean(prices in arb_prices(1)) {
        let quotes = quotes_from_prices("AAPL", &prices);
        let trimmed = TrimmedMean::new(0.0).unwrap().aggregate(&quotes, None).unwrap();
        let mean = WeightedMean.aggregate(&quotes, None).unwrap();
        prop_assert_eq!(trimmed, mean);
    }

    /// One extreme outlier cannot drag the median or the 20% trimmed
    /// mean outside the original value range.
    #[test]
    fn single_outlier_is_contained(
        prices in proptest::collection::vec(90.0f64..110.0, 5..=9),
        outlier in prop_oneof![1.0e7f64..1.0e9, 0.0001f64..0.001],
    ) {
        let min = prices.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = prices.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        let mut with_outlier = prices.clone();
        with_outlier.push(outlier);
        let quotes = quotes_from_prices("AAPL", &with_outlier);

        let median = Median.aggregate(&quotes, None).unwrap();
        prop_assert!(median >= min && median <= max);

        let trimmed = TrimmedMean::new(0.2).unwrap().aggregate(&quotes, None).unwrap();
        prop_assert!(trimmed >= min && trimmed <= max);
    }

    /// Confidence never decreases as the source count grows, with
    /// spread and dispersion held fixed.
    #[test]
    fn confidence_monotonic_in_sources(
        spread in 0.0f64..50.0,
        std_dev in 0.0f64..200.0,
    ) {
        let mut last = 0.0;
        for count in 1..=16 {
            let score = confidence_score(count, spread, std_dev);
            prop_assert!(score >= last);
            prop_assert!((0.0..=100.0).contains(&score));
            last = score;
        }
    }

    /// Every emitted consensus satisfies windowStart <= windowEnd <=
    /// computedAt.
    #[test]
    fn window_ordering_invariant(prices in arb_prices(3)) {
        let quotes = quotes_from_prices("AAPL", &prices);
        let consensus = engine()
            .aggregate("AAPL", &quotes, &AggregationOptions::default())
            .unwrap();

        prop_assert!(consensus.window_start <= consensus.window_end);
        prop_assert!(consensus.window_end <= consensus.computed_at);
        prop_assert_eq!(consensus.metrics.source_count, prices.len());
    }
}
