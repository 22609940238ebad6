//! Canonical record builder
//!
//! Shared validator and transformer invoked for every raw quote
//! regardless of which normalizer variant recognized it.

use crate::error::NormalizeError;
use crate::normalize::rules::Normalizer;
use crate::types::{format_iso_millis, now_millis, AuditInfo, CanonicalQuote, RawQuote};

/// Round to four decimal places, half away from zero.
pub fn round_price(price: f64) -> f64 {
    (price * 10_000.0).round() / 10_000.0
}

/// Validate a raw quote and build the canonical record using the given
/// strategy's symbol rewrite.
pub fn build_canonical(
    raw: &RawQuote,
    normalizer: Normalizer,
) -> Result<CanonicalQuote, NormalizeError> {
    if raw.symbol.trim().is_empty() {
        return Err(NormalizeError::ValidationFailure(
            "symbol is empty".to_string(),
        ));
    }
    if raw.source.trim().is_empty() {
        return Err(NormalizeError::ValidationFailure(
            "source is empty".to_string(),
        ));
    }
    if raw.price.is_nan() || !raw.price.is_finite() {
        return Err(NormalizeError::ValidationFailure(format!(
            "price is not a finite number: {}",
            raw.price
        )));
    }
    if raw.price < 0.0 {
        return Err(NormalizeError::ValidationFailure(format!(
            "price is negative: {}",
            raw.price
        )));
    }
    if raw.timestamp <= 0 {
        return Err(NormalizeError::ValidationFailure(format!(
            "timestamp is not a positive epoch: {}",
            raw.timestamp
        )));
    }

    let symbol = normalizer.rewrite_symbol(&raw.symbol);
    if symbol.is_empty() {
        return Err(NormalizeError::ValidationFailure(format!(
            "symbol '{}' is empty after rewriting",
            raw.symbol
        )));
    }

    let price = round_price(raw.price);
    let iso_timestamp = format_iso_millis(raw.timestamp).ok_or_else(|| {
        NormalizeError::ValidationFailure(format!(
            "timestamp is not a valid epoch: {}",
            raw.timestamp
        ))
    })?;

    let mut transformations = Vec::new();
    if symbol != raw.symbol {
        transformations.push(format!("symbol: {} -> {}", raw.symbol, symbol));
    }
    if price != raw.price {
        transformations.push(format!("price: {} -> {}", raw.price, price));
    }

    Ok(CanonicalQuote {
        symbol,
        price,
        iso_timestamp,
        original_timestamp: raw.timestamp,
        source: normalizer.canonical_source(),
        audit: AuditInfo {
            original_source: raw.source.clone(),
            original_symbol: raw.symbol.clone(),
            normalized_at: now_millis(),
            normalizer_version: normalizer.version().to_string(),
            was_transformed: !transformations.is_empty(),
            transformations,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::parse_iso_millis;

    fn raw(symbol: &str, price: f64, timestamp: i64, source: &str) -> RawQuote {
        RawQuote {
            symbol: symbol.into(),
            price,
            timestamp,
            source: source.into(),
        }
    }

    #[test]
    fn builds_canonical_record_with_audit_trail() {
        let quote = raw("AAPL.US", 187.123456, 1_700_000_000_123, "alpha-vantage");
        let canonical = build_canonical(&quote, Normalizer::AlphaVantage).unwrap();

        assert_eq!(canonical.symbol, "AAPL");
        assert_eq!(canonical.price, 187.1235);
        assert_eq!(canonical.original_timestamp, 1_700_000_000_123);
        assert_eq!(
            parse_iso_millis(&canonical.iso_timestamp),
            Some(1_700_000_000_123)
        );
        assert!(canonical.audit.was_transformed);
        assert_eq!(canonical.audit.transformations.len(), 2);
        assert_eq!(
            canonical.audit.transformations[0],
            "symbol: AAPL.US -> AAPL"
        );
        assert!(canonical.audit.transformations[1].starts_with("price: "));
    }

    #[test]
    fn untouched_record_reports_no_transformations() {
        let quote = raw("MSFT", 400.25, 1_700_000_000_000, "mock");
        let canonical = build_canonical(&quote, Normalizer::Mock).unwrap();
        assert!(!canonical.audit.was_transformed);
        assert!(canonical.audit.transformations.is_empty());
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(round_price(1.00005), 1.0001);
        assert_eq!(round_price(1.00004), 1.0);
        assert_eq!(round_price(-1.00005), -1.0001);
    }

    #[test]
    fn rejects_invalid_fields() {
        let cases = vec![
            raw("", 1.0, 1, "mock"),
            raw("AAPL", f64::NAN, 1, "mock"),
            raw("AAPL", f64::INFINITY, 1, "mock"),
            raw("AAPL", -0.5, 1, "mock"),
            raw("AAPL", 1.0, 0, "mock"),
            raw("AAPL", 1.0, -5, "mock"),
            raw("AAPL", 1.0, 1, "   "),
        ];
        for case in cases {
            let result = build_canonical(&case, Normalizer::Mock);
            assert!(
                matches!(result, Err(NormalizeError::ValidationFailure(_))),
                "expected validation failure for {:?}",
                case
            );
        }
    }
}
