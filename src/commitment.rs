//! Commitment digest hook
//!
//! Deterministic hash binding a consensus price to an external
//! verifier. The SHA-256 digest is truncated to 248 bits so the value
//! always fits a 254-bit prime field, and rendered as 0x-prefixed hex.

use sha2::{Digest, Sha256};

/// Price is committed as a fixed-point integer with 8 fractional
/// digits, which is exact for 4-decimal canonical prices.
const PRICE_SCALE: f64 = 1e8;

/// Canonicalize an externally supplied proof digest: trim, lowercase,
/// strip a 0x prefix. Differently rendered digests of the same value
/// commit identically.
fn canonical_proof(proof_digest: &str) -> String {
    let lowered = proof_digest.trim().to_lowercase();
    lowered
        .strip_prefix("0x")
        .map(str::to_string)
        .unwrap_or(lowered)
}

/// Compute the commitment digest over (price, timestamp, asset id,
/// optional proof digest).
pub fn commitment_digest(
    price: f64,
    timestamp: i64,
    asset_id: &str,
    proof_digest: Option<&str>,
) -> String {
    let scaled = (price * PRICE_SCALE).round() as i128;

    let mut hasher = Sha256::new();
    hasher.update(scaled.to_be_bytes());
    hasher.update(timestamp.to_be_bytes());
    hasher.update(asset_id.as_bytes());
    if let Some(proof) = proof_digest {
        hasher.update(b"|");
        hasher.update(canonical_proof(proof).as_bytes());
    }
    let digest = hasher.finalize();

    // Drop the leading byte: 248 bits < any 254-bit field prime.
    format!("0x{}", hex::encode(&digest[1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        let a = commitment_digest(187.1235, 1_700_000_000_123, "AAPL", None);
        let b = commitment_digest(187.1235, 1_700_000_000_123, "AAPL", None);
        assert_eq!(a, b);
        assert!(a.starts_with("0x"));
        // 31 bytes of hex
        assert_eq!(a.len(), 2 + 62);
    }

    #[test]
    fn digest_varies_with_every_input() {
        let base = commitment_digest(100.0, 1_000, "AAPL", None);
        assert_ne!(commitment_digest(100.0001, 1_000, "AAPL", None), base);
        assert_ne!(commitment_digest(100.0, 1_001, "AAPL", None), base);
        assert_ne!(commitment_digest(100.0, 1_000, "MSFT", None), base);
        assert_ne!(commitment_digest(100.0, 1_000, "AAPL", Some("ab")), base);
    }

    #[test]
    fn proof_digest_is_canonicalized() {
        let a = commitment_digest(100.0, 1_000, "AAPL", Some("0xABCDEF"));
        let b = commitment_digest(100.0, 1_000, "AAPL", Some("abcdef"));
        assert_eq!(a, b);
    }

    #[test]
    fn absent_proof_differs_from_empty_proof() {
        let none = commitment_digest(100.0, 1_000, "AAPL", None);
        let empty = commitment_digest(100.0, 1_000, "AAPL", Some(""));
        assert_ne!(none, empty);
    }
}
