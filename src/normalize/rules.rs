//! Per-source normalizer variants
//!
//! Each variant carries the capability set {recognize, rewrite_symbol,
//! version, canonical_source}. Recognition matches the raw source name
//! case-insensitively after stripping whitespace, hyphens and
//! underscores.

use crate::types::{RawQuote, SourceId};

/// Exchange suffixes stripped from AlphaVantage symbols ("AAPL.US")
const ALPHA_VANTAGE_SUFFIXES: &[&str] = &["US", "NYSE", "NASDAQ", "LSE", "TSX", "ASX", "HK", "LON"];

/// Asset-class prefixes stripped from Finnhub symbols ("US-GOOGL")
const FINNHUB_PREFIXES: &[&str] = &["US", "CRYPTO", "FX", "INDICES"];

/// Exchange suffixes stripped from Yahoo Finance symbols ("BARC.L")
const YAHOO_SUFFIXES: &[&str] = &[
    "L", "T", "AX", "HK", "SI", "KS", "TW", "NS", "BO", "TO", "V", "F", "DE", "PA", "AS", "BR",
    "MC", "MI", "SW", "CO", "MX", "SA", "JK", "KL",
];

/// Source-identified normalization strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Normalizer {
    AlphaVantage,
    Finnhub,
    YahooFinance,
    Mock,
}

/// Lowercase the source name and drop whitespace, '-' and '_' so that
/// "Alpha Vantage", "alpha-vantage" and "ALPHA_VANTAGE" all compare
/// equal.
fn clean_source(source: &str) -> String {
    source
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Strip a trailing ".SUFFIX" when the suffix is in `suffixes`
/// (case-insensitive).
fn strip_dot_suffix<'a>(symbol: &'a str, suffixes: &[&str]) -> &'a str {
    if let Some((head, tail)) = symbol.rsplit_once('.') {
        if !head.is_empty() && suffixes.iter().any(|s| s.eq_ignore_ascii_case(tail)) {
            return head;
        }
    }
    symbol
}

/// Strip a leading "PREFIX-" when the prefix is in `prefixes`
/// (case-insensitive).
fn strip_dash_prefix<'a>(symbol: &'a str, prefixes: &[&str]) -> &'a str {
    if let Some((head, tail)) = symbol.split_once('-') {
        if !tail.is_empty() && prefixes.iter().any(|p| p.eq_ignore_ascii_case(head)) {
            return tail;
        }
    }
    symbol
}

impl Normalizer {
    /// Identifier fragments matched against the cleaned source name.
    fn identifiers(&self) -> &'static [&'static str] {
        match self {
            Normalizer::AlphaVantage => &["alphavantage"],
            Normalizer::Finnhub => &["finnhub"],
            Normalizer::YahooFinance => &["yahoofinance", "yahoo"],
            Normalizer::Mock => &["mock"],
        }
    }

    /// Whether this variant handles the raw record's source.
    pub fn recognizes(&self, raw: &RawQuote) -> bool {
        let cleaned = clean_source(&raw.source);
        if cleaned.is_empty() {
            return false;
        }
        self.identifiers().iter().any(|id| cleaned.contains(id))
    }

    /// Apply the variant's structural rewrite, then trim and uppercase
    /// the residual.
    pub fn rewrite_symbol(&self, symbol: &str) -> String {
        let trimmed = symbol.trim();
        let rewritten = match self {
            Normalizer::AlphaVantage => strip_dot_suffix(trimmed, ALPHA_VANTAGE_SUFFIXES),
            Normalizer::Finnhub => strip_dash_prefix(trimmed, FINNHUB_PREFIXES),
            Normalizer::YahooFinance => {
                let stripped = strip_dot_suffix(trimmed, YAHOO_SUFFIXES);
                stripped.strip_prefix('^').unwrap_or(stripped)
            }
            Normalizer::Mock => trimmed,
        };
        rewritten.trim().to_uppercase()
    }

    pub fn version(&self) -> &'static str {
        match self {
            Normalizer::AlphaVantage => "alphavantage/1",
            Normalizer::Finnhub => "finnhub/1",
            Normalizer::YahooFinance => "yahoofinance/1",
            Normalizer::Mock => "mock/1",
        }
    }

    pub fn canonical_source(&self) -> SourceId {
        match self {
            Normalizer::AlphaVantage => SourceId::AlphaVantage,
            Normalizer::Finnhub => SourceId::Finnhub,
            Normalizer::YahooFinance => SourceId::YahooFinance,
            Normalizer::Mock => SourceId::Mock,
        }
    }
}
