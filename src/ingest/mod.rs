//! Ingestor collaborators
//!
//! The uniform contract through which the scheduler pulls raw quotes,
//! plus the two implementations the core ships: a deterministic mock
//! provider and an adapter draining a streaming channel.

pub mod rest;
pub mod stream;

pub use rest::RestIngestor;

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::error::IngestError;
use crate::types::{now_millis, RawQuote};

/// Pull-based quote source. Streaming providers are adapted through
/// [`StreamIngestor`].
#[async_trait]
pub trait Ingestor: Send + Sync {
    /// Provider name, also used as the raw record source field.
    fn name(&self) -> &str;

    /// Fetch current quotes for the requested symbols.
    async fn fetch_quotes(&self, symbols: &[String]) -> Result<Vec<RawQuote>, IngestError>;
}

/// Deterministic mock provider: quotes wiggle around configured base
/// prices with a time-seeded hash, no randomness involved.
#[derive(Debug, Clone)]
pub struct MockIngestor {
    source: String,
    base_prices: HashMap<String, f64>,
}

impl MockIngestor {
    pub fn new(source: impl Into<String>, base_prices: HashMap<String, f64>) -> Self {
        Self {
            source: source.into(),
            base_prices,
        }
    }

    /// Pseudo-jitter in [-0.5%, +0.5%] derived from an FNV-1a hash of
    /// the symbol and the current second.
    fn jitter(symbol: &str, epoch_second: i64) -> f64 {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in symbol.bytes().chain(epoch_second.to_be_bytes()) {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x1000_0000_01b3);
        }
        let unit = (hash % 10_000) as f64 / 10_000.0;
        (unit - 0.5) / 100.0
    }
}

#[async_trait]
impl Ingestor for MockIngestor {
    fn name(&self) -> &str {
        &self.source
    }

    async fn fetch_quotes(&self, symbols: &[String]) -> Result<Vec<RawQuote>, IngestError> {
        let now = now_millis();
        let quotes = symbols
            .iter()
            .filter_map(|symbol| {
                let base = self.base_prices.get(symbol.trim()).copied()?;
                let price = base * (1.0 + Self::jitter(symbol, now / 1_000));
                Some(RawQuote {
                    symbol: symbol.clone(),
                    price,
                    timestamp: now,
                    source: self.source.clone(),
                })
            })
            .collect();
        Ok(quotes)
    }
}

/// Adapter exposing a streaming channel through the pull contract:
/// `fetch_quotes` drains whatever the stream buffered since the last
/// cycle, filtered to the requested symbols.
pub struct StreamIngestor {
    source: String,
    rx: Mutex<mpsc::Receiver<RawQuote>>,
}

impl StreamIngestor {
    pub fn new(source: impl Into<String>, rx: mpsc::Receiver<RawQuote>) -> Self {
        Self {
            source: source.into(),
            rx: Mutex::new(rx),
        }
    }
}

#[async_trait]
impl Ingestor for StreamIngestor {
    fn name(&self) -> &str {
        &self.source
    }

    async fn fetch_quotes(&self, symbols: &[String]) -> Result<Vec<RawQuote>, IngestError> {
        let wanted: Vec<String> = symbols.iter().map(|s| s.trim().to_uppercase()).collect();
        let mut rx = self.rx.lock().await;

        let mut quotes = Vec::new();
        while let Ok(quote) = rx.try_recv() {
            if wanted.is_empty() || wanted.contains(&quote.symbol.trim().to_uppercase()) {
                quotes.push(quote);
            }
        }
        Ok(quotes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_ingestor_quotes_requested_symbols() {
        let mut bases = HashMap::new();
        bases.insert("AAPL".to_string(), 190.0);
        bases.insert("MSFT".to_string(), 420.0);
        let ingestor = MockIngestor::new("mock", bases);

        let quotes = ingestor
            .fetch_quotes(&["AAPL".into(), "MSFT".into(), "UNKNOWN".into()])
            .await
            .unwrap();

        assert_eq!(quotes.len(), 2);
        for quote in &quotes {
            assert_eq!(quote.source, "mock");
            let base = if quote.symbol == "AAPL" { 190.0 } else { 420.0 };
            assert!((quote.price - base).abs() / base <= 0.005 + 1e-9);
            assert!(quote.timestamp > 0);
        }
    }

    #[tokio::test]
    async fn stream_ingestor_drains_buffered_quotes() {
        let (tx, rx) = mpsc::channel(16);
        let ingestor = StreamIngestor::new("yahoo-stream", rx);

        for (symbol, price) in [("AAPL", 190.0), ("msft ", 420.0), ("TSLA", 250.0)] {
            tx.send(RawQuote {
                symbol: symbol.into(),
                price,
                timestamp: now_millis(),
                source: "yahoo-stream".into(),
            })
            .await
            .unwrap();
        }

        let quotes = ingestor
            .fetch_quotes(&["AAPL".into(), "MSFT".into()])
            .await
            .unwrap();
        assert_eq!(quotes.len(), 2);

        // Buffer is drained: a second call sees nothing new.
        let quotes = ingestor.fetch_quotes(&["AAPL".into()]).await.unwrap();
        assert!(quotes.is_empty());
    }
}
