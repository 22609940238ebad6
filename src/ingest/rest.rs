//! Generic REST quote ingestor
//!
//! Polls a JSON endpoint returning an array of quote objects. Provider
//! specifics (auth, pagination, field quirks) belong to dedicated
//! clients outside the core; this adapter covers the common case of a
//! plain quote listing.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::error::IngestError;
use crate::ingest::Ingestor;
use crate::types::RawQuote;

#[derive(Debug, Deserialize)]
struct QuoteDto {
    symbol: String,
    price: f64,
    timestamp: i64,
    source: Option<String>,
}

pub struct RestIngestor {
    name: String,
    url: String,
    client: reqwest::Client,
}

impl RestIngestor {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        timeout_millis: u64,
    ) -> Result<Self, IngestError> {
        let name = name.into();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_millis))
            .build()
            .map_err(|e| IngestError::Provider {
                source_id: name.clone(),
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            name,
            url: url.into(),
            client,
        })
    }

    fn request_url(&self, symbols: &[String]) -> String {
        format!("{}?symbols={}", self.url.trim_end_matches('/'), symbols.join(","))
    }

    /// Map parsed payload entries to raw quotes, stamping the ingestor
    /// name on entries without a source and dropping non-finite prices.
    fn to_quotes(&self, payload: Vec<QuoteDto>) -> Vec<RawQuote> {
        payload
            .into_iter()
            .filter_map(|dto| {
                if !dto.price.is_finite() {
                    warn!(ingestor = %self.name, symbol = %dto.symbol, "dropping non-finite price");
                    return None;
                }
                Some(RawQuote {
                    symbol: dto.symbol,
                    price: dto.price,
                    timestamp: dto.timestamp,
                    source: dto.source.unwrap_or_else(|| self.name.clone()),
                })
            })
            .collect()
    }
}

#[async_trait]
impl Ingestor for RestIngestor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_quotes(&self, symbols: &[String]) -> Result<Vec<RawQuote>, IngestError> {
        let url = self.request_url(symbols);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    IngestError::Timeout {
                        source_id: self.name.clone(),
                        millis: 0,
                    }
                } else {
                    IngestError::Provider {
                        source_id: self.name.clone(),
                        message: e.to_string(),
                    }
                }
            })?;

        if !response.status().is_success() {
            return Err(IngestError::Provider {
                source_id: self.name.clone(),
                message: format!("endpoint returned {}", response.status()),
            });
        }

        let payload: Vec<QuoteDto> = response.json().await.map_err(|e| IngestError::Provider {
            source_id: self.name.clone(),
            message: format!("invalid quote payload: {e}"),
        })?;

        Ok(self.to_quotes(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingestor() -> RestIngestor {
        RestIngestor::new("finnhub", "https://quotes.example/v1/quotes/", 5_000).unwrap()
    }

    #[test]
    fn request_url_joins_symbols() {
        assert_eq!(
            ingestor().request_url(&["AAPL".into(), "MSFT".into()]),
            "https://quotes.example/v1/quotes?symbols=AAPL,MSFT"
        );
    }

    #[test]
    fn payload_maps_to_raw_quotes() {
        let payload: Vec<QuoteDto> = serde_json::from_str(
            r#"[
                {"symbol":"US-AAPL","price":187.5,"timestamp":1700000000123},
                {"symbol":"US-MSFT","price":400.0,"timestamp":1700000000124,"source":"finnhub-ws"}
            ]"#,
        )
        .unwrap();

        let quotes = ingestor().to_quotes(payload);
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].source, "finnhub");
        assert_eq!(quotes[1].source, "finnhub-ws");
    }

    #[test]
    fn non_finite_prices_are_dropped() {
        let payload = vec![
            QuoteDto {
                symbol: "AAPL".into(),
                price: f64::INFINITY,
                timestamp: 1,
                source: None,
            },
            QuoteDto {
                symbol: "MSFT".into(),
                price: 400.0,
                timestamp: 1,
                source: None,
            },
        ];
        let quotes = ingestor().to_quotes(payload);
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].symbol, "MSFT");
    }
}
