//! Publisher contract
//!
//! The downstream transport (chain client, API gateway) lives outside
//! the core; the scheduler hands it a publish request per consensus and
//! treats the receipt as opaque.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::PublishError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishRequest {
    pub asset_id: String,
    pub price: f64,
    /// Epoch ms of the consensus emission
    pub timestamp: i64,
    /// Hex field element binding (price, timestamp, asset, proof)
    pub commitment_digest: String,
    pub proof_digest: Option<String>,
    pub proof_public_inputs: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishReceipt {
    pub tx_hash: String,
    pub ok: bool,
}

#[async_trait]
pub trait Publisher: Send + Sync {
    fn name(&self) -> &str;

    async fn publish(&self, request: PublishRequest) -> Result<PublishReceipt, PublishError>;
}

/// Default publisher: logs the request and acknowledges it. Stands in
/// wherever no transport is wired.
#[derive(Debug, Default)]
pub struct LogPublisher;

#[async_trait]
impl Publisher for LogPublisher {
    fn name(&self) -> &str {
        "log"
    }

    async fn publish(&self, request: PublishRequest) -> Result<PublishReceipt, PublishError> {
        info!(
            asset = %request.asset_id,
            price = request.price,
            commitment = %request.commitment_digest,
            "publishing consensus"
        );
        let short: String = request
            .commitment_digest
            .trim_start_matches("0x")
            .chars()
            .take(16)
            .collect();
        Ok(PublishReceipt {
            tx_hash: format!("log-{short}"),
            ok: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_publisher_acknowledges() {
        let publisher = LogPublisher;
        let receipt = publisher
            .publish(PublishRequest {
                asset_id: "AAPL".into(),
                price: 100.0,
                timestamp: 1_700_000_000_000,
                commitment_digest: "0xabcdef0123456789".into(),
                proof_digest: None,
                proof_public_inputs: None,
            })
            .await
            .unwrap();

        assert!(receipt.ok);
        assert!(receipt.tx_hash.starts_with("log-"));
    }
}
