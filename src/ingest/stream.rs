//! Reconnecting quote stream driver
//!
//! Connects to a provider WebSocket emitting JSON quote events and
//! feeds them into an mpsc channel for the [`super::StreamIngestor`]
//! adapter. Connection life is an explicit state machine
//! {disconnected, connecting, open, backoff}; re-establishment uses
//! capped exponential backoff with the attempt count reset on a
//! successful open, and cancellation is terminal.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::types::RawQuote;

/// Connection state of the streaming driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Disconnected,
    Connecting,
    Open,
    Backoff,
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub url: String,
    /// Source name stamped on events that omit one
    pub source: String,
    pub base_backoff_millis: u64,
    pub max_backoff_millis: u64,
}

impl StreamConfig {
    pub fn new(url: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            source: source.into(),
            base_backoff_millis: 1_000,
            max_backoff_millis: 60_000,
        }
    }
}

/// Wire format of one streaming quote event.
#[derive(Debug, Deserialize)]
struct WireQuote {
    symbol: String,
    price: f64,
    timestamp: i64,
    source: Option<String>,
}

/// Parse one text frame into a raw quote. Malformed payloads yield
/// None and are dropped by the caller.
fn parse_event(text: &str, default_source: &str) -> Option<RawQuote> {
    let wire: WireQuote = serde_json::from_str(text).ok()?;
    if !wire.price.is_finite() {
        return None;
    }
    Some(RawQuote {
        symbol: wire.symbol,
        price: wire.price,
        timestamp: wire.timestamp,
        source: wire.source.unwrap_or_else(|| default_source.to_string()),
    })
}

/// Backoff delay before reconnect `attempt` (1-based), capped.
fn backoff_delay(config: &StreamConfig, attempt: u32) -> Duration {
    let shift = attempt.saturating_sub(1).min(16);
    let millis = config
        .base_backoff_millis
        .saturating_mul(1u64 << shift)
        .min(config.max_backoff_millis);
    Duration::from_millis(millis)
}

/// Spawn the driver. Returns the task handle and a watch receiver over
/// the connection state.
pub fn spawn_quote_stream(
    config: StreamConfig,
    tx: mpsc::Sender<RawQuote>,
    cancel: CancellationToken,
) -> (JoinHandle<()>, watch::Receiver<ConnState>) {
    let (state_tx, state_rx) = watch::channel(ConnState::Disconnected);

    let handle = tokio::spawn(async move {
        run_stream(config, tx, cancel, state_tx).await;
    });

    (handle, state_rx)
}

async fn run_stream(
    config: StreamConfig,
    tx: mpsc::Sender<RawQuote>,
    cancel: CancellationToken,
    state: watch::Sender<ConnState>,
) {
    let mut attempt = 0u32;

    'reconnect: loop {
        if cancel.is_cancelled() {
            break;
        }

        let _ = state.send(ConnState::Connecting);
        info!(source = %config.source, url = %config.url, attempt, "connecting quote stream");

        let connected = tokio::select! {
            _ = cancel.cancelled() => break 'reconnect,
            result = connect_async(config.url.as_str()) => result,
        };

        match connected {
            Ok((ws_stream, _)) => {
                attempt = 0;
                let _ = state.send(ConnState::Open);
                info!(source = %config.source, "✅ quote stream open");

                let (mut write, mut read) = ws_stream.split();
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            let _ = write.send(Message::Close(None)).await;
                            break 'reconnect;
                        }
                        message = read.next() => match message {
                            Some(Ok(Message::Text(text))) => {
                                match parse_event(&text, &config.source) {
                                    Some(quote) => {
                                        if tx.send(quote).await.is_err() {
                                            // Receiver gone: nothing left to feed.
                                            break 'reconnect;
                                        }
                                    }
                                    None => {
                                        warn!(source = %config.source, payload = %text, "dropping malformed stream payload");
                                    }
                                }
                            }
                            Some(Ok(Message::Ping(data))) => {
                                let _ = write.send(Message::Pong(data)).await;
                            }
                            Some(Ok(Message::Close(_))) => {
                                warn!(source = %config.source, "stream closed by server");
                                break;
                            }
                            Some(Err(err)) => {
                                warn!(source = %config.source, error = %err, "stream error");
                                break;
                            }
                            None => {
                                warn!(source = %config.source, "stream ended");
                                break;
                            }
                            _ => {}
                        }
                    }
                }
            }
            Err(err) => {
                warn!(source = %config.source, error = %err, "connection failed");
            }
        }

        attempt += 1;
        let delay = backoff_delay(&config, attempt);
        let _ = state.send(ConnState::Backoff);
        info!(
            source = %config.source,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "🔄 reconnecting after backoff"
        );
        tokio::select! {
            _ = cancel.cancelled() => break 'reconnect,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    let _ = state.send(ConnState::Disconnected);
    info!(source = %config.source, "quote stream stopped");
}
