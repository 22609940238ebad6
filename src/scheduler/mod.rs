//! Fetch orchestrator
//!
//! Periodic driver for the fetch -> normalize -> aggregate -> publish
//! cycle. Single-flight: at most one cycle is ever in flight, and ticks
//! that fire while a cycle is still running are skipped. Stop cancels
//! the shared token; an in-flight cycle observes it at its next
//! suspension point.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use cron::Schedule;
use futures_util::future::join_all;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::aggregate::AggregationEngine;
use crate::commitment::commitment_digest;
use crate::error::IngestError;
use crate::ingest::Ingestor;
use crate::metrics::Counters;
use crate::normalize::NormalizerRegistry;
use crate::publish::{PublishRequest, Publisher};
use crate::retry::{retry_async, RetryPolicy};
use crate::types::{AggregationOptions, CanonicalQuote, RawQuote};

pub const DEFAULT_INGEST_TIMEOUT_MILLIS: u64 = 10_000;

/// Scheduling and per-cycle parameters.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval mode; wins over cron when both are set
    pub interval_millis: Option<u64>,
    /// Cron mode, used only when the interval is unset
    pub cron_expression: Option<String>,
    /// Symbols fetched each cycle
    pub symbols: Vec<String>,
    pub options: AggregationOptions,
    pub retry: RetryPolicy,
    pub ingest_timeout_millis: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_millis: Some(60_000),
            cron_expression: None,
            symbols: Vec::new(),
            options: AggregationOptions::default(),
            retry: RetryPolicy::default(),
            ingest_timeout_millis: DEFAULT_INGEST_TIMEOUT_MILLIS,
        }
    }
}

struct Inner {
    config: SchedulerConfig,
    ingestors: Vec<Arc<dyn Ingestor>>,
    publisher: Arc<dyn Publisher>,
    registry: NormalizerRegistry,
    engine: AggregationEngine,
    counters: Arc<Counters>,
    running: AtomicBool,
    cancel: Mutex<CancellationToken>,
}

#[derive(Clone)]
pub struct FetchOrchestrator {
    inner: Arc<Inner>,
}

impl FetchOrchestrator {
    pub fn new(
        config: SchedulerConfig,
        ingestors: Vec<Arc<dyn Ingestor>>,
        publisher: Arc<dyn Publisher>,
        engine: AggregationEngine,
        counters: Arc<Counters>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                ingestors,
                publisher,
                registry: NormalizerRegistry::new(),
                engine,
                counters,
                running: AtomicBool::new(false),
                cancel: Mutex::new(CancellationToken::new()),
            }),
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn counters(&self) -> &Arc<Counters> {
        &self.inner.counters
    }

    /// Start the periodic loop. The first cycle runs immediately. A
    /// second start is a no-op with a warning.
    pub async fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            warn!("scheduler already running, ignoring start");
            return;
        }

        let token = CancellationToken::new();
        *self.inner.cancel.lock().await = token.clone();

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            run_loop(inner, token).await;
        });
    }

    /// Stop the loop: cancels the waiting interval and signals any
    /// in-flight cycle. No further cycles are emitted.
    pub async fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.inner.cancel.lock().await.cancel();
        info!("scheduler stopped");
    }

    /// Execute one full cycle outside the periodic loop.
    pub async fn run_once(&self) {
        let token = self.inner.cancel.lock().await.clone();
        run_cycle(&self.inner, &token).await;
    }
}

async fn run_loop(inner: Arc<Inner>, cancel: CancellationToken) {
    if let Some(interval) = inner.config.interval_millis {
        info!(interval_ms = interval, "scheduler started in interval mode");
        run_interval_loop(&inner, &cancel, interval).await;
    } else if let Some(expression) = inner.config.cron_expression.clone() {
        match Schedule::from_str(&expression) {
            Ok(schedule) => {
                info!(cron = %expression, "scheduler started in cron mode");
                run_cron_loop(&inner, &cancel, &schedule).await;
            }
            Err(err) => {
                error!(cron = %expression, error = %err, "invalid cron expression, scheduler idle");
            }
        }
    } else {
        error!("no interval and no cron expression configured, scheduler idle");
    }
    inner.running.store(false, Ordering::SeqCst);
}

async fn run_interval_loop(inner: &Arc<Inner>, cancel: &CancellationToken, interval_ms: u64) {
    let period = Duration::from_millis(interval_ms.max(1));
    let mut next = Instant::now();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep_until(next) => {}
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = run_cycle(inner, cancel) => {}
        }

        // Skip any ticks the cycle ran through; at most one in flight.
        next += period;
        let now = Instant::now();
        while next <= now {
            Counters::incr(&inner.counters.ticks_skipped);
            next += period;
        }
    }
}

async fn run_cron_loop(inner: &Arc<Inner>, cancel: &CancellationToken, schedule: &Schedule) {
    // Immediate first cycle, matching interval mode.
    tokio::select! {
        _ = cancel.cancelled() => return,
        _ = run_cycle(inner, cancel) => {}
    }

    loop {
        let Some(next_fire) = schedule.upcoming(Utc).next() else {
            warn!("cron schedule has no upcoming fire times, scheduler idle");
            return;
        };
        let wait = (next_fire - Utc::now()).to_std().unwrap_or(Duration::ZERO);

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(wait) => {}
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = run_cycle(inner, cancel) => {}
        }
    }
}

/// One fetch -> normalize -> aggregate -> publish cycle. Failures are
/// logged and counted, never propagated.
async fn run_cycle(inner: &Arc<Inner>, cancel: &CancellationToken) {
    Counters::incr(&inner.counters.cycles);
    let symbols = &inner.config.symbols;
    if symbols.is_empty() {
        warn!("no symbols configured, skipping cycle");
        return;
    }

    // 1. Query every ingestor concurrently, each wrapped in retry and a
    //    per-call timeout.
    let fetches = inner.ingestors.iter().map(|ingestor| {
        let ingestor = Arc::clone(ingestor);
        let policy = inner.config.retry;
        let timeout = Duration::from_millis(inner.config.ingest_timeout_millis);
        async move {
            let name = ingestor.name().to_string();
            let (name_ref, ingestor_ref) = (&name, &ingestor);
            let result = retry_async(policy, &name, || async move {
                match tokio::time::timeout(timeout, ingestor_ref.fetch_quotes(symbols)).await {
                    Ok(result) => result,
                    Err(_) => Err(IngestError::Timeout {
                        source_id: name_ref.clone(),
                        millis: timeout.as_millis() as u64,
                    }),
                }
            })
            .await;
            (name, result)
        }
    });

    let results = tokio::select! {
        _ = cancel.cancelled() => return,
        results = join_all(fetches) => results,
    };

    let mut raws: Vec<RawQuote> = Vec::new();
    for (name, result) in results {
        match result {
            Ok(quotes) => {
                Counters::add(&inner.counters.quotes_ingested, quotes.len() as u64);
                raws.extend(quotes);
            }
            Err(err) => {
                Counters::incr(&inner.counters.ingest_failures);
                warn!(ingestor = %name, error = %err, "ingestor failed after retries");
            }
        }
    }
    if raws.is_empty() {
        warn!("cycle produced no raw quotes");
        return;
    }

    // 2. Normalize and group by canonical symbol.
    let (canonical, failures) = inner.registry.normalize_batch(&raws);
    Counters::add(&inner.counters.normalize_failures, failures.len() as u64);

    let mut grouped: HashMap<String, Vec<CanonicalQuote>> = HashMap::new();
    for quote in canonical {
        grouped.entry(quote.symbol.clone()).or_default().push(quote);
    }

    // 3. Aggregate per symbol and hand each consensus to the publisher.
    //    The engine writes the last-value cache on success.
    for (symbol, quotes) in &grouped {
        if cancel.is_cancelled() {
            return;
        }
        let consensus = match inner.engine.aggregate(symbol, quotes, &inner.config.options) {
            Ok(consensus) => consensus,
            Err(err) => {
                Counters::incr(&inner.counters.aggregate_failures);
                warn!(symbol = %symbol, error = %err, "aggregation failed");
                continue;
            }
        };
        Counters::incr(&inner.counters.symbols_aggregated);

        let digest = commitment_digest(consensus.price, consensus.computed_at, symbol, None);
        let request = PublishRequest {
            asset_id: symbol.clone(),
            price: consensus.price,
            timestamp: consensus.computed_at,
            commitment_digest: digest,
            proof_digest: None,
            proof_public_inputs: None,
        };

        match inner.publisher.publish(request).await {
            Ok(receipt) if receipt.ok => {
                Counters::incr(&inner.counters.publish_success);
            }
            Ok(receipt) => {
                Counters::incr(&inner.counters.publish_failures);
                warn!(symbol = %symbol, tx_hash = %receipt.tx_hash, "publish not acknowledged");
            }
            Err(err) => {
                Counters::incr(&inner.counters.publish_failures);
                warn!(symbol = %symbol, error = %err, "publish failed");
            }
        }
    }
}
