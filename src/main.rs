//! pricefuse service entry point
//!
//! Wires configuration, collaborators and the fetch orchestrator, then
//! runs until ctrl-c.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pricefuse::aggregate::AggregationEngine;
use pricefuse::cache::LastValueCache;
use pricefuse::config::AppConfig;
use pricefuse::ingest::{Ingestor, MockIngestor};
use pricefuse::metrics::Counters;
use pricefuse::publish::LogPublisher;
use pricefuse::scheduler::FetchOrchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(config = %config.digest(), "starting pricefuse");

    let cache = Arc::new(LastValueCache::new());
    let weights = Arc::new(config.weight_registry().context("invalid source weights")?);
    let engine = AggregationEngine::new(weights, Arc::clone(&cache));

    // Three independent mock providers stand in until real provider
    // clients are wired; each one answers for every configured symbol.
    let base_prices: HashMap<String, f64> = config
        .stock_symbols
        .iter()
        .enumerate()
        .map(|(i, s)| (s.clone(), 100.0 + 25.0 * i as f64))
        .collect();
    let ingestors: Vec<Arc<dyn Ingestor>> = vec![
        Arc::new(MockIngestor::new("mock-alpha", base_prices.clone())),
        Arc::new(MockIngestor::new("mock-beta", base_prices.clone())),
        Arc::new(MockIngestor::new("mock-gamma", base_prices)),
    ];

    let orchestrator = FetchOrchestrator::new(
        config.scheduler_config(),
        ingestors,
        Arc::new(LogPublisher),
        engine,
        Arc::new(Counters::new()),
    );

    orchestrator.start().await;
    info!("scheduler running, press ctrl-c to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    orchestrator.stop().await;
    let snapshot = orchestrator.counters().snapshot();
    info!(
        cycles = snapshot.cycles,
        published = snapshot.publish_success,
        "shutdown complete"
    );
    Ok(())
}
