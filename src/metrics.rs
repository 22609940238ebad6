//! Cycle counters
//!
//! Process-wide relaxed atomics incremented by the scheduler. Exposed
//! as a serializable snapshot; HTTP exposure lives outside the core.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Debug, Default)]
pub struct Counters {
    pub cycles: AtomicU64,
    pub ticks_skipped: AtomicU64,
    pub quotes_ingested: AtomicU64,
    pub ingest_failures: AtomicU64,
    pub normalize_failures: AtomicU64,
    pub symbols_aggregated: AtomicU64,
    pub aggregate_failures: AtomicU64,
    pub publish_success: AtomicU64,
    pub publish_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountersSnapshot {
    pub cycles: u64,
    pub ticks_skipped: u64,
    pub quotes_ingested: u64,
    pub ingest_failures: u64,
    pub normalize_failures: u64,
    pub symbols_aggregated: u64,
    pub aggregate_failures: u64,
    pub publish_success: u64,
    pub publish_failures: u64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            ticks_skipped: self.ticks_skipped.load(Ordering::Relaxed),
            quotes_ingested: self.quotes_ingested.load(Ordering::Relaxed),
            ingest_failures: self.ingest_failures.load(Ordering::Relaxed),
            normalize_failures: self.normalize_failures.load(Ordering::Relaxed),
            symbols_aggregated: self.symbols_aggregated.load(Ordering::Relaxed),
            aggregate_failures: self.aggregate_failures.load(Ordering::Relaxed),
            publish_success: self.publish_success.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
        }
    }
}
