//! Last-value cache
//!
//! In-memory map from symbol to the latest consensus price and the
//! canonical quotes behind it. Single writer per symbol (the
//! scheduler's aggregation path), concurrent multi-symbol readers for
//! the debug surface. Not durable, no eviction.

use std::collections::HashMap;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::types::{now_millis, CanonicalQuote, ConsensusPrice};

/// Latest state for one symbol. Replaced wholesale on update so readers
/// never observe a torn record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub last_consensus: ConsensusPrice,
    pub last_canonical: Vec<CanonicalQuote>,
    pub last_updated_at: i64,
}

/// Debug surface data contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugSnapshot {
    pub last_aggregated: HashMap<String, ConsensusPrice>,
    pub last_normalized: HashMap<String, Vec<CanonicalQuote>>,
    pub updated_at: i64,
}

#[derive(Debug, Default)]
pub struct LastValueCache {
    entries: DashMap<String, CacheEntry>,
}

impl LastValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entry for a symbol atomically.
    pub fn update(&self, symbol: &str, consensus: ConsensusPrice, canonical: Vec<CanonicalQuote>) {
        self.entries.insert(
            symbol.to_string(),
            CacheEntry {
                last_consensus: consensus,
                last_canonical: canonical,
                last_updated_at: now_millis(),
            },
        );
    }

    /// Consistent snapshot of one symbol's entry.
    pub fn get(&self, symbol: &str) -> Option<CacheEntry> {
        self.entries.get(symbol).map(|e| e.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of every symbol for the debug surface.
    pub fn snapshot(&self) -> DebugSnapshot {
        let mut last_aggregated = HashMap::new();
        let mut last_normalized = HashMap::new();
        for entry in self.entries.iter() {
            last_aggregated.insert(entry.key().clone(), entry.last_consensus.clone());
            last_normalized.insert(entry.key().clone(), entry.last_canonical.clone());
        }
        DebugSnapshot {
            last_aggregated,
            last_normalized,
            updated_at: now_millis(),
        }
    }
}
