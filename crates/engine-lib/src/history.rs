//! Bounded per-entity measurement history
//!
//! Keeps a sliding window of recent samples for every (entity, metric) pair
//! with FIFO eviction at capacity. Entities are sharded across a concurrent
//! map so ingestion for different entities never contends; updates for one
//! entity are serialized by the map entry scope.

use std::collections::{HashMap, VecDeque};

use dashmap::DashMap;

/// Default per-(entity, metric) window capacity
pub const DEFAULT_CAPACITY: usize = 100;

/// A single retained measurement sample
#[derive(Debug, Clone, Copy)]
pub struct Sample {
    pub value: f64,
    pub timestamp: i64,
}

/// Per-entity windows keyed by metric name
#[derive(Debug, Default)]
struct EntityWindows {
    metrics: HashMap<String, VecDeque<Sample>>,
}

/// Sliding-window store for all tracked entities
pub struct MetricsHistory {
    entities: DashMap<String, EntityWindows>,
    capacity: usize,
}

impl MetricsHistory {
    /// Create a store with the given per-(entity, metric) capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            entities: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append a sample, evicting the oldest entry when the window is full
    pub fn append(&self, entity_id: &str, metric_name: &str, value: f64, timestamp: i64) {
        let mut entry = self.entities.entry(entity_id.to_string()).or_default();
        let window = entry
            .metrics
            .entry(metric_name.to_string())
            .or_insert_with(|| VecDeque::with_capacity(self.capacity.min(64)));

        while window.len() >= self.capacity {
            window.pop_front();
        }
        window.push_back(Sample { value, timestamp });
    }

    /// The most recent up-to-k values in chronological order
    ///
    /// Unknown keys return an empty vector; callers treat short windows as
    /// insufficient history, never as a fault.
    pub fn window(&self, entity_id: &str, metric_name: &str, k: usize) -> Vec<f64> {
        match self.entities.get(entity_id) {
            Some(entry) => match entry.metrics.get(metric_name) {
                Some(window) => {
                    let skip = window.len().saturating_sub(k);
                    window.iter().skip(skip).map(|s| s.value).collect()
                }
                None => Vec::new(),
            },
            None => Vec::new(),
        }
    }

    /// The most recent sample for a key, if any
    pub fn latest(&self, entity_id: &str, metric_name: &str) -> Option<f64> {
        self.entities
            .get(entity_id)?
            .metrics
            .get(metric_name)?
            .back()
            .map(|s| s.value)
    }

    /// Number of retained samples for a key
    pub fn len(&self, entity_id: &str, metric_name: &str) -> usize {
        self.entities
            .get(entity_id)
            .and_then(|e| e.metrics.get(metric_name).map(|w| w.len()))
            .unwrap_or(0)
    }

    /// Snapshot of tracked entity ids for the decision loop
    pub fn entities(&self) -> Vec<String> {
        self.entities.iter().map(|e| e.key().clone()).collect()
    }

    /// Number of tracked entities
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Drop all state for one entity
    pub fn remove(&self, entity_id: &str) {
        self.entities.remove(entity_id);
    }
}

impl Default for MetricsHistory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
