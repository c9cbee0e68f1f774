//! Bounded history of per-load [`ContextMetrics`].

use crate::model::PerformanceStats;
use jitctx_core::ContextMetrics;
use std::collections::{BTreeMap, VecDeque};

/// Default number of loads retained.
pub const DEFAULT_METRICS_CAPACITY: usize = 1_000;

/// Append-only ring of load metrics, oldest rotated out first.
#[derive(Debug)]
pub struct MetricsLog {
    entries: VecDeque<ContextMetrics>,
    capacity: usize,
    total_recorded: u64,
}

impl MetricsLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_METRICS_CAPACITY)),
            capacity: capacity.max(1),
            total_recorded: 0,
        }
    }

    pub fn record(&mut self, metrics: ContextMetrics) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(metrics);
        self.total_recorded += 1;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent load, if any.
    pub fn last(&self) -> Option<&ContextMetrics> {
        self.entries.back()
    }

    /// Retained loads in call order.
    pub fn iter(&self) -> impl Iterator<Item = &ContextMetrics> {
        self.entries.iter()
    }

    pub fn summary(&self) -> PerformanceStats {
        if self.entries.is_empty() {
            return PerformanceStats {
                total_loads: self.total_recorded,
                ..Default::default()
            };
        }

        let n = self.entries.len() as f64;
        let mut total_ms = 0.0;
        let mut total_tokens = 0usize;
        let mut hits = 0usize;
        let mut over = 0usize;
        let mut phases: BTreeMap<_, usize> = BTreeMap::new();

        for m in &self.entries {
            total_ms += m.load_time.as_secs_f64() * 1000.0;
            total_tokens += m.token_count;
            if m.cache_hit {
                hits += 1;
            }
            if m.over_budget {
                over += 1;
            }
            *phases.entry(m.phase).or_insert(0) += 1;
        }

        PerformanceStats {
            loads: self.entries.len(),
            total_loads: self.total_recorded,
            avg_load_time_ms: total_ms / n,
            avg_tokens: total_tokens as f64 / n,
            cache_hit_rate: hits as f64 / n * 100.0,
            over_budget_loads: over,
            phase_distribution: phases,
        }
    }

    /// Forget every load, including the lifetime count.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_recorded = 0;
    }
}

impl Default for MetricsLog {
    fn default() -> Self {
        Self::new(DEFAULT_METRICS_CAPACITY)
    }
}
