//! Data model for token usage records and efficiency reports.

use chrono::{DateTime, Utc};
use jitctx_core::Phase;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Usage ─────────────────────────────────────────────────────────────────

/// One recorded context load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    /// When the load was recorded.
    pub timestamp: DateTime<Utc>,
    /// Phase the tokens were charged to.
    pub phase: Phase,
    /// Tokens consumed by the load.
    pub tokens: usize,
    /// Free-form label (e.g. "load_context", "forced").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// The phase ceiling at the time of recording.
    pub phase_ceiling: usize,
    /// Whether `tokens` fit inside `phase_ceiling`.
    pub within_ceiling: bool,
}

// ── Aggregated views ──────────────────────────────────────────────────────

/// Result of a budget check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetCheck {
    pub within_budget: bool,
    pub remaining: usize,
}

impl From<BudgetCheck> for (bool, usize) {
    fn from(check: BudgetCheck) -> Self {
        (check.within_budget, check.remaining)
    }
}

/// Token efficiency report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyMetrics {
    /// Percentage of available phase budget actually used (0.0–100.0).
    pub efficiency_score: f64,
    /// Percentage of loads that fit their phase ceiling (0.0–100.0).
    pub budget_compliance: f64,
    /// Cumulative tokens per phase.
    pub phase_usage: BTreeMap<Phase, usize>,
    /// Cumulative tokens across all phases.
    pub total_usage: usize,
    /// Number of recorded loads.
    pub total_loads: u64,
}

/// Aggregate timing and size figures over the retained metrics history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
    /// Loads retained in the history window.
    pub loads: usize,
    /// Loads ever recorded, including ones rotated out.
    pub total_loads: u64,
    /// Mean load time in milliseconds.
    pub avg_load_time_ms: f64,
    /// Mean bundle size in tokens.
    pub avg_tokens: f64,
    /// Percentage of retained loads served from cache.
    pub cache_hit_rate: f64,
    /// Loads that stayed over budget after optimization.
    pub over_budget_loads: usize,
    /// Loads per phase in the retained window.
    pub phase_distribution: BTreeMap<Phase, usize>,
}
