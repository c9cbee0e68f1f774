//! Token accounting and load metrics for jitctx.
//!
//! Provides the [`TokenBudgetManager`] ledger that charges every assembled
//! bundle to its phase, answers budget checks against per-phase and global
//! ceilings, and reports efficiency; plus a bounded [`MetricsLog`] of
//! per-load timings for operational visibility.

pub mod ledger;
pub mod metrics;
pub mod model;

pub use ledger::TokenBudgetManager;
pub use metrics::{DEFAULT_METRICS_CAPACITY, MetricsLog};
pub use model::{BudgetCheck, EfficiencyMetrics, PerformanceStats, UsageRecord};
