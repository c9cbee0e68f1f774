//! Thread-safe token ledger: tracks per-phase usage against ceilings,
//! answers budget checks, and serves efficiency reports.

use crate::model::*;
use chrono::Utc;
use jitctx_core::{Phase, PhaseConfig};
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

/// Usage records kept for inspection; older ones are pruned in bulk.
const MAX_HISTORY: usize = 10_000;

/// Process-lifetime token accounting.
///
/// Thread-safe via a single `RwLock` around all counters. Recording never
/// enforces a budget; callers check first with [`check_budget`] so that
/// forced or diagnostic loads can still be recorded.
///
/// [`check_budget`]: TokenBudgetManager::check_budget
pub struct TokenBudgetManager {
    /// Ceiling across all phases.
    max_total_tokens: usize,
    /// Ceiling per phase.
    ceilings: HashMap<Phase, usize>,
    /// Running totals and history.
    state: RwLock<LedgerState>,
}

#[derive(Debug, Default)]
struct LedgerState {
    total_usage: usize,
    phase_usage: HashMap<Phase, usize>,
    history: Vec<UsageRecord>,
    /// Sum of the phase ceiling of every recorded load.
    total_available: u128,
    total_used: u128,
    total_loads: u64,
    compliant_loads: u64,
}

impl TokenBudgetManager {
    /// Create a ledger with a global ceiling and one ceiling per phase config.
    pub fn new(max_total_tokens: usize, configs: &[PhaseConfig]) -> Self {
        Self {
            max_total_tokens,
            ceilings: configs.iter().map(|c| (c.phase, c.max_tokens)).collect(),
            state: RwLock::new(LedgerState::default()),
        }
    }

    /// Ledger over the built-in phase configs.
    pub fn with_defaults(max_total_tokens: usize) -> Self {
        Self::new(max_total_tokens, &PhaseConfig::defaults())
    }

    pub fn max_total_tokens(&self) -> usize {
        self.max_total_tokens
    }

    /// Ceiling for a phase (0 for a phase without config).
    pub fn phase_ceiling(&self, phase: Phase) -> usize {
        self.ceilings.get(&phase).copied().unwrap_or(0)
    }

    /// Check whether `requested` tokens still fit for `phase`.
    ///
    /// `remaining` is the phase ceiling minus that phase's cumulative usage,
    /// tightened to the global headroom when that is smaller.
    pub fn check_budget(&self, phase: Phase, requested: usize) -> BudgetCheck {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);

        let phase_used = state.phase_usage.get(&phase).copied().unwrap_or(0);
        let phase_remaining = self.phase_ceiling(phase).saturating_sub(phase_used);
        let global_remaining = self.max_total_tokens.saturating_sub(state.total_usage);
        let remaining = phase_remaining.min(global_remaining);

        BudgetCheck {
            within_budget: requested <= remaining,
            remaining,
        }
    }

    /// Record a load. Does not enforce the budget.
    pub fn record_usage(&self, phase: Phase, tokens: usize, label: Option<&str>) {
        let ceiling = self.phase_ceiling(phase);
        let within_ceiling = tokens <= ceiling;

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.total_usage += tokens;
        *state.phase_usage.entry(phase).or_insert(0) += tokens;
        state.total_available += ceiling as u128;
        state.total_used += tokens as u128;
        state.total_loads += 1;
        if within_ceiling {
            state.compliant_loads += 1;
        }

        if state.history.len() >= MAX_HISTORY {
            state.history.drain(..MAX_HISTORY / 10);
        }
        state.history.push(UsageRecord {
            timestamp: Utc::now(),
            phase,
            tokens,
            label: label.map(str::to_string),
            phase_ceiling: ceiling,
            within_ceiling,
        });

        if !within_ceiling {
            tracing::warn!(
                phase = %phase,
                tokens,
                ceiling,
                "Recorded load exceeds its phase ceiling"
            );
        }
    }

    /// Cumulative usage across all phases.
    pub fn current_usage(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .total_usage
    }

    /// Cumulative usage for one phase.
    pub fn phase_usage(&self, phase: Phase) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .phase_usage
            .get(&phase)
            .copied()
            .unwrap_or(0)
    }

    /// Recent usage records (most recent first).
    pub fn usage_history(&self, limit: usize) -> Vec<UsageRecord> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.history.iter().rev().take(limit).cloned().collect()
    }

    pub fn get_efficiency_metrics(&self) -> EfficiencyMetrics {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);

        let phase_usage: BTreeMap<Phase, usize> =
            state.phase_usage.iter().map(|(p, t)| (*p, *t)).collect();

        if state.total_loads == 0 {
            return EfficiencyMetrics {
                efficiency_score: 0.0,
                budget_compliance: 100.0,
                phase_usage,
                total_usage: 0,
                total_loads: 0,
            };
        }

        let efficiency_score = if state.total_available == 0 {
            0.0
        } else {
            state.total_used as f64 / state.total_available as f64 * 100.0
        };
        let budget_compliance = state.compliant_loads as f64 / state.total_loads as f64 * 100.0;

        EfficiencyMetrics {
            efficiency_score,
            budget_compliance,
            phase_usage,
            total_usage: state.total_usage,
            total_loads: state.total_loads,
        }
    }

    /// Forget all recorded usage.
    pub fn reset(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state = LedgerState::default();
    }
}
