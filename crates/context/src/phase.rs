//! Phase classification.
//!
//! Maps a free-text turn to a [`Phase`] with an ordered table of
//! `(phase, patterns)` pairs. The first phase with a matching pattern wins,
//! so the table runs from the most to the least specific phase. Adding a
//! phase is a data change to [`default_patterns`].
//!
//! # Resolution order
//!
//! 1. Patterns against the current input
//! 2. Patterns against conversation history, newest turn first
//! 3. The previously detected phase (sticky across ambiguous turns)
//! 4. [`Phase::Spec`] on the very first call

use chrono::{DateTime, Utc};
use jitctx_core::{Error, Phase, PhaseConfig, Result};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Resolved phases kept for diagnostics.
const MAX_PHASE_HISTORY: usize = 100;

/// Built-in pattern table, most specific phase first.
///
/// Patterns are matched against lowercased input.
pub fn default_patterns() -> Vec<(Phase, Vec<&'static str>)> {
    vec![
        (
            Phase::Spec,
            vec![
                r"spec-\d+",
                r"\bspec\b",
                r"specification",
                r"\brequirements?\b",
                r"/\w+:1-plan",
            ],
        ),
        (
            Phase::Red,
            vec![
                r"\bred\b",
                r"failing tests?",
                r"write (a )?tests?",
                r"test[- ]first",
            ],
        ),
        (
            Phase::Green,
            vec![r"\bgreen\b", r"implement", r"make (it|the tests?) pass"],
        ),
        (
            Phase::Refactor,
            vec![r"refactor", r"clean ?up", r"simplif", r"restructur"],
        ),
        (
            Phase::Sync,
            vec![
                r"\bsync\b",
                r"documentation",
                r"\bdocs?\b",
                r"changelog",
                r"/\w+:3-sync",
            ],
        ),
        (
            Phase::Debug,
            vec![
                r"debug",
                r"\berror\b",
                r"\bbugs?\b",
                r"stack ?trace",
                r"\bcrash",
            ],
        ),
        (
            Phase::Planning,
            vec![r"\bplan\b", r"architecture", r"\bdesign\b", r"roadmap"],
        ),
    ]
}

/// One resolved phase, as recorded in the diagnostic history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub phase: Phase,
    /// Phase before this call (`None` on the first call).
    pub previous: Option<Phase>,
    pub timestamp: DateTime<Utc>,
}

/// Compiled patterns for one phase.
struct PhaseMatcher {
    phase: Phase,
    patterns: Vec<Regex>,
}

impl PhaseMatcher {
    fn matches(&self, lowered: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(lowered))
    }
}

/// Stateful phase classifier holding the per-phase configs.
pub struct PhaseDetector {
    matchers: Vec<PhaseMatcher>,
    configs: HashMap<Phase, PhaseConfig>,
    current: Option<Phase>,
    history: VecDeque<PhaseTransition>,
}

impl PhaseDetector {
    /// Detector with the built-in pattern table.
    pub fn new(configs: Vec<PhaseConfig>) -> Result<Self> {
        Self::with_patterns(default_patterns(), configs)
    }

    /// Detector over the built-in patterns and built-in configs.
    pub fn with_defaults() -> Result<Self> {
        Self::new(PhaseConfig::defaults())
    }

    /// Detector with a custom pattern table, evaluated in the given order.
    pub fn with_patterns(
        patterns: Vec<(Phase, Vec<&str>)>,
        configs: Vec<PhaseConfig>,
    ) -> Result<Self> {
        let matchers = patterns
            .into_iter()
            .map(|(phase, sources)| {
                let patterns = sources
                    .into_iter()
                    .map(|src| {
                        Regex::new(src).map_err(|e| Error::Config {
                            message: format!("invalid pattern '{src}' for phase {phase}: {e}"),
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(PhaseMatcher { phase, patterns })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            matchers,
            configs: configs.into_iter().map(|c| (c.phase, c)).collect(),
            current: None,
            history: VecDeque::new(),
        })
    }

    /// Classify a turn and record the result.
    pub fn detect_phase(&mut self, input: &str, history: Option<&[String]>) -> Phase {
        let resolved = self
            .match_text(input)
            .or_else(|| {
                history.and_then(|turns| turns.iter().rev().find_map(|t| self.match_text(t)))
            })
            .or(self.current)
            .unwrap_or_default();

        self.record(resolved);
        resolved
    }

    /// First phase whose patterns match `text`, without touching state.
    pub fn match_text(&self, text: &str) -> Option<Phase> {
        let lowered = text.to_lowercase();
        self.matchers
            .iter()
            .find(|m| m.matches(&lowered))
            .map(|m| m.phase)
    }

    pub fn get_phase_config(&self, phase: Phase) -> Result<&PhaseConfig> {
        self.configs.get(&phase).ok_or(Error::ConfigNotFound(phase))
    }

    /// The most recently resolved phase.
    pub fn current_phase(&self) -> Option<Phase> {
        self.current
    }

    /// Resolved phases, oldest first.
    pub fn phase_history(&self) -> impl Iterator<Item = &PhaseTransition> {
        self.history.iter()
    }

    pub fn phase_history_len(&self) -> usize {
        self.history.len()
    }

    fn record(&mut self, phase: Phase) {
        let previous = self.current;
        if previous != Some(phase) {
            tracing::info!(
                from = previous.map(|p| p.as_str()).unwrap_or("none"),
                to = %phase,
                "Phase transition"
            );
        }

        if self.history.len() >= MAX_PHASE_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(PhaseTransition {
            phase,
            previous,
            timestamp: Utc::now(),
        });
        self.current = Some(phase);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> PhaseDetector {
        PhaseDetector::with_defaults().unwrap()
    }

    #[test]
    fn spec_request_is_spec_phase() {
        let mut d = detector();
        assert_eq!(d.detect_phase("Create SPEC-001 for login", None), Phase::Spec);
    }

    #[test]
    fn keywords_map_to_phases() {
        let d = detector();
        assert_eq!(d.match_text("Write a failing test for the parser"), Some(Phase::Red));
        assert_eq!(d.match_text("Now implement the handler"), Some(Phase::Green));
        assert_eq!(d.match_text("Refactor the session module"), Some(Phase::Refactor));
        assert_eq!(d.match_text("Update the docs"), Some(Phase::Sync));
        assert_eq!(d.match_text("Why does this crash on startup?"), Some(Phase::Debug));
        assert_eq!(d.match_text("Sketch the architecture"), Some(Phase::Planning));
        assert_eq!(d.match_text("hello there"), None);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let d = detector();
        assert_eq!(d.match_text("GREEN: make it pass"), Some(Phase::Green));
    }

    #[test]
    fn earlier_phase_wins_when_several_match() {
        let d = detector();
        // Matches both Spec and Red; Spec is evaluated first.
        assert_eq!(d.match_text("write tests for SPEC-042"), Some(Phase::Spec));
    }

    #[test]
    fn first_ambiguous_call_defaults_to_spec() {
        let mut d = detector();
        assert_eq!(d.detect_phase("ok", None), Phase::Spec);
    }

    #[test]
    fn input_match_beats_history() {
        let mut d = detector();
        let history = vec!["refactor the cache".to_string()];
        assert_eq!(
            d.detect_phase("implement login", Some(history.as_slice())),
            Phase::Green
        );
        assert_eq!(d.current_phase(), Some(Phase::Green));
    }

    #[test]
    fn history_resolves_ambiguous_input() {
        let mut d = detector();
        let history = vec![
            "refactor the cache".to_string(),
            "implement the eviction".to_string(),
        ];
        // Newest matching turn wins.
        assert_eq!(
            d.detect_phase("continue", Some(history.as_slice())),
            Phase::Green
        );
    }

    #[test]
    fn ambiguous_input_keeps_previous_phase() {
        let mut d = detector();
        d.detect_phase("refactor the cache", None);
        assert_eq!(d.detect_phase("continue", None), Phase::Refactor);
        let empty: Vec<String> = Vec::new();
        assert_eq!(
            d.detect_phase("continue", Some(empty.as_slice())),
            Phase::Refactor
        );
    }

    #[test]
    fn history_is_recorded_and_bounded() {
        let mut d = detector();
        d.detect_phase("implement it", None);
        d.detect_phase("debug the error", None);

        let recorded: Vec<_> = d.phase_history().cloned().collect();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].previous, None);
        assert_eq!(recorded[1].previous, Some(Phase::Green));
        assert_eq!(recorded[1].phase, Phase::Debug);

        for _ in 0..(MAX_PHASE_HISTORY + 10) {
            d.detect_phase("ok", None);
        }
        assert_eq!(d.phase_history_len(), MAX_PHASE_HISTORY);
    }

    #[test]
    fn every_phase_has_config() {
        let d = detector();
        for phase in Phase::ALL {
            assert_eq!(d.get_phase_config(phase).unwrap().phase, phase);
        }
    }

    #[test]
    fn missing_config_fails_fast() {
        let d = PhaseDetector::new(vec![PhaseConfig::default_for(Phase::Spec)]).unwrap();
        let err = d.get_phase_config(Phase::Sync).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound(Phase::Sync)));
    }

    #[test]
    fn invalid_pattern_is_config_error() {
        let result = PhaseDetector::with_patterns(
            vec![(Phase::Spec, vec!["(unclosed"])],
            PhaseConfig::defaults(),
        );
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn custom_table_order_is_respected() {
        let mut d = PhaseDetector::with_patterns(
            vec![(Phase::Debug, vec!["login"]), (Phase::Spec, vec!["login"])],
            PhaseConfig::defaults(),
        )
        .unwrap();
        assert_eq!(d.detect_phase("login page", None), Phase::Debug);
    }
}
