//! Workflow phases and their static budgets.
//!
//! A turn always belongs to exactly one [`Phase`]. Each phase owns a
//! [`PhaseConfig`] that caps how many tokens a bundle may cost and pins the
//! skills and documents that must be considered first.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A stage of the assisted development workflow.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Writing or revising a specification.
    #[default]
    Spec,
    /// Test-first: writing failing tests.
    Red,
    /// Implementing until the tests pass.
    Green,
    /// Cleaning up working code.
    Refactor,
    /// Syncing documentation with the code.
    Sync,
    /// Chasing down a failure.
    Debug,
    /// Architecture and roadmap work.
    Planning,
}

impl Phase {
    /// Every phase, in declaration order.
    pub const ALL: [Phase; 7] = [
        Phase::Spec,
        Phase::Red,
        Phase::Green,
        Phase::Refactor,
        Phase::Sync,
        Phase::Debug,
        Phase::Planning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spec => "spec",
            Self::Red => "red",
            Self::Green => "green",
            Self::Refactor => "refactor",
            Self::Sync => "sync",
            Self::Debug => "debug",
            Self::Planning => "planning",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spec" | "specification" => Ok(Self::Spec),
            "red" | "test" => Ok(Self::Red),
            "green" | "implement" => Ok(Self::Green),
            "refactor" => Ok(Self::Refactor),
            "sync" | "docs" => Ok(Self::Sync),
            "debug" => Ok(Self::Debug),
            "planning" | "plan" => Ok(Self::Planning),
            other => Err(format!("unknown phase '{other}'")),
        }
    }
}

/// Budget and pinned material for one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseConfig {
    pub phase: Phase,

    /// Hard cap on the estimated token cost of one bundle.
    pub max_tokens: usize,

    /// Skill names that are always scored first, in order.
    #[serde(default)]
    pub essential_skills: Vec<String>,

    /// Document paths (relative to the project root) loaded on every miss.
    #[serde(default)]
    pub essential_documents: Vec<String>,

    /// Skill categories that get a scoring boost in this phase.
    #[serde(default)]
    pub preferred_categories: Vec<String>,
}

impl PhaseConfig {
    /// Built-in configuration for a phase.
    pub fn default_for(phase: Phase) -> Self {
        let (max_tokens, skills, docs, categories): (usize, &[&str], &[&str], &[&str]) =
            match phase {
                Phase::Spec => (
                    30_000,
                    &["spec-authoring", "requirements-ears"],
                    &["CLAUDE.md", ".jitctx/project/product.md"],
                    &["spec", "planning"],
                ),
                Phase::Red => (
                    25_000,
                    &["tdd-red", "testing-patterns"],
                    &["CLAUDE.md", ".jitctx/project/tech.md"],
                    &["testing"],
                ),
                Phase::Green => (
                    25_000,
                    &["tdd-green", "language-idioms"],
                    &["CLAUDE.md", ".jitctx/project/structure.md"],
                    &["implementation", "language"],
                ),
                Phase::Refactor => (
                    20_000,
                    &["refactoring", "code-quality"],
                    &["CLAUDE.md"],
                    &["quality", "refactor"],
                ),
                Phase::Sync => (
                    40_000,
                    &["docs-sync", "changelog"],
                    &["CLAUDE.md", "README.md"],
                    &["documentation"],
                ),
                Phase::Debug => (
                    15_000,
                    &["debugging", "error-analysis"],
                    &["CLAUDE.md"],
                    &["debugging"],
                ),
                Phase::Planning => (
                    35_000,
                    &["architecture", "planning"],
                    &[
                        "CLAUDE.md",
                        ".jitctx/project/product.md",
                        ".jitctx/project/structure.md",
                    ],
                    &["architecture", "planning"],
                ),
            };

        fn owned(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        }

        Self {
            phase,
            max_tokens,
            essential_skills: owned(skills),
            essential_documents: owned(docs),
            preferred_categories: owned(categories),
        }
    }

    /// Built-in configuration for every phase.
    pub fn defaults() -> Vec<Self> {
        Phase::ALL.iter().map(|p| Self::default_for(*p)).collect()
    }

    pub fn is_essential_skill(&self, name: &str) -> bool {
        self.essential_skills.iter().any(|s| s == name)
    }

    pub fn prefers_any(&self, categories: &std::collections::BTreeSet<String>) -> bool {
        self.preferred_categories
            .iter()
            .any(|c| categories.contains(c))
    }
}
