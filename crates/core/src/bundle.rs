//! The assembled bundle and per-load metrics.

use crate::phase::Phase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// A skill as delivered to the assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillRecord {
    pub name: String,
    pub path: PathBuf,
    pub content: String,
    pub tokens: usize,
    pub priority: u8,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    /// Pinned by the phase config; never dropped during optimization.
    pub essential: bool,
}

/// A project document as delivered to the assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Identifier from the phase config (path relative to the project root)
    pub id: String,
    pub path: PathBuf,
    pub content: String,
    pub tokens: usize,
    /// Whether markup was stripped to fit the budget.
    #[serde(default)]
    pub compressed: bool,
}

/// Everything assembled for one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextBundle {
    pub phase: Phase,
    pub skills: Vec<SkillRecord>,
    pub documents: Vec<DocumentRecord>,
    /// Sum of skill and document tokens.
    pub total_tokens: usize,
    /// The phase budget this bundle was assembled against.
    pub budget: usize,
    /// Still larger than `budget` after optimization.
    pub over_budget: bool,
}

impl ContextBundle {
    /// An empty bundle for a phase.
    pub fn empty(phase: Phase, budget: usize) -> Self {
        Self {
            phase,
            skills: Vec::new(),
            documents: Vec::new(),
            total_tokens: 0,
            budget,
            over_budget: false,
        }
    }

    /// Recompute `total_tokens` and `over_budget` from the current contents.
    pub fn recount(&mut self) -> usize {
        let skills: usize = self.skills.iter().map(|s| s.tokens).sum();
        let docs: usize = self.documents.iter().map(|d| d.tokens).sum();
        self.total_tokens = skills + docs;
        self.over_budget = self.total_tokens > self.budget;
        self.total_tokens
    }

    /// Approximate in-memory footprint, used for cache accounting.
    pub fn size_bytes(&self) -> usize {
        let skills: usize = self
            .skills
            .iter()
            .map(|s| s.content.len() + s.name.len())
            .sum();
        let docs: usize = self
            .documents
            .iter()
            .map(|d| d.content.len() + d.id.len())
            .sum();
        skills + docs
    }

    pub fn skill_names(&self) -> Vec<&str> {
        self.skills.iter().map(|s| s.name.as_str()).collect()
    }
}

/// What a single `load_context` call cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextMetrics {
    pub phase: Phase,
    pub load_time: Duration,
    pub token_count: usize,
    pub cache_hit: bool,
    pub skills_loaded: usize,
    pub docs_loaded: usize,
    /// Bundle exceeded the phase budget even after optimization.
    #[serde(default)]
    pub over_budget: bool,
    /// Skills were dropped or documents compressed.
    #[serde(default)]
    pub optimized: bool,
    pub timestamp: DateTime<Utc>,
}
