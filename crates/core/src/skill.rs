//! Indexed skill metadata.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Priority assigned to skills that don't declare one (least important).
pub const DEFAULT_PRIORITY: u8 = 5;

/// One skill artifact discovered in the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillInfo {
    /// Unique skill name (frontmatter `name`, or derived from the path)
    pub name: String,

    /// Location of the skill file
    pub path: PathBuf,

    /// File size at index time
    pub size_bytes: u64,

    /// Estimated token cost, derived from `size_bytes`
    pub estimated_tokens: usize,

    /// Category tags
    #[serde(default)]
    pub categories: BTreeSet<String>,

    /// 1 = most important, [`DEFAULT_PRIORITY`] = least
    #[serde(default = "default_priority")]
    pub priority: u8,
}

fn default_priority() -> u8 {
    DEFAULT_PRIORITY
}

impl SkillInfo {
    pub fn has_category(&self, category: &str) -> bool {
        self.categories.contains(category)
    }
}
