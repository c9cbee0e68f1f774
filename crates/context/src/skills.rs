//! Skill index and budget-constrained selection.
//!
//! The index is built once by walking the skills corpus for `*.md` files and
//! is read-only afterwards. A missing corpus yields an empty index: every
//! downstream step behaves as if no skills exist.
//!
//! Skill files may open with a frontmatter block:
//!
//! ```text
//! ---
//! name: tdd-red
//! categories: testing, tdd
//! priority: 1
//! ---
//! ```
//!
//! Without one, the name comes from the path (`foo.md` → `foo`,
//! `foo/SKILL.md` → `foo`) and the category from the enclosing directory.

use crate::token;
use jitctx_core::{DEFAULT_PRIORITY, PhaseConfig, SkillInfo};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Score added for skills pinned by the phase config.
const ESSENTIAL_BOOST: u32 = 100;
/// Score added for skills in one of the phase's preferred categories.
const CATEGORY_BOOST: u32 = 50;
/// Score per priority step above the lowest priority.
const PRIORITY_WEIGHT: u32 = 10;

const FALLBACK_CATEGORY: &str = "general";

/// Read-only aggregate over the index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillStats {
    pub total_skills: usize,
    pub total_tokens: usize,
    /// Category → number of skills tagged with it.
    pub categories: BTreeMap<String, usize>,
}

/// All skills discovered in a corpus.
#[derive(Debug, Clone, Default)]
pub struct SkillIndex {
    root: Option<PathBuf>,
    skills: Vec<SkillInfo>,
}

impl SkillIndex {
    /// An index with no skills.
    pub fn empty() -> Self {
        Self::default()
    }

    /// An index over already-known skills.
    pub fn from_skills(mut skills: Vec<SkillInfo>) -> Self {
        skills.sort_by(|a, b| a.name.cmp(&b.name));
        Self { root: None, skills }
    }

    /// Walk `root` and index every markdown file found.
    ///
    /// Never fails: unreadable directories and files are skipped. When two
    /// files declare the same skill name, the lexicographically first path
    /// is kept.
    pub async fn build(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        if !tokio::fs::metadata(&root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            warn!("Skills directory not found: {}", root.display());
            return Self {
                root: Some(root),
                skills: Vec::new(),
            };
        }

        info!("Indexing skills in {}", root.display());

        let mut files = Vec::new();
        let mut pending = vec![root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Skipping unreadable directory");
                    continue;
                }
            };

            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(dir = %dir.display(), error = %e, "Stopped reading directory");
                        break;
                    }
                };

                let path = entry.path();
                let Ok(file_type) = entry.file_type().await else {
                    continue;
                };

                if file_type.is_dir() {
                    pending.push(path);
                } else if path.extension().and_then(|s| s.to_str()) == Some("md") {
                    files.push(path);
                }
            }
        }

        // Path order, so the first path wins a name clash on every platform.
        files.sort();

        let mut skills = Vec::new();
        let mut seen = HashSet::new();
        for path in files {
            let Some(skill) = index_skill_file(&root, &path).await else {
                continue;
            };
            if seen.insert(skill.name.clone()) {
                skills.push(skill);
            } else {
                warn!(
                    name = %skill.name,
                    path = %path.display(),
                    "Duplicate skill name ignored"
                );
            }
        }

        let mut index = Self::from_skills(skills);
        index.root = Some(root);
        info!("Indexed {} skills", index.len());
        index
    }

    /// Corpus location this index was built from.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&SkillInfo> {
        self.skills.iter().find(|s| s.name == name)
    }

    pub fn skills(&self) -> &[SkillInfo] {
        &self.skills
    }

    /// Select skills for a phase without exceeding `token_budget`.
    ///
    /// # Algorithm
    ///
    /// 1. Score each skill: essential boost + preferred-category boost +
    ///    priority weight
    /// 2. Sort by score (desc), then token cost (asc), then name
    /// 3. Greedily admit skills while the running total fits; a skill that
    ///    doesn't fit is skipped, not a stopping point
    pub fn filter_skills(&self, config: &PhaseConfig, token_budget: usize) -> Vec<SkillInfo> {
        if token_budget == 0 || self.skills.is_empty() {
            return Vec::new();
        }

        let mut ranked: Vec<(u32, &SkillInfo)> = self
            .skills
            .iter()
            .map(|s| (score_skill(s, config), s))
            .collect();
        ranked.sort_by(|(score_a, a), (score_b, b)| {
            score_b
                .cmp(score_a)
                .then(a.estimated_tokens.cmp(&b.estimated_tokens))
                .then_with(|| a.name.cmp(&b.name))
        });

        let mut used = 0usize;
        let mut selected = Vec::new();
        for (score, skill) in ranked {
            if used + skill.estimated_tokens <= token_budget {
                used += skill.estimated_tokens;
                debug!(
                    skill = %skill.name,
                    score,
                    tokens = skill.estimated_tokens,
                    "Selected skill"
                );
                selected.push(skill.clone());
            } else {
                debug!(
                    skill = %skill.name,
                    tokens = skill.estimated_tokens,
                    remaining = token_budget - used,
                    "Skipped skill over budget"
                );
            }
        }

        selected
    }

    pub fn get_skill_stats(&self) -> SkillStats {
        let mut categories = BTreeMap::new();
        for skill in &self.skills {
            for category in &skill.categories {
                *categories.entry(category.clone()).or_insert(0) += 1;
            }
        }

        SkillStats {
            total_skills: self.skills.len(),
            total_tokens: self.skills.iter().map(|s| s.estimated_tokens).sum(),
            categories,
        }
    }
}

fn score_skill(skill: &SkillInfo, config: &PhaseConfig) -> u32 {
    let priority = skill.priority.clamp(1, DEFAULT_PRIORITY);
    let mut score = u32::from(DEFAULT_PRIORITY + 1 - priority) * PRIORITY_WEIGHT;
    if config.is_essential_skill(&skill.name) {
        score += ESSENTIAL_BOOST;
    }
    if config.prefers_any(&skill.categories) {
        score += CATEGORY_BOOST;
    }
    score
}

async fn index_skill_file(root: &Path, path: &Path) -> Option<SkillInfo> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Skipping unreadable skill file");
            return None;
        }
    };

    let size_bytes = content.len() as u64;
    let meta = parse_frontmatter(&content);
    let (default_name, default_category) = names_from_path(root, path);

    let categories = if meta.categories.is_empty() {
        BTreeSet::from([default_category])
    } else {
        meta.categories
    };

    Some(SkillInfo {
        name: meta.name.unwrap_or(default_name),
        path: path.to_path_buf(),
        size_bytes,
        estimated_tokens: token::estimate_tokens_from_bytes(size_bytes),
        categories,
        priority: meta.priority.unwrap_or(DEFAULT_PRIORITY),
    })
}

/// Metadata read from a skill's frontmatter block.
#[derive(Debug, Default, PartialEq, Eq)]
struct Frontmatter {
    name: Option<String>,
    categories: BTreeSet<String>,
    priority: Option<u8>,
}

/// Parse the `key: value` lines of a leading `---` block.
fn parse_frontmatter(content: &str) -> Frontmatter {
    let mut meta = Frontmatter::default();

    let Some(rest) = content.strip_prefix("---") else {
        return meta;
    };
    let Some((block, _body)) = rest.split_once("\n---") else {
        return meta;
    };

    for line in block.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().trim_matches('"');

        match key.trim() {
            "name" if !value.is_empty() => meta.name = Some(value.to_string()),
            "category" | "categories" | "tags" => {
                meta.categories.extend(
                    value
                        .trim_matches(|c| c == '[' || c == ']')
                        .split(',')
                        .map(|c| c.trim().trim_matches('"').to_lowercase())
                        .filter(|c| !c.is_empty()),
                );
            }
            "priority" => match value.parse::<u8>() {
                Ok(p) if (1..=DEFAULT_PRIORITY).contains(&p) => meta.priority = Some(p),
                _ => debug!(value, "Ignoring out-of-range skill priority"),
            },
            _ => {}
        }
    }

    meta
}

/// Default `(name, category)` derived from a skill's location.
fn names_from_path(root: &Path, path: &Path) -> (String, String) {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string();

    let dir_name = |p: Option<&Path>| {
        p.filter(|p| p.starts_with(root) && *p != root)
            .and_then(|p| p.file_name())
            .and_then(|s| s.to_str())
            .map(str::to_string)
    };

    let parent = path.parent();
    if stem.eq_ignore_ascii_case("skill") {
        let name = dir_name(parent).unwrap_or(stem);
        let category = dir_name(parent.and_then(Path::parent))
            .unwrap_or_else(|| FALLBACK_CATEGORY.to_string());
        (name, category)
    } else {
        let category = dir_name(parent).unwrap_or_else(|| FALLBACK_CATEGORY.to_string());
        (stem, category)
    }
}
