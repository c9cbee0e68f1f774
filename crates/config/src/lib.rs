//! Configuration loading, validation, and management for jitctx.
//!
//! Loads configuration from `~/.jitctx/config.toml` with environment
//! variable overrides. Every field has a default, so a missing file is
//! never an error. Phase sections are partial: only the keys present
//! replace the built-in [`PhaseConfig`] values.

use jitctx_core::{Phase, PhaseConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.jitctx/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Skills corpus. Defaults to `<project_root>/.claude/skills`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills_dir: Option<PathBuf>,

    /// Root that essential document paths are resolved against.
    #[serde(default = "default_project_root")]
    pub project_root: PathBuf,

    /// Bundle cache bounds
    #[serde(default)]
    pub cache: CacheConfig,

    /// Process-wide token ceiling
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Per-phase overrides keyed by phase name (`spec`, `red`, ...)
    #[serde(default)]
    pub phases: BTreeMap<String, PhaseOverride>,
}

fn default_project_root() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_max_size")]
    pub max_size: usize,

    #[serde(default = "default_cache_max_memory_mb")]
    pub max_memory_mb: usize,
}

fn default_cache_max_size() -> usize {
    100
}
fn default_cache_max_memory_mb() -> usize {
    50
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: default_cache_max_size(),
            max_memory_mb: default_cache_max_memory_mb(),
        }
    }
}

impl CacheConfig {
    pub fn max_memory_bytes(&self) -> usize {
        self.max_memory_mb * 1024 * 1024
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default = "default_max_total_tokens")]
    pub max_total_tokens: usize,
}

fn default_max_total_tokens() -> usize {
    180_000
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_total_tokens: default_max_total_tokens(),
        }
    }
}

/// Partial override of a built-in phase configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhaseOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub essential_skills: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub essential_documents: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_categories: Option<Vec<String>>,
}

impl PhaseOverride {
    fn apply(&self, mut base: PhaseConfig) -> PhaseConfig {
        if let Some(max) = self.max_tokens {
            base.max_tokens = max;
        }
        if let Some(skills) = &self.essential_skills {
            base.essential_skills = skills.clone();
        }
        if let Some(docs) = &self.essential_documents {
            base.essential_documents = docs.clone();
        }
        if let Some(categories) = &self.preferred_categories {
            base.preferred_categories = categories.clone();
        }
        base
    }
}

impl EngineConfig {
    /// Load configuration from the default path (~/.jitctx/config.toml).
    ///
    /// Environment variables override file values:
    /// - `JITCTX_SKILLS_DIR`
    /// - `JITCTX_PROJECT_ROOT`
    /// - `JITCTX_MAX_TOTAL_TOKENS`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            ConfigError::ParseError { reason, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::new(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(dir) = std::env::var("JITCTX_SKILLS_DIR") {
            self.skills_dir = Some(PathBuf::from(dir));
        }
        if let Ok(root) = std::env::var("JITCTX_PROJECT_ROOT") {
            self.project_root = PathBuf::from(root);
        }
        if let Ok(raw) = std::env::var("JITCTX_MAX_TOTAL_TOKENS") {
            match raw.parse::<usize>() {
                Ok(max) => self.budget.max_total_tokens = max,
                Err(e) => {
                    tracing::warn!(value = %raw, error = %e, "Ignoring invalid JITCTX_MAX_TOTAL_TOKENS")
                }
            }
        }
        self.validate()
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".jitctx")
    }

    /// The skills corpus location after defaults are applied.
    pub fn effective_skills_dir(&self) -> PathBuf {
        self.skills_dir
            .clone()
            .unwrap_or_else(|| self.project_root.join(".claude").join("skills"))
    }

    /// Built-in phase configs with this file's overrides merged in.
    pub fn phase_configs(&self) -> Result<Vec<PhaseConfig>, ConfigError> {
        let mut configs = PhaseConfig::defaults();
        for (key, over) in &self.phases {
            let phase: Phase = key.parse().map_err(ConfigError::ValidationError)?;
            if let Some(slot) = configs.iter_mut().find(|c| c.phase == phase) {
                *slot = over.apply(slot.clone());
            }
        }
        Ok(configs)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.max_size == 0 {
            return Err(ConfigError::ValidationError(
                "cache.max_size must be > 0".into(),
            ));
        }

        if self.cache.max_memory_mb == 0 {
            return Err(ConfigError::ValidationError(
                "cache.max_memory_mb must be > 0".into(),
            ));
        }

        if self.budget.max_total_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "budget.max_total_tokens must be > 0".into(),
            ));
        }

        for config in self.phase_configs()? {
            if config.max_tokens == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "phases.{}.max_tokens must be > 0",
                    config.phase
                )));
            }
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let mut config = Self::default();
        for phase in PhaseConfig::defaults() {
            config.phases.insert(
                phase.phase.to_string(),
                PhaseOverride {
                    max_tokens: Some(phase.max_tokens),
                    essential_skills: Some(phase.essential_skills),
                    essential_documents: Some(phase.essential_documents),
                    preferred_categories: Some(phase.preferred_categories),
                },
            );
        }
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            skills_dir: None,
            project_root: default_project_root(),
            cache: CacheConfig::default(),
            budget: BudgetConfig::default(),
            phases: BTreeMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
