//! Context orchestrator: the single entry point of the engine.
//!
//! Wires the phase detector, skill index, bundle cache and token ledger into
//! one `load_context` call:
//!
//! ```text
//! input ─▶ detect phase ─▶ cache key ─┬─ hit ─────────────────────────────▶ bundle
//!                                     └─ miss ─▶ select skills ─▶ read files
//!                                                ─▶ optimize if over budget
//!                                                ─▶ ledger + metrics + cache ─▶ bundle
//! ```
//!
//! Cache, ledger and metrics are only written after every file read has
//! completed, so dropping a `load_context` future mid-flight leaves them
//! untouched.

use crate::cache::{CacheStats, ContextCache, generate_cache_key};
use crate::compress::compress_text;
use crate::phase::PhaseDetector;
use crate::skills::{SkillIndex, SkillStats};
use crate::token::estimate_tokens;
use chrono::Utc;
use jitctx_config::EngineConfig;
use jitctx_core::{
    ContextBundle, ContextMetrics, DocumentRecord, Error, Phase, PhaseConfig, Result, SkillRecord,
};
use jitctx_telemetry::{EfficiencyMetrics, MetricsLog, PerformanceStats, TokenBudgetManager};
use serde::Serialize;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Ledger label for loads charged by the orchestrator.
const LOAD_LABEL: &str = "load_context";

/// Snapshot of every engine component, for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub current_phase: Option<Phase>,
    pub performance: PerformanceStats,
    pub cache: CacheStats,
    pub efficiency: EfficiencyMetrics,
    pub skills: SkillStats,
    pub phase_history_len: usize,
}

/// Assembles phase-appropriate context bundles.
pub struct ContextOrchestrator {
    detector: PhaseDetector,
    index: SkillIndex,
    cache: ContextCache,
    ledger: Arc<TokenBudgetManager>,
    metrics: MetricsLog,
    project_root: PathBuf,
}

impl ContextOrchestrator {
    /// Build every component from configuration and index the skills corpus.
    pub async fn from_config(config: &EngineConfig) -> Result<Self> {
        let phases = config.phase_configs().map_err(|e| Error::Config {
            message: e.to_string(),
        })?;

        let ledger = TokenBudgetManager::new(config.budget.max_total_tokens, &phases);
        let detector = PhaseDetector::new(phases)?;
        let index = SkillIndex::build(config.effective_skills_dir()).await;
        let cache = ContextCache::new(config.cache.max_size, config.cache.max_memory_bytes());

        Ok(Self::new(
            detector,
            index,
            cache,
            Arc::new(ledger),
            config.project_root.clone(),
        ))
    }

    /// Assemble an orchestrator from already-built parts.
    pub fn new(
        detector: PhaseDetector,
        index: SkillIndex,
        cache: ContextCache,
        ledger: Arc<TokenBudgetManager>,
        project_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            detector,
            index,
            cache,
            ledger,
            metrics: MetricsLog::default(),
            project_root: project_root.into(),
        }
    }

    /// Load the context bundle for one conversational turn.
    ///
    /// `history` is ordered oldest to newest. `context` is an arbitrary JSON
    /// object that takes part in the cache key.
    ///
    /// Unreadable skills and documents are skipped. The only error is a
    /// detected phase with no registered config.
    pub async fn load_context(
        &mut self,
        input: &str,
        history: Option<&[String]>,
        context: Option<&Value>,
    ) -> Result<(ContextBundle, ContextMetrics)> {
        let started = Instant::now();
        let phase = self.detector.detect_phase(input, history);
        let config = self.detector.get_phase_config(phase)?.clone();
        let key = generate_cache_key(phase, input, context);

        if self.cache.contains(&key) {
            if let Some(entry) = self.cache.get(&key) {
                let bundle = entry.content.clone();
                let metrics = self.record_metrics(&bundle, started, true, false);
                debug!(phase = %phase, tokens = bundle.total_tokens, "Served bundle from cache");
                return Ok((bundle, metrics));
            }
        }

        let (bundle, optimized) = self.assemble(&config).await;

        let check = self.ledger.check_budget(phase, bundle.total_tokens);
        if !check.within_budget {
            warn!(
                phase = %phase,
                requested = bundle.total_tokens,
                remaining = check.remaining,
                "Bundle exceeds remaining token budget"
            );
        }
        self.ledger
            .record_usage(phase, bundle.total_tokens, Some(LOAD_LABEL));

        let metrics = self.record_metrics(&bundle, started, false, optimized);
        self.cache.record_miss();
        self.cache
            .put(key, bundle.clone(), bundle.total_tokens, Some(phase));

        info!(
            phase = %phase,
            tokens = bundle.total_tokens,
            budget = bundle.budget,
            skills = bundle.skills.len(),
            documents = bundle.documents.len(),
            optimized,
            over_budget = bundle.over_budget,
            elapsed_ms = metrics.load_time.as_millis() as u64,
            "Context loaded"
        );

        Ok((bundle, metrics))
    }

    pub fn get_stats(&self) -> EngineStats {
        EngineStats {
            current_phase: self.detector.current_phase(),
            performance: self.metrics.summary(),
            cache: self.cache.get_stats(),
            efficiency: self.ledger.get_efficiency_metrics(),
            skills: self.index.get_skill_stats(),
            phase_history_len: self.detector.phase_history_len(),
        }
    }

    /// Drop every cached bundle and re-index the skills corpus.
    pub async fn clear_cache(&mut self) {
        self.cache.clear();
        if let Some(root) = self.index.root().map(Path::to_path_buf) {
            self.index = SkillIndex::build(root).await;
        }
        info!("Context cache cleared");
    }

    /// Clear the cache, the ledger and the metrics history.
    pub fn reset(&mut self) {
        self.cache.clear();
        self.ledger.reset();
        self.metrics.clear();
    }

    /// Shared handle to the token ledger.
    pub fn ledger(&self) -> Arc<TokenBudgetManager> {
        Arc::clone(&self.ledger)
    }

    pub fn skill_index(&self) -> &SkillIndex {
        &self.index
    }

    pub fn detector(&self) -> &PhaseDetector {
        &self.detector
    }

    pub fn metrics(&self) -> &MetricsLog {
        &self.metrics
    }

    pub fn cache(&self) -> &ContextCache {
        &self.cache
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Read the selected skills and essential documents for one phase.
    ///
    /// Returns the bundle and whether it had to be optimized.
    async fn assemble(&self, config: &PhaseConfig) -> (ContextBundle, bool) {
        let mut bundle = ContextBundle::empty(config.phase, config.max_tokens);

        for skill in self.index.filter_skills(config, config.max_tokens) {
            let Some(content) = read_item(&skill.path).await else {
                continue;
            };
            bundle.skills.push(SkillRecord {
                essential: config.is_essential_skill(&skill.name),
                tokens: estimate_tokens(&content),
                content,
                name: skill.name,
                path: skill.path,
                priority: skill.priority,
                categories: skill.categories.into_iter().collect(),
            });
        }

        for id in &config.essential_documents {
            let path = self.project_root.join(id);
            let Some(content) = read_item(&path).await else {
                continue;
            };
            bundle.documents.push(DocumentRecord {
                id: id.clone(),
                path,
                tokens: estimate_tokens(&content),
                content,
                compressed: false,
            });
        }

        bundle.recount();
        let optimized = bundle.over_budget && optimize_context_aggressively(&mut bundle);
        if bundle.over_budget {
            warn!(
                phase = %config.phase,
                tokens = bundle.total_tokens,
                budget = bundle.budget,
                "Bundle still over budget after optimization"
            );
        }
        (bundle, optimized)
    }

    fn record_metrics(
        &mut self,
        bundle: &ContextBundle,
        started: Instant,
        cache_hit: bool,
        optimized: bool,
    ) -> ContextMetrics {
        let metrics = ContextMetrics {
            phase: bundle.phase,
            load_time: started.elapsed(),
            token_count: bundle.total_tokens,
            cache_hit,
            skills_loaded: bundle.skills.len(),
            docs_loaded: bundle.documents.len(),
            over_budget: bundle.over_budget,
            optimized,
            timestamp: Utc::now(),
        };
        self.metrics.record(metrics.clone());
        metrics
    }
}

/// Shrink an over-budget bundle in place. Returns whether anything changed.
///
/// Non-essential skills go first: lowest priority, then largest. Once only
/// essential skills remain, documents are compressed in order until the
/// bundle fits. Best effort; the bundle may still be over budget.
pub fn optimize_context_aggressively(bundle: &mut ContextBundle) -> bool {
    let mut changed = false;

    while bundle.total_tokens > bundle.budget {
        let victim = bundle
            .skills
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.essential)
            .max_by(|(_, a), (_, b)| {
                a.priority
                    .cmp(&b.priority)
                    .then(a.tokens.cmp(&b.tokens))
            })
            .map(|(i, _)| i);
        let Some(i) = victim else {
            break;
        };

        let dropped = bundle.skills.remove(i);
        debug!(skill = %dropped.name, tokens = dropped.tokens, "Dropped skill to fit budget");
        bundle.recount();
        changed = true;
    }

    for i in 0..bundle.documents.len() {
        if bundle.total_tokens <= bundle.budget {
            break;
        }
        let doc = &mut bundle.documents[i];
        let compressed = compress_text(&doc.content);
        if compressed.len() < doc.content.len() {
            let before = doc.tokens;
            doc.tokens = estimate_tokens(&compressed);
            doc.content = compressed;
            doc.compressed = true;
            debug!(document = %doc.id, before, after = doc.tokens, "Compressed document");
            changed = true;
        }
        bundle.recount();
    }

    changed
}

async fn read_item(path: &Path) -> Option<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Some(content),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "Skipping missing file");
            None
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Skipping unreadable file");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn skills_dir(root: &Path) -> PathBuf {
        root.join(".claude").join("skills")
    }

    async fn engine(dir: &TempDir, toml: &str) -> ContextOrchestrator {
        let mut config = EngineConfig::from_toml(toml).unwrap();
        config.project_root = dir.path().to_path_buf();
        ContextOrchestrator::from_config(&config).await.unwrap()
    }

    fn project() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        let skills = skills_dir(dir.path());
        write(
            &skills.join("spec/spec-authoring/SKILL.md"),
            "---\npriority: 1\n---\nWrite requirements in EARS form.\n",
        );
        write(&skills.join("testing/tdd-red.md"), "Write the failing test first.\n");
        write(
            &dir.path().join("CLAUDE.md"),
            "# Project\n\nRun the test suite before committing.\n",
        );
        dir
    }

    #[tokio::test]
    async fn spec_request_fits_phase_budget() {
        let dir = project();
        let mut engine = engine(&dir, "").await;

        let (bundle, metrics) = engine
            .load_context("Create SPEC-001 for login", None, None)
            .await
            .unwrap();

        assert_eq!(bundle.phase, Phase::Spec);
        assert_eq!(bundle.budget, 30_000);
        assert!(bundle.total_tokens <= bundle.budget);
        assert!(!bundle.over_budget);
        assert_eq!(bundle.skills[0].name, "spec-authoring");
        assert!(bundle.skills[0].essential);
        // product.md is missing and skipped.
        assert_eq!(bundle.documents.len(), 1);
        assert_eq!(bundle.documents[0].id, "CLAUDE.md");

        assert!(!metrics.cache_hit);
        assert_eq!(metrics.token_count, bundle.total_tokens);
        assert_eq!(metrics.skills_loaded, bundle.skills.len());
        assert_eq!(engine.ledger().current_usage(), bundle.total_tokens);
    }

    #[tokio::test]
    async fn identical_loads_hit_cache() {
        let dir = project();
        let mut engine = engine(&dir, "").await;
        let ctx = json!({"file": "src/auth.rs"});

        let (first, _) = engine
            .load_context("write a failing test", None, Some(&ctx))
            .await
            .unwrap();
        let (second, metrics) = engine
            .load_context("write a failing test", None, Some(&ctx))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert!(metrics.cache_hit);

        let stats = engine.get_stats();
        assert_eq!(stats.cache.hits, 1);
        assert_eq!(stats.cache.misses, 1);
        assert_eq!(stats.performance.total_loads, 2);
        assert!((stats.performance.cache_hit_rate - 50.0).abs() < 1e-9);
        // Only the miss is charged.
        assert_eq!(engine.ledger().current_usage(), first.total_tokens);
    }

    #[tokio::test]
    async fn different_context_is_a_miss() {
        let dir = project();
        let mut engine = engine(&dir, "").await;

        engine
            .load_context("refactor auth", None, Some(&json!({"branch": "a"})))
            .await
            .unwrap();
        let (_, metrics) = engine
            .load_context("refactor auth", None, Some(&json!({"branch": "b"})))
            .await
            .unwrap();

        assert!(!metrics.cache_hit);
        assert_eq!(engine.cache().len(), 2);
    }

    #[tokio::test]
    async fn missing_corpus_still_returns_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine(&dir, "").await;
        assert_eq!(engine.get_stats().skills.total_skills, 0);

        let (bundle, metrics) = engine
            .load_context("Create SPEC-001 for login", None, None)
            .await
            .unwrap();

        assert!(bundle.skills.is_empty());
        assert!(bundle.documents.is_empty());
        assert_eq!(bundle.total_tokens, 0);
        assert!(!bundle.over_budget);
        assert_eq!(metrics.skills_loaded, 0);
    }

    #[tokio::test]
    async fn history_drives_ambiguous_turns() {
        let dir = project();
        let mut engine = engine(&dir, "").await;
        let history = vec!["let's refactor the session code".to_string()];

        let (bundle, _) = engine
            .load_context("go on", Some(history.as_slice()), None)
            .await
            .unwrap();

        assert_eq!(bundle.phase, Phase::Refactor);
        assert_eq!(engine.get_stats().current_phase, Some(Phase::Refactor));
    }

    #[tokio::test]
    async fn over_budget_bundle_is_optimized() {
        let dir = tempfile::tempdir().unwrap();
        let skills = skills_dir(dir.path());
        write(&skills.join("tdd-green.md"), &"a".repeat(80));
        write(&skills.join("helper.md"), &"b".repeat(64));
        write(
            &dir.path().join("CLAUDE.md"),
            &format!("{}keep this rule", "## Section\n\n".repeat(20)),
        );

        let mut engine = engine(
            &dir,
            "[phases.green]\nmax_tokens = 40\nessential_documents = [\"CLAUDE.md\"]\n",
        )
        .await;

        let (bundle, metrics) = engine
            .load_context("implement the login handler", None, None)
            .await
            .unwrap();

        assert_eq!(bundle.phase, Phase::Green);
        assert_eq!(bundle.skill_names(), vec!["tdd-green"]);
        assert!(bundle.documents[0].compressed);
        assert_eq!(bundle.documents[0].content, "keep this rule");
        assert_eq!(bundle.total_tokens, 24);
        assert!(!bundle.over_budget);
        assert!(metrics.optimized);
    }

    #[tokio::test]
    async fn unfixable_overflow_is_flagged_not_failed() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("CLAUDE.md"), &"plain text ".repeat(40));

        let mut engine = engine(
            &dir,
            "[phases.debug]\nmax_tokens = 10\nessential_documents = [\"CLAUDE.md\"]\n",
        )
        .await;

        let (bundle, metrics) = engine
            .load_context("debug this crash", None, None)
            .await
            .unwrap();

        assert!(bundle.over_budget);
        assert!(metrics.over_budget);
        assert_eq!(bundle.total_tokens, 110);
        // Still charged even though the check was denied.
        assert_eq!(engine.ledger().phase_usage(Phase::Debug), 110);
        assert_eq!(engine.get_stats().performance.over_budget_loads, 1);
    }

    #[tokio::test]
    async fn vanished_skill_file_is_skipped() {
        let dir = project();
        let mut engine = engine(&dir, "").await;
        std::fs::remove_file(skills_dir(dir.path()).join("testing/tdd-red.md")).unwrap();

        let (bundle, _) = engine
            .load_context("write failing tests", None, None)
            .await
            .unwrap();

        assert_eq!(bundle.phase, Phase::Red);
        assert!(!bundle.skill_names().contains(&"tdd-red"));
        assert!(bundle.skill_names().contains(&"spec-authoring"));
    }

    #[tokio::test]
    async fn clear_cache_reindexes_corpus() {
        let dir = project();
        let mut engine = engine(&dir, "").await;
        engine.load_context("implement it", None, None).await.unwrap();
        assert_eq!(engine.skill_index().len(), 2);

        write(&skills_dir(dir.path()).join("tdd-green.md"), "Make it pass.\n");
        engine.clear_cache().await;

        assert!(engine.cache().is_empty());
        assert_eq!(engine.skill_index().len(), 3);

        let (bundle, metrics) = engine.load_context("implement it", None, None).await.unwrap();
        assert!(!metrics.cache_hit);
        assert!(bundle.skill_names().contains(&"tdd-green"));
    }

    #[tokio::test]
    async fn reset_clears_ledger_and_metrics() {
        let dir = project();
        let mut engine = engine(&dir, "").await;
        engine.load_context("update the docs", None, None).await.unwrap();
        engine.load_context("update the docs", None, None).await.unwrap();
        assert!(engine.ledger().current_usage() > 0);

        engine.reset();

        assert_eq!(engine.ledger().current_usage(), 0);
        assert!(engine.metrics().is_empty());
        assert!(engine.cache().is_empty());

        let performance = engine.get_stats().performance;
        assert_eq!(performance.loads, 0);
        assert_eq!(performance.total_loads, 0);
    }

    #[tokio::test]
    async fn phase_without_config_fails_fast() {
        let detector = PhaseDetector::new(vec![PhaseConfig::default_for(Phase::Spec)]).unwrap();
        let mut engine = ContextOrchestrator::new(
            detector,
            SkillIndex::empty(),
            ContextCache::new(10, 1024),
            Arc::new(TokenBudgetManager::with_defaults(1_000)),
            ".",
        );

        let err = engine
            .load_context("implement the parser", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound(Phase::Green)));
        assert!(engine.metrics().is_empty());
    }

    fn skill(name: &str, tokens: usize, priority: u8, essential: bool) -> SkillRecord {
        SkillRecord {
            name: name.into(),
            path: PathBuf::from(format!("{name}.md")),
            content: "x".repeat(tokens * 4),
            tokens,
            priority,
            categories: vec![],
            essential,
        }
    }

    #[test]
    fn optimizer_drops_lowest_priority_then_largest() {
        let mut bundle = ContextBundle::empty(Phase::Green, 100);
        bundle.skills = vec![
            skill("pinned", 50, 5, true),
            skill("important", 30, 1, false),
            skill("minor-small", 10, 5, false),
            skill("minor-big", 40, 5, false),
        ];
        bundle.recount();
        assert_eq!(bundle.total_tokens, 130);

        assert!(optimize_context_aggressively(&mut bundle));
        assert_eq!(bundle.skill_names(), vec!["pinned", "important", "minor-small"]);
        assert_eq!(bundle.total_tokens, 90);
    }

    #[test]
    fn optimizer_never_drops_essential_skills() {
        let mut bundle = ContextBundle::empty(Phase::Spec, 10);
        bundle.skills = vec![skill("a", 20, 5, true), skill("b", 20, 1, true)];
        bundle.recount();

        assert!(!optimize_context_aggressively(&mut bundle));
        assert_eq!(bundle.skills.len(), 2);
        assert!(bundle.over_budget);
    }
}
