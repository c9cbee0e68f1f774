//! Bundle cache: a size- and memory-bounded LRU map.
//!
//! # Entry lifecycle
//!
//! ```text
//! absent ──put──▶ present ──get (hit)──▶ present, most recently used
//!    ▲                │
//!    └── evict / clear / clear_phase
//! ```
//!
//! Recency changes only on `get` and `put`; `contains` is a pure check.
//! Hit, miss and eviction counters are cumulative for the cache's lifetime
//! and survive [`ContextCache::clear`].

use chrono::{DateTime, Utc};
use jitctx_core::{ContextBundle, Phase};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

/// One cached bundle plus its bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub key: String,
    pub content: ContextBundle,
    pub token_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    /// Number of hits served; 0 right after `put`.
    pub access_count: u64,
    pub phase: Option<Phase>,
    /// Footprint counted against `max_memory`.
    pub size_bytes: usize,
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Percentage of lookups that hit (0.0–100.0).
    pub hit_rate: f64,
    pub evictions: u64,
    pub size: usize,
    pub memory_bytes: usize,
    pub max_size: usize,
    pub max_memory: usize,
}

/// LRU cache of assembled bundles.
pub struct ContextCache {
    entries: LruCache<String, ContextEntry>,
    max_size: usize,
    max_memory: usize,
    memory_bytes: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl ContextCache {
    /// Create a cache holding at most `max_size` entries and `max_memory`
    /// bytes of bundle content. Both bounds are clamped to at least 1.
    pub fn new(max_size: usize, max_memory: usize) -> Self {
        Self {
            entries: LruCache::unbounded(),
            max_size: max_size.max(1),
            max_memory: max_memory.max(1),
            memory_bytes: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Insert or overwrite `key` as the most recently used entry.
    ///
    /// Evicts least recently used entries until both bounds hold. Returns
    /// `false` when the bundle alone is larger than `max_memory`; it is then
    /// not cached and any previous entry under `key` is dropped.
    pub fn put(
        &mut self,
        key: impl Into<String>,
        content: ContextBundle,
        token_count: usize,
        phase: Option<Phase>,
    ) -> bool {
        let key = key.into();
        let size_bytes = content.size_bytes();

        if let Some(old) = self.entries.pop(&key) {
            self.memory_bytes -= old.size_bytes;
        }

        if size_bytes > self.max_memory {
            debug!(
                key = %short(&key),
                size_bytes,
                max_memory = self.max_memory,
                "Bundle too large to cache"
            );
            return false;
        }

        while self.entries.len() >= self.max_size
            || self.memory_bytes + size_bytes > self.max_memory
        {
            let Some((evicted_key, evicted)) = self.entries.pop_lru() else {
                break;
            };
            self.memory_bytes -= evicted.size_bytes;
            self.evictions += 1;
            debug!(key = %short(&evicted_key), "Evicted least recently used bundle");
        }

        let now = Utc::now();
        self.entries.push(
            key.clone(),
            ContextEntry {
                key,
                content,
                token_count,
                created_at: now,
                last_accessed: now,
                access_count: 0,
                phase,
                size_bytes,
            },
        );
        self.memory_bytes += size_bytes;
        true
    }

    /// Look up `key`, marking it most recently used on a hit.
    pub fn get(&mut self, key: &str) -> Option<&ContextEntry> {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.access_count += 1;
                entry.last_accessed = Utc::now();
                self.hits += 1;
                Some(entry)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Presence check that leaves recency and counters untouched.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains(key)
    }

    /// Count a lookup that was answered without calling [`get`](Self::get).
    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn remove(&mut self, key: &str) -> Option<ContextEntry> {
        let entry = self.entries.pop(key)?;
        self.memory_bytes -= entry.size_bytes;
        Some(entry)
    }

    /// Drop every entry tagged with `phase`. Returns how many were removed.
    pub fn clear_phase(&mut self, phase: Phase) -> usize {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| e.phase == Some(phase))
            .map(|(k, _)| k.clone())
            .collect();

        for key in &keys {
            self.remove(key);
        }
        keys.len()
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.memory_bytes = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get_stats(&self) -> CacheStats {
        let lookups = self.hits + self.misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64 * 100.0
        };

        CacheStats {
            hits: self.hits,
            misses: self.misses,
            hit_rate,
            evictions: self.evictions,
            size: self.entries.len(),
            memory_bytes: self.memory_bytes,
            max_size: self.max_size,
            max_memory: self.max_memory,
        }
    }
}

/// Deterministic key for a `(phase, input, context)` triple.
///
/// The input is normalized (trimmed, lowercased, whitespace collapsed) and
/// the context is fingerprinted with object keys sorted, so key order in
/// `context` never changes the result.
pub fn generate_cache_key(phase: Phase, input: &str, context: Option<&Value>) -> String {
    let normalized = input
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ");

    let mut fingerprint = String::new();
    if let Some(value) = context {
        write_canonical(value, &mut fingerprint);
    }

    let mut hasher = Sha256::new();
    hasher.update(phase.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(normalized.as_bytes());
    hasher.update([0u8]);
    hasher.update(fingerprint.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Serialize `value` as JSON with object keys in sorted order.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn short(key: &str) -> &str {
    key.get(..12).unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jitctx_core::SkillRecord;
    use serde_json::json;
    use std::path::PathBuf;

    fn bundle(phase: Phase, bytes: usize) -> ContextBundle {
        let mut bundle = ContextBundle::empty(phase, 10_000);
        if bytes > 0 {
            bundle.skills.push(SkillRecord {
                name: String::new(),
                path: PathBuf::new(),
                content: "x".repeat(bytes),
                tokens: bytes.div_ceil(4),
                priority: 3,
                categories: vec![],
                essential: false,
            });
            bundle.recount();
        }
        bundle
    }

    fn cache(max_size: usize) -> ContextCache {
        ContextCache::new(max_size, 1024 * 1024)
    }

    #[test]
    fn lru_evicts_oldest() {
        let mut c = cache(2);
        c.put("a", bundle(Phase::Spec, 4), 1, None);
        c.put("b", bundle(Phase::Spec, 4), 1, None);
        c.put("c", bundle(Phase::Spec, 4), 1, None);

        assert!(c.get("a").is_none());
        assert!(c.get("b").is_some());
        assert!(c.get("c").is_some());
        assert_eq!(c.get_stats().evictions, 1);
    }

    #[test]
    fn get_refreshes_recency() {
        let mut c = cache(2);
        c.put("a", bundle(Phase::Spec, 4), 1, None);
        c.put("b", bundle(Phase::Spec, 4), 1, None);
        assert!(c.get("a").is_some());
        c.put("c", bundle(Phase::Spec, 4), 1, None);

        assert!(c.contains("a"));
        assert!(!c.contains("b"));
        assert!(c.contains("c"));
    }

    #[test]
    fn contains_does_not_refresh_recency() {
        let mut c = cache(2);
        c.put("a", bundle(Phase::Spec, 4), 1, None);
        c.put("b", bundle(Phase::Spec, 4), 1, None);
        assert!(c.contains("a"));
        c.put("c", bundle(Phase::Spec, 4), 1, None);

        assert!(!c.contains("a"));
        assert_eq!(c.get_stats().hits + c.get_stats().misses, 0);
    }

    #[test]
    fn overwrite_keeps_single_entry() {
        let mut c = cache(2);
        c.put("a", bundle(Phase::Spec, 4), 1, None);
        c.put("a", bundle(Phase::Red, 8), 2, Some(Phase::Red));

        assert_eq!(c.len(), 1);
        let entry = c.get("a").unwrap();
        assert_eq!(entry.token_count, 2);
        assert_eq!(entry.phase, Some(Phase::Red));
        assert_eq!(c.get_stats().memory_bytes, 8);
        assert_eq!(c.get_stats().evictions, 0);
    }

    #[test]
    fn hits_and_misses_are_counted() {
        let mut c = cache(4);
        c.put("a", bundle(Phase::Spec, 4), 1, None);

        assert_eq!(c.get("a").unwrap().access_count, 1);
        assert_eq!(c.get("a").unwrap().access_count, 2);
        assert!(c.get("zzz").is_none());

        let stats = c.get_stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn memory_bound_triggers_eviction() {
        let mut c = ContextCache::new(100, 100);
        c.put("a", bundle(Phase::Spec, 40), 10, None);
        c.put("b", bundle(Phase::Spec, 40), 10, None);
        c.put("c", bundle(Phase::Spec, 40), 10, None);

        assert!(!c.contains("a"));
        assert_eq!(c.len(), 2);
        assert_eq!(c.get_stats().memory_bytes, 80);
    }

    #[test]
    fn oversized_bundle_is_not_cached() {
        let mut c = ContextCache::new(10, 16);
        c.put("a", bundle(Phase::Spec, 8), 2, None);
        assert!(!c.put("a", bundle(Phase::Spec, 32), 8, None));

        assert!(c.is_empty());
        assert_eq!(c.get_stats().memory_bytes, 0);
    }

    #[test]
    fn clear_phase_is_selective() {
        let mut c = cache(10);
        c.put("s1", bundle(Phase::Spec, 4), 1, Some(Phase::Spec));
        c.put("s2", bundle(Phase::Spec, 4), 1, Some(Phase::Spec));
        c.put("r1", bundle(Phase::Red, 4), 1, Some(Phase::Red));
        c.put("untagged", bundle(Phase::Red, 4), 1, None);

        assert_eq!(c.clear_phase(Phase::Spec), 2);
        assert!(c.contains("r1"));
        assert!(c.contains("untagged"));
        assert_eq!(c.len(), 2);
        assert_eq!(c.get_stats().memory_bytes, 8);
    }

    #[test]
    fn clear_keeps_counters() {
        let mut c = cache(10);
        c.put("a", bundle(Phase::Spec, 4), 1, None);
        c.get("a");
        c.get("b");
        c.clear();

        let stats = c.get_stats();
        assert_eq!(stats.size, 0);
        assert_eq!(stats.memory_bytes, 0);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn cache_key_is_deterministic() {
        let ctx = json!({"file": "src/lib.rs", "line": 10});
        let a = generate_cache_key(Phase::Green, "implement login", Some(&ctx));
        let b = generate_cache_key(Phase::Green, "implement login", Some(&ctx));
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn cache_key_normalizes_input() {
        let a = generate_cache_key(Phase::Green, "  Implement   LOGIN ", None);
        let b = generate_cache_key(Phase::Green, "implement login", None);
        assert_eq!(a, b);
    }

    #[test]
    fn cache_key_ignores_context_key_order() {
        let a: Value = serde_json::from_str(r#"{"a": 1, "b": {"x": [1, 2], "y": null}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"b": {"y": null, "x": [1, 2]}, "a": 1}"#).unwrap();
        assert_eq!(
            generate_cache_key(Phase::Spec, "q", Some(&a)),
            generate_cache_key(Phase::Spec, "q", Some(&b))
        );
    }

    #[test]
    fn cache_key_changes_with_each_argument() {
        let ctx = json!({"branch": "main"});
        let base = generate_cache_key(Phase::Spec, "create spec", Some(&ctx));

        assert_ne!(base, generate_cache_key(Phase::Red, "create spec", Some(&ctx)));
        assert_ne!(base, generate_cache_key(Phase::Spec, "create specs", Some(&ctx)));
        assert_ne!(
            base,
            generate_cache_key(Phase::Spec, "create spec", Some(&json!({"branch": "dev"})))
        );
        assert_ne!(base, generate_cache_key(Phase::Spec, "create spec", None));
        // Array order is significant.
        assert_ne!(
            generate_cache_key(Phase::Spec, "q", Some(&json!([1, 2]))),
            generate_cache_key(Phase::Spec, "q", Some(&json!([2, 1])))
        );
    }
}
