//! Just-in-time context assembly.
//!
//! Given a conversational turn, [`ContextOrchestrator`] detects the workflow
//! phase, selects the skills and project documents relevant to it within the
//! phase's token budget, and returns them as a [`ContextBundle`]. Repeated
//! turns are served from an LRU [`ContextCache`]; every assembled bundle is
//! charged to the shared token ledger.
//!
//! [`ContextBundle`]: jitctx_core::ContextBundle

pub mod cache;
pub mod compress;
pub mod orchestrator;
pub mod phase;
pub mod skills;
pub mod token;

pub use cache::{CacheStats, ContextCache, ContextEntry, generate_cache_key};
pub use compress::compress_text;
pub use orchestrator::{ContextOrchestrator, EngineStats, optimize_context_aggressively};
pub use phase::{PhaseDetector, PhaseTransition, default_patterns};
pub use skills::{SkillIndex, SkillStats};
pub use token::{estimate_tokens, estimate_tokens_from_bytes};
