//! # jitctx Core
//!
//! Domain types and error definitions for the just-in-time context assembly
//! engine. This crate has **no I/O**: it defines the model that the
//! config, telemetry and context crates build on.
//!
//! ## Domain
//!
//! - [`Phase`]: the closed set of workflow stages a turn can belong to
//! - [`PhaseConfig`]: per-phase token budget and pinned material
//! - [`SkillInfo`]: one indexed skill artifact
//! - [`ContextBundle`]: the skills and documents assembled for one turn
//! - [`ContextMetrics`]: what one assembly cost and whether it was cached

pub mod bundle;
pub mod error;
pub mod phase;
pub mod skill;

// Re-export key types at crate root for ergonomics
pub use bundle::{ContextBundle, ContextMetrics, DocumentRecord, SkillRecord};
pub use error::{Error, Result};
pub use phase::{Phase, PhaseConfig};
pub use skill::{DEFAULT_PRIORITY, SkillInfo};
