//! Error types for the jitctx domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Only conditions that
//! indicate a broken invariant surface here; per-item I/O failures are
//! contained by the selector and orchestrator.

use crate::phase::Phase;
use thiserror::Error;

/// The top-level error type for all jitctx operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Configuration errors ---
    #[error("No configuration registered for phase '{0}'")]
    ConfigNotFound(Phase),

    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_not_found_names_phase() {
        let err = Error::ConfigNotFound(Phase::Refactor);
        assert!(err.to_string().contains("refactor"));
    }

    #[test]
    fn config_error_carries_message() {
        let err = Error::Config {
            message: "invalid pattern".into(),
        };
        assert_eq!(err.to_string(), "Configuration error: invalid pattern");
    }
}
