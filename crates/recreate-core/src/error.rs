//! # Error Types
//!
//! Errors raised by the pure half of the engine.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  recreate-core errors (this file)                                      │
//! │  └── CoreError        - config validation, rendering, catalog parsing  │
//! │                                                                         │
//! │  recreate-db errors (separate crate)                                   │
//! │  └── EngineError      - the full taxonomy surfaced to the CLI          │
//! │                                                                         │
//! │  Flow: CoreError → EngineError → CLI exit code 1                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Errors from config validation and script rendering.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A mandatory config key is absent or empty.
    #[error("missing mandatory configuration key '{0}'")]
    MissingKey(String),

    /// The config declares a database type the engine cannot drive.
    #[error("unsupported database type '{0}' (only 'sqlite' is supported)")]
    UnsupportedDatabase(String),

    /// The config document is not valid JSON or has the wrong shape.
    #[error("invalid configuration document: {0}")]
    InvalidDocument(#[from] serde_json::Error),

    /// A catalog row carried a kind other than table/index/view/trigger.
    #[error("unknown catalog object kind '{0}'")]
    UnknownObjectKind(String),

    /// A report or script could not be rendered.
    #[error("failed to render {artifact}: {reason}")]
    Render { artifact: String, reason: String },
}

impl CoreError {
    /// Returns true for errors caused by the configuration document.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CoreError::MissingKey(_)
                | CoreError::UnsupportedDatabase(_)
                | CoreError::InvalidDocument(_)
        )
    }
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::MissingKey("database.path".to_string());
        assert_eq!(
            err.to_string(),
            "missing mandatory configuration key 'database.path'"
        );

        let err = CoreError::UnsupportedDatabase("postgres".to_string());
        assert!(err.to_string().contains("postgres"));
        assert!(err.is_configuration());
        assert!(!CoreError::UnknownObjectKind("x".into()).is_configuration());
    }
}
