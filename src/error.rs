//! Error types for apkcache
//!
//! All modules use `CacheResult<T>` as their return type. `CacheError` is
//! `Clone` so that the outcome of a single in-flight fetch can be handed to
//! every caller waiting on it.

use crate::fetch::FetchError;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Result type alias for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// All errors that can occur in apkcache
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    // Key errors
    #[error("Invalid cache key: {0}")]
    InvalidKey(String),

    // Store errors
    #[error("Cache entry not found: {0}")]
    NotFound(String),

    #[error("Cache entry {key} is corrupt: {reason}")]
    Corrupt { key: String, reason: String },

    // Fetch errors
    #[error("Offline mode: {key} is not in the cache")]
    Offline { key: String },

    #[error("Failed to fetch {key}: {source}")]
    Fetch {
        key: String,
        #[source]
        source: FetchError,
    },

    #[error("Validation failed for {key}: {reason}")]
    Validation { key: String, reason: String },

    #[error("Fetch of {key} was cancelled")]
    Cancelled { key: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("No cache directory configured and no per-user cache location is available")]
    NoCacheDir,

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: Arc<std::io::Error>,
    },

    // General errors
    #[error("{0}")]
    User(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source: Arc::new(source),
        }
    }

    /// Create a corrupt-entry error
    pub fn corrupt(key: impl ToString, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Check if error is retryable
    ///
    /// Only network-side failures qualify. Offline and validation failures
    /// will fail the same way on every attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Fetch { source, .. } => source.is_transient(),
            Self::Cancelled { .. } => true,
            _ => false,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Offline { .. } => Some("Re-run without --offline to populate the cache"),
            Self::NoCacheDir => Some("Pass --cache-dir or set [cache].dir in the config file"),
            Self::Corrupt { .. } => Some("Run: apkcache verify --remove"),
            Self::ConfigInvalid { .. } => Some("Run: apkcache config init --force"),
            Self::Validation { .. } => {
                Some("The repository served unexpected content; check the repository URL")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CacheError::Offline {
            key: "main/x86_64/APKINDEX".to_string(),
        };
        assert!(err.to_string().contains("Offline mode"));
        assert!(err.to_string().contains("main/x86_64/APKINDEX"));
    }

    #[test]
    fn error_hint() {
        let err = CacheError::Offline {
            key: "k".to_string(),
        };
        assert_eq!(
            err.hint(),
            Some("Re-run without --offline to populate the cache")
        );
        assert_eq!(CacheError::Internal("x".to_string()).hint(), None);

        let invalid = CacheError::ConfigInvalid {
            path: PathBuf::from("/etc/apkcache/config.toml"),
            reason: "expected `]`".to_string(),
        };
        assert_eq!(invalid.hint(), Some("Run: apkcache config init --force"));
    }

    #[test]
    fn error_retryable() {
        let transient = CacheError::Fetch {
            key: "k".to_string(),
            source: FetchError::Timeout,
        };
        let not_found = CacheError::Fetch {
            key: "k".to_string(),
            source: FetchError::Status {
                url: "https://example.com/x.apk".to_string(),
                code: 404,
            },
        };
        assert!(transient.is_retryable());
        assert!(!not_found.is_retryable());
        assert!(!CacheError::Offline { key: "k".to_string() }.is_retryable());
        assert!(!CacheError::Validation {
            key: "k".to_string(),
            reason: "bad".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn io_error_keeps_source() {
        use std::error::Error as _;

        let err = CacheError::io(
            "writing entry",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "IO error: writing entry");
    }
}
