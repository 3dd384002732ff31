//! Error taxonomy for the atforge core.
//!
//! Patch-engine errors are always surfaced to callers; document validation
//! errors feed the config agent's retry loop before hardening into
//! [`AtForgeError::ConfigCompileFailed`]; transport exchange failures are
//! data (`ok: false`), never errors. Only transport *construction* errors
//! appear here.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AtForgeError>;

#[derive(Debug, Error)]
pub enum AtForgeError {
    // ── Patch engine ────────────────────────────────────────────────────
    #[error("invalid JSON pointer `{pointer}`: {reason}")]
    InvalidPointer { pointer: String, reason: String },

    #[error("path not found: {pointer}")]
    PathNotFound { pointer: String },

    #[error("list index out of range at `{pointer}`: {index}")]
    IndexOutOfRange { pointer: String, index: i64 },

    #[error("path already exists: {pointer}")]
    PathExists { pointer: String },

    #[error("test op failed at {pointer}")]
    TestFailed { pointer: String },

    #[error("invalid patch: {reason}")]
    InvalidPatch { reason: String },

    // ── Document validation ─────────────────────────────────────────────
    #[error("invalid manifest: {reason}")]
    ManifestInvalid { reason: String },

    #[error("invalid extension: {reason}")]
    ExtensionInvalid { reason: String },

    #[error("config compile failed after {attempts} attempts: {last_error}")]
    ConfigCompileFailed { attempts: u32, last_error: String },

    // ── External boundaries ─────────────────────────────────────────────
    #[error("transport unavailable: {reason}")]
    TransportUnavailable { reason: String },

    #[error("agent runner unavailable: {reason}")]
    AgentUnavailable { reason: String },

    #[error("agent response failed schema validation: {detail}")]
    SchemaValidation { detail: String },

    // ── Ambient ─────────────────────────────────────────────────────────
    #[error("settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create directory {path}: {source}")]
    DirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize {what}: {source}")]
    Serialize {
        what: String,
        #[source]
        source: serde_json::Error,
    },
}

impl AtForgeError {
    pub fn invalid_pointer(pointer: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPointer {
            pointer: pointer.into(),
            reason: reason.into(),
        }
    }

    pub fn path_not_found(pointer: impl Into<String>) -> Self {
        Self::PathNotFound {
            pointer: pointer.into(),
        }
    }

    pub fn index_out_of_range(pointer: impl Into<String>, index: i64) -> Self {
        Self::IndexOutOfRange {
            pointer: pointer.into(),
            index,
        }
    }

    pub fn path_exists(pointer: impl Into<String>) -> Self {
        Self::PathExists {
            pointer: pointer.into(),
        }
    }

    pub fn test_failed(pointer: impl Into<String>) -> Self {
        Self::TestFailed {
            pointer: pointer.into(),
        }
    }

    pub fn invalid_patch(reason: impl Into<String>) -> Self {
        Self::InvalidPatch {
            reason: reason.into(),
        }
    }

    pub fn manifest_invalid(reason: impl Into<String>) -> Self {
        Self::ManifestInvalid {
            reason: reason.into(),
        }
    }

    pub fn extension_invalid(reason: impl Into<String>) -> Self {
        Self::ExtensionInvalid {
            reason: reason.into(),
        }
    }

    pub fn transport_unavailable(reason: impl Into<String>) -> Self {
        Self::TransportUnavailable {
            reason: reason.into(),
        }
    }

    pub fn agent_unavailable(reason: impl Into<String>) -> Self {
        Self::AgentUnavailable {
            reason: reason.into(),
        }
    }

    pub fn schema_validation(detail: impl Into<String>) -> Self {
        Self::SchemaValidation {
            detail: detail.into(),
        }
    }

    /// Whether the config agent may retry with this error as a hint.
    ///
    /// Patch, validation, and schema failures describe a bad *candidate*
    /// and are worth another attempt; an unavailable runner or an I/O
    /// problem will not improve on retry.
    pub fn is_retryable_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidPointer { .. }
                | Self::PathNotFound { .. }
                | Self::IndexOutOfRange { .. }
                | Self::PathExists { .. }
                | Self::TestFailed { .. }
                | Self::InvalidPatch { .. }
                | Self::ManifestInvalid { .. }
                | Self::ExtensionInvalid { .. }
                | Self::SchemaValidation { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_pointer_context() {
        let err = AtForgeError::path_not_found("/policy/must_have_capabilities");
        assert_eq!(
            err.to_string(),
            "path not found: /policy/must_have_capabilities"
        );

        let err = AtForgeError::index_out_of_range("/commands/9", 9);
        assert_eq!(err.to_string(), "list index out of range at `/commands/9`: 9");
    }

    #[test]
    fn retry_classification_splits_boundaries_from_candidates() {
        assert!(AtForgeError::manifest_invalid("baseline missing").is_retryable_validation());
        assert!(AtForgeError::test_failed("/baseline").is_retryable_validation());
        assert!(AtForgeError::schema_validation("missing field").is_retryable_validation());
        assert!(!AtForgeError::agent_unavailable("not configured").is_retryable_validation());
        assert!(!AtForgeError::transport_unavailable("no port").is_retryable_validation());
    }

    #[test]
    fn config_compile_failed_carries_attempts() {
        let err = AtForgeError::ConfigCompileFailed {
            attempts: 3,
            last_error: "invalid manifest: baseline must be a non-empty string".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("after 3 attempts"));
        assert!(msg.contains("baseline must be a non-empty string"));
    }
}
