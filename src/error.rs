//! Compile errors
//!
//! Every failure aborts the whole compilation; nothing is retried and no
//! partial bundle is returned.

use std::fmt;
use std::io;
use std::path::PathBuf;

use boot_merge::MergeError;
use serde::{Deserialize, Serialize};

/// Result alias used throughout the compiler.
pub type Result<T> = std::result::Result<T, CompileError>;

/// Stable error kinds, usable for exit codes and automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    IncompatibleMergeType,
    ArrayLengthMismatch,
    UnknownPhase,
    UnknownMiddleware,
    CyclicInheritance,
    UnresolvedPath,
    InvalidConfigShape,
    UndefinedModel,
    Io,
    Parse,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IncompatibleMergeType => write!(f, "INCOMPATIBLE_MERGE_TYPE"),
            Self::ArrayLengthMismatch => write!(f, "ARRAY_LENGTH_MISMATCH"),
            Self::UnknownPhase => write!(f, "UNKNOWN_PHASE"),
            Self::UnknownMiddleware => write!(f, "UNKNOWN_MIDDLEWARE"),
            Self::CyclicInheritance => write!(f, "CYCLIC_INHERITANCE"),
            Self::UnresolvedPath => write!(f, "UNRESOLVED_PATH"),
            Self::InvalidConfigShape => write!(f, "INVALID_CONFIG_SHAPE"),
            Self::UndefinedModel => write!(f, "UNDEFINED_MODEL"),
            Self::Io => write!(f, "IO"),
            Self::Parse => write!(f, "PARSE"),
        }
    }
}

/// Compilation errors
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("Cannot apply {origin}: {source}")]
    Merge {
        origin: String,
        #[source]
        source: MergeError,
    },

    #[error("Cannot apply {origin}: the phase \"{phase}\" is not defined in the main config")]
    UnknownPhase { origin: String, phase: String },

    #[error(
        "Cannot apply {origin}: the middleware \"{middleware}\" in phase \"{phase}\" \
         is not defined in the main config"
    )]
    UnknownMiddleware {
        origin: String,
        phase: String,
        middleware: String,
    },

    #[error("Cyclic model inheritance involving \"{model}\"")]
    CyclicInheritance { model: String },

    #[error("Cannot resolve path \"{reference}\" relative to {}", root.display())]
    UnresolvedPath { reference: String, root: PathBuf },

    #[error("Invalid {domain} configuration: {reason}")]
    InvalidConfigShape { domain: String, reason: String },

    #[error("Model \"{name}\" is configured but has no definition")]
    UndefinedModel { name: String },

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Parse error in {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
}

impl CompileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Merge { source, .. } => match source {
                MergeError::IncompatibleTypes { .. } => ErrorKind::IncompatibleMergeType,
                MergeError::ArrayLengthMismatch { .. } => ErrorKind::ArrayLengthMismatch,
            },
            Self::UnknownPhase { .. } => ErrorKind::UnknownPhase,
            Self::UnknownMiddleware { .. } => ErrorKind::UnknownMiddleware,
            Self::CyclicInheritance { .. } => ErrorKind::CyclicInheritance,
            Self::UnresolvedPath { .. } => ErrorKind::UnresolvedPath,
            Self::InvalidConfigShape { .. } => ErrorKind::InvalidConfigShape,
            Self::UndefinedModel { .. } => ErrorKind::UndefinedModel,
            Self::Io { .. } => ErrorKind::Io,
            Self::Parse { .. } => ErrorKind::Parse,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid_shape(domain: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfigShape {
            domain: domain.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_error_kind_and_message() {
        let err = CompileError::Merge {
            origin: "config.local.json".to_string(),
            source: MergeError::IncompatibleTypes {
                key_path: "rest.limit".to_string(),
            },
        };

        assert_eq!(err.kind(), ErrorKind::IncompatibleMergeType);
        let msg = err.to_string();
        assert!(msg.contains("config.local.json"));
        assert!(msg.contains("rest.limit"));
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ErrorKind::UnknownPhase.to_string(), "UNKNOWN_PHASE");
        assert_eq!(
            serde_json::to_string(&ErrorKind::CyclicInheritance).unwrap(),
            "\"CYCLIC_INHERITANCE\""
        );
    }
}
