//! Merge error types.

/// Errors produced while merging two configuration trees.
///
/// Both variants carry the full key path of the offending value, using
/// dots for object keys and brackets for array indices (`a.b[2].c`).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    #[error("Cannot merge values of incompatible types for the option `{key_path}`")]
    IncompatibleTypes { key_path: String },

    #[error(
        "Cannot merge array values of different length for the option `{key_path}` \
         ({target_len} vs {incoming_len})"
    )]
    ArrayLengthMismatch {
        key_path: String,
        target_len: usize,
        incoming_len: usize,
    },
}

impl MergeError {
    /// Key path of the value that could not be merged.
    pub fn key_path(&self) -> &str {
        match self {
            Self::IncompatibleTypes { key_path } => key_path,
            Self::ArrayLengthMismatch { key_path, .. } => key_path,
        }
    }

    /// Re-root the key path under `prefix`.
    pub fn with_prefix(self, prefix: &str) -> Self {
        let join = |key_path: String| {
            if key_path.is_empty() {
                prefix.to_string()
            } else if prefix.is_empty() || key_path.starts_with('[') {
                format!("{}{}", prefix, key_path)
            } else {
                format!("{}.{}", prefix, key_path)
            }
        };
        match self {
            Self::IncompatibleTypes { key_path } => Self::IncompatibleTypes {
                key_path: join(key_path),
            },
            Self::ArrayLengthMismatch {
                key_path,
                target_len,
                incoming_len,
            } => Self::ArrayLengthMismatch {
                key_path: join(key_path),
                target_len,
                incoming_len,
            },
        }
    }
}
