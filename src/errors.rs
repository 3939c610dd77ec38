// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the index and query engine

use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required input (corpus directory, index artifact, queries file) is missing
    #[error("{what} not found: {}", path.display())]
    NotFound { what: String, path: PathBuf },

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("embedding provider failed: {0:#}")]
    Provider(anyhow::Error),

    #[error("corrupt index at {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("embedding dimension mismatch: index has {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn not_found(what: impl Into<String>, path: impl AsRef<Path>) -> Self {
        Self::NotFound {
            what: what.into(),
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn corrupt(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// True for the `NotFound` variant.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_path() {
        let err = Error::not_found("index artifacts", "/tmp/missing");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "index artifacts not found: /tmp/missing");
    }

    #[test]
    fn provider_error_keeps_context_chain() {
        let inner = anyhow::anyhow!("connection refused").context("embedding command failed");
        let err = Error::Provider(inner);
        let message = err.to_string();
        assert!(message.contains("embedding command failed"));
        assert!(message.contains("connection refused"));
    }
}
