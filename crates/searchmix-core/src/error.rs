//! Error types for searchmix-core operations.
//!
//! Every fallible public function returns [`Result<T>`]. Errors are grouped
//! by the subsystem they originate from; per-file failures during a batch
//! `add` are absorbed and logged by the caller rather than surfaced here.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for searchmix-core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation failed (file reads, index directory creation, ...).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The input path handed to `add` or `get` does not exist.
    #[error("Input not found: {}", .0.display())]
    InputNotFound(PathBuf),

    /// The file extension is not recognized by any registered converter.
    ///
    /// Fatal for a single-file `add`; logged and skipped during a directory
    /// `add`.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A converter rejected its input.
    #[error("Converter failed for '{path}': {reason}")]
    Converter {
        /// Path of the file that failed to convert.
        path: String,
        /// Converter-supplied reason.
        reason: String,
    },

    /// Structural parsing of a document failed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The rewritten query was rejected by the index's query parser.
    ///
    /// Carries both forms so callers can see what the rewrite produced.
    #[error("Invalid query '{original}' (rewritten as '{rewritten}'): {reason}")]
    Query {
        /// The query as the caller supplied it.
        original: String,
        /// The internal field-addressed form.
        rewritten: String,
        /// Parser message, including the offending token position.
        reason: String,
    },

    /// Search index operation failed.
    #[error("Index error: {0}")]
    Index(String),

    /// Persistence-layer failure outside plain I/O.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization or deserialization of persisted blobs failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<tantivy::TantivyError> for Error {
    fn from(err: tantivy::TantivyError) -> Self {
        Self::Index(err.to_string())
    }
}

impl Error {
    /// Stable category identifier for logging and metrics.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::InputNotFound(_) => "input_not_found",
            Self::UnsupportedFormat(_) => "unsupported_format",
            Self::Converter { .. } => "converter",
            Self::Parse(_) => "parse",
            Self::Query { .. } => "query",
            Self::Index(_) => "index",
            Self::Storage(_) => "storage",
            Self::Config(_) => "config",
            Self::Serialization(_) => "serialization",
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = Error::Query {
            original: "title:foo".into(),
            rewritten: "title_normalized:foo".into(),
            reason: "unknown field".into(),
        };
        let text = err.to_string();
        assert!(text.contains("title:foo"));
        assert!(text.contains("title_normalized:foo"));
        assert!(text.contains("unknown field"));
    }

    #[test]
    fn categories_are_stable() {
        assert_eq!(Error::Parse("x".into()).category(), "parse");
        assert_eq!(Error::Storage("x".into()).category(), "storage");
        assert_eq!(
            Error::UnsupportedFormat("xyz".into()).category(),
            "unsupported_format"
        );
        assert_eq!(
            Error::InputNotFound(PathBuf::from("/missing")).category(),
            "input_not_found"
        );
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io.into();
        assert_eq!(err.category(), "io");
        assert!(err.to_string().contains("denied"));
    }
}
