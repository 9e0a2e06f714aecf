// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed errors for docqa's own failure modes.
//!
//! Failures from external services (embedding runtime, LLM, SQLite, PDF
//! parsing) travel as `anyhow::Error`; the variants here are the ones callers
//! are expected to inspect.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    /// A required setting is absent.
    #[error("Missing required configuration: {key} is not set")]
    MissingConfig { key: &'static str },

    /// The input document does not exist.
    #[error("File not found: {}", path.display())]
    MissingInput { path: PathBuf },

    /// An operation was invoked before the phase it depends on.
    #[error("Cannot {operation}: {missing} not initialized")]
    NotReady {
        operation: &'static str,
        missing: &'static str,
    },

    /// The collection was built with a different embedding model.
    #[error(
        "Collection '{collection}' was indexed with embedding model '{stored}', \
         but '{requested}' was requested; use a new collection name or persist directory"
    )]
    EmbeddingModelMismatch {
        collection: String,
        stored: String,
        requested: String,
    },
}
