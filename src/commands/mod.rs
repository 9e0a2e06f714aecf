// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command implementations for the docqa binary

pub mod ask;
pub mod chat;
pub mod eval;
pub mod ingest;
pub mod search;

use anyhow::Result;

use docqa::config::Settings;
use docqa::embedding::SetupOutcome;
use docqa::engine::RagSystem;
use docqa::errors::RagError;

/// Builds the pipeline and brings it to the ready state.
///
/// The document is checked before any model is loaded.
pub(crate) fn prepare(settings: &Settings, rebuild: bool) -> Result<(RagSystem, SetupOutcome)> {
    if !settings.pdf_path.exists() {
        return Err(RagError::MissingInput {
            path: settings.pdf_path.clone(),
        }
        .into());
    }

    let mut rag = RagSystem::new(settings)?;
    eprintln!("Ingesting document from: {}", settings.pdf_path.display());
    rag.ingest_and_process()?;
    if rebuild {
        rag.reset_collection()?;
    }
    eprintln!("Setting up vector store...");
    let outcome = rag.setup()?;
    Ok((rag, outcome))
}
