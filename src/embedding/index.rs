// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collection setup: open or create a persistent collection and index chunks
//! into it once.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

use super::chunker::DocumentChunk;
use super::provider::EmbeddingProvider;
use super::storage::VectorStore;

/// What `setup_collection` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupOutcome {
    /// The collection already held vectors; nothing was inserted.
    Reused { count: u64 },
    /// Chunks were embedded and inserted.
    Indexed { count: u64 },
}

impl SetupOutcome {
    pub fn count(&self) -> u64 {
        match self {
            SetupOutcome::Reused { count } | SetupOutcome::Indexed { count } => *count,
        }
    }
}

/// Opens `collection_name` under `persist_dir` and indexes `chunks` if the
/// collection is empty.
///
/// Re-running against a non-empty collection is a no-op, so a document is
/// indexed at most once per collection name.
pub fn setup_collection(
    chunks: &[DocumentChunk],
    provider: &mut dyn EmbeddingProvider,
    collection_name: &str,
    persist_dir: &Path,
) -> Result<(VectorStore, SetupOutcome)> {
    let mut store = VectorStore::open_in_dir(persist_dir)?;
    store.ensure_collection(collection_name, provider.model_id())?;

    let existing = store.list_ids(collection_name)?;
    if !existing.is_empty() {
        tracing::info!(
            collection = collection_name,
            vectors = existing.len(),
            path = %store.path().display(),
            "using existing collection"
        );
        let count = existing.len() as u64;
        return Ok((store, SetupOutcome::Reused { count }));
    }

    tracing::info!(
        collection = collection_name,
        chunks = chunks.len(),
        path = %store.path().display(),
        "indexing documents for the first time"
    );

    let embeddings = embed_chunks(chunks, provider)?;
    let inserted = store
        .insert_chunks(collection_name, chunks, &embeddings)
        .with_context(|| format!("Failed to index collection '{}'", collection_name))?;

    Ok((
        store,
        SetupOutcome::Indexed {
            count: inserted as u64,
        },
    ))
}

fn embed_chunks(
    chunks: &[DocumentChunk],
    provider: &mut dyn EmbeddingProvider,
) -> Result<Vec<Vec<f32>>> {
    let pb = ProgressBar::new(chunks.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40.cyan/blue}] {pos}/{len} chunks | Embedding")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##."),
    );

    let batch_size = provider.batch_size().max(1);
    let mut embeddings = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = provider
            .embed_texts(&texts)
            .context("Failed to embed document chunks")?;
        if vectors.len() != texts.len() {
            anyhow::bail!(
                "Embedding provider returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            );
        }
        embeddings.extend(vectors);
        pb.inc(batch.len() as u64);
    }
    pb.finish_and_clear();

    Ok(embeddings)
}
