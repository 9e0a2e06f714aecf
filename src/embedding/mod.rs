// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding module - chunking, embedding and vector persistence
//!
//! Turns page texts into overlapping chunks, embeds them, and keeps them in a
//! persistent SQLite collection that supports cosine similarity search.

pub mod chunker;
pub mod index;
pub mod provider;
pub mod storage;

pub use chunker::{ChunkConfig, DocumentChunk, RecursiveChunker, TextChunk};
pub use index::{setup_collection, SetupOutcome};
pub use provider::{
    create_provider, DummyProvider, EmbeddingProvider, EmbeddingProviderConfig, FastEmbedder,
    HashingProvider, ProviderKind,
};
pub use storage::{ScoredChunk, VectorStore, DEFAULT_EMBEDDING_DIM};
