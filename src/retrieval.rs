// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retrieval over the vector store, with optional re-ranking.
//!
//! [`VectorRetriever`] embeds the query and returns the nearest chunks.
//! [`RerankingRetriever`] wraps any [`Retriever`], over-fetches candidates
//! and reorders them with a [`RelevanceScorer`]: vector search is tuned for
//! recall, the scorer for precision within the larger candidate pool.

use anyhow::{bail, Context, Result};
use fastembed::{RerankInitOptions, RerankerModel, TextRerank};
use std::collections::HashSet;
use std::str::FromStr;

use crate::embedding::provider::tokenize;
use crate::embedding::{EmbeddingProvider, ScoredChunk, VectorStore};

/// Number of chunks returned by plain similarity search.
pub const DEFAULT_TOP_K: usize = 3;

/// Candidates fetched before re-ranking.
pub const DEFAULT_RERANK_CANDIDATES: usize = 10;

/// Chunks kept after re-ranking.
pub const DEFAULT_RERANK_TOP_N: usize = 3;

const RERANK_BATCH_SIZE: usize = 32;

/// Anything that returns ranked chunks for a query.
pub trait Retriever {
    /// Returns up to `k` chunks, most relevant first.
    fn search(&mut self, query: &str, k: usize) -> Result<Vec<ScoredChunk>>;
}

/// Nearest-neighbour search over one collection.
///
/// Queries are embedded with the same provider that indexed the collection.
pub struct VectorRetriever {
    store: VectorStore,
    provider: Box<dyn EmbeddingProvider>,
    collection: String,
}

impl VectorRetriever {
    pub fn new(
        store: VectorStore,
        provider: Box<dyn EmbeddingProvider>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            store,
            provider,
            collection: collection.into(),
        }
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Releases the store and returns the embedding provider.
    pub fn into_provider(self) -> Box<dyn EmbeddingProvider> {
        self.provider
    }
}

impl Retriever for VectorRetriever {
    fn search(&mut self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query_embedding = self
            .provider
            .embed_one(query)
            .context("Failed to embed query")?;
        self.store
            .search_similar(&self.collection, &query_embedding, k)
    }
}

/// Secondary relevance model used for re-ranking.
pub trait RelevanceScorer {
    fn model_id(&self) -> &str;

    /// Scores every document against the query; higher is more relevant.
    /// Returns one score per document, in input order.
    fn score(&mut self, query: &str, documents: &[&str]) -> Result<Vec<f32>>;
}

/// Which re-ranking model to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScorerKind {
    /// Cross-encoder via fastembed
    #[default]
    CrossEncoder,
    /// Query-term coverage, no model
    TermOverlap,
}

impl FromStr for ScorerKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "cross-encoder" | "crossencoder" | "fastembed" => Ok(ScorerKind::CrossEncoder),
            "term-overlap" | "lexical" => Ok(ScorerKind::TermOverlap),
            other => bail!(
                "Unsupported reranker '{}'. Supported values: cross-encoder, term-overlap",
                other
            ),
        }
    }
}

/// Builds the scorer selected by `kind`.
pub fn create_scorer(kind: ScorerKind) -> Result<Box<dyn RelevanceScorer>> {
    Ok(match kind {
        ScorerKind::CrossEncoder => Box::new(CrossEncoderScorer::new()?),
        ScorerKind::TermOverlap => Box::new(TermOverlapScorer::new()),
    })
}

/// Cross-encoder re-ranker (BAAI/bge-reranker-base) run locally.
pub struct CrossEncoderScorer {
    reranker: TextRerank,
    model_id: String,
}

impl CrossEncoderScorer {
    pub fn new() -> Result<Self> {
        let model = RerankerModel::BGERerankerBase;
        let reranker = TextRerank::try_new(RerankInitOptions::new(model))
            .context("Failed to initialize fastembed reranker")?;
        Ok(Self {
            reranker,
            model_id: "BAAI/bge-reranker-base".to_string(),
        })
    }
}

impl RelevanceScorer for CrossEncoderScorer {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn score(&mut self, query: &str, documents: &[&str]) -> Result<Vec<f32>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let ranked = self
            .reranker
            .rerank(query, documents.to_vec(), false, Some(RERANK_BATCH_SIZE))
            .context("Re-ranking failed")?;

        let mut scores = vec![f32::NEG_INFINITY; documents.len()];
        for result in ranked {
            if let Some(slot) = scores.get_mut(result.index) {
                *slot = result.score;
            }
        }
        Ok(scores)
    }
}

/// Scores a document by the fraction of distinct query terms it contains.
///
/// Terms shorter than three characters are ignored.
pub struct TermOverlapScorer {
    model_id: String,
}

impl TermOverlapScorer {
    pub fn new() -> Self {
        Self {
            model_id: "term-overlap".to_string(),
        }
    }
}

impl Default for TermOverlapScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl RelevanceScorer for TermOverlapScorer {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn score(&mut self, query: &str, documents: &[&str]) -> Result<Vec<f32>> {
        let terms: HashSet<String> = tokenize(query)
            .filter(|t| t.chars().count() >= 3)
            .collect();
        if terms.is_empty() {
            return Ok(vec![0.0; documents.len()]);
        }

        Ok(documents
            .iter()
            .map(|doc| {
                let words: HashSet<String> = tokenize(doc).collect();
                let hits = terms.iter().filter(|t| words.contains(*t)).count();
                hits as f32 / terms.len() as f32
            })
            .collect())
    }
}

/// Re-ranking settings.
#[derive(Debug, Clone, Copy)]
pub struct RerankConfig {
    /// Candidates fetched from the wrapped retriever
    pub k_initial: usize,
    /// Results kept after re-ranking
    pub k_final: usize,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            k_initial: DEFAULT_RERANK_CANDIDATES,
            k_final: DEFAULT_RERANK_TOP_N,
        }
    }
}

/// Decorator that re-orders another retriever's candidates.
pub struct RerankingRetriever<'a> {
    inner: &'a mut dyn Retriever,
    scorer: &'a mut dyn RelevanceScorer,
    config: RerankConfig,
}

impl<'a> RerankingRetriever<'a> {
    pub fn new(
        inner: &'a mut dyn Retriever,
        scorer: &'a mut dyn RelevanceScorer,
        config: RerankConfig,
    ) -> Self {
        Self {
            inner,
            scorer,
            config,
        }
    }

    /// Searches with the configured `k_final`.
    pub fn search_default(&mut self, query: &str) -> Result<Vec<ScoredChunk>> {
        let k = self.config.k_final;
        self.search(query, k)
    }
}

impl Retriever for RerankingRetriever<'_> {
    /// Fetches `max(k_initial, k)` candidates and returns the `k` best by
    /// scorer output. Returned scores are the scorer's.
    fn search(&mut self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut candidates = self.inner.search(query, self.config.k_initial.max(k))?;
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let documents: Vec<&str> = candidates.iter().map(|c| c.chunk.text.as_str()).collect();
        let scores = self.scorer.score(query, &documents)?;
        if scores.len() != candidates.len() {
            bail!(
                "Re-ranker {} returned {} scores for {} candidates",
                self.scorer.model_id(),
                scores.len(),
                candidates.len()
            );
        }

        for (candidate, score) in candidates.iter_mut().zip(scores) {
            candidate.score = score;
        }
        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(k);

        tracing::debug!(
            scorer = self.scorer.model_id(),
            kept = candidates.len(),
            "re-ranked candidates"
        );
        Ok(candidates)
    }
}
