// SPDX-License-Identifier: MIT OR Apache-2.0

//! The RAG pipeline: ingest, index, ask.
//!
//! [`RagSystem`] moves through three phases:
//!
//! ```text
//! Uninitialized --ingest_and_process--> Chunked --setup--> Ready --ask--> Ready
//! ```
//!
//! Similarity search and question answering need `Ready`.

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;

use crate::config::Settings;
use crate::document::load_document;
use crate::embedding::{
    create_provider, setup_collection, DocumentChunk, EmbeddingProvider, EmbeddingProviderConfig,
    RecursiveChunker, ScoredChunk, SetupOutcome, VectorStore,
};
use crate::errors::RagError;
use crate::generation::GenerationChain;
use crate::llm::{GroqProvider, LlmProvider};
use crate::retrieval::{
    create_scorer, RelevanceScorer, RerankConfig, RerankingRetriever, Retriever, ScorerKind,
    VectorRetriever, DEFAULT_TOP_K,
};
use crate::telemetry::RunTracer;

/// Characters of chunk text shown per citation.
pub const EXCERPT_CHARS: usize = 100;

/// Pipeline phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Uninitialized,
    Chunked,
    Ready,
}

/// A cited chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    pub page: u32,
    pub content: String,
}

impl Source {
    fn from_chunk(chunk: &DocumentChunk) -> Self {
        let mut content: String = chunk.text.chars().take(EXCERPT_CHARS).collect();
        content.push_str("...");
        Self {
            page: chunk.page,
            content,
        }
    }
}

/// Answer to one question, with the chunks it was generated from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub query: String,
    pub answer: String,
    pub sources: Vec<Source>,
    pub reranked: bool,
}

/// Builds a [`RagSystem`], optionally with injected components.
pub struct RagSystemBuilder<'a> {
    settings: &'a Settings,
    chunker: Option<RecursiveChunker>,
    embedder: Option<Box<dyn EmbeddingProvider>>,
    scorer: Option<Box<dyn RelevanceScorer>>,
    llm: Option<Box<dyn LlmProvider>>,
    tracer: Option<RunTracer>,
}

impl<'a> RagSystemBuilder<'a> {
    pub fn chunker(mut self, chunker: RecursiveChunker) -> Self {
        self.chunker = Some(chunker);
        self
    }

    pub fn embedder(mut self, embedder: Box<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn scorer(mut self, scorer: Box<dyn RelevanceScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn llm(mut self, llm: Box<dyn LlmProvider>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn tracer(mut self, tracer: RunTracer) -> Self {
        self.tracer = Some(tracer);
        self
    }

    /// Missing components are built from the settings. The re-ranking model
    /// is loaded on first use.
    pub fn build(self) -> Result<RagSystem> {
        let settings = self.settings;
        let embedder = match self.embedder {
            Some(embedder) => embedder,
            None => create_provider(&EmbeddingProviderConfig::from_env(settings.embeddings)?)?,
        };
        let llm: Box<dyn LlmProvider> = match self.llm {
            Some(llm) => llm,
            None => Box::new(GroqProvider::new(
                settings.groq_api_key.clone(),
                settings.llm_model.clone(),
                &settings.llm_base_url,
            )?),
        };
        let tracer = self
            .tracer
            .unwrap_or_else(|| RunTracer::from_settings(&settings.tracing));

        Ok(RagSystem {
            pdf_path: settings.pdf_path.clone(),
            persist_dir: settings.persist_dir.clone(),
            collection_name: settings.collection_name.clone(),
            chunker: self.chunker.unwrap_or_else(RecursiveChunker::with_defaults),
            chunks: Vec::new(),
            embedder: Some(embedder),
            retriever: None,
            scorer: self.scorer,
            scorer_kind: settings.reranker,
            rerank: RerankConfig::default(),
            llm,
            tracer,
            state: PipelineState::Uninitialized,
        })
    }
}

/// Orchestrates loading, chunking, indexing, retrieval and generation.
pub struct RagSystem {
    pdf_path: PathBuf,
    persist_dir: PathBuf,
    collection_name: String,
    chunker: RecursiveChunker,
    chunks: Vec<DocumentChunk>,
    /// Held here until `setup` hands it to the retriever.
    embedder: Option<Box<dyn EmbeddingProvider>>,
    retriever: Option<VectorRetriever>,
    scorer: Option<Box<dyn RelevanceScorer>>,
    scorer_kind: ScorerKind,
    rerank: RerankConfig,
    llm: Box<dyn LlmProvider>,
    tracer: RunTracer,
    state: PipelineState,
}

impl RagSystem {
    pub fn builder(settings: &Settings) -> RagSystemBuilder<'_> {
        RagSystemBuilder {
            settings,
            chunker: None,
            embedder: None,
            scorer: None,
            llm: None,
            tracer: None,
        }
    }

    /// Builds a system with every component derived from `settings`.
    pub fn new(settings: &Settings) -> Result<Self> {
        Self::builder(settings).build()
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn chunks(&self) -> &[DocumentChunk] {
        &self.chunks
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    /// Vectors stored in the bound collection.
    pub fn collection_len(&self) -> Result<u64> {
        let retriever = self.retriever.as_ref().ok_or(RagError::NotReady {
            operation: "count vectors",
            missing: "vector index",
        })?;
        retriever.store().count(retriever.collection())
    }

    /// Loads the document and splits it into chunks.
    pub fn ingest_and_process(&mut self) -> Result<usize> {
        let pages = load_document(&self.pdf_path)?;
        tracing::info!(pages = pages.len(), path = %self.pdf_path.display(), "loaded document");

        let source = self.pdf_path.display().to_string();
        self.chunks = self.chunker.chunk_pages(&pages, &source);
        tracing::info!(chunks = self.chunks.len(), "split document into chunks");

        if let Some(retriever) = self.retriever.take() {
            self.embedder = Some(retriever.into_provider());
        }
        self.state = PipelineState::Chunked;
        Ok(self.chunks.len())
    }

    /// Drops every vector in the configured collection.
    pub fn reset_collection(&mut self) -> Result<usize> {
        if let Some(retriever) = self.retriever.take() {
            self.embedder = Some(retriever.into_provider());
            if self.state == PipelineState::Ready {
                self.state = PipelineState::Chunked;
            }
        }
        let mut store = VectorStore::open_in_dir(&self.persist_dir)?;
        let deleted = store.delete_collection(&self.collection_name)?;
        tracing::info!(collection = %self.collection_name, deleted, "reset collection");
        Ok(deleted)
    }

    /// Opens or builds the vector index and binds the retriever.
    pub fn setup(&mut self) -> Result<SetupOutcome> {
        if self.state == PipelineState::Uninitialized {
            return Err(RagError::NotReady {
                operation: "set up the vector index",
                missing: "document chunks",
            }
            .into());
        }
        if let Some(retriever) = self.retriever.take() {
            self.embedder = Some(retriever.into_provider());
        }
        let mut embedder = self.embedder.take().ok_or(RagError::NotReady {
            operation: "set up the vector index",
            missing: "embedding provider",
        })?;

        let result = setup_collection(
            &self.chunks,
            embedder.as_mut(),
            &self.collection_name,
            &self.persist_dir,
        );
        let (store, outcome) = match result {
            Ok(ok) => ok,
            Err(e) => {
                self.embedder = Some(embedder);
                return Err(e);
            }
        };

        self.retriever = Some(VectorRetriever::new(
            store,
            embedder,
            self.collection_name.clone(),
        ));
        self.state = PipelineState::Ready;
        Ok(outcome)
    }

    /// Top-3 chunks by vector similarity.
    pub fn similarity_search(&mut self, query: &str) -> Result<Vec<ScoredChunk>> {
        self.search(query, DEFAULT_TOP_K, false)
    }

    /// Top-`k` chunks, optionally re-ranked.
    pub fn search(&mut self, query: &str, k: usize, use_rerank: bool) -> Result<Vec<ScoredChunk>> {
        let retriever = self.retriever.as_mut().ok_or(RagError::NotReady {
            operation: "run similarity search",
            missing: "vector index",
        })?;

        if !use_rerank {
            return retriever.search(query, k);
        }

        let scorer: &mut dyn RelevanceScorer = match &mut self.scorer {
            Some(scorer) => scorer.as_mut(),
            slot => {
                tracing::info!(scorer = ?self.scorer_kind, "loading re-ranking model");
                slot.insert(create_scorer(self.scorer_kind)?).as_mut()
            }
        };
        RerankingRetriever::new(retriever, scorer, self.rerank).search(query, k)
    }

    /// Answers `query` from the document.
    ///
    /// Retrieval runs once; the same chunks feed the prompt and the
    /// citations.
    pub fn ask(&mut self, query: &str, use_rerank: bool) -> Result<Answer> {
        if self.state != PipelineState::Ready {
            return Err(RagError::NotReady {
                operation: "answer questions",
                missing: "vector index",
            }
            .into());
        }

        let started = Utc::now();
        let k = if use_rerank {
            self.rerank.k_final
        } else {
            DEFAULT_TOP_K
        };
        let retrieved = self.search(query, k, use_rerank)?;
        let answer = GenerationChain::new(self.llm.as_ref()).generate(query, &retrieved)?;

        let result = Answer {
            query: query.to_string(),
            answer,
            sources: retrieved.iter().map(|r| Source::from_chunk(&r.chunk)).collect(),
            reranked: use_rerank,
        };

        self.tracer.record(
            "docqa.ask",
            json!({ "query": query, "use_rerank": use_rerank }),
            json!({ "answer": result.answer, "sources": result.sources.len() }),
            started,
            Utc::now(),
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileConfig;
    use crate::embedding::HashingProvider;
    use crate::llm::ProviderRequest;
    use crate::retrieval::TermOverlapScorer;
    use std::path::Path;
    use tempfile::TempDir;

    struct EchoLlm;

    impl LlmProvider for EchoLlm {
        fn model_id(&self) -> &str {
            "echo"
        }

        fn answer(&self, request: &ProviderRequest) -> Result<String> {
            let context = request
                .prompt
                .split("Context:\n")
                .nth(1)
                .and_then(|rest| rest.split("\n\nQuestion:").next())
                .unwrap_or_default();
            Ok(context.lines().next().unwrap_or_default().to_string())
        }
    }

    fn settings_for(dir: &Path) -> Settings {
        let mut settings = Settings::resolve(
            &FileConfig::default(),
            |key| (key == "GROQ_API_KEY").then(|| "test-key".to_string()),
            dir,
        )
        .unwrap();
        settings.pdf_path = dir.join("doc.txt");
        settings
    }

    fn system(dir: &TempDir) -> RagSystem {
        let settings = settings_for(dir.path());
        RagSystem::builder(&settings)
            .embedder(Box::new(HashingProvider::new(512)))
            .scorer(Box::new(TermOverlapScorer::new()))
            .llm(Box::new(EchoLlm))
            .tracer(RunTracer::disabled())
            .build()
            .unwrap()
    }

    fn write_doc(dir: &TempDir) {
        std::fs::write(
            dir.path().join("doc.txt"),
            "The capital of France is Paris.\x0cBananas are rich in potassium.\x0cRust has no garbage collector.",
        )
        .unwrap();
    }

    fn not_ready(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<RagError>(), Some(RagError::NotReady { .. }))
    }

    #[test]
    fn search_before_setup_is_rejected() {
        let dir = TempDir::new().unwrap();
        write_doc(&dir);
        let mut rag = system(&dir);

        assert_eq!(rag.state(), PipelineState::Uninitialized);
        assert!(not_ready(&rag.similarity_search("capital").unwrap_err()));
        assert!(not_ready(&rag.setup().unwrap_err()));

        rag.ingest_and_process().unwrap();
        assert_eq!(rag.state(), PipelineState::Chunked);
        let err = rag.similarity_search("capital").unwrap_err();
        assert!(not_ready(&err));
        assert!(err.to_string().contains("vector index"));
        assert!(not_ready(&rag.ask("capital?", false).unwrap_err()));
    }

    #[test]
    fn ingest_missing_document_is_input_error() {
        let dir = TempDir::new().unwrap();
        let mut rag = system(&dir);
        let err = rag.ingest_and_process().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RagError>(),
            Some(RagError::MissingInput { .. })
        ));
        assert_eq!(rag.state(), PipelineState::Uninitialized);
    }

    #[test]
    fn full_pipeline_reaches_ready() {
        let dir = TempDir::new().unwrap();
        write_doc(&dir);
        let mut rag = system(&dir);

        assert_eq!(rag.ingest_and_process().unwrap(), 3);
        assert_eq!(rag.chunks()[0].page, 1);
        assert_eq!(rag.chunks()[2].page, 3);

        let outcome = rag.setup().unwrap();
        assert_eq!(outcome, SetupOutcome::Indexed { count: 3 });
        assert_eq!(rag.state(), PipelineState::Ready);
        assert_eq!(rag.collection_len().unwrap(), 3);

        let results = rag.similarity_search("What is the capital of France?").unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].chunk.text, "The capital of France is Paris.");
    }

    #[test]
    fn ask_cites_the_chunks_it_answered_from() {
        let dir = TempDir::new().unwrap();
        write_doc(&dir);
        let mut rag = system(&dir);
        rag.ingest_and_process().unwrap();
        rag.setup().unwrap();

        let answer = rag.ask("What is the capital of France?", false).unwrap();
        assert_eq!(answer.answer, "The capital of France is Paris.");
        assert!(!answer.reranked);
        assert_eq!(answer.sources.len(), 3);
        assert_eq!(answer.sources[0].page, 1);
        assert_eq!(answer.sources[0].content, "The capital of France is Paris....");
        assert_eq!(rag.state(), PipelineState::Ready);
    }

    #[test]
    fn ask_with_rerank_marks_answer() {
        let dir = TempDir::new().unwrap();
        write_doc(&dir);
        let mut rag = system(&dir);
        rag.ingest_and_process().unwrap();
        rag.setup().unwrap();

        let answer = rag.ask("potassium bananas", true).unwrap();
        assert!(answer.reranked);
        assert_eq!(answer.sources[0].page, 2);
        assert_eq!(answer.answer, "Bananas are rich in potassium.");
    }

    #[test]
    fn setup_twice_reuses_collection() {
        let dir = TempDir::new().unwrap();
        write_doc(&dir);
        let mut rag = system(&dir);
        rag.ingest_and_process().unwrap();
        rag.setup().unwrap();
        let second = rag.setup().unwrap();

        assert_eq!(second, SetupOutcome::Reused { count: 3 });
        assert_eq!(rag.collection_len().unwrap(), 3);
    }

    #[test]
    fn reset_collection_allows_reindexing() {
        let dir = TempDir::new().unwrap();
        write_doc(&dir);
        let mut rag = system(&dir);
        rag.ingest_and_process().unwrap();
        rag.setup().unwrap();

        assert_eq!(rag.reset_collection().unwrap(), 3);
        assert_eq!(rag.state(), PipelineState::Chunked);
        assert_eq!(rag.setup().unwrap(), SetupOutcome::Indexed { count: 3 });
    }

    #[test]
    fn excerpt_is_char_bounded() {
        let chunk = DocumentChunk::new("é".repeat(150), 0, 4, "doc.pdf");
        let source = Source::from_chunk(&chunk);
        assert_eq!(source.page, 4);
        assert_eq!(source.content.chars().count(), EXCERPT_CHARS + 3);
        assert!(source.content.ends_with("..."));
    }
}
