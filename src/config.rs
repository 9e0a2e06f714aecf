// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for docqa
//!
//! Settings are resolved once at startup, lowest to highest precedence:
//! built-in defaults, `.docqarc.toml` in the current directory (or
//! `~/.config/docqa/config.toml`), a `.env` file, the process environment and
//! finally command-line flags. The resolved [`Settings`] value is passed by
//! reference to every component that needs it.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::embedding::provider::parse_bool;
use crate::embedding::ProviderKind;
use crate::errors::RagError;
use crate::llm::{DEFAULT_LLM_BASE_URL, DEFAULT_LLM_MODEL};
use crate::retrieval::ScorerKind;

pub const DEFAULT_COLLECTION: &str = "rag_collection";
pub const DEFAULT_TRACING_ENDPOINT: &str = "https://eu.api.smith.langchain.com";
pub const DEFAULT_TRACING_PROJECT: &str = "rag-exercise";

const CONFIG_FILE_NAME: &str = ".docqarc.toml";

/// LLM section of the config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Chat model name
    pub model: Option<String>,
    /// OpenAI-compatible API base URL
    pub base_url: Option<String>,
}

impl LlmConfig {
    /// Get model (defaults to llama-3.3-70b-versatile)
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_LLM_MODEL)
    }

    /// Get base URL (defaults to Groq)
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_LLM_BASE_URL)
    }
}

/// Paths section of the config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub base_dir: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub persist_dir: Option<PathBuf>,
    pub pdf: Option<PathBuf>,
}

/// Run tracing section of the config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    pub enabled: Option<bool>,
    pub endpoint: Option<String>,
    pub project: Option<String>,
}

/// Retrieval section of the config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Embedding provider (fastembed, hashing, dummy)
    pub embeddings: Option<String>,
    /// Re-ranker (cross-encoder, term-overlap)
    pub reranker: Option<String>,
}

/// Configuration loaded from .docqarc.toml or ~/.config/docqa/config.toml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Collection name inside the vector store
    pub collection: Option<String>,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub tracing: TracingConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

impl FileConfig {
    /// Load configuration from files
    ///
    /// Precedence (highest to lowest):
    /// 1. .docqarc.toml in current directory
    /// 2. ~/.config/docqa/config.toml
    pub fn load() -> Self {
        if let Some(config) = Self::load_from_path(Path::new(CONFIG_FILE_NAME)) {
            return config;
        }

        if let Some(home) = dirs::home_dir() {
            let config_path = home.join(".config").join("docqa").join("config.toml");
            if let Some(config) = Self::load_from_path(&config_path) {
                return config;
            }
        }

        Self::default()
    }

    fn load_from_path(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match toml::from_str(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                eprintln!("Warning: Failed to parse {}: {}", path.display(), e);
                None
            }
        }
    }
}

/// LangSmith-compatible run tracing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingSettings {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub endpoint: String,
    pub project: String,
}

impl TracingSettings {
    /// Tracing needs both the flag and a key.
    pub fn is_active(&self) -> bool {
        self.enabled && self.api_key.is_some()
    }
}

/// Flags that override every other source.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub pdf: Option<PathBuf>,
    pub collection: Option<String>,
    pub persist_dir: Option<PathBuf>,
}

/// Fully resolved settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub groq_api_key: String,
    pub llm_model: String,
    pub llm_base_url: String,
    pub tracing: TracingSettings,
    pub base_dir: PathBuf,
    pub data_dir: PathBuf,
    pub persist_dir: PathBuf,
    pub pdf_path: PathBuf,
    pub collection_name: String,
    pub embeddings: ProviderKind,
    pub reranker: ScorerKind,
}

impl Settings {
    /// Reads `.env`, the config file and the process environment.
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        let file = FileConfig::load();
        let cwd = std::env::current_dir().context("Failed to resolve current directory")?;
        Self::resolve(&file, |key| std::env::var(key).ok(), &cwd)
    }

    /// Resolves settings from a config file and an environment lookup.
    ///
    /// Empty environment values count as unset.
    pub fn resolve<F>(file: &FileConfig, env: F, cwd: &Path) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let groq_api_key = var("GROQ_API_KEY").ok_or(RagError::MissingConfig {
            key: "GROQ_API_KEY",
        })?;

        let llm_model = var("DOCQA_LLM_MODEL").unwrap_or_else(|| file.llm.model().to_string());
        let llm_base_url =
            var("DOCQA_LLM_BASE_URL").unwrap_or_else(|| file.llm.base_url().to_string());

        let enabled = match var("LANGSMITH_TRACING") {
            Some(raw) => parse_bool("LANGSMITH_TRACING", &raw, false)?,
            None => file.tracing.enabled.unwrap_or(false),
        };
        let tracing = TracingSettings {
            enabled,
            api_key: var("LANGSMITH_API_KEY"),
            endpoint: var("LANGSMITH_ENDPOINT")
                .or_else(|| file.tracing.endpoint.clone())
                .unwrap_or_else(|| DEFAULT_TRACING_ENDPOINT.to_string()),
            project: var("LANGSMITH_PROJECT")
                .or_else(|| file.tracing.project.clone())
                .unwrap_or_else(|| DEFAULT_TRACING_PROJECT.to_string()),
        };

        let path_var = |key: &str, from_file: &Option<PathBuf>| {
            var(key).map(PathBuf::from).or_else(|| from_file.clone())
        };
        let base_dir = path_var("DOCQA_BASE_DIR", &file.paths.base_dir)
            .unwrap_or_else(|| cwd.to_path_buf());
        let data_dir =
            path_var("DOCQA_DATA_DIR", &file.paths.data_dir).unwrap_or_else(|| base_dir.join("data"));
        let persist_dir = path_var("DOCQA_PERSIST_DIR", &file.paths.persist_dir)
            .unwrap_or_else(|| data_dir.join("vector_db"));
        let pdf_path = path_var("DOCQA_PDF_PATH", &file.paths.pdf)
            .unwrap_or_else(|| data_dir.join("document.pdf"));

        let collection_name = var("DOCQA_COLLECTION")
            .or_else(|| file.collection.clone())
            .unwrap_or_else(|| DEFAULT_COLLECTION.to_string());

        let embeddings = match var("DOCQA_EMBEDDINGS").or_else(|| file.retrieval.embeddings.clone())
        {
            Some(raw) => raw.parse()?,
            None => ProviderKind::default(),
        };
        let reranker = match var("DOCQA_RERANKER").or_else(|| file.retrieval.reranker.clone()) {
            Some(raw) => raw.parse()?,
            None => ScorerKind::default(),
        };

        Ok(Self {
            groq_api_key,
            llm_model,
            llm_base_url,
            tracing,
            base_dir,
            data_dir,
            persist_dir,
            pdf_path,
            collection_name,
            embeddings,
            reranker,
        })
    }

    /// Applies command-line flags (CLI wins).
    pub fn with_overrides(mut self, overrides: &CliOverrides) -> Self {
        if let Some(pdf) = &overrides.pdf {
            self.pdf_path = pdf.clone();
        }
        if let Some(collection) = &overrides.collection {
            self.collection_name = collection.clone();
        }
        if let Some(persist_dir) = &overrides.persist_dir {
            self.persist_dir = persist_dir.clone();
        }
        self
    }
}
