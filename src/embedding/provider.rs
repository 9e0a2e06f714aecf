// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding provider interface and implementations.
//!
//! The default provider runs sentence-transformers/all-MiniLM-L6-v2 locally
//! through fastembed. A feature-hashing provider covers offline use and tests.

use anyhow::{bail, Context, Result};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::borrow::Cow;
use std::env;
use std::str::FromStr;

use super::storage::DEFAULT_EMBEDDING_DIM;

const DEFAULT_FASTEMBED_MODEL: &str = "minilm";
const DEFAULT_FASTEMBED_BATCH_SIZE: usize = 256;
const MAX_FASTEMBED_BATCH_SIZE: usize = 1024;
const DEFAULT_FASTEMBED_MAX_CHARS: usize = 2000;
const DEFAULT_HASHING_BATCH_SIZE: usize = 64;

/// Which embedding backend to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    /// Local ONNX model via fastembed
    #[default]
    FastEmbed,
    /// Deterministic feature hashing of word tokens
    Hashing,
    /// Zero vectors
    Dummy,
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "fastembed" | "builtin" | "minilm" => Ok(ProviderKind::FastEmbed),
            "hashing" | "hash" => Ok(ProviderKind::Hashing),
            "dummy" => Ok(ProviderKind::Dummy),
            other => bail!(
                "Unsupported embedding provider '{}'. Supported values: fastembed, hashing, dummy",
                other
            ),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::FastEmbed => write!(f, "fastembed"),
            ProviderKind::Hashing => write!(f, "hashing"),
            ProviderKind::Dummy => write!(f, "dummy"),
        }
    }
}

/// Configuration for the embedding provider.
#[derive(Debug, Clone)]
pub struct EmbeddingProviderConfig {
    pub kind: ProviderKind,
    pub model: EmbeddingModel,
    pub batch_size: usize,
    pub max_chars: usize,
    pub normalize: bool,
    /// Vector dimension for the hashing and dummy providers.
    pub dimension: usize,
}

impl EmbeddingProviderConfig {
    /// Reads the fastembed tuning knobs from the environment.
    pub fn from_env(kind: ProviderKind) -> Result<Self> {
        let model = parse_model_env()?;
        let mut batch_size = parse_usize_env("FASTEMBED_BATCH_SIZE", DEFAULT_FASTEMBED_BATCH_SIZE)?;
        if batch_size == 0 {
            batch_size = DEFAULT_FASTEMBED_BATCH_SIZE;
        }
        if batch_size > MAX_FASTEMBED_BATCH_SIZE {
            eprintln!(
                "Warning: FASTEMBED_BATCH_SIZE={} exceeds max {}; clamping.",
                batch_size, MAX_FASTEMBED_BATCH_SIZE
            );
            batch_size = MAX_FASTEMBED_BATCH_SIZE;
        }

        let mut max_chars = parse_usize_env("FASTEMBED_MAX_CHARS", DEFAULT_FASTEMBED_MAX_CHARS)?;
        if max_chars == 0 {
            max_chars = DEFAULT_FASTEMBED_MAX_CHARS;
        }

        let normalize = parse_bool_env("FASTEMBED_NORMALIZE", true)?;

        Ok(Self {
            kind,
            model,
            batch_size,
            max_chars,
            normalize,
            dimension: DEFAULT_EMBEDDING_DIM,
        })
    }

    pub fn with_kind(mut self, kind: ProviderKind) -> Self {
        self.kind = kind;
        self
    }
}

impl Default for EmbeddingProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::FastEmbed,
            model: EmbeddingModel::AllMiniLML6V2,
            batch_size: DEFAULT_FASTEMBED_BATCH_SIZE,
            max_chars: DEFAULT_FASTEMBED_MAX_CHARS,
            normalize: true,
            dimension: DEFAULT_EMBEDDING_DIM,
        }
    }
}

/// Trait for embedding providers.
///
/// Documents and queries must be embedded by the same provider; the model id
/// is recorded with each collection so a mismatch can be detected.
pub trait EmbeddingProvider: Send {
    /// Returns the model identifier.
    fn model_id(&self) -> &str;

    /// Returns the batch size used by the provider.
    fn batch_size(&self) -> usize;

    /// Generates embeddings for the given texts.
    fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Generates an embedding for a single text.
    fn embed_one(&mut self, text: &str) -> Result<Vec<f32>> {
        let mut result = self.embed_texts(&[text.to_string()])?;
        result
            .pop()
            .ok_or_else(|| anyhow::anyhow!("No embedding returned"))
    }
}

/// Builds the provider selected by `config.kind`.
pub fn create_provider(config: &EmbeddingProviderConfig) -> Result<Box<dyn EmbeddingProvider>> {
    let provider: Box<dyn EmbeddingProvider> = match config.kind {
        ProviderKind::FastEmbed => Box::new(FastEmbedder::new(config.clone())?),
        ProviderKind::Hashing => Box::new(HashingProvider::new(config.dimension)),
        ProviderKind::Dummy => Box::new(DummyProvider::new(config.dimension)),
    };
    tracing::debug!(model = provider.model_id(), "embedding provider ready");
    Ok(provider)
}

/// FastEmbed provider using sentence-transformers/all-MiniLM-L6-v2.
pub struct FastEmbedder {
    embedder: TextEmbedding,
    config: EmbeddingProviderConfig,
    model_id: String,
}

impl FastEmbedder {
    pub fn new(config: EmbeddingProviderConfig) -> Result<Self> {
        let model = config.model.clone();
        let model_id = model.to_string();
        let init = InitOptions::new(model);
        let embedder =
            TextEmbedding::try_new(init).context("Failed to initialize fastembed model")?;

        Ok(Self {
            embedder,
            config,
            model_id,
        })
    }
}

impl EmbeddingProvider for FastEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let prepared = truncate_texts(texts, self.config.max_chars);
        let mut embeddings = self
            .embedder
            .embed(&prepared, Some(self.config.batch_size))?;

        if self.config.normalize {
            for embedding in embeddings.iter_mut() {
                l2_normalize(embedding);
            }
        }

        Ok(embeddings)
    }
}

/// Feature-hashing provider.
///
/// Each lowercase alphanumeric token is hashed into one of `dimension`
/// buckets with a hash-derived sign; the result is L2-normalised. Texts that
/// share words land close together, which is enough for offline retrieval
/// and fully deterministic.
pub struct HashingProvider {
    model: String,
    dimension: usize,
    batch_size: usize,
}

impl HashingProvider {
    pub fn new(dimension: usize) -> Self {
        let dimension = dimension.max(1);
        Self {
            model: format!("hashing-{}", dimension),
            dimension,
            batch_size: DEFAULT_HASHING_BATCH_SIZE,
        }
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in tokenize(text) {
            let hash = blake3::hash(token.as_bytes());
            let bytes = hash.as_bytes();
            let bucket = u64::from_le_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            ]) as usize
                % self.dimension;
            let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        l2_normalize(&mut vector);
        vector
    }
}

impl EmbeddingProvider for HashingProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }
}

/// Dummy provider that returns zero vectors (for testing/fallback).
pub struct DummyProvider {
    model: String,
    dimension: usize,
    batch_size: usize,
}

impl DummyProvider {
    /// Creates a new dummy provider with specified dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            model: "dummy".to_string(),
            dimension,
            batch_size: DEFAULT_FASTEMBED_BATCH_SIZE,
        }
    }
}

impl EmbeddingProvider for DummyProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let vectors: Vec<Vec<f32>> = texts.iter().map(|_| vec![0.0; self.dimension]).collect();

        Ok(vectors)
    }
}

/// Lowercase alphanumeric tokens.
pub(crate) fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_lowercase())
}

fn truncate_texts<'a>(texts: &'a [String], max_chars: usize) -> Vec<Cow<'a, str>> {
    texts
        .iter()
        .map(|text| truncate_to_chars(text.as_str(), max_chars))
        .collect()
}

fn truncate_to_chars<'a>(input: &'a str, max_chars: usize) -> Cow<'a, str> {
    if max_chars == 0 {
        return Cow::Borrowed("");
    }

    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => Cow::Owned(input[..idx].to_string()),
        None => Cow::Borrowed(input),
    }
}

fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vector.iter_mut() {
        *value /= norm;
    }
}

fn parse_model_env() -> Result<EmbeddingModel> {
    let raw = env::var("FASTEMBED_MODEL").unwrap_or_else(|_| DEFAULT_FASTEMBED_MODEL.to_string());
    let value = raw.trim();
    if value.is_empty() {
        return Ok(EmbeddingModel::AllMiniLML6V2);
    }

    match value.to_lowercase().as_str() {
        "minilm"
        | "all-minilm-l6-v2"
        | "allminilm-l6-v2"
        | "sentence-transformers/all-minilm-l6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        other => bail!(
            "Unsupported FASTEMBED_MODEL '{}'. Supported value: {}",
            other,
            DEFAULT_FASTEMBED_MODEL
        ),
    }
}

fn parse_usize_env(name: &str, default: usize) -> Result<usize> {
    match env::var(name) {
        Ok(raw) => {
            let value = raw.trim();
            if value.is_empty() {
                Ok(default)
            } else {
                value
                    .parse::<usize>()
                    .with_context(|| format!("Invalid {} value: {}", name, value))
            }
        }
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("Failed to read {}", name)),
    }
}

pub(crate) fn parse_bool_env(name: &str, default: bool) -> Result<bool> {
    match env::var(name) {
        Ok(raw) => parse_bool(name, &raw, default),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("Failed to read {}", name)),
    }
}

pub(crate) fn parse_bool(name: &str, raw: &str, default: bool) -> Result<bool> {
    let value = raw.trim().to_lowercase();
    if value.is_empty() {
        return Ok(default);
    }
    match value.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("Invalid {} value: {}", name, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_dummy_provider() {
        let mut provider = DummyProvider::new(384);
        assert_eq!(provider.model_id(), "dummy");

        let result = provider
            .embed_texts(&["hello".to_string(), "world".to_string()])
            .unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].len(), 384);
        assert!(result[0].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_empty_embed() {
        let mut provider = HashingProvider::new(384);
        let result = provider.embed_texts(&[]).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_hashing_is_deterministic() {
        let mut first = HashingProvider::new(128);
        let mut second = HashingProvider::new(128);
        let a = first.embed_one("The capital of France is Paris.").unwrap();
        let b = second.embed_one("The capital of France is Paris.").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 128);
        assert_eq!(first.model_id(), "hashing-128");
    }

    #[test]
    fn test_hashing_is_normalized() {
        let mut provider = HashingProvider::new(64);
        let v = provider.embed_one("some words here").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hashing_similar_texts_are_closer() {
        let mut provider = HashingProvider::new(384);
        let query = provider.embed_one("capital of France").unwrap();
        let close = provider
            .embed_one("The capital of France is Paris.")
            .unwrap();
        let far = provider
            .embed_one("Rust ownership rules prevent data races.")
            .unwrap();
        assert!(cosine(&query, &close) > cosine(&query, &far));
    }

    #[test]
    fn test_tokenize_lowercases_and_splits() {
        let tokens: Vec<String> = tokenize("Hello, World! x2").collect();
        assert_eq!(tokens, vec!["hello", "world", "x2"]);
    }

    #[test]
    fn test_provider_kind_parsing() {
        assert_eq!("fastembed".parse::<ProviderKind>().unwrap(), ProviderKind::FastEmbed);
        assert_eq!("Hashing".parse::<ProviderKind>().unwrap(), ProviderKind::Hashing);
        assert_eq!("dummy".parse::<ProviderKind>().unwrap(), ProviderKind::Dummy);
        assert!("openai".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_create_offline_providers() {
        let config = EmbeddingProviderConfig::default().with_kind(ProviderKind::Hashing);
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_id(), "hashing-384");

        let config = EmbeddingProviderConfig::default().with_kind(ProviderKind::Dummy);
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_id(), "dummy");
    }

    #[test]
    fn test_truncate_to_chars() {
        let input = "hello";
        assert_eq!(
            truncate_to_chars(input, 2),
            Cow::<str>::Owned("he".to_string())
        );
        assert_eq!(truncate_to_chars(input, 5), Cow::Borrowed(input));
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("X", "yes", false).unwrap());
        assert!(!parse_bool("X", "off", true).unwrap());
        assert!(parse_bool("X", "", true).unwrap());
        assert!(parse_bool("X", "maybe", true).is_err());
    }
}
