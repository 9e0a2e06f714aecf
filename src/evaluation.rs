// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retrieval evaluation against a small golden dataset.
//!
//! A question is a hit when its expected keyword appears (case-insensitive)
//! in any of the top-3 retrieved chunks.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::embedding::ScoredChunk;
use crate::engine::{Answer, RagSystem};

/// Question paired with a keyword the retrieved context should contain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldenItem {
    pub question: String,
    #[serde(alias = "expected_contains")]
    pub expected: String,
}

impl GoldenItem {
    pub fn new(question: &str, expected: &str) -> Self {
        Self {
            question: question.to_string(),
            expected: expected.to_string(),
        }
    }
}

/// Built-in dataset for the Spanish exercise brief. Pass `--dataset` for
/// documents in other languages.
pub fn default_dataset() -> Vec<GoldenItem> {
    vec![
        GoldenItem::new("¿Cuál es el objetivo principal de la actividad?", "objetivo"),
        GoldenItem::new("¿Qué herramientas se deben utilizar?", "langchain"),
        GoldenItem::new("¿Cómo se evalúa el sistema?", "hit rate"),
        GoldenItem::new("¿Qué modelo de embeddings se utiliza?", "text-embedding-3"),
        GoldenItem::new("¿Qué base de datos vectorial se recomienda?", "Chroma"),
    ]
}

/// Reads a JSON array of `{question, expected}` objects.
pub fn load_dataset(path: &Path) -> Result<Vec<GoldenItem>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read dataset: {}", path.display()))?;
    let items: Vec<GoldenItem> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse dataset: {}", path.display()))?;
    Ok(items)
}

pub fn is_hit(expected: &str, retrieved: &[ScoredChunk]) -> bool {
    let needle = expected.to_lowercase();
    retrieved
        .iter()
        .any(|r| r.chunk.text.to_lowercase().contains(&needle))
}

/// Percentage of hits; zero for an empty run.
pub fn hit_rate(hits: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    hits as f64 / total as f64 * 100.0
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionOutcome {
    pub question: String,
    pub expected: String,
    pub hit: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub results: Vec<QuestionOutcome>,
    pub hits: usize,
    pub total: usize,
    pub hit_rate: f64,
    /// Generated answer for the first question, kept for offline
    /// faithfulness scoring.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_answer: Option<Answer>,
}

/// Runs every question through `similarity_search` and scores the hits.
pub fn run_evaluation(
    rag: &mut RagSystem,
    dataset: &[GoldenItem],
    with_answer: bool,
) -> Result<EvaluationReport> {
    if dataset.is_empty() {
        bail!("Evaluation dataset is empty");
    }

    let mut results = Vec::with_capacity(dataset.len());
    for item in dataset {
        let retrieved = rag.similarity_search(&item.question)?;
        let hit = is_hit(&item.expected, &retrieved);
        tracing::debug!(question = %item.question, hit, "evaluated question");
        results.push(QuestionOutcome {
            question: item.question.clone(),
            expected: item.expected.clone(),
            hit,
        });
    }

    let hits = results.iter().filter(|r| r.hit).count();
    let sample_answer = if with_answer {
        Some(rag.ask(&dataset[0].question, false)?)
    } else {
        None
    };

    Ok(EvaluationReport {
        hit_rate: hit_rate(hits, results.len()),
        total: results.len(),
        hits,
        results,
        sample_answer,
    })
}
