// SPDX-License-Identifier: MIT OR Apache-2.0

//! Index the configured document

use anyhow::Result;
use serde::Serialize;

use crate::cli::OutputFormat;
use docqa::config::Settings;
use docqa::embedding::SetupOutcome;
use docqa::output::{colorize_name, colorize_status, print_json, use_colors};

#[derive(Debug, Serialize)]
struct IngestSummary<'a> {
    document: String,
    collection: &'a str,
    chunks: usize,
    indexed: bool,
    vectors: u64,
}

/// Run the ingest command
pub fn run(settings: &Settings, rebuild: bool, format: OutputFormat, compact: bool) -> Result<()> {
    let (rag, outcome) = super::prepare(settings, rebuild)?;
    let summary = IngestSummary {
        document: settings.pdf_path.display().to_string(),
        collection: rag.collection_name(),
        chunks: rag.chunks().len(),
        indexed: matches!(outcome, SetupOutcome::Indexed { .. }),
        vectors: rag.collection_len()?,
    };

    match format {
        OutputFormat::Json => print_json(&summary, compact)?,
        OutputFormat::Text => {
            let use_color = use_colors();
            let mark = colorize_status("✓", true, use_color);
            let collection = colorize_name(summary.collection, use_color);
            match outcome {
                SetupOutcome::Indexed { count } => {
                    println!("{} Indexed {} chunks into '{}'", mark, count, collection)
                }
                SetupOutcome::Reused { count } => println!(
                    "{} Collection '{}' already holds {} vectors; nothing to index",
                    mark, collection, count
                ),
            }
        }
    }
    Ok(())
}
