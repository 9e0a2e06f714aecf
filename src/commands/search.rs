// SPDX-License-Identifier: MIT OR Apache-2.0

//! Show retrieved chunks for a query

use anyhow::Result;

use crate::cli::OutputFormat;
use docqa::config::Settings;
use docqa::output::{
    colorize_query, colorize_status, format_scored_chunk, print_json, use_colors,
};

/// Run the search command
pub fn run(
    settings: &Settings,
    query: &str,
    k: usize,
    rerank: bool,
    format: OutputFormat,
    compact: bool,
) -> Result<()> {
    let (mut rag, _) = super::prepare(settings, false)?;
    let results = rag.search(query, k, rerank)?;

    match format {
        OutputFormat::Json => print_json(&results, compact)?,
        OutputFormat::Text => {
            let use_color = use_colors();
            if results.is_empty() {
                println!(
                    "{} No chunks found for: {}",
                    colorize_status("✗", false, use_color),
                    colorize_query(query, use_color)
                );
                return Ok(());
            }
            for result in &results {
                println!("{}", format_scored_chunk(result, use_color));
            }
        }
    }
    Ok(())
}
