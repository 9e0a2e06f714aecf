// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot question answering

use anyhow::Result;

use crate::cli::OutputFormat;
use docqa::config::Settings;
use docqa::engine::Answer;
use docqa::output::{colorize_heading, format_source, print_json, use_colors};

/// Run the ask command
pub fn run(
    settings: &Settings,
    query: &str,
    rerank: bool,
    format: OutputFormat,
    compact: bool,
) -> Result<()> {
    let (mut rag, _) = super::prepare(settings, false)?;
    let answer = rag.ask(query, rerank)?;

    match format {
        OutputFormat::Json => print_json(&answer, compact)?,
        OutputFormat::Text => print_answer(&answer, use_colors()),
    }
    Ok(())
}

pub(crate) fn print_answer(answer: &Answer, use_color: bool) {
    println!("\n{} {}", colorize_heading("Answer:", use_color), answer.answer);
    println!("\n{}", colorize_heading("Sources:", use_color));
    for source in &answer.sources {
        println!("{}", format_source(source, use_color));
    }
}
