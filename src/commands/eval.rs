// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retrieval hit-rate evaluation

use anyhow::Result;
use std::path::Path;

use crate::cli::OutputFormat;
use docqa::config::Settings;
use docqa::evaluation::{default_dataset, load_dataset, run_evaluation};
use docqa::output::{colorize_heading, colorize_status, print_json, use_colors};

/// Run the eval command
pub fn run(
    settings: &Settings,
    dataset: Option<&Path>,
    with_answer: bool,
    format: OutputFormat,
    compact: bool,
) -> Result<()> {
    let items = match dataset {
        Some(path) => load_dataset(path)?,
        None => default_dataset(),
    };
    let (mut rag, _) = super::prepare(settings, false)?;
    let report = run_evaluation(&mut rag, &items, with_answer)?;

    if format == OutputFormat::Json {
        return print_json(&report, compact);
    }

    let use_color = use_colors();
    println!(
        "\n{}",
        colorize_heading("--- Retrieval Evaluation (Hit Rate @ 3) ---", use_color)
    );
    for outcome in &report.results {
        let status = if outcome.hit { "HIT" } else { "MISS" };
        println!(
            "Question: {} -> {}",
            outcome.question,
            colorize_status(status, outcome.hit, use_color)
        );
    }
    println!("\nHit Rate @ 3: {:.1}%", report.hit_rate);

    if let Some(answer) = &report.sample_answer {
        println!(
            "\n{}",
            colorize_heading("--- Sample Answer (Faithfulness) ---", use_color)
        );
        println!("Question: {}", answer.query);
        println!("Generated Answer: {}", answer.answer);
    }
    Ok(())
}
