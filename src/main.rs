// SPDX-License-Identifier: MIT OR Apache-2.0

//! docqa - Ask questions about a PDF
//!
//! Retrieval-augmented question answering over a single document: local
//! embeddings in a SQLite vector store, optional cross-encoder re-ranking and
//! an LLM that answers only from the retrieved context.

mod cli;
mod commands;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Commands};
use docqa::config::Settings;
use docqa::errors::RagError;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // Initialize tracing with DOCQA_LOG env var (e.g., DOCQA_LOG=info docqa ask "...")
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("DOCQA_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<RagError>() {
                Some(RagError::MissingInput { path }) => {
                    eprintln!("File not found: {}", path.display());
                }
                _ => eprintln!("Error: {:#}", err),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Some(Commands::Completions { shell }) = &cli.command {
        let mut cmd = Cli::command();
        generate(*shell, &mut cmd, "docqa", &mut std::io::stdout());
        return Ok(());
    }

    let settings = Settings::load()?.with_overrides(&cli.overrides());
    let format = cli.format;
    let compact = cli.compact;

    match cli.command {
        None => commands::chat::run(&settings, false)?,
        Some(Commands::Chat { rerank }) => commands::chat::run(&settings, rerank)?,
        Some(Commands::Ingest { rebuild }) => {
            commands::ingest::run(&settings, rebuild, format, compact)?;
        }
        Some(Commands::Ask { query, rerank }) => {
            commands::ask::run(&settings, &query, rerank, format, compact)?;
        }
        Some(Commands::Search { query, k, rerank }) => {
            commands::search::run(&settings, &query, k, rerank, format, compact)?;
        }
        Some(Commands::Eval {
            dataset,
            with_answer,
        }) => {
            commands::eval::run(&settings, dataset.as_deref(), with_answer, format, compact)?;
        }
        Some(Commands::Completions { .. }) => {}
    }

    Ok(())
}
