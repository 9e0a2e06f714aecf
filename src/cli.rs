// SPDX-License-Identifier: MIT OR Apache-2.0

//! CLI argument parsing using clap

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use docqa::config::CliOverrides;

/// docqa - Ask questions about a PDF
///
/// Splits the document into overlapping chunks, indexes them in a local
/// vector store and answers questions with an LLM restricted to the retrieved
/// context. Runs the interactive chat when no command is given.
#[derive(Parser, Debug)]
#[command(name = "docqa")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Compact JSON output (no pretty formatting)
    #[arg(long, global = true)]
    pub compact: bool,

    /// Document to index (overrides DOCQA_PDF_PATH)
    #[arg(long, global = true)]
    pub pdf: Option<PathBuf>,

    /// Collection name (overrides DOCQA_COLLECTION)
    #[arg(long, global = true)]
    pub collection: Option<String>,

    /// Vector store directory (overrides DOCQA_PERSIST_DIR)
    #[arg(long, global = true)]
    pub persist_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            pdf: self.pdf.clone(),
            collection: self.collection.clone(),
            persist_dir: self.persist_dir.clone(),
        }
    }
}

/// Output format for results
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive question answering (default)
    Chat {
        /// Start with re-ranking enabled
        #[arg(long)]
        rerank: bool,
    },

    /// Load, chunk and index the document
    Ingest {
        /// Drop the existing collection and index again
        #[arg(long)]
        rebuild: bool,
    },

    /// Answer a single question
    Ask {
        /// Question about the document
        query: String,

        /// Re-rank 10 candidates down to 3 before answering
        #[arg(long)]
        rerank: bool,
    },

    /// Show the chunks retrieved for a query
    Search {
        /// Search query
        query: String,

        /// Number of chunks to return
        #[arg(short = 'k', long, default_value_t = 3)]
        k: usize,

        /// Re-rank before returning
        #[arg(long)]
        rerank: bool,
    },

    /// Measure retrieval hit rate at 3
    Eval {
        /// JSON file with [{"question": ..., "expected": ...}]
        #[arg(long)]
        dataset: Option<PathBuf>,

        /// Also generate an answer for the first question
        #[arg(long)]
        with_answer: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
