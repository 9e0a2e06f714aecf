// SPDX-License-Identifier: MIT OR Apache-2.0

//! Output and color utilities for consistent terminal formatting
//!
//! Provides shared color functions respecting NO_COLOR environment variable.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use crate::embedding::ScoredChunk;
use crate::engine::Source;

/// Check if colors should be used (respects NO_COLOR env var)
pub fn use_colors() -> bool {
    std::env::var("NO_COLOR").is_err()
}

/// Print a value as JSON, pretty unless `compact`
pub fn print_json<T: Serialize + ?Sized>(value: &T, compact: bool) -> Result<()> {
    let rendered = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{}", rendered);
    Ok(())
}

/// Colorize page label (yellow)
pub fn colorize_page(page: u32, use_color: bool) -> String {
    let label = format!("Page {}", page);
    if use_color {
        label.yellow().to_string()
    } else {
        label
    }
}

/// Colorize a heading such as "Answer:" (bold)
pub fn colorize_heading(text: &str, use_color: bool) -> String {
    if use_color {
        text.bold().to_string()
    } else {
        text.to_string()
    }
}

/// Colorize excerpt text (dimmed)
pub fn colorize_excerpt(text: &str, use_color: bool) -> String {
    if use_color {
        text.dimmed().to_string()
    } else {
        text.to_string()
    }
}

/// Colorize a status word (green for good, red otherwise)
pub fn colorize_status(text: &str, ok: bool, use_color: bool) -> String {
    match (use_color, ok) {
        (false, _) => text.to_string(),
        (true, true) => text.green().bold().to_string(),
        (true, false) => text.red().bold().to_string(),
    }
}

/// Colorize a collection name (cyan)
pub fn colorize_name(text: &str, use_color: bool) -> String {
    if use_color {
        text.cyan().to_string()
    } else {
        text.to_string()
    }
}

/// Colorize a user query (yellow)
pub fn colorize_query(text: &str, use_color: bool) -> String {
    if use_color {
        text.yellow().to_string()
    } else {
        text.to_string()
    }
}

/// `- [Page N]: excerpt`
pub fn format_source(source: &Source, use_color: bool) -> String {
    format!(
        "- [{}]: {}",
        colorize_page(source.page, use_color),
        colorize_excerpt(&source.content, use_color)
    )
}

/// `[Page N] 0.8123 text`, with newlines in the text flattened
pub fn format_scored_chunk(result: &ScoredChunk, use_color: bool) -> String {
    let text = result.chunk.text.split_whitespace().collect::<Vec<_>>().join(" ");
    let score = format!("{:.4}", result.score);
    let score = if use_color {
        score.cyan().to_string()
    } else {
        score
    };
    format!(
        "[{}] {} {}",
        colorize_page(result.chunk.page, use_color),
        score,
        text
    )
}
