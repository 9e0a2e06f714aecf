// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interactive question loop

use anyhow::Result;
use std::io::{self, BufRead, Write};

use docqa::config::Settings;
use docqa::output::use_colors;

/// What a line typed at the prompt asks for.
#[derive(Debug, PartialEq, Eq)]
pub enum ChatInput<'a> {
    Empty,
    Exit,
    ToggleRerank,
    Query(&'a str),
}

pub fn classify(line: &str) -> ChatInput<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ChatInput::Empty;
    }
    match trimmed.to_lowercase().as_str() {
        "exit" | "quit" | "salir" => ChatInput::Exit,
        "rerank" => ChatInput::ToggleRerank,
        _ => ChatInput::Query(trimmed),
    }
}

/// Run the chat loop until an exit word or end of input
pub fn run(settings: &Settings, rerank: bool) -> Result<()> {
    let (mut rag, _) = super::prepare(settings, false)?;
    let use_color = use_colors();
    let mut use_rerank = rerank;

    println!("\n--- RAG Chat Initialized ---");
    println!("Type 'exit' to quit or 'rerank' to toggle re-ranking.");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("\n> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;

        match classify(&line) {
            ChatInput::Empty => continue,
            ChatInput::Exit => break,
            ChatInput::ToggleRerank => {
                use_rerank = !use_rerank;
                println!("Re-ranking: {}", if use_rerank { "ON" } else { "OFF" });
            }
            ChatInput::Query(query) => {
                println!("Thinking...");
                match rag.ask(query, use_rerank) {
                    Ok(answer) => super::ask::print_answer(&answer, use_color),
                    Err(e) => eprintln!("Error: {:#}", e),
                }
            }
        }
    }

    println!("\nGoodbye!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_words_are_case_insensitive() {
        assert_eq!(classify("exit"), ChatInput::Exit);
        assert_eq!(classify("  QUIT "), ChatInput::Exit);
        assert_eq!(classify("Salir"), ChatInput::Exit);
        assert_eq!(classify("ReRank"), ChatInput::ToggleRerank);
    }

    #[test]
    fn blank_lines_are_ignored() {
        assert_eq!(classify(""), ChatInput::Empty);
        assert_eq!(classify("   \t"), ChatInput::Empty);
    }

    #[test]
    fn other_input_is_a_trimmed_query() {
        assert_eq!(
            classify("  what is the refund policy? "),
            ChatInput::Query("what is the refund policy?")
        );
        assert_eq!(classify("exit now"), ChatInput::Query("exit now"));
    }
}
