// SPDX-License-Identifier: MIT OR Apache-2.0

//! docqa - Retrieval-augmented question answering over a document
//!
//! Shared modules for the docqa CLI tool.

pub mod config;
pub mod document;
pub mod embedding;
pub mod engine;
pub mod errors;
pub mod evaluation;
pub mod generation;
pub mod llm;
pub mod output;
pub mod retrieval;
pub mod telemetry;
