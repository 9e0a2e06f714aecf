// SPDX-License-Identifier: MIT OR Apache-2.0

//! Document loading.
//!
//! A document is an ordered sequence of page texts. PDFs are read with
//! `lopdf`; anything else is treated as UTF-8 text where form feeds
//! (`\x0c`, as emitted by `pdftotext`) separate pages.

use anyhow::{Context, Result};
use std::path::Path;

use crate::errors::RagError;

/// Text of a single page. `page` is 1-indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub page: u32,
    pub text: String,
}

/// Source of page texts for a document path.
pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Vec<PageText>>;
}

/// Extracts text from every page of a PDF.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfLoader;

impl DocumentLoader for PdfLoader {
    fn load(&self, path: &Path) -> Result<Vec<PageText>> {
        let doc = lopdf::Document::load(path)
            .with_context(|| format!("Failed to parse PDF: {}", path.display()))?;

        let mut pages = Vec::new();
        for page_number in doc.get_pages().keys().copied() {
            let text = doc.extract_text(&[page_number]).with_context(|| {
                format!(
                    "Failed to extract text from page {} of {}",
                    page_number,
                    path.display()
                )
            })?;
            pages.push(PageText {
                page: page_number,
                text,
            });
        }

        Ok(pages)
    }
}

/// Reads a plain-text file, one page per form-feed separated section.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextLoader;

impl DocumentLoader for PlainTextLoader {
    fn load(&self, path: &Path) -> Result<Vec<PageText>> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read document: {}", path.display()))?;
        Ok(split_pages(&content))
    }
}

/// Loads a document, choosing the loader from the file extension.
pub fn load_document(path: &Path) -> Result<Vec<PageText>> {
    if !path.exists() {
        return Err(RagError::MissingInput {
            path: path.to_path_buf(),
        }
        .into());
    }

    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

    if is_pdf {
        PdfLoader.load(path)
    } else {
        PlainTextLoader.load(path)
    }
}

fn split_pages(content: &str) -> Vec<PageText> {
    if content.is_empty() {
        return Vec::new();
    }

    content
        .split('\x0c')
        .enumerate()
        .map(|(idx, text)| PageText {
            page: idx as u32 + 1,
            text: text.to_string(),
        })
        .collect()
}
