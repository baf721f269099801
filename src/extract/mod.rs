// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Text extraction
//!
//! Each supported format has a [`Partitioner`] that splits a file into
//! content elements. [`TextExtractor`] picks the partitioner by extension
//! and joins the text of the elements that carry any.

pub mod document;
pub mod pdf;

use std::path::Path;
use tracing::{debug, warn};

use crate::{DocsortError, Result};

/// Kind of a content element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Title,
    Page,
    Paragraph,
    TableRow,
    PageBreak,
}

/// One piece of a partitioned document
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub kind: ElementKind,
    text: Option<String>,
}

impl Element {
    pub fn text(kind: ElementKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: Some(text.into()),
        }
    }

    pub fn page_break() -> Self {
        Self {
            kind: ElementKind::PageBreak,
            text: None,
        }
    }

    /// Text content, if this element exposes any
    pub fn content(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

/// Splits one family of file formats into elements
pub trait Partitioner: Send + Sync {
    /// Name of this partitioner
    fn name(&self) -> &'static str;

    /// File extensions this partitioner handles
    fn supported_extensions(&self) -> &[&str];

    /// Check if this partitioner can handle a file
    fn can_handle(&self, path: &Path) -> bool {
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            self.supported_extensions().iter().any(|e| e.eq_ignore_ascii_case(ext))
        } else {
            false
        }
    }

    /// Parse a file into content elements
    fn partition(&self, path: &Path) -> Result<Vec<Element>>;

    /// Priority (higher = preferred when multiple partitioners match)
    fn priority(&self) -> u8 {
        50
    }
}

/// Registry of partitioners
pub struct TextExtractor {
    partitioners: Vec<Box<dyn Partitioner>>,
}

impl TextExtractor {
    /// Create an extractor with every built-in partitioner
    pub fn new() -> Self {
        let mut extractor = Self {
            partitioners: Vec::new(),
        };

        extractor.register(Box::new(pdf::PdfPartitioner::new()));
        extractor.register(Box::new(document::PlainTextPartitioner::new()));
        extractor.register(Box::new(document::DocxPartitioner::new()));
        extractor.register(Box::new(document::SpreadsheetPartitioner::new()));

        extractor
    }

    /// Register a new partitioner
    pub fn register(&mut self, partitioner: Box<dyn Partitioner>) {
        self.partitioners.push(partitioner);
        self.partitioners.sort_by_key(|p| std::cmp::Reverse(p.priority()));
    }

    /// Find the best partitioner for a file
    pub fn find_partitioner(&self, path: &Path) -> Option<&dyn Partitioner> {
        self.partitioners
            .iter()
            .find(|p| p.can_handle(path))
            .map(|p| p.as_ref())
    }

    /// Get partitioner names
    pub fn partitioner_names(&self) -> Vec<&'static str> {
        self.partitioners.iter().map(|p| p.name()).collect()
    }

    /// Partition a file with the matching partitioner
    pub fn partition(&self, path: &Path) -> Result<Vec<Element>> {
        let partitioner = self.find_partitioner(path).ok_or_else(|| {
            DocsortError::UnsupportedFileType(
                path.extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("<none>")
                    .to_string(),
            )
        })?;

        debug!("Partitioning {:?} with {}", path, partitioner.name());
        partitioner.partition(path)
    }

    /// Plain text of a file, or an empty string if it cannot be read
    pub fn extract(&self, path: &Path) -> String {
        match self.partition(path) {
            Ok(elements) => join_elements(&elements),
            Err(e) => {
                warn!("Failed to extract text from {:?}: {}", path, e);
                String::new()
            }
        }
    }
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Newline-joined text of the elements that expose any, trimmed
pub fn join_elements(elements: &[Element]) -> String {
    elements
        .iter()
        .filter_map(Element::content)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_skips_textless_elements() {
        let elements = vec![
            Element::text(ElementKind::Title, "  Title"),
            Element::page_break(),
            Element::text(ElementKind::Page, "Body text\n\n"),
        ];
        assert_eq!(join_elements(&elements), "Title\nBody text");
    }

    #[test]
    fn test_unsupported_extension_yields_empty_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("picture.png");
        std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();

        let extractor = TextExtractor::new();
        assert!(matches!(
            extractor.partition(&path),
            Err(DocsortError::UnsupportedFileType(ext)) if ext == "png"
        ));
        assert_eq!(extractor.extract(&path), "");
    }

    #[test]
    fn test_corrupt_pdf_yields_empty_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"this is not a pdf at all").unwrap();

        assert_eq!(TextExtractor::new().extract(&path), "");
    }

    #[test]
    fn test_missing_file_yields_empty_text() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(TextExtractor::new().extract(&dir.path().join("gone.txt")), "");
    }

    #[test]
    fn test_extension_match_is_case_insensitive() {
        let extractor = TextExtractor::new();
        assert_eq!(
            extractor.find_partitioner(Path::new("paper.PDF")).map(|p| p.name()),
            Some("pdf")
        );
        assert_eq!(
            extractor.find_partitioner(Path::new("notes.Md")).map(|p| p.name()),
            Some("text")
        );
        assert!(extractor.find_partitioner(Path::new("README")).is_none());
    }
}
