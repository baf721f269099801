// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! PDF partitioner

use std::path::Path;
use tracing::{debug, info, warn};

use super::{Element, ElementKind, Partitioner};
use crate::{DocsortError, Result};

/// Partitioner for PDF files: document title, then one element per page
pub struct PdfPartitioner;

impl PdfPartitioner {
    pub fn new() -> Self {
        Self
    }

    /// Title from the document info dictionary, if any
    fn title(doc: &lopdf::Document) -> Option<String> {
        let info_ref = doc.trailer.get(b"Info").ok()?.as_reference().ok()?;
        let info_dict = doc.get_dictionary(info_ref).ok()?;
        let raw = info_dict.get(b"Title").ok()?.as_str().ok()?;
        let title = decode_pdf_string(raw);
        let title = title.trim();
        if title.is_empty() {
            None
        } else {
            Some(title.to_string())
        }
    }

    /// Whole-document text through pdf-extract, which copes with more font
    /// encodings than lopdf's per-page extraction. pdf-extract panics on some
    /// inputs, so a panic is reported as an extraction error.
    fn extract_whole(bytes: &[u8]) -> Result<String> {
        match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(DocsortError::Extraction(format!("PDF text extraction failed: {}", e))),
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                warn!("pdf-extract panicked: {}", reason);
                Err(DocsortError::Extraction(format!("PDF text extraction panicked: {}", reason)))
            }
        }
    }
}

impl Default for PdfPartitioner {
    fn default() -> Self {
        Self::new()
    }
}

impl Partitioner for PdfPartitioner {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn supported_extensions(&self) -> &[&str] {
        &["pdf"]
    }

    fn priority(&self) -> u8 {
        90
    }

    fn partition(&self, path: &Path) -> Result<Vec<Element>> {
        info!("Extracting PDF: {:?}", path);

        let bytes = std::fs::read(path)?;
        let doc = match lopdf::Document::load_mem(&bytes) {
            Ok(doc) => doc,
            Err(e) => {
                debug!("lopdf could not load {:?} ({}), using pdf-extract", path, e);
                let text = Self::extract_whole(&bytes)?;
                return Ok(vec![Element::text(ElementKind::Page, text)]);
            }
        };

        let mut elements = Vec::new();
        if let Some(title) = Self::title(&doc) {
            elements.push(Element::text(ElementKind::Title, title));
        }

        let mut page_text_found = false;
        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        for (i, page) in page_numbers.iter().enumerate() {
            if i > 0 {
                elements.push(Element::page_break());
            }
            match doc.extract_text(&[*page]) {
                Ok(text) => {
                    page_text_found |= !text.trim().is_empty();
                    elements.push(Element::text(ElementKind::Page, text));
                }
                Err(e) => debug!("No text on page {} of {:?}: {}", page, path, e),
            }
        }

        if !page_text_found {
            debug!("Per-page extraction empty for {:?}, retrying whole document", path);
            elements.retain(|e| e.kind == ElementKind::Title);
            elements.push(Element::text(ElementKind::Page, Self::extract_whole(&bytes)?));
        }

        Ok(elements)
    }
}

/// PDF text strings are PDFDocEncoding or UTF-16BE with a byte order mark
fn decode_pdf_string(raw: &[u8]) -> String {
    if let Some(utf16) = raw.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        String::from_utf8_lossy(raw).to_string()
    }
}
