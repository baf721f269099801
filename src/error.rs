// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for docsort

use thiserror::Error;

/// Result type alias for docsort operations
pub type Result<T> = std::result::Result<T, DocsortError>;

/// docsort error types
#[derive(Error, Debug)]
pub enum DocsortError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Model engine not available: {0}")]
    ModelUnavailable(String),

    #[error("Classification error: {0}")]
    Classification(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("No stored result for document: {0}")]
    UnknownDocument(String),

    #[error("Invalid category: {0}")]
    InvalidCategory(String),

    #[error("URL and directory lists differ in length ({urls} urls, {directories} directories)")]
    LengthMismatch { urls: usize, directories: usize },

    #[error("Server error: {0}")]
    Server(String),
}
