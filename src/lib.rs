// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! docsort: local zero-shot document classifier and organizer
//!
//! Downloads documents into a staging directory, extracts their text, scores it
//! against a closed set of categories and files each document into a folder
//! named after its dominant category.

pub mod classifier;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod history;
pub mod organizer;
pub mod report;
pub mod session;
pub mod store;
pub mod web;

pub use config::AppConfig;
pub use error::{DocsortError, Result};
