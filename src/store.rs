// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Persisted classification results

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::classifier::CategoryScores;
use crate::{DocsortError, Result};

/// Stored result for one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub categories: CategoryScores,
    /// Where the document was when it was analyzed
    pub path: PathBuf,
}

impl DocumentRecord {
    pub fn new(categories: CategoryScores, path: PathBuf) -> Self {
        Self { categories, path }
    }

    /// Highest-scoring label
    pub fn dominant_category(&self) -> Option<&str> {
        self.categories.dominant().map(|(label, _)| label)
    }
}

/// Filename -> record mapping held in memory during a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Results {
    records: BTreeMap<String, DocumentRecord>,
}

impl Results {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, filename: impl Into<String>, record: DocumentRecord) {
        self.records.insert(filename.into(), record);
    }

    pub fn get(&self, filename: &str) -> Option<&DocumentRecord> {
        self.records.get(filename)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DocumentRecord)> {
        self.records.iter().map(|(name, record)| (name.as_str(), record))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Replace a document's scores with a single label at full confidence.
    ///
    /// All other scores are discarded.
    pub fn correct(&mut self, filename: &str, category: &str) -> Result<()> {
        let record = self
            .records
            .get_mut(filename)
            .ok_or_else(|| DocsortError::UnknownDocument(filename.to_string()))?;
        record.categories = CategoryScores::single(category, 1.0);
        Ok(())
    }

    /// Documents whose scores mention any of `selected`
    pub fn search<S: AsRef<str>>(&self, selected: &[S]) -> Vec<(&str, &DocumentRecord)> {
        self.iter()
            .filter(|(_, record)| selected.iter().any(|c| record.categories.contains(c.as_ref())))
            .collect()
    }
}

/// JSON file backing [`Results`]
#[derive(Debug, Clone)]
pub struct ResultStore {
    path: PathBuf,
}

impl ResultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored results; a missing file means no results yet
    pub fn load(&self) -> Result<Results> {
        if !self.path.exists() {
            debug!("No results file at {:?}", self.path);
            return Ok(Results::new());
        }

        let content = std::fs::read_to_string(&self.path)?;
        let results: Results = serde_json::from_str(&content)?;
        info!("Loaded {} results from {:?}", results.len(), self.path);
        Ok(results)
    }

    /// Overwrite the results file with `results`
    pub fn save(&self, results: &Results) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = File::create(&self.path)?;
        let mut writer = BufWriter::new(file);
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut writer, formatter);
        results.serialize(&mut serializer)?;
        writer.flush()?;

        debug!("Saved {} results to {:?}", results.len(), self.path);
        Ok(())
    }
}
