// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Move journal for undo support

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::Result;

/// A single organizer move
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub filename: String,
    pub original_path: PathBuf,
    pub new_path: PathBuf,
    pub category: String,
    pub file_hash: String,
    pub undone: bool,
}

/// JSONL journal of moves
pub struct History {
    path: PathBuf,
}

impl History {
    /// Create a new history manager
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Append one entry as a JSON line, creating the journal if needed
    pub fn append(&self, entry: &MoveEntry) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(entry)?)?;
        Ok(())
    }

    /// Every journaled move, oldest first; unreadable lines are skipped
    pub fn read_all(&self) -> Result<Vec<MoveEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for (n, line) in BufReader::new(File::open(&self.path)?).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!("Skipping journal line {} in {:?}: {}", n + 1, self.path, e),
            }
        }

        Ok(entries)
    }

    /// Get the most recent N entries (newest first)
    pub fn get_recent(&self, count: usize) -> Result<Vec<MoveEntry>> {
        let mut entries = self.read_all()?;
        entries.reverse();
        entries.truncate(count);
        Ok(entries)
    }

    /// Flag entry `id` as undone. The journal is rewritten to a sibling file
    /// that then replaces it.
    pub fn mark_undone(&self, id: &str) -> Result<()> {
        let entries: Vec<MoveEntry> = self
            .read_all()?
            .into_iter()
            .map(|mut entry| {
                if entry.id == id {
                    entry.undone = true;
                }
                entry
            })
            .collect();

        let mut staged = self.path.clone().into_os_string();
        staged.push(".rewrite");
        let staged = PathBuf::from(staged);

        let mut writer = BufWriter::new(File::create(&staged)?);
        for entry in &entries {
            serde_json::to_writer(&mut writer, entry)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        drop(writer);

        fs::rename(&staged, &self.path)?;
        Ok(())
    }

    /// Entries not yet undone, oldest first
    pub fn get_undoable(&self) -> Result<Vec<MoveEntry>> {
        let entries = self.read_all()?;
        Ok(entries.into_iter().filter(|e| !e.undone).collect())
    }

    /// Clear all history
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    /// Get history file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Create a new journal entry stamped now
pub fn create_entry(
    original_path: PathBuf,
    new_path: PathBuf,
    category: String,
    file_hash: String,
) -> MoveEntry {
    let filename = original_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    MoveEntry {
        id: uuid::Uuid::new_v4().to_string(),
        timestamp: Utc::now(),
        filename,
        original_path,
        new_path,
        category,
        file_hash,
        undone: false,
    }
}
