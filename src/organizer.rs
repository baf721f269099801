// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Filing documents into category folders

use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::history::{create_entry, History, MoveEntry};
use crate::store::Results;
use crate::{DocsortError, Result};

/// A document moved (or, in a dry run, about to be moved)
#[derive(Debug, Clone, PartialEq)]
pub struct MovedFile {
    pub filename: String,
    pub category: String,
    pub from: PathBuf,
    pub to: PathBuf,
}

/// Outcome of an organize run
#[derive(Debug, Default)]
pub struct OrganizeReport {
    pub moved: Vec<MovedFile>,
    /// Documents whose recorded path no longer exists
    pub skipped: Vec<String>,
}

/// Outcome of an undo run
#[derive(Debug, Default)]
pub struct UndoReport {
    pub restored: Vec<MoveEntry>,
    pub skipped: Vec<(MoveEntry, String)>,
}

/// Moves files under `dest_root/<category>/` and journals every move
pub struct Organizer {
    dest_root: PathBuf,
    history: History,
}

impl Organizer {
    pub fn new(dest_root: impl Into<PathBuf>, history: History) -> Self {
        Self {
            dest_root: dest_root.into(),
            history,
        }
    }

    pub fn dest_root(&self) -> &Path {
        &self.dest_root
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Where `path` would land in `category`, avoiding existing files
    pub fn target_path(&self, path: &Path, category: &str) -> Result<PathBuf> {
        let filename = path.file_name().ok_or_else(|| {
            DocsortError::Config(format!("Cannot determine file name of {:?}", path))
        })?;
        let folder = self.dest_root.join(category);
        let target = folder.join(filename);
        if !target.exists() {
            return Ok(target);
        }

        // Handle filename collision
        let stem = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let timestamp = Local::now().format("%H%M%S").to_string();

        let mut candidate = folder.join(format!("{}_{}{}", stem, timestamp, ext));
        let mut n = 2;
        while candidate.exists() {
            candidate = folder.join(format!("{}_{}_{}{}", stem, timestamp, n, ext));
            n += 1;
        }
        Ok(candidate)
    }

    /// Move one file into its category folder, creating the folder if needed
    pub fn move_to_category(&self, path: &Path, category: &str) -> Result<PathBuf> {
        let target = self.target_path(path, category)?;
        if let Some(folder) = target.parent() {
            fs::create_dir_all(folder)?;
        }

        let file_hash = calculate_file_hash(path)?;
        move_file(path, &target)?;

        let entry = create_entry(path.to_path_buf(), target.clone(), category.to_string(), file_hash);
        self.history.append(&entry)?;

        info!("{:?} -> {}", path.file_name().unwrap_or_default(), category);
        Ok(target)
    }

    /// File every stored document that is still at its recorded path into
    /// its dominant category.
    ///
    /// Recorded paths are left as they were; documents already moved by an
    /// earlier run are therefore skipped.
    pub fn organize(&self, results: &Results, dry_run: bool) -> Result<OrganizeReport> {
        let mut report = OrganizeReport::default();

        for (filename, record) in results.iter() {
            if !record.path.is_file() {
                debug!("Skipping {}: {:?} no longer exists", filename, record.path);
                report.skipped.push(filename.to_string());
                continue;
            }

            let Some(category) = record.dominant_category() else {
                warn!("Skipping {}: no category stored", filename);
                report.skipped.push(filename.to_string());
                continue;
            };

            let to = if dry_run {
                let target = self.target_path(&record.path, category)?;
                info!("DRY RUN: Would move {:?} to {:?}", record.path, target);
                target
            } else {
                self.move_to_category(&record.path, category)?
            };

            report.moved.push(MovedFile {
                filename: filename.to_string(),
                category: category.to_string(),
                from: record.path.clone(),
                to,
            });
        }

        Ok(report)
    }

    /// Move the `count` most recent journaled files back (0 = all)
    pub fn undo(&self, count: usize, dry_run: bool) -> Result<UndoReport> {
        let mut entries = self.history.get_undoable()?;
        entries.reverse();
        if count > 0 {
            entries.truncate(count);
        }

        let mut report = UndoReport::default();
        for entry in entries {
            if !entry.new_path.exists() {
                report.skipped.push((entry, "file not found, may have been moved/deleted".to_string()));
                continue;
            }
            if entry.original_path.exists() {
                report.skipped.push((entry, "original path already exists".to_string()));
                continue;
            }
            if calculate_file_hash(&entry.new_path)? != entry.file_hash {
                report.skipped.push((entry, "content changed since it was moved".to_string()));
                continue;
            }

            if dry_run {
                info!("DRY RUN: Would move {:?} back to {:?}", entry.new_path, entry.original_path);
            } else {
                if let Some(parent) = entry.original_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                move_file(&entry.new_path, &entry.original_path)?;
                self.history.mark_undone(&entry.id)?;
                info!("Undone: {:?} -> {:?}", entry.new_path, entry.original_path);
            }
            report.restored.push(entry);
        }

        Ok(report)
    }
}

/// Rename, falling back to copy + delete when the rename itself is refused
/// (typically across filesystems)
fn move_file(from: &Path, to: &Path) -> Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(e.into()),
        Err(e) => {
            debug!("rename {:?} -> {:?} failed ({}), copying instead", from, to, e);
            fs::copy(from, to)?;
            fs::remove_file(from)?;
            Ok(())
        }
    }
}

/// BLAKE3 hash of a file's content
pub fn calculate_file_hash(path: &Path) -> Result<String> {
    let data = fs::read(path)?;
    let hash = blake3::hash(&data);
    Ok(hash.to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::CategoryScores;
    use crate::store::DocumentRecord;

    struct Fixture {
        _dir: tempfile::TempDir,
        staging: PathBuf,
        organizer: Organizer,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("documents");
        fs::create_dir_all(&staging).unwrap();
        let organizer = Organizer::new(
            dir.path().join("sorted"),
            History::new(dir.path().join("history.jsonl")),
        );
        Fixture { _dir: dir, staging, organizer }
    }

    fn stage(fx: &Fixture, name: &str, body: &str) -> PathBuf {
        let path = fx.staging.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_move_creates_category_folder() {
        let fx = fixture();
        let path = stage(&fx, "paper.pdf", "content");

        let to = fx.organizer.move_to_category(&path, "GHD").unwrap();

        assert_eq!(to, fx.organizer.dest_root().join("GHD").join("paper.pdf"));
        assert!(!path.exists());
        assert_eq!(fs::read_to_string(&to).unwrap(), "content");
        assert_eq!(fx.organizer.history().read_all().unwrap().len(), 1);
    }

    #[test]
    fn test_collision_keeps_both_files() {
        let fx = fixture();
        let first = stage(&fx, "paper.pdf", "one");
        let first_to = fx.organizer.move_to_category(&first, "GGE").unwrap();

        let second = stage(&fx, "paper.pdf", "two");
        let second_to = fx.organizer.move_to_category(&second, "GGE").unwrap();

        assert_ne!(first_to, second_to);
        assert_eq!(fs::read_to_string(&first_to).unwrap(), "one");
        assert_eq!(fs::read_to_string(&second_to).unwrap(), "two");
        assert_eq!(second_to.extension().unwrap(), "pdf");
    }

    #[test]
    fn test_organize_uses_dominant_category_and_skips_missing() {
        let fx = fixture();
        let a = stage(&fx, "a.pdf", "a");
        let mut scores = CategoryScores::new();
        scores.insert("GHD", 0.4);
        scores.insert("GGE", 0.8);

        let mut results = Results::new();
        results.insert("a.pdf", DocumentRecord::new(scores, a.clone()));
        results.insert(
            "gone.pdf",
            DocumentRecord::new(CategoryScores::single("GGE", 1.0), fx.staging.join("gone.pdf")),
        );

        let report = fx.organizer.organize(&results, false).unwrap();
        assert_eq!(report.moved.len(), 1);
        assert_eq!(report.moved[0].category, "GGE");
        assert_eq!(report.skipped, vec!["gone.pdf"]);
        assert!(fx.organizer.dest_root().join("GGE").join("a.pdf").exists());

        // The stored path is stale now, so a second run moves nothing
        assert_eq!(results.get("a.pdf").unwrap().path, a);
        let again = fx.organizer.organize(&results, false).unwrap();
        assert!(again.moved.is_empty());
        assert_eq!(again.skipped.len(), 2);
    }

    #[test]
    fn test_dry_run_moves_nothing() {
        let fx = fixture();
        let a = stage(&fx, "a.pdf", "a");
        let mut results = Results::new();
        results.insert("a.pdf", DocumentRecord::new(CategoryScores::unknown(), a.clone()));

        let report = fx.organizer.organize(&results, true).unwrap();
        assert_eq!(report.moved[0].category, "Unknown");
        assert!(a.exists());
        assert!(!fx.organizer.dest_root().exists());
        assert!(fx.organizer.history().read_all().unwrap().is_empty());
    }

    #[test]
    fn test_undo_restores_latest_move() {
        let fx = fixture();
        let a = stage(&fx, "a.pdf", "a");
        let b = stage(&fx, "b.pdf", "b");
        fx.organizer.move_to_category(&a, "GGE").unwrap();
        fx.organizer.move_to_category(&b, "GHD").unwrap();

        let report = fx.organizer.undo(1, false).unwrap();
        assert_eq!(report.restored.len(), 1);
        assert!(b.exists());
        assert!(!a.exists());

        let report = fx.organizer.undo(0, false).unwrap();
        assert_eq!(report.restored.len(), 1);
        assert!(a.exists());
        assert!(fx.organizer.history().get_undoable().unwrap().is_empty());
    }

    #[test]
    fn test_undo_skips_modified_file() {
        let fx = fixture();
        let a = stage(&fx, "a.pdf", "a");
        let to = fx.organizer.move_to_category(&a, "GGE").unwrap();
        fs::write(&to, "edited").unwrap();

        let report = fx.organizer.undo(0, false).unwrap();
        assert!(report.restored.is_empty());
        assert_eq!(report.skipped.len(), 1);
        assert!(!a.exists());
    }
}
