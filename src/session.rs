// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Session state shared by the CLI and the web dashboard

use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::classifier::{Classifier, UNKNOWN_CATEGORY};
use crate::config::{check_threshold, AppConfig};
use crate::extract::TextExtractor;
use crate::history::History;
use crate::organizer::{OrganizeReport, Organizer, UndoReport};
use crate::store::{DocumentRecord, ResultStore, Results};
use crate::{DocsortError, Result};

/// Counts from one analysis batch
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AnalysisReport {
    pub analyzed: usize,
    pub failed: usize,
    /// Analyzed documents that ended up `Unknown`
    pub unknown: usize,
}

/// Configuration, results and the components acting on them.
///
/// Results are saved after an analysis batch and after a correction.
pub struct Session {
    config: AppConfig,
    store: ResultStore,
    results: Results,
    extractor: TextExtractor,
    classifier: Classifier,
    organizer: Organizer,
}

impl Session {
    /// Load stored results and wire up the components
    pub fn open(config: AppConfig, classifier: Classifier) -> Result<Self> {
        let store = ResultStore::new(config.results_file());
        let results = store.load()?;
        let organizer = Organizer::new(config.dest_dir(), History::new(config.history_file()));

        Ok(Self {
            config,
            store,
            results,
            extractor: TextExtractor::new(),
            classifier,
            organizer,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn results(&self) -> &Results {
        &self.results
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn extractor(&self) -> &TextExtractor {
        &self.extractor
    }

    pub fn organizer(&self) -> &Organizer {
        &self.organizer
    }

    /// Labels a document can be corrected to
    pub fn categories(&self) -> Vec<String> {
        self.config.selectable_categories()
    }

    pub fn record(&self, filename: &str) -> Result<&DocumentRecord> {
        self.results
            .get(filename)
            .ok_or_else(|| DocsortError::UnknownDocument(filename.to_string()))
    }

    /// Classify every file in the staging directory and save once at the end
    pub async fn run_analysis(&mut self, threshold: f64) -> Result<AnalysisReport> {
        check_threshold(threshold)?;

        let files = staged_files(&self.config.source_dir())?;
        info!(
            "Analyzing {} files with {} (threshold {:.2})",
            files.len(),
            self.classifier.model_name(),
            threshold
        );

        let mut report = AnalysisReport::default();
        for path in files {
            let Some(filename) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
                continue;
            };

            let text = self.extractor.extract(&path);
            match self.classifier.classify_with_threshold(&text, threshold).await {
                Ok(categories) => {
                    if categories.contains(UNKNOWN_CATEGORY) {
                        report.unknown += 1;
                    }
                    debug!("{}: {:?}", filename, categories);
                    self.results.insert(filename, DocumentRecord::new(categories, path));
                    report.analyzed += 1;
                }
                Err(e) => {
                    error!("Failed to classify {}: {}", filename, e);
                    report.failed += 1;
                }
            }
        }

        self.store.save(&self.results)?;
        info!(
            "Analysis finished: {} analyzed, {} unknown, {} failed",
            report.analyzed, report.unknown, report.failed
        );
        Ok(report)
    }

    /// Override a document's classification and save
    pub fn correct(&mut self, filename: &str, category: &str) -> Result<()> {
        if !self.categories().iter().any(|c| c == category) {
            return Err(DocsortError::InvalidCategory(category.to_string()));
        }
        self.results.correct(filename, category)?;
        self.store.save(&self.results)?;
        info!("Corrected {} to {}", filename, category);
        Ok(())
    }

    /// Documents tagged with any of `categories`
    pub fn search<S: AsRef<str>>(&self, categories: &[S]) -> Vec<(&str, &DocumentRecord)> {
        self.results.search(categories)
    }

    pub fn organize(&self, dry_run: bool) -> Result<OrganizeReport> {
        let report = self.organizer.organize(&self.results, dry_run)?;
        info!("Organized {} documents, skipped {}", report.moved.len(), report.skipped.len());
        Ok(report)
    }

    pub fn undo(&self, count: usize, dry_run: bool) -> Result<UndoReport> {
        self.organizer.undo(count, dry_run)
    }
}

/// Regular files directly in `dir`, sorted by name
fn staged_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        warn!("Staging directory {:?} does not exist", dir);
        return Ok(Vec::new());
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && should_process(path))
        .collect();
    files.sort();
    Ok(files)
}

/// Skip hidden, partially downloaded and OS bookkeeping files
pub fn should_process(path: &Path) -> bool {
    let filename = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return false,
    };

    if filename.starts_with('.') {
        return false;
    }

    let temp_extensions = [".tmp", ".part", ".crdownload", ".partial", ".download"];
    if temp_extensions.iter().any(|ext| filename.ends_with(ext)) {
        return false;
    }

    let skip_names = ["desktop.ini", "thumbs.db"];
    !skip_names.iter().any(|n| filename.eq_ignore_ascii_case(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::tests::{physics_scores, ScriptedModel};
    use crate::classifier::{CategoryScores, ClassifierPolicy};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    const LONG_TEXT: &str = "Generalized hydrodynamics describes the large scale dynamics of integrable systems.";

    struct Fixture {
        dir: tempfile::TempDir,
        model: Arc<ScriptedModel>,
        session: Session,
    }

    fn config_in(root: &Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.source_dir = root.join("documents").to_string_lossy().to_string();
        config.dest_dir = root.join("sorted").to_string_lossy().to_string();
        config.results_file = root.join("results.json").to_string_lossy().to_string();
        config.history_file = root.join("history.jsonl").to_string_lossy().to_string();
        config.categories = physics_scores().iter().map(|(l, _)| l.to_string()).collect();
        config
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        std::fs::create_dir_all(config.source_dir()).unwrap();

        let model = Arc::new(ScriptedModel::new(&physics_scores()));
        let classifier = Classifier::new(model.clone(), config.categories.clone(), ClassifierPolicy::default());
        let session = Session::open(config, classifier).unwrap();
        Fixture { dir, model, session }
    }

    fn stage(fx: &Fixture, name: &str, body: &str) {
        std::fs::write(fx.session.config().source_dir().join(name), body).unwrap();
    }

    #[test]
    fn test_should_process() {
        assert!(should_process(Path::new("paper.pdf")));
        assert!(!should_process(Path::new(".hidden.pdf")));
        assert!(!should_process(Path::new("paper.pdf.part")));
        assert!(!should_process(Path::new("Thumbs.db")));
    }

    #[tokio::test]
    async fn test_analysis_stores_and_saves() {
        let mut fx = fixture();
        stage(&fx, "long.txt", LONG_TEXT);
        stage(&fx, "short.txt", "tiny");
        stage(&fx, "skipped.pdf.part", LONG_TEXT);

        let report = fx.session.run_analysis(0.3).await.unwrap();
        assert_eq!(report, AnalysisReport { analyzed: 2, failed: 0, unknown: 1 });
        assert_eq!(fx.model.calls.load(Ordering::SeqCst), 1);

        let long = fx.session.record("long.txt").unwrap();
        assert_eq!(long.categories, CategoryScores::single("GGE", 0.6));
        assert_eq!(long.path, fx.session.config().source_dir().join("long.txt"));
        assert_eq!(fx.session.record("short.txt").unwrap().categories, CategoryScores::unknown());
        assert!(fx.session.record("skipped.pdf.part").is_err());

        let reloaded = ResultStore::new(fx.dir.path().join("results.json")).load().unwrap();
        assert_eq!(&reloaded, fx.session.results());
    }

    #[tokio::test]
    async fn test_high_threshold_falls_back_to_top_k() {
        let mut fx = fixture();
        stage(&fx, "long.txt", LONG_TEXT);

        fx.session.run_analysis(0.7).await.unwrap();
        let labels: Vec<&str> = fx.session.record("long.txt").unwrap().categories.labels().collect();
        assert_eq!(labels, vec!["GGE", "GHD", "Lieb-Liniger", "Diffusif", "sex"]);
    }

    #[tokio::test]
    async fn test_invalid_threshold_is_rejected() {
        let mut fx = fixture();
        assert!(matches!(fx.session.run_analysis(1.5).await, Err(DocsortError::Config(_))));
    }

    #[tokio::test]
    async fn test_correct_validates_and_saves() {
        let mut fx = fixture();
        stage(&fx, "long.txt", LONG_TEXT);
        fx.session.run_analysis(0.3).await.unwrap();

        assert!(matches!(
            fx.session.correct("long.txt", "Astrology"),
            Err(DocsortError::InvalidCategory(_))
        ));
        assert!(matches!(
            fx.session.correct("missing.txt", "GHD"),
            Err(DocsortError::UnknownDocument(_))
        ));

        fx.session.correct("long.txt", "GHD").unwrap();
        let reloaded = ResultStore::new(fx.dir.path().join("results.json")).load().unwrap();
        assert_eq!(reloaded.get("long.txt").unwrap().categories, CategoryScores::single("GHD", 1.0));

        fx.session.correct("long.txt", UNKNOWN_CATEGORY).unwrap();
        assert_eq!(fx.session.search(&[UNKNOWN_CATEGORY]).len(), 1);
    }

    #[tokio::test]
    async fn test_organize_then_undo() {
        let mut fx = fixture();
        stage(&fx, "long.txt", LONG_TEXT);
        fx.session.run_analysis(0.3).await.unwrap();

        let report = fx.session.organize(false).unwrap();
        assert_eq!(report.moved.len(), 1);
        assert!(fx.dir.path().join("sorted").join("GGE").join("long.txt").exists());

        let undone = fx.session.undo(0, false).unwrap();
        assert_eq!(undone.restored.len(), 1);
        assert!(fx.session.config().source_dir().join("long.txt").exists());
    }
}
