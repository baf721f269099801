// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Zero-shot multi-label classification
//!
//! A [`ZeroShotModel`] produces an independent score per candidate label.
//! [`Classifier`] wraps one model instance together with the category
//! vocabulary and the thresholding policy; it is built once at startup and
//! handed to whoever needs it.

pub mod keyword;
pub mod ollama;
mod scores;

pub use keyword::KeywordModel;
pub use ollama::{OllamaClient, OllamaZeroShot};
pub use scores::CategoryScores;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::config::{ClassifierConfig, ModelBackend};
use crate::Result;

/// Label recorded when a document has too little text to classify
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// A pretrained zero-shot scorer
#[async_trait]
pub trait ZeroShotModel: Send + Sync {
    /// Name of this model, for logs and status output
    fn name(&self) -> &str;

    /// Score `text` against every label. Scores are independent (multi-label)
    /// and lie in `[0, 1]`; order of the returned pairs is not significant.
    async fn score(&self, text: &str, labels: &[String]) -> Result<Vec<(String, f64)>>;
}

/// Thresholding policy applied to raw model scores
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierPolicy {
    /// Minimum score for a label to be kept
    pub threshold: f64,
    /// Labels kept when nothing clears the threshold
    pub top_k: usize,
    /// Shorter texts are not sent to the model
    pub min_chars: usize,
    /// Only this many leading characters are sent to the model
    pub max_chars: usize,
}

impl Default for ClassifierPolicy {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            top_k: 5,
            min_chars: 50,
            max_chars: 1000,
        }
    }
}

/// Category classifier bound to one model instance
pub struct Classifier {
    model: Arc<dyn ZeroShotModel>,
    labels: Vec<String>,
    policy: ClassifierPolicy,
}

impl Classifier {
    pub fn new(model: Arc<dyn ZeroShotModel>, labels: Vec<String>, policy: ClassifierPolicy) -> Self {
        Self { model, labels, policy }
    }

    /// Build the configured backend
    pub fn from_config(config: &ClassifierConfig, labels: Vec<String>) -> Result<Self> {
        let model: Arc<dyn ZeroShotModel> = match config.backend {
            ModelBackend::Ollama => Arc::new(OllamaZeroShot::new(config)?),
            ModelBackend::Keyword => Arc::new(KeywordModel::new()),
        };
        Ok(Self::new(model, labels, config.policy()))
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn policy(&self) -> &ClassifierPolicy {
        &self.policy
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Classify with the configured threshold
    pub async fn classify(&self, text: &str) -> Result<CategoryScores> {
        self.classify_with_threshold(text, self.policy.threshold).await
    }

    /// Classify with a per-run threshold
    pub async fn classify_with_threshold(&self, text: &str, threshold: f64) -> Result<CategoryScores> {
        if text.chars().count() < self.policy.min_chars {
            debug!("Text too short for classification ({} chars)", text.chars().count());
            return Ok(CategoryScores::unknown());
        }

        let prefix = truncate_chars(text, self.policy.max_chars);
        let raw = self.model.score(prefix, &self.labels).await?;
        debug!("Raw scores from {}: {:?}", self.model.name(), raw);

        Ok(select_categories(&raw, threshold, self.policy.top_k))
    }
}

/// Apply threshold selection with top-K fallback.
///
/// The result is ordered by descending score and is never empty.
pub fn select_categories(raw: &[(String, f64)], threshold: f64, top_k: usize) -> CategoryScores {
    let mut ranked: Vec<&(String, f64)> = raw.iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    let above: CategoryScores = ranked
        .iter()
        .filter(|(_, score)| *score >= threshold)
        .map(|(label, score)| (label.clone(), *score))
        .collect();

    if !above.is_empty() {
        return above;
    }

    let fallback: CategoryScores = ranked
        .iter()
        .take(top_k.max(1))
        .map(|(label, score)| (label.clone(), *score))
        .collect();

    if fallback.is_empty() {
        CategoryScores::unknown()
    } else {
        fallback
    }
}

/// Leading `max` characters of `text`, cut on a char boundary
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Model returning fixed scores and recording what it was asked
    pub(crate) struct ScriptedModel {
        scores: Vec<(String, f64)>,
        pub calls: AtomicUsize,
        pub last_text: Mutex<Option<String>>,
    }

    impl ScriptedModel {
        pub(crate) fn new(scores: &[(&str, f64)]) -> Self {
            Self {
                scores: scores.iter().map(|(l, s)| (l.to_string(), *s)).collect(),
                calls: AtomicUsize::new(0),
                last_text: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl ZeroShotModel for ScriptedModel {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn score(&self, text: &str, _labels: &[String]) -> Result<Vec<(String, f64)>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_text.lock().unwrap() = Some(text.to_string());
            Ok(self.scores.clone())
        }
    }

    pub(crate) fn physics_scores() -> Vec<(&'static str, f64)> {
        vec![
            ("GGE", 0.6),
            ("GHD", 0.1),
            ("Lieb-Liniger", 0.05),
            ("Diffusif", 0.02),
            ("sex", 0.01),
        ]
    }

    fn physics_labels() -> Vec<String> {
        ["GGE", "GHD", "Lieb-Liniger", "Diffusif", "sex"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn long_text() -> String {
        "Generalized Gibbs ensembles describe integrable systems after a quench. ".repeat(3)
    }

    fn classifier(model: Arc<ScriptedModel>) -> Classifier {
        Classifier::new(model, physics_labels(), ClassifierPolicy::default())
    }

    #[tokio::test]
    async fn test_short_text_is_unknown_without_model_call() {
        let model = Arc::new(ScriptedModel::new(&physics_scores()));
        let classifier = classifier(model.clone());

        let result = classifier.classify("too short").await.unwrap();
        assert_eq!(result, CategoryScores::unknown());

        let result = classifier.classify("").await.unwrap();
        assert_eq!(result, CategoryScores::unknown());

        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_threshold_keeps_only_confident_labels() {
        let model = Arc::new(ScriptedModel::new(&physics_scores()));
        let result = classifier(model).classify_with_threshold(&long_text(), 0.3).await.unwrap();

        assert_eq!(result, CategoryScores::single("GGE", 0.6));
    }

    #[tokio::test]
    async fn test_top_k_fallback_when_nothing_clears() {
        let model = Arc::new(ScriptedModel::new(&physics_scores()));
        let result = classifier(model).classify_with_threshold(&long_text(), 0.7).await.unwrap();

        let labels: Vec<&str> = result.labels().collect();
        assert_eq!(labels, vec!["GGE", "GHD", "Lieb-Liniger", "Diffusif", "sex"]);
        assert_eq!(result.get("sex"), Some(0.01));
    }

    #[tokio::test]
    async fn test_only_prefix_is_sent() {
        let model = Arc::new(ScriptedModel::new(&physics_scores()));
        let text = "é".repeat(1500);
        classifier(model.clone()).classify(&text).await.unwrap();

        let sent = model.last_text.lock().unwrap().clone().unwrap();
        assert_eq!(sent.chars().count(), 1000);
    }

    #[tokio::test]
    async fn test_text_of_exactly_min_length_is_classified() {
        let model = Arc::new(ScriptedModel::new(&physics_scores()));
        let text = "x".repeat(50);
        let result = classifier(model.clone()).classify(&text).await.unwrap();

        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        assert!(result.contains("GGE"));
    }

    #[test]
    fn test_fallback_respects_top_k() {
        let raw: Vec<(String, f64)> = physics_scores()
            .into_iter()
            .map(|(l, s)| (l.to_string(), s))
            .collect();
        let result = select_categories(&raw, 0.9, 2);
        assert_eq!(result.labels().collect::<Vec<_>>(), vec!["GGE", "GHD"]);
    }

    #[test]
    fn test_raising_threshold_never_adds_labels() {
        let raw: Vec<(String, f64)> = vec![
            ("a".into(), 0.95),
            ("b".into(), 0.55),
            ("c".into(), 0.35),
            ("d".into(), 0.3),
            ("e".into(), 0.05),
        ];

        let mut previous: Option<Vec<String>> = None;
        for step in 0..=20 {
            let threshold = step as f64 * 0.05;
            let selected: Vec<String> = raw
                .iter()
                .filter(|(_, s)| *s >= threshold)
                .map(|(l, _)| l.clone())
                .collect();
            if let Some(prev) = &previous {
                assert!(selected.iter().all(|l| prev.contains(l)), "threshold {}", threshold);
            }

            let result = select_categories(&raw, threshold, 5);
            assert!(!result.is_empty());
            if !selected.is_empty() {
                assert_eq!(result.labels().map(String::from).collect::<Vec<_>>(), selected);
            }
            previous = Some(selected);
        }
    }

    #[test]
    fn test_empty_model_output_is_unknown() {
        assert_eq!(select_categories(&[], 0.3, 5), CategoryScores::unknown());
    }

    #[test]
    fn test_truncate_chars_on_boundary() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }
}
