// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for docsort

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::classifier::{ClassifierPolicy, UNKNOWN_CATEGORY};
use crate::{DocsortError, Result};

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Staging directory holding documents awaiting analysis
    #[serde(default = "default_source_dir")]
    pub source_dir: String,

    /// Root under which one folder per category is created
    #[serde(default = "default_dest_dir")]
    pub dest_dir: String,

    /// Persisted classification results
    #[serde(default = "default_results_file")]
    pub results_file: String,

    /// Move journal used for undo
    #[serde(default = "default_history_file")]
    pub history_file: String,

    /// Closed category vocabulary
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,

    /// Zero-shot classifier settings
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Download list
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Web UI settings
    #[serde(default)]
    pub web: WebConfig,
}

/// Which zero-shot model implementation to use
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelBackend {
    /// LLM served by a local Ollama instance
    #[default]
    Ollama,
    /// Offline label-occurrence scorer
    Keyword,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub backend: ModelBackend,
    /// Ollama base URL
    #[serde(default = "default_engine_url")]
    pub url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    /// `{}` is replaced by the candidate label
    #[serde(default = "default_hypothesis_template")]
    pub hypothesis_template: String,
    #[serde(default = "default_engine_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,
    /// Parallel to `directories`
    #[serde(default = "default_urls")]
    pub urls: Vec<String>,
    #[serde(default = "default_directories")]
    pub directories: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WebConfig {
    #[serde(default = "default_web_host")]
    pub host: String,
    #[serde(default = "default_web_port")]
    pub port: u16,
}

/// Upper bound on model request retries
pub const MAX_RETRIES: u32 = 10;

// Default value functions
fn default_source_dir() -> String { "./documents".to_string() }
fn default_dest_dir() -> String { "./sorted".to_string() }
fn default_results_file() -> String { "./results.json".to_string() }
fn default_history_file() -> String { "docsort_history.jsonl".to_string() }
fn default_engine_url() -> String { "http://localhost:11434".to_string() }
fn default_model() -> String { "llama3.2:3b".to_string() }
fn default_threshold() -> f64 { 0.3 }
fn default_top_k() -> usize { 5 }
fn default_min_chars() -> usize { 50 }
fn default_max_chars() -> usize { 1000 }
fn default_hypothesis_template() -> String { "This document is about {}.".to_string() }
fn default_engine_timeout() -> u64 { 120 }
fn default_retries() -> u32 { 2 }
fn default_fetch_timeout() -> u64 { 30 }
fn default_web_host() -> String { "127.0.0.1".to_string() }
fn default_web_port() -> u16 { 8501 }

fn default_categories() -> Vec<String> {
    [
        "GGE", "Mathématiques", "GHD", "Intelligence Artificielle", "1D",
        "Philosophie", "Littérature", "Biologie", "Chimie", "Économie", "Sociologie",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_urls() -> Vec<String> {
    [
        "https://arxiv.org/pdf/2408.04502.pdf",
        "https://arxiv.org/pdf/2506.05279.pdf",
        "https://arxiv.org/pdf/2505.05839.pdf",
        "https://arxiv.org/pdf/2312.15344.pdf",
        "https://arxiv.org/pdf/1309.3471.pdf",
        "https://arxiv.org/pdf/2406.17569.pdf",
        "https://www.numdam.org/item/AST_2013__350__R1_0.pdf",
        "https://www.imo.universite-paris-saclay.fr/~frederic.paulin/notescours/cours18sep23TESD.pdf",
        "https://images.math.cnrs.fr/wp-content/uploads/2024/10/10.60868ey52-3C40.pdf",
        "https://univ-scholarvox-com.ezproxy.universite-paris-saclay.fr/reader/docid/45006579/page/54?searchterm=M%20theory",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_directories() -> Vec<String> {
    vec![default_source_dir(); default_urls().len()]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            dest_dir: default_dest_dir(),
            results_file: default_results_file(),
            history_file: default_history_file(),
            categories: default_categories(),
            classifier: ClassifierConfig::default(),
            fetch: FetchConfig::default(),
            web: WebConfig::default(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            backend: ModelBackend::default(),
            url: default_engine_url(),
            model: default_model(),
            threshold: default_threshold(),
            top_k: default_top_k(),
            min_chars: default_min_chars(),
            max_chars: default_max_chars(),
            hypothesis_template: default_hypothesis_template(),
            timeout_secs: default_engine_timeout(),
            retries: default_retries(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout(),
            urls: default_urls(),
            directories: default_directories(),
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_web_host(),
            port: default_web_port(),
        }
    }
}

impl ClassifierConfig {
    /// Thresholding policy derived from these settings
    pub fn policy(&self) -> ClassifierPolicy {
        ClassifierPolicy {
            threshold: self.threshold,
            top_k: self.top_k,
            min_chars: self.min_chars,
            max_chars: self.max_chars,
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| DocsortError::Config(format!("Failed to parse config: {}", e)))?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn source_dir(&self) -> PathBuf {
        PathBuf::from(&self.source_dir)
    }

    pub fn dest_dir(&self) -> PathBuf {
        PathBuf::from(&self.dest_dir)
    }

    pub fn results_file(&self) -> PathBuf {
        PathBuf::from(&self.results_file)
    }

    pub fn history_file(&self) -> PathBuf {
        PathBuf::from(&self.history_file)
    }

    /// Category vocabulary plus the `Unknown` sentinel, in display order
    pub fn selectable_categories(&self) -> Vec<String> {
        let mut all = self.categories.clone();
        all.push(UNKNOWN_CATEGORY.to_string());
        all
    }

    /// Check that the configuration is usable.
    ///
    /// Fetch list lengths are deliberately not checked here; `fetch` reports
    /// that mismatch itself before touching the network.
    pub fn validate(&self) -> Result<()> {
        check_threshold(self.classifier.threshold)?;

        if self.classifier.top_k == 0 {
            return Err(DocsortError::Config("top_k must be at least 1".to_string()));
        }
        if self.classifier.retries > MAX_RETRIES {
            return Err(DocsortError::Config(format!(
                "retries ({}) exceeds the maximum of {}",
                self.classifier.retries, MAX_RETRIES
            )));
        }
        if self.classifier.min_chars > self.classifier.max_chars {
            return Err(DocsortError::Config(format!(
                "min_chars ({}) exceeds max_chars ({})",
                self.classifier.min_chars, self.classifier.max_chars
            )));
        }
        if !self.classifier.hypothesis_template.contains("{}") {
            return Err(DocsortError::Config(
                "hypothesis_template must contain a {} placeholder".to_string(),
            ));
        }

        if self.categories.is_empty() {
            return Err(DocsortError::Config("at least one category is required".to_string()));
        }

        let mut seen = HashSet::new();
        for label in &self.categories {
            check_label(label)?;
            if label == UNKNOWN_CATEGORY {
                return Err(DocsortError::InvalidCategory(format!(
                    "'{}' is reserved for unclassifiable documents",
                    UNKNOWN_CATEGORY
                )));
            }
            if !seen.insert(label.as_str()) {
                return Err(DocsortError::InvalidCategory(format!("duplicate label '{}'", label)));
            }
        }

        Ok(())
    }
}

/// Thresholds come from a 0.0-1.0 slider; anything else is a caller bug
pub fn check_threshold(threshold: f64) -> Result<()> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(DocsortError::Config(format!(
            "threshold must be within 0.0-1.0, got {}",
            threshold
        )))
    }
}

/// Labels double as folder names under the destination root
fn check_label(label: &str) -> Result<()> {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        return Err(DocsortError::InvalidCategory("empty label".to_string()));
    }
    if trimmed == "." || trimmed == ".." || label.contains(['/', '\\']) {
        return Err(DocsortError::InvalidCategory(format!(
            "'{}' cannot be used as a folder name",
            label
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.fetch.urls.len(), config.fetch.directories.len());
        assert_eq!(config.classifier.threshold, 0.3);
        assert_eq!(config.classifier.top_k, 5);
        assert_eq!(config.fetch.urls.len(), 10);
    }

    #[test]
    fn test_retries_are_capped() {
        let mut config = AppConfig::default();
        config.classifier.retries = MAX_RETRIES;
        assert!(config.validate().is_ok());

        config.classifier.retries = 100;
        assert!(matches!(config.validate(), Err(DocsortError::Config(_))));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: AppConfig = serde_json::from_str(
            r#"{ "categories": ["GGE", "GHD"], "classifier": { "threshold": 0.5 } }"#,
        )
        .unwrap();

        assert_eq!(config.categories, vec!["GGE", "GHD"]);
        assert_eq!(config.classifier.threshold, 0.5);
        assert_eq!(config.classifier.max_chars, 1000);
        assert_eq!(config.source_dir, "./documents");
    }

    #[test]
    fn test_rejects_bad_labels() {
        let mut config = AppConfig::default();
        config.categories = vec!["A".into(), "A".into()];
        assert!(matches!(config.validate(), Err(DocsortError::InvalidCategory(_))));

        config.categories = vec!["Unknown".into()];
        assert!(config.validate().is_err());

        config.categories = vec!["../etc".into()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_threshold_range() {
        assert!(check_threshold(0.0).is_ok());
        assert!(check_threshold(1.0).is_ok());
        assert!(check_threshold(1.05).is_err());
        assert!(check_threshold(f64::NAN).is_err());
    }

    #[test]
    fn test_selectable_categories_end_with_unknown() {
        let config = AppConfig::default();
        let all = config.selectable_categories();
        assert_eq!(all.last().map(String::as_str), Some(UNKNOWN_CATEGORY));
        assert_eq!(all.len(), config.categories.len() + 1);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = AppConfig::default();
        config.classifier.model = "qwen2.5:7b".to_string();
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.classifier.model, "qwen2.5:7b");
        assert_eq!(loaded.categories, config.categories);
    }
}
