// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Ollama-backed zero-shot scoring

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::ZeroShotModel;
use crate::config::ClassifierConfig;
use crate::{DocsortError, Result};

/// Longest wait between two attempts
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Exponential backoff before retry `attempt` (1-based): 1s, 2s, 4s, ...
fn backoff_delay(attempt: u32) -> Duration {
    let secs = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_secs(secs).min(MAX_BACKOFF)
}

/// Ollama API client
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Deserialize)]
struct ModelInfo {
    name: String,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        // Accept endpoint URLs as well as the bare base URL
        let base_url = base_url
            .trim_end_matches('/')
            .replace("/api/generate", "")
            .replace("/api/chat", "");

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.base_url);

        self.client
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| {
                DocsortError::ModelUnavailable(format!(
                    "Cannot connect to Ollama at {}: {}",
                    self.base_url, e
                ))
            })?;

        Ok(())
    }

    /// List available models
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self.client.get(&url).send().await?;

        let tags: TagsResponse = response.json().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Check if a specific model is available
    pub async fn model_available(&self, model: &str) -> Result<bool> {
        let models = self.list_models().await?;
        Ok(models.iter().any(|m| m.starts_with(model) || m == &format!("{}:latest", model)))
    }

    /// Generate a completion; `format` is passed through (e.g. `"json"`)
    pub async fn generate(&self, model: &str, prompt: &str, format: Option<&str>) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        let request = GenerateRequest {
            model,
            prompt,
            stream: false,
            format,
            options: GenerateOptions { temperature: 0.0 },
        };

        debug!("Sending request to Ollama: model={}", model);

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(DocsortError::ModelUnavailable(format!(
                "Ollama returned status {}",
                response.status()
            )));
        }

        let result: GenerateResponse = response.json().await?;
        Ok(result.response)
    }

    /// Generate with retry logic
    pub async fn generate_with_retry(
        &self,
        model: &str,
        prompt: &str,
        format: Option<&str>,
        retries: u32,
    ) -> Result<String> {
        let mut last_error = None;

        for attempt in 0..=retries {
            if attempt > 0 {
                let delay = backoff_delay(attempt);
                warn!("Retrying Ollama request in {:?} (attempt {})", delay, attempt + 1);
                tokio::time::sleep(delay).await;
            }

            match self.generate(model, prompt, format).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DocsortError::ModelUnavailable("Unknown error".to_string())))
    }
}

/// Zero-shot scorer that asks a local LLM to judge one entailment
/// hypothesis per label
pub struct OllamaZeroShot {
    client: OllamaClient,
    model: String,
    hypothesis_template: String,
    retries: u32,
}

impl OllamaZeroShot {
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        let client = OllamaClient::new(&config.url, Duration::from_secs(config.timeout_secs))?;
        Ok(Self {
            client,
            model: config.model.clone(),
            hypothesis_template: config.hypothesis_template.clone(),
            retries: config.retries,
        })
    }

    fn build_prompt(&self, text: &str, labels: &[String]) -> String {
        let hypotheses: String = labels
            .iter()
            .map(|label| {
                format!(
                    "- \"{}\": {}\n",
                    label,
                    self.hypothesis_template.replace("{}", label)
                )
            })
            .collect();

        format!(
            "You are a zero-shot multi-label text classifier. For each label below, \
             estimate independently the probability (0.0 to 1.0) that its hypothesis \
             is true of the text. Several labels may be likely at once.\n\n\
             Labels and hypotheses:\n{}\n\
             Respond with a single JSON object mapping every label to its probability \
             and nothing else.\n\n\
             Text:\n\"\"\"\n{}\n\"\"\"",
            hypotheses, text
        )
    }
}

#[async_trait]
impl ZeroShotModel for OllamaZeroShot {
    fn name(&self) -> &str {
        &self.model
    }

    async fn score(&self, text: &str, labels: &[String]) -> Result<Vec<(String, f64)>> {
        let prompt = self.build_prompt(text, labels);
        let response = self
            .client
            .generate_with_retry(&self.model, &prompt, Some("json"), self.retries)
            .await?;
        parse_scores(&response, labels)
    }
}

/// Parse a model reply into one score per label.
///
/// Accepts a bare `{label: score}` object, the same object under a
/// `"scores"` key, and chatter around the JSON. Scores are clamped to
/// `[0, 1]`; labels the model skipped score 0.
pub fn parse_scores(response: &str, labels: &[String]) -> Result<Vec<(String, f64)>> {
    let start = response.find('{');
    let end = response.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if s < e => &response[s..=e],
        _ => {
            return Err(DocsortError::Classification(format!(
                "no JSON object in model response: {:?}",
                truncate_for_log(response)
            )))
        }
    };

    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| DocsortError::Classification(format!("malformed model response: {}", e)))?;

    let object = match value.get("scores").and_then(|s| s.as_object()) {
        Some(nested) => nested,
        None => value.as_object().ok_or_else(|| {
            DocsortError::Classification("model response is not a JSON object".to_string())
        })?,
    };

    let mut matched = 0;
    let scores: Vec<(String, f64)> = labels
        .iter()
        .map(|label| {
            let raw = object.get(label).or_else(|| {
                object
                    .iter()
                    .find(|(k, _)| k.trim().eq_ignore_ascii_case(label))
                    .map(|(_, v)| v)
            });
            let score = raw.and_then(score_value);
            if score.is_some() {
                matched += 1;
            }
            (label.clone(), score.unwrap_or(0.0))
        })
        .collect();

    if matched == 0 && !labels.is_empty() {
        return Err(DocsortError::Classification(
            "model response contained none of the labels".to_string(),
        ));
    }

    Ok(scores)
}

fn score_value(value: &serde_json::Value) -> Option<f64> {
    let score = match value {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => match s.trim().strip_suffix('%') {
            Some(pct) => pct.trim().parse::<f64>().ok()? / 100.0,
            None => s.trim().parse::<f64>().ok()?,
        },
        _ => return None,
    };
    if score.is_finite() {
        Some(score.clamp(0.0, 1.0))
    } else {
        None
    }
}

fn truncate_for_log(s: &str) -> &str {
    super::truncate_chars(s, 200)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        vec!["GGE".to_string(), "GHD".to_string(), "Chimie".to_string()]
    }

    #[test]
    fn test_backoff_is_bounded() {
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(3), Duration::from_secs(4));
        assert_eq!(backoff_delay(7), MAX_BACKOFF);
        assert_eq!(backoff_delay(200), MAX_BACKOFF);
    }

    #[test]
    fn test_parse_plain_object() {
        let scores = parse_scores(r#"{"GGE": 0.82, "GHD": 0.4, "Chimie": 0.01}"#, &labels()).unwrap();
        assert_eq!(scores[0], ("GGE".to_string(), 0.82));
        assert_eq!(scores[2], ("Chimie".to_string(), 0.01));
    }

    #[test]
    fn test_parse_nested_and_chatty() {
        let response = "Sure! Here you go:\n{\"scores\": {\"gge\": \"0.7\", \"GHD\": 1.4}}\nHope this helps.";
        let scores = parse_scores(response, &labels()).unwrap();
        assert_eq!(scores[0].1, 0.7);
        assert_eq!(scores[1].1, 1.0);
        assert_eq!(scores[2].1, 0.0);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_scores("I cannot classify this.", &labels()).is_err());
        assert!(parse_scores("{not json}", &labels()).is_err());
        assert!(parse_scores(r#"{"Physics": 0.9}"#, &labels()).is_err());
    }

    #[test]
    fn test_prompt_lists_every_hypothesis() {
        let config = ClassifierConfig::default();
        let model = OllamaZeroShot::new(&config).unwrap();
        let prompt = model.build_prompt("some text", &labels());

        assert!(prompt.contains("This document is about GGE."));
        assert!(prompt.contains("This document is about Chimie."));
        assert!(prompt.contains("some text"));
    }

    #[test]
    fn test_base_url_normalized() {
        let client = OllamaClient::new("http://localhost:11434/api/generate/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:11434");
    }
}
