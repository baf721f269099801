// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Offline label-occurrence scorer

use async_trait::async_trait;

use super::ZeroShotModel;
use crate::Result;

/// Scores each label by how often it appears in the text.
///
/// No model involved: a label seen `n` times scores `n / (n + 1)`, so one
/// mention gives 0.5 and absent labels score 0. Useful without a running
/// engine and for labels that are literal terms (acronyms, proper names).
#[derive(Debug, Clone, Default)]
pub struct KeywordModel;

impl KeywordModel {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ZeroShotModel for KeywordModel {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn score(&self, text: &str, labels: &[String]) -> Result<Vec<(String, f64)>> {
        let haystack = text.to_lowercase();
        Ok(labels
            .iter()
            .map(|label| {
                let needle = label.to_lowercase();
                let count = if needle.is_empty() { 0 } else { haystack.matches(needle.as_str()).count() };
                (label.clone(), count as f64 / (count as f64 + 1.0))
            })
            .collect())
    }
}
