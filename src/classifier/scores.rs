// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Ordered label -> score mapping

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::UNKNOWN_CATEGORY;

/// Classification result for one document.
///
/// Serialized as a JSON object; entry order survives a save/load cycle so
/// the classifier's descending-score order is what the user sees.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CategoryScores {
    entries: Vec<(String, f64)>,
}

impl CategoryScores {
    pub fn new() -> Self {
        Self::default()
    }

    /// The sentinel result for documents without usable text
    pub fn unknown() -> Self {
        Self::single(UNKNOWN_CATEGORY, 0.0)
    }

    pub fn single(label: impl Into<String>, score: f64) -> Self {
        Self {
            entries: vec![(label.into(), score)],
        }
    }

    /// Insert or replace a label's score, keeping its original position
    pub fn insert(&mut self, label: impl Into<String>, score: f64) {
        let label = label.into();
        match self.entries.iter_mut().find(|(l, _)| *l == label) {
            Some(entry) => entry.1 = score,
            None => self.entries.push((label, score)),
        }
    }

    pub fn get(&self, label: &str) -> Option<f64> {
        self.entries.iter().find(|(l, _)| l == label).map(|(_, s)| *s)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.entries.iter().any(|(l, _)| l == label)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(l, s)| (l.as_str(), *s))
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(l, _)| l.as_str())
    }

    /// Highest-scoring label; the earliest entry wins ties
    pub fn dominant(&self) -> Option<(&str, f64)> {
        let mut best: Option<(&str, f64)> = None;
        for (label, score) in self.iter() {
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((label, score)),
            }
        }
        best
    }

    /// Entries by descending score, stable for equal scores
    pub fn sorted_desc(&self) -> Vec<(&str, f64)> {
        let mut sorted: Vec<(&str, f64)> = self.iter().collect();
        sorted.sort_by(|a, b| b.1.total_cmp(&a.1));
        sorted
    }
}

impl FromIterator<(String, f64)> for CategoryScores {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        let mut scores = Self::new();
        for (label, score) in iter {
            scores.insert(label, score);
        }
        scores
    }
}

impl Serialize for CategoryScores {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (label, score) in &self.entries {
            map.serialize_entry(label, score)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CategoryScores {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ScoresVisitor;

        impl<'de> Visitor<'de> for ScoresVisitor {
            type Value = CategoryScores;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of category labels to scores")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut scores = CategoryScores::new();
                while let Some((label, score)) = access.next_entry::<String, f64>()? {
                    scores.insert(label, score);
                }
                Ok(scores)
            }
        }

        deserializer.deserialize_map(ScoresVisitor)
    }
}
