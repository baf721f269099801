// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Text rendering of results for the terminal

use serde_json::Value;

use crate::classifier::CategoryScores;
use crate::store::{DocumentRecord, Results};

/// `label (0.60), other (0.35)`
pub fn format_categories(scores: &CategoryScores) -> String {
    scores
        .iter()
        .map(|(label, score)| format!("{} ({:.2})", label, score))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Two-column table: document name and its categories with scores
pub fn render_table<'a, I>(rows: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a DocumentRecord)>,
{
    let rows: Vec<(&str, String)> = rows
        .into_iter()
        .map(|(name, record)| (name, format_categories(&record.categories)))
        .collect();

    let header = ("Document", "Categories");
    let width = rows
        .iter()
        .map(|(name, _)| name.chars().count())
        .chain(std::iter::once(header.0.len()))
        .max()
        .unwrap_or(0);

    let mut out = format!("{:<width$}  {}\n", header.0, header.1, width = width);
    out.push_str(&format!("{}  {}\n", "-".repeat(width), "-".repeat(header.1.len())));
    for (name, categories) in rows {
        out.push_str(&format!("{:<width$}  {}\n", name, categories, width = width));
    }
    out
}

/// Horizontal bar chart, highest score first
pub fn render_bar_chart(scores: &CategoryScores, width: usize) -> String {
    let sorted = scores.sorted_desc();
    let label_width = sorted.iter().map(|(l, _)| l.chars().count()).max().unwrap_or(0);

    let mut out = String::new();
    for (label, score) in sorted {
        let filled = (score.clamp(0.0, 1.0) * width as f64).round() as usize;
        out.push_str(&format!(
            "{:<lw$} |{}{} {:.2}\n",
            label,
            "█".repeat(filled),
            " ".repeat(width - filled),
            score,
            lw = label_width
        ));
    }
    out
}

/// JSON view of a set of documents, keyed by filename
pub fn results_json<'a, I>(rows: I) -> Value
where
    I: IntoIterator<Item = (&'a str, &'a DocumentRecord)>,
{
    let map: serde_json::Map<String, Value> = rows
        .into_iter()
        .map(|(name, record)| (name.to_string(), serde_json::to_value(record).unwrap_or(Value::Null)))
        .collect();
    Value::Object(map)
}

/// Per-category document counts, by dominant category
pub fn category_counts(results: &Results, categories: &[String]) -> Vec<(String, usize)> {
    categories
        .iter()
        .map(|c| {
            let n = results
                .iter()
                .filter(|(_, r)| r.dominant_category() == Some(c.as_str()))
                .count();
            (c.clone(), n)
        })
        .collect()
}
