// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use docsort::classifier::ollama::parse_scores;
use docsort::classifier::select_categories;
use docsort::fetcher::filename_from_url;

#[derive(Arbitrary, Debug)]
struct Input {
    url: String,
    response: String,
    labels: Vec<String>,
    threshold: f64,
    top_k: u8,
}

fuzz_target!(|input: Input| {
    if let Some(name) = filename_from_url(&input.url) {
        assert!(!name.is_empty());
        assert!(!name.contains('/'));
    }

    if let Ok(scores) = parse_scores(&input.response, &input.labels) {
        assert!(scores.iter().all(|(_, s)| (0.0..=1.0).contains(s)));

        let top_k = usize::from(input.top_k).max(1);
        let selected = select_categories(&scores, input.threshold, top_k);
        assert!(!selected.is_empty());
    }
});
