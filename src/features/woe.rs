//! Weight of Evidence / Information Value for categorical columns.
//!
//! WoE(v) = ln(good%(v) / bad%(v)) where "bad" is the positive class. Counts are
//! Laplace-smoothed so categories seen in one class only still score finitely.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Additive smoothing applied to per-category class counts.
pub const WOE_SMOOTHING: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WoeTable {
    /// Label column the scores were fitted against
    pub target: String,
    /// Raw category value → WoE score
    pub scores: BTreeMap<String, f64>,
    pub information_value: f64,
}

impl WoeTable {
    /// Fit from `(raw value, label)` pairs.
    pub fn fit<'a, I>(target: &str, pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, u8)>,
    {
        let mut counts: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
        for (value, label) in pairs {
            let entry = counts.entry(value).or_insert((0.0, 0.0));
            if label == 1 {
                entry.1 += 1.0;
            } else {
                entry.0 += 1.0;
            }
        }

        let k = counts.len() as f64;
        let total_good: f64 = counts.values().map(|c| c.0).sum();
        let total_bad: f64 = counts.values().map(|c| c.1).sum();
        let good_denom = total_good + WOE_SMOOTHING * k;
        let bad_denom = total_bad + WOE_SMOOTHING * k;

        let mut scores = BTreeMap::new();
        let mut iv = 0.0;
        for (value, (good, bad)) in counts {
            let good_pct = (good + WOE_SMOOTHING) / good_denom;
            let bad_pct = (bad + WOE_SMOOTHING) / bad_denom;
            let woe = (good_pct / bad_pct).ln();
            iv += (good_pct - bad_pct) * woe;
            scores.insert(value.to_string(), woe);
        }

        Self {
            target: target.to_string(),
            scores,
            information_value: iv,
        }
    }

    /// Score for a raw value; values never seen at fit time carry no evidence (0.0).
    pub fn score(&self, value: &str) -> Option<f64> {
        self.scores.get(value).copied()
    }

    pub fn score_or_neutral(&self, value: &str) -> f64 {
        self.score(value).unwrap_or(0.0)
    }
}
