//! Binary classification metrics.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
}

impl ClassificationReport {
    pub fn from_predictions(y_true: &[u8], y_pred: &[u8]) -> Self {
        let mut m = Self::default();
        for (&t, &p) in y_true.iter().zip(y_pred) {
            match (t, p) {
                (1, 1) => m.true_positive += 1,
                (0, 1) => m.false_positive += 1,
                (1, _) => m.false_negative += 1,
                _ => m.true_negative += 1,
            }
        }
        m
    }

    pub fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }
}

/// Accuracy, precision, recall, F1 and ROC-AUC, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub roc_auc: f64,
}

impl Metrics {
    /// Evaluate scores against labels; scores at or above `threshold` predict 1.
    pub fn evaluate(y_true: &[u8], scores: &[f64], threshold: f64) -> (Self, ClassificationReport) {
        let y_pred: Vec<u8> = scores.iter().map(|&s| u8::from(s >= threshold)).collect();
        let cm = ClassificationReport::from_predictions(y_true, &y_pred);
        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };

        let accuracy = ratio(cm.true_positive + cm.true_negative, cm.total());
        let precision = ratio(cm.true_positive, cm.true_positive + cm.false_positive);
        let recall = ratio(cm.true_positive, cm.true_positive + cm.false_negative);
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };
        let metrics = Self {
            accuracy,
            precision,
            recall,
            f1,
            roc_auc: roc_auc(y_true, scores),
        };
        (metrics, cm)
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Accuracy: {:.4}, Precision: {:.4}, Recall: {:.4}, F1-Score: {:.4}, ROC-AUC: {:.4}",
            self.accuracy, self.precision, self.recall, self.f1, self.roc_auc
        )
    }
}

/// Area under the ROC curve via the rank-sum statistic (ties share average rank).
/// Returns 0.5 when only one class is present.
pub fn roc_auc(y_true: &[u8], scores: &[f64]) -> f64 {
    let n = y_true.len().min(scores.len());
    let n_pos = y_true[..n].iter().filter(|&&y| y == 1).count();
    let n_neg = n - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return 0.5;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // 1-based ranks i+1..=j+1 share their mean
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            if y_true[idx] == 1 {
                rank_sum_pos += avg_rank;
            }
        }
        i = j + 1;
    }

    let n_pos_f = n_pos as f64;
    (rank_sum_pos - n_pos_f * (n_pos_f + 1.0) / 2.0) / (n_pos_f * n_neg as f64)
}
