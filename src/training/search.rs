//! Exhaustive hyperparameter search scored by cross-validated ROC-AUC.

use super::metrics::roc_auc;
use super::split::stratified_kfold;
use crate::error::{PipelineError, Result};
use crate::model::{Classifier, Hyperparams, ModelError};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub params: Hyperparams,
    /// Mean validation ROC-AUC
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Viable candidates, best first; ties keep grid order
    pub ranked: Vec<Candidate>,
    /// Candidates that failed to fit, with the reason
    pub excluded: Vec<(Hyperparams, String)>,
}

impl SearchResult {
    pub fn best(&self) -> Option<&Candidate> {
        self.ranked.first()
    }
}

/// Score every grid point; failures are logged and excluded.
pub fn search<F>(grid: &[Hyperparams], mut scorer: F) -> Result<SearchResult>
where
    F: FnMut(&Hyperparams) -> std::result::Result<f64, ModelError>,
{
    let mut ranked = Vec::with_capacity(grid.len());
    let mut excluded = Vec::new();

    for params in grid {
        match scorer(params) {
            Ok(score) if score.is_finite() => {
                tracing::debug!(%params, score, "candidate scored");
                ranked.push(Candidate {
                    params: params.clone(),
                    score,
                });
            }
            Ok(score) => {
                tracing::warn!(%params, score, "candidate produced a non-finite score; excluded");
                excluded.push((params.clone(), format!("non-finite score {score}")));
            }
            Err(e) => {
                tracing::warn!(%params, error = %e, "candidate failed to fit; excluded");
                excluded.push((params.clone(), e.to_string()));
            }
        }
    }

    if ranked.is_empty() {
        let kind = grid
            .first()
            .map(|p| p.kind().to_string())
            .unwrap_or_else(|| "empty grid".to_string());
        return Err(PipelineError::NoViableCandidate(kind));
    }

    // sort_by is stable, so equal scores keep grid order
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    Ok(SearchResult { ranked, excluded })
}

/// Scorer computing mean ROC-AUC over stratified folds of `(x, y)`.
///
/// Folds are capped at the minority class size. With fewer than two minority
/// rows the candidate is fitted and scored on the full set.
pub fn cv_auc_scorer<'a>(
    x: &'a Array2<f64>,
    y: &'a [u8],
    folds: usize,
    seed: u64,
) -> impl FnMut(&Hyperparams) -> std::result::Result<f64, ModelError> + 'a {
    let positives = y.iter().filter(|&&v| v == 1).count();
    let minority = positives.min(y.len() - positives);
    let k = folds.min(minority);
    let splits = if k >= 2 {
        stratified_kfold(y, k, seed)
    } else {
        tracing::warn!(minority, "too few minority rows for cross-validation; scoring on the training set");
        Vec::new()
    };

    move |params: &Hyperparams| {
        if splits.is_empty() {
            let targets: Array1<f64> = y.iter().map(|&v| f64::from(v)).collect();
            let mut model = params.build();
            model.fit(x, &targets)?;
            let proba = model.predict_proba(x)?;
            return Ok(roc_auc(y, &proba.to_vec()));
        }

        let mut total = 0.0;
        for split in &splits {
            let x_train = x.select(Axis(0), &split.train);
            let y_train: Array1<f64> = split.train.iter().map(|&i| f64::from(y[i])).collect();
            let x_val = x.select(Axis(0), &split.test);
            let y_val: Vec<u8> = split.test.iter().map(|&i| y[i]).collect();

            let mut model = params.build();
            model.fit(&x_train, &y_train)?;
            let proba = model.predict_proba(&x_val)?;
            total += roc_auc(&y_val, &proba.to_vec());
        }
        Ok(total / splits.len() as f64)
    }
}
