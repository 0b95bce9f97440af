//! Training orchestrator: stratified hold-out, grid search, refit, evaluation.

mod metrics;
mod search;
mod split;

pub use metrics::{roc_auc, ClassificationReport, Metrics};
pub use search::{cv_auc_scorer, search, Candidate, SearchResult};
pub use split::{stratified_kfold, stratified_split, Split};

use crate::config::TrainingConfig;
use crate::error::{PipelineError, Result};
use crate::features::{FeatureVector, SchemaTag};
use crate::model::{to_matrix, Classifier, Hyperparams, ModelArtifact, ModelError, ModelKind};
use chrono::Utc;
use ndarray::{Array1, Axis};

/// Everything one `train` call produces.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub artifact: ModelArtifact,
    /// Held-out metrics of the selected model
    pub metrics: Metrics,
    pub report: ClassificationReport,
    /// Mean cross-validated ROC-AUC of the selected candidate
    pub cv_score: f64,
    pub search: SearchResult,
}

pub struct Trainer {
    config: TrainingConfig,
    schema_tag: SchemaTag,
    label_threshold: f64,
}

impl Trainer {
    /// `schema_tag` is recorded on every artifact this trainer produces.
    pub fn new(config: TrainingConfig, schema_tag: SchemaTag, label_threshold: f64) -> Self {
        Self {
            config,
            schema_tag,
            label_threshold,
        }
    }

    pub fn train(
        &self,
        vectors: &[FeatureVector],
        labels: &[u8],
        kind: ModelKind,
        grid: &[Hyperparams],
    ) -> Result<TrainingOutcome> {
        let first = vectors.first().ok_or(PipelineError::EmptyDataset)?;
        if vectors.len() != labels.len() {
            return Err(ModelError::DimensionMismatch {
                expected: vectors.len(),
                got: labels.len(),
            }
            .into());
        }
        if let Some(v) = vectors.iter().find(|v| v.columns != first.columns) {
            return Err(PipelineError::FeatureLayout {
                model: kind.to_string(),
                expected: first.columns.to_vec(),
                got: v.columns.to_vec(),
            });
        }
        let grid: Vec<Hyperparams> = grid.iter().filter(|p| p.kind() == kind).cloned().collect();

        let x = to_matrix(vectors)?;
        let split = stratified_split(labels, self.config.test_fraction, self.config.seed);
        let x_train = x.select(Axis(0), &split.train);
        let y_train: Vec<u8> = split.train.iter().map(|&i| labels[i]).collect();
        let x_test = x.select(Axis(0), &split.test);
        let y_test: Vec<u8> = split.test.iter().map(|&i| labels[i]).collect();
        tracing::info!(
            model = %kind,
            train = y_train.len(),
            test = y_test.len(),
            candidates = grid.len(),
            "starting grid search"
        );

        let result = search(
            &grid,
            cv_auc_scorer(&x_train, &y_train, self.config.cv_folds, self.config.seed),
        )?;

        // Refit on the whole training split; fall back down the ranking if the winner fails.
        let targets: Array1<f64> = y_train.iter().map(|&v| f64::from(v)).collect();
        let mut chosen = None;
        for candidate in &result.ranked {
            let mut model = candidate.params.build();
            match model.fit(&x_train, &targets) {
                Ok(()) => {
                    chosen = Some((candidate.clone(), model));
                    break;
                }
                Err(e) => tracing::warn!(params = %candidate.params, error = %e, "refit failed; trying next candidate"),
            }
        }
        let (candidate, model) = chosen.ok_or_else(|| PipelineError::NoViableCandidate(kind.to_string()))?;

        let (eval_x, eval_y) = if y_test.is_empty() {
            (&x_train, &y_train)
        } else {
            (&x_test, &y_test)
        };
        let proba = model.predict_proba(eval_x)?;
        let (metrics, report) = Metrics::evaluate(eval_y, &proba.to_vec(), self.label_threshold);
        tracing::info!(
            model = %kind,
            params = %candidate.params,
            cv_auc = candidate.score,
            accuracy = metrics.accuracy,
            precision = metrics.precision,
            recall = metrics.recall,
            f1 = metrics.f1,
            roc_auc = metrics.roc_auc,
            "model trained"
        );

        let artifact = ModelArtifact {
            name: kind.to_string(),
            kind,
            params: candidate.params.clone(),
            schema_tag: self.schema_tag.clone(),
            feature_names: first.columns.to_vec(),
            model,
            trained_at: Utc::now(),
        };
        Ok(TrainingOutcome {
            artifact,
            metrics,
            report,
            cv_score: candidate.score,
            search: result,
        })
    }
}
