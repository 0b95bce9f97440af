//! Binary classifiers behind a fit/predict capability, and the persisted artifact.

mod forest;
mod logistic;

pub use forest::{DecisionTree, RandomForest};
pub use logistic::LogisticRegression;

use crate::error::{PipelineError, Result};
use crate::features::{FeatureVector, SchemaTag};
use crate::state::store::{read_json, write_json_atomic};
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("model has not been fitted yet")]
    NotFitted,

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("convergence failed after {0} iterations")]
    ConvergenceFailed(usize),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("training labels contain a single class")]
    SingleClass,
}

/// Fit/predict capability every trainable model provides.
pub trait Classifier: Send + Sync {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> std::result::Result<(), ModelError>;

    /// Probability of the positive class per row.
    fn predict_proba(&self, x: &Array2<f64>) -> std::result::Result<Array1<f64>, ModelError>;

    fn predict(&self, x: &Array2<f64>, threshold: f64) -> std::result::Result<Array1<u8>, ModelError> {
        Ok(self.predict_proba(x)?.mapv(|p| u8::from(p >= threshold)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    LogisticRegression,
    RandomForest,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::LogisticRegression => "logistic_regression",
            ModelKind::RandomForest => "random_forest",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = ModelError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "logistic_regression" => Ok(ModelKind::LogisticRegression),
            "random_forest" => Ok(ModelKind::RandomForest),
            other => Err(ModelError::InvalidParameter(format!("unknown model kind {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Penalty {
    L1,
    L2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticParams {
    /// Inverse regularization strength
    pub c: f64,
    pub penalty: Penalty,
    pub max_iter: usize,
    pub tolerance: f64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            penalty: Penalty::L2,
            max_iter: 1000,
            tolerance: 1e-6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 42,
        }
    }
}

/// One grid-search candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum Hyperparams {
    Logistic(LogisticParams),
    Forest(ForestParams),
}

impl Hyperparams {
    pub fn kind(&self) -> ModelKind {
        match self {
            Hyperparams::Logistic(_) => ModelKind::LogisticRegression,
            Hyperparams::Forest(_) => ModelKind::RandomForest,
        }
    }

    /// Fresh, unfitted model for this candidate.
    pub fn build(&self) -> TrainedModel {
        match self {
            Hyperparams::Logistic(p) => TrainedModel::Logistic(LogisticRegression::new(p.clone())),
            Hyperparams::Forest(p) => TrainedModel::Forest(RandomForest::new(p.clone())),
        }
    }
}

impl fmt::Display for Hyperparams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hyperparams::Logistic(p) => write!(f, "C={} penalty={:?}", p.c, p.penalty),
            Hyperparams::Forest(p) => write!(
                f,
                "n_estimators={} max_depth={:?} min_samples_split={} min_samples_leaf={}",
                p.n_estimators, p.max_depth, p.min_samples_split, p.min_samples_leaf
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrainedModel {
    Logistic(LogisticRegression),
    Forest(RandomForest),
}

impl Classifier for TrainedModel {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> std::result::Result<(), ModelError> {
        match self {
            TrainedModel::Logistic(m) => m.fit(x, y),
            TrainedModel::Forest(m) => m.fit(x, y),
        }
    }

    fn predict_proba(&self, x: &Array2<f64>) -> std::result::Result<Array1<f64>, ModelError> {
        match self {
            TrainedModel::Logistic(m) => m.predict_proba(x),
            TrainedModel::Forest(m) => m.predict_proba(x),
        }
    }
}

/// Stack vectors row-wise into a design matrix.
pub fn to_matrix(vectors: &[FeatureVector]) -> std::result::Result<Array2<f64>, ModelError> {
    let cols = vectors.first().map(|v| v.len()).unwrap_or(0);
    let mut flat = Vec::with_capacity(vectors.len() * cols);
    for v in vectors {
        if v.len() != cols {
            return Err(ModelError::DimensionMismatch {
                expected: cols,
                got: v.len(),
            });
        }
        flat.extend_from_slice(v.as_slice());
    }
    Array2::from_shape_vec((vectors.len(), cols), flat).map_err(|_| ModelError::DimensionMismatch {
        expected: cols,
        got: 0,
    })
}

pub fn labels_to_array(labels: &[u8]) -> Array1<f64> {
    labels.iter().map(|&y| f64::from(y)).collect()
}

/// A fitted model bound to the feature layout it was trained on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub name: String,
    pub kind: ModelKind,
    pub params: Hyperparams,
    /// Schema tag of the encoding state used for training
    pub schema_tag: SchemaTag,
    pub feature_names: Vec<String>,
    pub model: TrainedModel,
    pub trained_at: DateTime<Utc>,
}

impl ModelArtifact {
    /// Reject vectors whose column order differs from the training layout.
    pub fn check_layout(&self, vector: &FeatureVector) -> Result<()> {
        if vector.columns.len() != self.feature_names.len()
            || vector.columns.iter().zip(&self.feature_names).any(|(a, b)| a != b)
        {
            return Err(PipelineError::FeatureLayout {
                model: self.name.clone(),
                expected: self.feature_names.clone(),
                got: vector.columns.to_vec(),
            });
        }
        Ok(())
    }

    /// Positive-class probability for one vector.
    pub fn predict_proba(&self, vector: &FeatureVector) -> Result<f64> {
        self.check_layout(vector)?;
        let x = Array2::from_shape_vec((1, vector.len()), vector.values.clone()).map_err(|_| {
            ModelError::DimensionMismatch {
                expected: self.feature_names.len(),
                got: vector.len(),
            }
        })?;
        let p = self.model.predict_proba(&x)?;
        Ok(p[0])
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(self, path)?;
        tracing::info!(model = %self.name, path = %path.display(), "model artifact saved");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let artifact: ModelArtifact = read_json(path)?;
        tracing::info!(model = %artifact.name, schema = %artifact.schema_tag, "model artifact loaded");
        Ok(artifact)
    }
}
