//! Error taxonomy shared by every pipeline component.

use crate::model::ModelError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("required column missing: {0}")]
    MissingColumn(String),

    #[error("dataset is empty")]
    EmptyDataset,

    /// Stored encoding state was produced for a different feature layout.
    #[error("incompatible encoding state: expected schema {expected}, found {found}")]
    IncompatibleState { expected: String, found: String },

    /// Encoding state and model artifact disagree on the training schema.
    #[error("model/state mismatch: state schema {state}, model schema {model}")]
    ModelStateMismatch { state: String, model: String },

    #[error("feature layout differs from model {model}: expected {expected:?}, got {got:?}")]
    FeatureLayout {
        model: String,
        expected: Vec<String>,
        got: Vec<String>,
    },

    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("no hyperparameter candidate could be fitted for {0}")]
    NoViableCandidate(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("run store error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl PipelineError {
    /// Status code used by the serving boundary when reporting this error.
    pub fn status(&self) -> u16 {
        match self {
            PipelineError::NotFound(_) => 404,
            PipelineError::IncompatibleState { .. } | PipelineError::ModelStateMismatch { .. } => 409,
            PipelineError::Io(_) | PipelineError::Sqlite(_) | PipelineError::NoViableCandidate(_) => 500,
            _ => 400,
        }
    }
}
