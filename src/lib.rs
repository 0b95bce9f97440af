//! Credit-risk pipeline: feature derivation, model training and consistent serving-time scoring.
//!
//! Modular structure:
//! - [`data`]: Raw transaction loading and credit statistics
//! - [`features`]: Fit/apply feature derivation with a fixed column layout
//! - [`state`]: Frozen encoding state and its schema-tagged store
//! - [`model`]: Logistic regression and random forest classifiers, model artifacts
//! - [`training`]: Stratified split, cross-validated grid search, metrics
//! - [`serving`]: Scoring adapter and hot-swappable scoring service
//! - [`risk`]: Score to label and risk level
//! - [`storage`]: Training run store
//! - [`logging`]: Structured JSON logging

pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod logging;
pub mod model;
pub mod risk;
pub mod serving;
pub mod state;
pub mod storage;
pub mod training;

pub use config::PipelineConfig;
pub use data::{RawDataset, RawTransaction};
pub use error::{PipelineError, Result};
pub use features::{FeaturePipeline, FeatureVector, SchemaTag};
pub use logging::StructuredLogger;
pub use model::{Classifier, ModelArtifact, ModelKind};
pub use risk::{RiskEngine, RiskLevel};
pub use serving::{ScoringService, ServingBundle};
pub use state::{EncodingState, EncodingStateStore};
pub use storage::RunStore;
pub use training::{Metrics, Trainer};
