//! Serving-time adapter: raw transaction in, per-model score out, using only
//! the frozen encoding state and the artifacts trained against it.

use crate::config::{PipelineConfig, RiskConfig};
use crate::data::RawTransaction;
use crate::error::{PipelineError, Result};
use crate::features::{FeaturePipeline, FeatureVector};
use crate::model::ModelArtifact;
use crate::risk::{RiskEngine, ScoreResult};
use crate::state::{EncodingState, EncodingStateStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Reject an artifact trained against a different encoding state.
pub fn check_compatible(state: &EncodingState, artifact: &ModelArtifact) -> Result<()> {
    if state.schema_tag != artifact.schema_tag {
        return Err(PipelineError::ModelStateMismatch {
            state: state.schema_tag.to_string(),
            model: artifact.schema_tag.to_string(),
        });
    }
    let names = state.feature_names();
    if names != artifact.feature_names {
        return Err(PipelineError::FeatureLayout {
            model: artifact.name.clone(),
            expected: artifact.feature_names.clone(),
            got: names,
        });
    }
    Ok(())
}

/// Score one transaction against one model.
pub fn score(
    pipeline: &FeaturePipeline,
    tx: &RawTransaction,
    state: &EncodingState,
    artifact: &ModelArtifact,
    engine: &RiskEngine,
) -> Result<ScoreResult> {
    check_compatible(state, artifact)?;
    let vector = pipeline.transform(tx, state)?;
    Ok(engine.assess(artifact.predict_proba(&vector)?))
}

/// Encoding state plus every model trained against it. Immutable once built.
#[derive(Debug)]
pub struct ServingBundle {
    state: EncodingState,
    models: Vec<ModelArtifact>,
}

impl ServingBundle {
    pub fn new(state: EncodingState, models: Vec<ModelArtifact>) -> Result<Self> {
        for artifact in &models {
            check_compatible(&state, artifact)?;
        }
        Ok(Self { state, models })
    }

    /// Load the state and every configured model kind from the artifacts dir.
    pub fn load(config: &PipelineConfig, pipeline: &FeaturePipeline) -> Result<Self> {
        let state = EncodingStateStore::load(&config.state_path(), pipeline.schema_tag())?;
        let models = config
            .training
            .models
            .iter()
            .map(|&kind| ModelArtifact::load(&config.model_path(kind)))
            .collect::<Result<Vec<_>>>()?;
        tracing::info!(models = models.len(), schema = %state.schema_tag, "serving bundle loaded");
        Self::new(state, models)
    }

    pub fn state(&self) -> &EncodingState {
        &self.state
    }

    pub fn models(&self) -> &[ModelArtifact] {
        &self.models
    }

    pub fn model(&self, name: &str) -> Option<&ModelArtifact> {
        self.models.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResponse {
    pub transaction_id: String,
    /// Model name → result
    pub scores: BTreeMap<String, ScoreResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

impl ErrorResponse {
    pub fn from_error(err: &PipelineError, transaction_id: Option<String>) -> Self {
        Self {
            status: err.status(),
            error: err.to_string(),
            transaction_id,
        }
    }
}

/// Shared scorer. Bundles are swapped whole; a request scores against the
/// bundle it started with.
pub struct ScoringService {
    pipeline: FeaturePipeline,
    engine: RiskEngine,
    bundle: RwLock<Arc<ServingBundle>>,
}

impl ScoringService {
    pub fn new(pipeline: FeaturePipeline, risk: RiskConfig, bundle: ServingBundle) -> Self {
        Self {
            pipeline,
            engine: RiskEngine::new(risk),
            bundle: RwLock::new(Arc::new(bundle)),
        }
    }

    pub fn pipeline(&self) -> &FeaturePipeline {
        &self.pipeline
    }

    /// Current bundle; the lock is released before the caller uses it.
    pub fn snapshot(&self) -> Arc<ServingBundle> {
        let guard = self.bundle.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// Install a new bundle and return the previous one.
    pub fn swap(&self, bundle: ServingBundle) -> Result<Arc<ServingBundle>> {
        if bundle.state.schema_tag != *self.pipeline.schema_tag() {
            return Err(PipelineError::IncompatibleState {
                expected: self.pipeline.schema_tag().to_string(),
                found: bundle.state.schema_tag.to_string(),
            });
        }
        let mut guard = self.bundle.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let previous = std::mem::replace(&mut *guard, Arc::new(bundle));
        tracing::info!(schema = %guard.state.schema_tag, models = guard.models.len(), "serving bundle swapped");
        Ok(previous)
    }

    /// Derive one feature vector and score it with every registered model.
    pub fn score_all(&self, tx: &RawTransaction) -> Result<ScoreResponse> {
        let bundle = self.snapshot();
        let vector = self.pipeline.transform(tx, &bundle.state)?;
        self.score_vector(&bundle, &tx.transaction_id, &vector)
    }

    fn score_vector(&self, bundle: &ServingBundle, transaction_id: &str, vector: &FeatureVector) -> Result<ScoreResponse> {
        let mut scores = BTreeMap::new();
        for artifact in &bundle.models {
            let p = artifact.predict_proba(vector)?;
            scores.insert(artifact.name.clone(), self.engine.assess(p));
        }
        tracing::debug!(transaction_id, models = scores.len(), "transaction scored");
        Ok(ScoreResponse {
            transaction_id: transaction_id.to_string(),
            scores,
        })
    }

    /// Handle one JSON request line; always returns one JSON response line.
    pub fn handle_line(&self, line: &str) -> String {
        let outcome = serde_json::from_str::<RawTransaction>(line)
            .map_err(|e| (PipelineError::from(e), None))
            .and_then(|tx| {
                self.score_all(&tx)
                    .map_err(|e| (e, Some(tx.transaction_id.clone())))
            });
        let rendered = match outcome {
            Ok(response) => serde_json::to_string(&response),
            Err((err, transaction_id)) => {
                tracing::warn!(error = %err, status = err.status(), "request rejected");
                serde_json::to_string(&ErrorResponse::from_error(&err, transaction_id))
            }
        };
        rendered.unwrap_or_else(|e| format!(r#"{{"status":500,"error":"{}"}}"#, e.to_string().replace('"', "'")))
    }
}
