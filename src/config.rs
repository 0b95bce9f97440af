//! Pipeline configuration. Defaults reproduce the production feature layout.

use crate::error::Result;
use crate::features::{NUMERIC_COLUMNS, TARGET_COLUMN};
use crate::model::{ForestParams, Hyperparams, LogisticParams, ModelKind, Penalty};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Input and artifact locations
    pub data: DataConfig,
    /// Feature derivation layout
    pub features: FeaturesConfig,
    /// Split, search and model grids
    pub training: TrainingConfig,
    /// Score → label / risk level thresholds
    pub risk: RiskConfig,
    pub serving: ServingConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Raw transactions CSV
    pub raw_path: PathBuf,
    /// Directory holding encoding state, model artifacts and the run store
    pub artifacts_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    /// Columns label-encoded into integer codes
    pub categorical_columns: Vec<String>,
    /// Numeric columns min-max scaled into [0, 1]
    pub scaled_columns: Vec<String>,
    /// Categorical columns whose code is replaced by a WoE score
    pub woe_columns: Vec<String>,
    /// Binary label column; only `FraudResult` is supported
    pub target_column: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Held-out fraction for final evaluation
    pub test_fraction: f64,
    pub seed: u64,
    /// Stratified folds used to score each grid candidate
    pub cv_folds: usize,
    /// Model kinds trained by `train`
    pub models: Vec<ModelKind>,
    pub logistic_grid: LogisticGrid,
    pub forest_grid: ForestGrid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticGrid {
    pub c: Vec<f64>,
    pub penalty: Vec<Penalty>,
    pub max_iter: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestGrid {
    pub n_estimators: Vec<usize>,
    /// `None` grows trees until leaves are pure
    pub max_depth: Vec<Option<usize>>,
    pub min_samples_split: Vec<usize>,
    pub min_samples_leaf: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Score at or above this is labelled 1
    pub label_threshold: f64,
    /// Score above this is high risk (0.0–1.0)
    pub high_threshold: f64,
    /// Score above this is medium risk
    pub medium_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServingConfig {
    /// Upper bound on requests scored concurrently
    pub max_concurrent: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data: DataConfig::default(),
            features: FeaturesConfig::default(),
            training: TrainingConfig::default(),
            risk: RiskConfig::default(),
            serving: ServingConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            raw_path: PathBuf::from("data/raw/data.csv"),
            artifacts_dir: PathBuf::from("artifacts"),
        }
    }
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        let names = |cols: &[&str]| cols.iter().map(|c| c.to_string()).collect::<Vec<_>>();
        Self {
            categorical_columns: names(&[
                "CurrencyCode",
                "CountryCode",
                "ProviderId",
                "ProductCategory",
                "ChannelId",
            ]),
            scaled_columns: names(&NUMERIC_COLUMNS),
            woe_columns: names(&["ProductCategory", "ChannelId"]),
            target_column: TARGET_COLUMN.to_string(),
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
            cv_folds: 5,
            models: vec![ModelKind::LogisticRegression, ModelKind::RandomForest],
            logistic_grid: LogisticGrid::default(),
            forest_grid: ForestGrid::default(),
        }
    }
}

impl Default for LogisticGrid {
    fn default() -> Self {
        Self {
            c: vec![0.01, 0.1, 1.0, 10.0, 100.0],
            penalty: vec![Penalty::L1, Penalty::L2],
            max_iter: 1000,
        }
    }
}

impl Default for ForestGrid {
    fn default() -> Self {
        Self {
            n_estimators: vec![50, 100, 200],
            max_depth: vec![None, Some(10), Some(20), Some(30)],
            min_samples_split: vec![2, 5, 10],
            min_samples_leaf: vec![1, 2, 4],
        }
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            label_threshold: 0.5,
            high_threshold: 0.8,
            medium_threshold: 0.5,
        }
    }
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self { max_concurrent: 8 }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

impl LogisticGrid {
    /// Cartesian product of the grid axes, in declaration order.
    pub fn candidates(&self) -> Vec<Hyperparams> {
        let mut out = Vec::with_capacity(self.c.len() * self.penalty.len());
        for &c in &self.c {
            for &penalty in &self.penalty {
                out.push(Hyperparams::Logistic(LogisticParams {
                    c,
                    penalty,
                    max_iter: self.max_iter,
                    ..LogisticParams::default()
                }));
            }
        }
        out
    }
}

impl ForestGrid {
    pub fn candidates(&self, seed: u64) -> Vec<Hyperparams> {
        let mut out = Vec::new();
        for &n_estimators in &self.n_estimators {
            for &max_depth in &self.max_depth {
                for &min_samples_split in &self.min_samples_split {
                    for &min_samples_leaf in &self.min_samples_leaf {
                        out.push(Hyperparams::Forest(ForestParams {
                            n_estimators,
                            max_depth,
                            min_samples_split,
                            min_samples_leaf,
                            seed,
                        }));
                    }
                }
            }
        }
        out
    }
}

impl TrainingConfig {
    /// Hyperparameter grid for one model kind.
    pub fn grid(&self, kind: ModelKind) -> Vec<Hyperparams> {
        match kind {
            ModelKind::LogisticRegression => self.logistic_grid.candidates(),
            ModelKind::RandomForest => self.forest_grid.candidates(self.seed),
        }
    }
}

impl PipelineConfig {
    /// Read the config at `path`. A missing file yields defaults; an
    /// unreadable or malformed one is an error.
    pub fn try_load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Load from JSON file if present; otherwise return default
    pub fn load(path: &Path) -> Self {
        Self::try_load(path).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "invalid config; using defaults");
            Self::default()
        })
    }

    pub fn state_path(&self) -> PathBuf {
        self.data.artifacts_dir.join("encoding_state.json")
    }

    pub fn model_path(&self, kind: ModelKind) -> PathBuf {
        self.data.artifacts_dir.join(format!("{}.json", kind.as_str()))
    }

    pub fn processed_path(&self) -> PathBuf {
        self.data.artifacts_dir.join("processed_data.csv")
    }

    pub fn run_store_path(&self) -> PathBuf {
        self.data.artifacts_dir.join("runs.db")
    }
}
