//! Frozen parameters fitted at training time and replayed unchanged at serving time.

pub(crate) mod store;

pub use store::EncodingStateStore;

use crate::features::{AggregateFeatureSet, FeatureSchema, SchemaTag, WoeTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label-encoder mapping for one categorical column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCodes {
    /// Raw value → code, assigned in sorted value order
    pub codes: BTreeMap<String, u32>,
    /// Code shared by the "Unknown" fill value and by values unseen at fit time
    pub unknown_code: u32,
}

impl CategoryCodes {
    pub fn code(&self, value: &str) -> Option<u32> {
        self.codes.get(value).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub min: f64,
    pub max: f64,
}

impl ScalerParams {
    /// Min-max scale, clamped to [0, 1]. A constant column maps to 0.
    pub fn scale(&self, x: f64) -> f64 {
        let range = self.max - self.min;
        if range <= 0.0 {
            return 0.0;
        }
        ((x - self.min) / range).clamp(0.0, 1.0)
    }
}

/// Value substituted for a missing cell, by declared column type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FillValue {
    /// Column mean at fit time
    Numeric(f64),
    Category(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingState {
    pub schema_tag: SchemaTag,
    pub schema: FeatureSchema,
    pub category_codes: BTreeMap<String, CategoryCodes>,
    pub scaler_params: BTreeMap<String, ScalerParams>,
    pub impute_fill: BTreeMap<String, FillValue>,
    /// Keyed by column; each table records the target it was fitted against
    pub woe_tables: BTreeMap<String, WoeTable>,
    /// Per-account aggregates of the fitting batch
    pub account_aggregates: BTreeMap<String, AggregateFeatureSet>,
}

impl EncodingState {
    pub fn feature_names(&self) -> Vec<String> {
        self.schema.names()
    }

    /// Information value per WoE column.
    pub fn information_values(&self) -> BTreeMap<&str, f64> {
        self.woe_tables
            .iter()
            .map(|(col, t)| (col.as_str(), t.information_value))
            .collect()
    }
}
