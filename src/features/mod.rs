//! Feature derivation: raw transaction → aggregate join → temporal extraction →
//! categorical encoding → imputation → min-max scaling → WoE substitution.

mod aggregate;
mod pipeline;
mod temporal;
mod woe;

pub use aggregate::{aggregate_by_account, AggregateFeatureSet};
pub use pipeline::FeaturePipeline;
pub use temporal::TemporalFeatureSet;
pub use woe::{WoeTable, WOE_SMOOTHING};

use crate::error::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

pub const AMOUNT: &str = "Amount";
pub const TOTAL_AMOUNT: &str = "Total_Transaction_Amount";
pub const AVERAGE_AMOUNT: &str = "Average_Transaction_Amount";
pub const TRANSACTION_COUNT: &str = "Transaction_Count";
pub const STD_AMOUNT: &str = "Std_Transaction_Amount";
pub const HOUR: &str = "Transaction_Hour";
pub const DAY: &str = "Transaction_Day";
pub const MONTH: &str = "Transaction_Month";
pub const YEAR: &str = "Transaction_Year";

/// Numeric columns always derived, in vector order.
pub const NUMERIC_COLUMNS: [&str; 9] = [
    AMOUNT,
    TOTAL_AMOUNT,
    AVERAGE_AMOUNT,
    TRANSACTION_COUNT,
    STD_AMOUNT,
    HOUR,
    DAY,
    MONTH,
    YEAR,
];

/// Binary label column; WoE tables are fitted against it.
pub const TARGET_COLUMN: &str = "FraudResult";

/// Category value used to fill missing categorical cells. Unseen values share its code.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Bumped whenever derivation semantics change in a way the layout hash cannot see.
pub const FORMAT_VERSION: &str = "v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    /// Integer category code
    Categorical,
    /// Weight-of-evidence score substituted for the category code
    Evidence,
}

impl ColumnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Numeric => "numeric",
            ColumnKind::Categorical => "categorical",
            ColumnKind::Evidence => "evidence",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
    /// Min-max scaled after imputation
    #[serde(default)]
    pub scaled: bool,
}

/// Ordered, named feature layout decided at fit time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub columns: Vec<ColumnSpec>,
}

impl FeatureSchema {
    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn of_kind(&self, kind: ColumnKind) -> impl Iterator<Item = &ColumnSpec> {
        self.columns.iter().filter(move |c| c.kind == kind)
    }

    /// Columns holding category codes before WoE substitution (categorical + evidence).
    pub fn category_columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns.iter().filter(|c| c.kind != ColumnKind::Numeric)
    }

    pub fn scaled_columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns.iter().filter(|c| c.scaled)
    }

    /// Version marker binding encoding state and models to this exact layout.
    pub fn tag(&self) -> SchemaTag {
        let mut h = Sha256::new();
        for c in &self.columns {
            h.update(c.name.as_bytes());
            h.update(b":");
            h.update(c.kind.as_str().as_bytes());
            if c.scaled {
                h.update(b":scaled");
            }
            h.update(b"\n");
        }
        let digest = format!("{:x}", h.finalize());
        SchemaTag(format!("{}:{}", FORMAT_VERSION, &digest[..16]))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaTag(pub String);

impl SchemaTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchemaTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fixed-order numeric model input for one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub transaction_id: String,
    pub columns: Arc<[String]>,
    pub values: Vec<f64>,
}

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| self.values[i])
    }
}

/// Write derived vectors (and labels when present) as CSV with a header row.
pub fn export_csv(
    vectors: &[FeatureVector],
    labels: Option<(&str, &[u8])>,
    path: &Path,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut writer = csv::Writer::from_path(path)?;
    if let Some(first) = vectors.first() {
        let mut header = vec!["TransactionId".to_string()];
        header.extend(first.columns.iter().cloned());
        if let Some((target, _)) = labels {
            header.push(target.to_string());
        }
        writer.write_record(&header)?;
    }
    for (i, v) in vectors.iter().enumerate() {
        let mut row = Vec::with_capacity(v.len() + 2);
        row.push(v.transaction_id.clone());
        row.extend(v.values.iter().map(|x| x.to_string()));
        if let Some((_, ys)) = labels {
            row.push(ys.get(i).map(|y| y.to_string()).unwrap_or_default());
        }
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// One derived cell while a record moves through the derivation steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Cell {
    Missing,
    Number(f64),
}

impl Cell {
    pub(crate) fn from_option(v: Option<f64>) -> Self {
        match v {
            Some(x) if x.is_finite() => Cell::Number(x),
            _ => Cell::Missing,
        }
    }
}
