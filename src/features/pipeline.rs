//! Feature pipeline: one set of derivation steps shared by fit and apply mode.
//!
//! Steps run in a fixed order because later steps read columns produced by
//! earlier ones: (1) aggregate join, (2) temporal extraction, (3) categorical
//! encoding, (4) imputation, (5) min-max scaling, (6) WoE substitution.

use super::{
    aggregate_by_account, AggregateFeatureSet, Cell, ColumnKind, ColumnSpec, FeatureSchema,
    FeatureVector, SchemaTag, TemporalFeatureSet, WoeTable, AMOUNT, AVERAGE_AMOUNT, DAY, HOUR,
    MONTH, NUMERIC_COLUMNS, STD_AMOUNT, TARGET_COLUMN, TOTAL_AMOUNT, TRANSACTION_COUNT, UNKNOWN_CATEGORY, YEAR,
};
use crate::config::FeaturesConfig;
use crate::data::{RawDataset, RawTransaction};
use crate::error::{PipelineError, Result};
use crate::state::{CategoryCodes, EncodingState, FillValue, ScalerParams};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Source columns that may be declared categorical.
const CATEGORY_SOURCES: [&str; 5] = [
    "CurrencyCode",
    "CountryCode",
    "ProviderId",
    "ProductCategory",
    "ChannelId",
];

/// Named cells of one transaction while it moves through the steps.
struct Record<'a> {
    tx: &'a RawTransaction,
    cells: HashMap<&'a str, Cell>,
}

impl<'a> Record<'a> {
    fn new(tx: &'a RawTransaction) -> Self {
        Self {
            tx,
            cells: HashMap::with_capacity(16),
        }
    }

    fn set(&mut self, column: &'a str, cell: Cell) {
        self.cells.insert(column, cell);
    }

    fn number(&self, column: &str) -> Option<f64> {
        match self.cells.get(column) {
            Some(Cell::Number(x)) => Some(*x),
            _ => None,
        }
    }
}

pub struct FeaturePipeline {
    schema: FeatureSchema,
    tag: SchemaTag,
    names: Arc<[String]>,
    target: String,
}

impl FeaturePipeline {
    /// Build the column layout from configuration.
    pub fn new(config: &FeaturesConfig) -> Result<Self> {
        if config.target_column != TARGET_COLUMN {
            return Err(PipelineError::MissingColumn(config.target_column.clone()));
        }
        for col in &config.scaled_columns {
            if !NUMERIC_COLUMNS.contains(&col.as_str()) {
                return Err(PipelineError::MissingColumn(col.clone()));
            }
        }
        for col in &config.categorical_columns {
            if !CATEGORY_SOURCES.contains(&col.as_str()) {
                return Err(PipelineError::MissingColumn(col.clone()));
            }
        }
        for col in &config.woe_columns {
            if !config.categorical_columns.contains(col) {
                return Err(PipelineError::MissingColumn(col.clone()));
            }
        }

        let mut columns: Vec<ColumnSpec> = NUMERIC_COLUMNS
            .iter()
            .map(|&name| ColumnSpec {
                name: name.to_string(),
                kind: ColumnKind::Numeric,
                scaled: config.scaled_columns.iter().any(|c| c == name),
            })
            .collect();
        columns.extend(config.categorical_columns.iter().map(|name| ColumnSpec {
            name: name.clone(),
            kind: if config.woe_columns.contains(name) {
                ColumnKind::Evidence
            } else {
                ColumnKind::Categorical
            },
            scaled: false,
        }));

        let schema = FeatureSchema { columns };
        let tag = schema.tag();
        let names: Arc<[String]> = schema.names().into();
        Ok(Self {
            schema,
            tag,
            names,
            target: config.target_column.clone(),
        })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Tag every state and model produced by this pipeline carries.
    pub fn schema_tag(&self) -> &SchemaTag {
        &self.tag
    }

    pub fn feature_names(&self) -> &[String] {
        &self.names
    }

    pub fn feature_count(&self) -> usize {
        self.names.len()
    }

    /// Fit every encoding parameter on `dataset` and return its derived vectors.
    pub fn fit_transform(&self, dataset: &RawDataset) -> Result<(Vec<FeatureVector>, EncodingState)> {
        if dataset.is_empty() {
            return Err(PipelineError::EmptyDataset);
        }
        let labels = dataset.labels()?;
        info!(rows = dataset.len(), schema = %self.tag, "fitting feature pipeline");

        debug!("creating aggregate features");
        let account_aggregates = aggregate_by_account(dataset);
        let mut records = Vec::with_capacity(dataset.len());
        for tx in dataset {
            let mut rec = Record::new(tx);
            self.join_aggregates(&mut rec, &account_aggregates);
            self.extract_temporal(&mut rec);
            records.push(rec);
        }
        let missing_amounts = records.iter().filter(|r| r.tx.amount.is_none()).count();
        if missing_amounts > 0 {
            debug!(missing_amounts, "amounts to impute");
        }

        debug!("encoding categorical variables");
        let category_codes = self.fit_category_codes(dataset)?;
        for rec in &mut records {
            self.encode_categories(rec, &category_codes)?;
        }

        debug!("handling missing values");
        let impute_fill = self.fit_impute(&records);
        for rec in &mut records {
            self.impute(rec, &impute_fill, &category_codes)?;
        }

        debug!("normalizing numerical features");
        let scaler_params = self.fit_scalers(&records);
        for rec in &mut records {
            self.normalize(rec, &scaler_params)?;
        }

        debug!("calculating weight of evidence");
        let woe_tables = self.fit_woe(dataset, &labels);
        for (column, table) in &woe_tables {
            info!(column = %column, iv = table.information_value, "information value");
        }
        for rec in &mut records {
            self.substitute_woe(rec, &woe_tables)?;
        }

        let vectors = records
            .iter()
            .map(|rec| self.assemble(rec))
            .collect::<Result<Vec<_>>>()?;

        let state = EncodingState {
            schema_tag: self.tag.clone(),
            schema: self.schema.clone(),
            category_codes,
            scaler_params,
            impute_fill,
            woe_tables,
            account_aggregates,
        };
        info!(rows = vectors.len(), features = self.feature_count(), "feature pipeline fitted");
        Ok((vectors, state))
    }

    /// Derive one record's vector using only the record and the frozen state.
    pub fn transform(&self, tx: &RawTransaction, state: &EncodingState) -> Result<FeatureVector> {
        self.check_state(state)?;
        self.apply(tx, state)
    }

    pub fn transform_batch(&self, dataset: &RawDataset, state: &EncodingState) -> Result<Vec<FeatureVector>> {
        self.check_state(state)?;
        dataset.iter().map(|tx| self.apply(tx, state)).collect()
    }

    fn check_state(&self, state: &EncodingState) -> Result<()> {
        if state.schema_tag != self.tag || state.schema != self.schema {
            return Err(PipelineError::IncompatibleState {
                expected: self.tag.to_string(),
                found: state.schema_tag.to_string(),
            });
        }
        Ok(())
    }

    fn apply(&self, tx: &RawTransaction, state: &EncodingState) -> Result<FeatureVector> {
        let mut rec = Record::new(tx);
        self.join_aggregates(&mut rec, &state.account_aggregates);
        self.extract_temporal(&mut rec);
        self.encode_categories(&mut rec, &state.category_codes)?;
        self.impute(&mut rec, &state.impute_fill, &state.category_codes)?;
        self.normalize(&mut rec, &state.scaler_params)?;
        self.substitute_woe(&mut rec, &state.woe_tables)?;
        self.assemble(&rec)
    }

    // (1)
    fn join_aggregates<'a>(
        &self,
        rec: &mut Record<'a>,
        table: &BTreeMap<String, AggregateFeatureSet>,
    ) {
        let stats = match table.get(&rec.tx.account_id) {
            Some(s) => Cow::Borrowed(s),
            None => Cow::Owned(AggregateFeatureSet::from_single(rec.tx)),
        };
        rec.set(AMOUNT, Cell::from_option(rec.tx.amount));
        rec.set(TOTAL_AMOUNT, Cell::Number(stats.total_amount));
        rec.set(AVERAGE_AMOUNT, Cell::from_option(stats.average_amount));
        rec.set(TRANSACTION_COUNT, Cell::Number(stats.count as f64));
        rec.set(STD_AMOUNT, Cell::from_option(stats.stddev_amount));
    }

    // (2)
    fn extract_temporal(&self, rec: &mut Record<'_>) {
        let t = TemporalFeatureSet::extract(&rec.tx.transaction_start_time);
        rec.set(HOUR, Cell::from_option(t.hour.map(f64::from)));
        rec.set(DAY, Cell::from_option(t.day.map(f64::from)));
        rec.set(MONTH, Cell::from_option(t.month.map(f64::from)));
        rec.set(YEAR, Cell::from_option(t.year.map(f64::from)));
    }

    // (3)
    fn encode_categories<'a>(
        &'a self,
        rec: &mut Record<'a>,
        codes: &BTreeMap<String, CategoryCodes>,
    ) -> Result<()> {
        for col in self.schema.category_columns() {
            let raw = raw_category(rec.tx, &col.name)?;
            if raw.is_empty() {
                rec.set(&col.name, Cell::Missing);
                continue;
            }
            let map = codes
                .get(&col.name)
                .ok_or_else(|| PipelineError::MissingColumn(col.name.clone()))?;
            let code = match map.code(raw) {
                Some(c) => c,
                None => {
                    warn!(
                        column = %col.name,
                        value = %raw,
                        transaction_id = %rec.tx.transaction_id,
                        "unseen category mapped to unknown code"
                    );
                    map.unknown_code
                }
            };
            rec.set(&col.name, Cell::Number(f64::from(code)));
        }
        Ok(())
    }

    // (4)
    fn impute(
        &self,
        rec: &mut Record<'_>,
        fills: &BTreeMap<String, FillValue>,
        codes: &BTreeMap<String, CategoryCodes>,
    ) -> Result<()> {
        for (column, cell) in rec.cells.iter_mut() {
            if *cell != Cell::Missing {
                continue;
            }
            let fill = fills
                .get(*column)
                .ok_or_else(|| PipelineError::MissingColumn(column.to_string()))?;
            *cell = match fill {
                FillValue::Numeric(v) => Cell::Number(*v),
                FillValue::Category(value) => {
                    let map = codes
                        .get(*column)
                        .ok_or_else(|| PipelineError::MissingColumn(column.to_string()))?;
                    Cell::Number(f64::from(map.code(value).unwrap_or(map.unknown_code)))
                }
            };
        }
        Ok(())
    }

    // (5)
    fn normalize(&self, rec: &mut Record<'_>, scalers: &BTreeMap<String, ScalerParams>) -> Result<()> {
        for col in self.schema.scaled_columns() {
            let params = scalers
                .get(&col.name)
                .ok_or_else(|| PipelineError::MissingColumn(col.name.clone()))?;
            if let Some(Cell::Number(x)) = rec.cells.get_mut(col.name.as_str()) {
                *x = params.scale(*x);
            }
        }
        Ok(())
    }

    // (6)
    fn substitute_woe<'a>(&'a self, rec: &mut Record<'a>, tables: &BTreeMap<String, WoeTable>) -> Result<()> {
        for col in self.schema.of_kind(ColumnKind::Evidence) {
            let table = tables
                .get(&col.name)
                .ok_or_else(|| PipelineError::MissingColumn(col.name.clone()))?;
            let raw = woe_key(raw_category(rec.tx, &col.name)?);
            rec.set(&col.name, Cell::Number(table.score_or_neutral(raw)));
        }
        Ok(())
    }

    fn assemble(&self, rec: &Record<'_>) -> Result<FeatureVector> {
        let values = self
            .names
            .iter()
            .map(|name| {
                rec.number(name)
                    .ok_or_else(|| PipelineError::MissingColumn(name.clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(FeatureVector {
            transaction_id: rec.tx.transaction_id.clone(),
            columns: Arc::clone(&self.names),
            values,
        })
    }

    fn fit_category_codes(&self, dataset: &RawDataset) -> Result<BTreeMap<String, CategoryCodes>> {
        let mut out = BTreeMap::new();
        for col in self.schema.category_columns() {
            let mut universe: BTreeSet<&str> = BTreeSet::new();
            universe.insert(UNKNOWN_CATEGORY);
            for tx in dataset {
                let raw = raw_category(tx, &col.name)?;
                if !raw.is_empty() {
                    universe.insert(raw);
                }
            }
            let codes: BTreeMap<String, u32> = universe
                .into_iter()
                .enumerate()
                .map(|(i, v)| (v.to_string(), i as u32))
                .collect();
            let unknown_code = codes.get(UNKNOWN_CATEGORY).copied().unwrap_or_default();
            debug!(column = %col.name, categories = codes.len(), "category codes fitted");
            out.insert(col.name.clone(), CategoryCodes { codes, unknown_code });
        }
        Ok(out)
    }

    /// Numeric columns fill with their fitted mean; category columns with "Unknown".
    fn fit_impute(&self, records: &[Record<'_>]) -> BTreeMap<String, FillValue> {
        let mut out = BTreeMap::new();
        for col in &self.schema.columns {
            let fill = match col.kind {
                ColumnKind::Numeric => {
                    let present: Vec<f64> = records.iter().filter_map(|r| r.number(&col.name)).collect();
                    let mean = if present.is_empty() {
                        0.0
                    } else {
                        present.iter().sum::<f64>() / present.len() as f64
                    };
                    FillValue::Numeric(mean)
                }
                ColumnKind::Categorical | ColumnKind::Evidence => {
                    FillValue::Category(UNKNOWN_CATEGORY.to_string())
                }
            };
            out.insert(col.name.clone(), fill);
        }
        out
    }

    fn fit_scalers(&self, records: &[Record<'_>]) -> BTreeMap<String, ScalerParams> {
        let mut out = BTreeMap::new();
        for col in self.schema.scaled_columns() {
            let (min, max) = records
                .iter()
                .filter_map(|r| r.number(&col.name))
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| (lo.min(x), hi.max(x)));
            let params = if min.is_finite() && max.is_finite() {
                ScalerParams { min, max }
            } else {
                ScalerParams { min: 0.0, max: 0.0 }
            };
            out.insert(col.name.clone(), params);
        }
        out
    }

    fn fit_woe(&self, dataset: &RawDataset, labels: &[u8]) -> BTreeMap<String, WoeTable> {
        self.schema
            .of_kind(ColumnKind::Evidence)
            .map(|col| {
                let pairs = dataset.iter().zip(labels.iter()).map(|(tx, &y)| {
                    let raw = tx.field(&col.name).unwrap_or("");
                    (woe_key(raw), y)
                });
                (col.name.clone(), WoeTable::fit(&self.target, pairs))
            })
            .collect()
    }
}

fn raw_category<'t>(tx: &'t RawTransaction, column: &str) -> Result<&'t str> {
    tx.field(column)
        .map(str::trim)
        .ok_or_else(|| PipelineError::MissingColumn(column.to_string()))
}

/// Missing categorical values are scored under the "Unknown" fill value.
fn woe_key(raw: &str) -> &str {
    let raw = raw.trim();
    if raw.is_empty() {
        UNKNOWN_CATEGORY
    } else {
        raw
    }
}
