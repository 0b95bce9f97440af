//! Raw transaction records as ingested from the source system.

mod loader;

pub use loader::{load, REQUIRED_COLUMNS};

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// One ingested transaction. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    #[serde(alias = "TransactionId")]
    pub transaction_id: String,
    #[serde(alias = "CustomerId")]
    pub customer_id: String,
    #[serde(alias = "AccountId")]
    pub account_id: String,
    /// `None` when the source cell was empty or not a number. The key itself
    /// is required on requests; only an explicit `null` deserializes to `None`.
    #[serde(alias = "Amount", deserialize_with = "required_amount")]
    pub amount: Option<f64>,
    #[serde(alias = "CurrencyCode")]
    pub currency_code: String,
    #[serde(alias = "CountryCode")]
    pub country_code: String,
    #[serde(alias = "ProviderId")]
    pub provider_id: String,
    #[serde(alias = "ProductCategory")]
    pub product_category: String,
    #[serde(alias = "ChannelId")]
    pub channel_id: String,
    /// Label; absent on scoring requests
    #[serde(default, alias = "FraudResult", skip_serializing_if = "Option::is_none")]
    pub fraud_result: Option<u8>,
    /// Kept as text; parsed during temporal extraction
    #[serde(alias = "TransactionStartTime")]
    pub transaction_start_time: String,
}

fn required_amount<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<f64>::deserialize(deserializer)
}

impl RawTransaction {
    /// Look up a categorical/identifier field by its source column name.
    pub fn field(&self, column: &str) -> Option<&str> {
        let value = match column {
            "TransactionId" => &self.transaction_id,
            "CustomerId" => &self.customer_id,
            "AccountId" => &self.account_id,
            "CurrencyCode" => &self.currency_code,
            "CountryCode" => &self.country_code,
            "ProviderId" => &self.provider_id,
            "ProductCategory" => &self.product_category,
            "ChannelId" => &self.channel_id,
            "TransactionStartTime" => &self.transaction_start_time,
            _ => return None,
        };
        Some(value.as_str())
    }
}

/// Ordered transactions keyed by unique `transaction_id`.
#[derive(Debug, Clone, Default)]
pub struct RawDataset {
    rows: Vec<RawTransaction>,
    index: HashMap<String, usize>,
}

impl RawDataset {
    /// Build from rows, rejecting duplicate transaction ids.
    pub fn new(rows: Vec<RawTransaction>) -> Result<Self> {
        let mut index = HashMap::with_capacity(rows.len());
        for (i, tx) in rows.iter().enumerate() {
            if index.insert(tx.transaction_id.clone(), i).is_some() {
                return Err(PipelineError::Parse {
                    line: i + 2,
                    message: format!("duplicate transaction id {}", tx.transaction_id),
                });
            }
        }
        Ok(Self { rows, index })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RawTransaction> {
        self.rows.iter()
    }

    pub fn rows(&self) -> &[RawTransaction] {
        &self.rows
    }

    pub fn get(&self, transaction_id: &str) -> Option<&RawTransaction> {
        self.index.get(transaction_id).map(|&i| &self.rows[i])
    }

    pub fn accounts(&self) -> BTreeSet<&str> {
        self.rows.iter().map(|t| t.account_id.as_str()).collect()
    }

    pub fn customers(&self) -> BTreeSet<&str> {
        self.rows.iter().map(|t| t.customer_id.as_str()).collect()
    }

    pub fn by_account(&self) -> BTreeMap<&str, Vec<&RawTransaction>> {
        let mut groups: BTreeMap<&str, Vec<&RawTransaction>> = BTreeMap::new();
        for tx in &self.rows {
            groups.entry(tx.account_id.as_str()).or_default().push(tx);
        }
        groups
    }

    pub fn by_customer(&self) -> BTreeMap<&str, Vec<&RawTransaction>> {
        let mut groups: BTreeMap<&str, Vec<&RawTransaction>> = BTreeMap::new();
        for tx in &self.rows {
            groups.entry(tx.customer_id.as_str()).or_default().push(tx);
        }
        groups
    }

    /// Labels in row order. Unlabelled rows are an error: fitting needs every label.
    pub fn labels(&self) -> Result<Vec<u8>> {
        self.rows
            .iter()
            .enumerate()
            .map(|(i, tx)| {
                tx.fraud_result.ok_or_else(|| PipelineError::Parse {
                    line: i + 2,
                    message: format!("transaction {} has no label", tx.transaction_id),
                })
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a RawDataset {
    type Item = &'a RawTransaction;
    type IntoIter = std::slice::Iter<'a, RawTransaction>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Fraction of labelled transactions flagged as fraud/default.
pub fn default_rate(dataset: &RawDataset) -> Result<f64> {
    let labels = dataset.labels()?;
    if labels.is_empty() {
        return Err(PipelineError::EmptyDataset);
    }
    let positives = labels.iter().filter(|&&y| y == 1).count();
    Ok(positives as f64 / labels.len() as f64)
}
