//! Per-account aggregate statistics joined back onto each transaction.

use crate::data::{RawDataset, RawTransaction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregates over the non-missing amounts of one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateFeatureSet {
    pub total_amount: f64,
    /// `None` when the account has no usable amount
    pub average_amount: Option<f64>,
    pub count: u64,
    /// Sample standard deviation; `None` below two observations
    pub stddev_amount: Option<f64>,
}

impl AggregateFeatureSet {
    pub fn from_amounts<I: IntoIterator<Item = f64>>(amounts: I) -> Self {
        let values: Vec<f64> = amounts.into_iter().collect();
        let count = values.len();
        let total: f64 = values.iter().sum();
        let average = (count > 0).then(|| total / count as f64);
        let stddev = match average {
            Some(mean) if count > 1 => {
                let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
                Some((ss / (count - 1) as f64).sqrt())
            }
            _ => None,
        };
        Self {
            total_amount: total,
            average_amount: average,
            count: count as u64,
            stddev_amount: stddev,
        }
    }

    /// Aggregates for an account never seen at fit time: the record alone.
    pub fn from_single(tx: &RawTransaction) -> Self {
        Self::from_amounts(tx.amount)
    }
}

/// Group by `account_id` and aggregate each group's amounts.
pub fn aggregate_by_account(dataset: &RawDataset) -> BTreeMap<String, AggregateFeatureSet> {
    dataset
        .by_account()
        .into_iter()
        .map(|(account, txs)| {
            let stats = AggregateFeatureSet::from_amounts(txs.iter().filter_map(|t| t.amount));
            (account.to_string(), stats)
        })
        .collect()
}
