//! Delimited-text loader for raw transactions.

use super::{RawDataset, RawTransaction};
use crate::error::{PipelineError, Result};
use csv::{ReaderBuilder, StringRecord};
use std::path::Path;
use tracing::{debug, info};

/// Columns every input file must carry (extra columns are ignored).
pub const REQUIRED_COLUMNS: [&str; 11] = [
    "TransactionId",
    "CustomerId",
    "AccountId",
    "Amount",
    "CurrencyCode",
    "CountryCode",
    "ProviderId",
    "ProductCategory",
    "ChannelId",
    "FraudResult",
    "TransactionStartTime",
];

struct ColumnIndex([usize; 11]);

impl ColumnIndex {
    fn resolve(headers: &StringRecord) -> Result<Self> {
        let mut idx = [0usize; 11];
        for (slot, name) in idx.iter_mut().zip(REQUIRED_COLUMNS) {
            *slot = headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| PipelineError::MissingColumn(name.to_string()))?;
        }
        Ok(Self(idx))
    }

    fn get<'r>(&self, record: &'r StringRecord, column: usize) -> &'r str {
        record.get(self.0[column]).map(str::trim).unwrap_or("")
    }
}

/// Read a raw transaction file. Fails on a missing path, missing required
/// columns, or a structurally malformed row; unparsable amounts become missing.
pub fn load(path: &Path) -> Result<RawDataset> {
    if !path.exists() {
        return Err(PipelineError::NotFound(path.to_path_buf()));
    }
    let mut reader = ReaderBuilder::new().from_path(path)?;
    let headers = reader.headers()?.clone();
    let columns = ColumnIndex::resolve(&headers)?;

    let mut rows = Vec::new();
    let mut coerced = 0usize;
    for (i, record) in reader.records().enumerate() {
        let line = i + 2;
        let record = record.map_err(|e| PipelineError::Parse {
            line,
            message: e.to_string(),
        })?;
        let tx = parse_row(&columns, &record, line, &mut coerced)?;
        rows.push(tx);
    }

    if coerced > 0 {
        debug!(coerced, "non-numeric amounts marked missing");
    }
    info!(
        path = %path.display(),
        rows = rows.len(),
        columns = headers.len(),
        "loaded raw transactions"
    );
    RawDataset::new(rows)
}

fn parse_row(
    columns: &ColumnIndex,
    record: &StringRecord,
    line: usize,
    coerced: &mut usize,
) -> Result<RawTransaction> {
    let transaction_id = columns.get(record, 0);
    if transaction_id.is_empty() {
        return Err(PipelineError::Parse {
            line,
            message: "empty TransactionId".to_string(),
        });
    }

    let raw_amount = columns.get(record, 3);
    let amount = match raw_amount.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => {
            *coerced += 1;
            None
        }
    };

    let fraud_result = match columns.get(record, 9) {
        "0" => 0,
        "1" => 1,
        other => {
            return Err(PipelineError::Parse {
                line,
                message: format!("FraudResult must be 0 or 1, got {:?}", other),
            })
        }
    };

    Ok(RawTransaction {
        transaction_id: transaction_id.to_string(),
        customer_id: columns.get(record, 1).to_string(),
        account_id: columns.get(record, 2).to_string(),
        amount,
        currency_code: columns.get(record, 4).to_string(),
        country_code: columns.get(record, 5).to_string(),
        provider_id: columns.get(record, 6).to_string(),
        product_category: columns.get(record, 7).to_string(),
        channel_id: columns.get(record, 8).to_string(),
        fraud_result: Some(fraud_result),
        transaction_start_time: columns.get(record, 10).to_string(),
    })
}
