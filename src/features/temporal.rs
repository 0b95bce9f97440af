//! Calendar fields extracted from the transaction start time.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"];

/// Hour/day/month/year of a transaction; all `None` when the timestamp is unparsable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalFeatureSet {
    pub hour: Option<u32>,
    pub day: Option<u32>,
    pub month: Option<u32>,
    pub year: Option<i32>,
}

impl TemporalFeatureSet {
    pub fn extract(raw: &str) -> Self {
        match parse_timestamp(raw) {
            Some(ts) => Self {
                hour: Some(ts.hour()),
                day: Some(ts.day()),
                month: Some(ts.month()),
                year: Some(ts.year()),
            },
            None => Self::default(),
        }
    }

    pub fn is_missing(&self) -> bool {
        self.year.is_none()
    }
}

/// Offset-aware stamps are normalized to UTC; naive stamps are taken as UTC.
fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
