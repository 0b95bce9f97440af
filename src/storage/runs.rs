//! SQLite-backed run store. One row per trained model.

use crate::error::{PipelineError, Result};
use crate::model::{Hyperparams, ModelKind};
use crate::training::{Metrics, TrainingOutcome};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub trained_at: DateTime<Utc>,
    pub model: ModelKind,
    pub schema_tag: String,
    pub params: Hyperparams,
    /// Mean cross-validated ROC-AUC of the selected candidate
    pub cv_score: f64,
    pub metrics: Metrics,
}

impl RunRecord {
    pub fn from_outcome(outcome: &TrainingOutcome) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            trained_at: outcome.artifact.trained_at,
            model: outcome.artifact.kind,
            schema_tag: outcome.artifact.schema_tag.as_str().to_string(),
            params: outcome.artifact.params.clone(),
            cv_score: outcome.cv_score,
            metrics: outcome.metrics,
        }
    }
}

type RunRow = (String, String, String, String, String, f64, f64, f64, f64, f64, f64);

const SELECT_RUN: &str = "SELECT run_id, trained_at, model, schema_tag, params, cv_score, \
     accuracy, precision, recall, f1, roc_auc FROM runs";

pub struct RunStore {
    conn: Mutex<Connection>,
}

impl RunStore {
    /// Open or create the DB at path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                run_id TEXT PRIMARY KEY,
                ts INTEGER NOT NULL,
                trained_at TEXT NOT NULL,
                model TEXT NOT NULL,
                schema_tag TEXT NOT NULL,
                params TEXT NOT NULL,
                cv_score REAL NOT NULL,
                accuracy REAL NOT NULL,
                precision REAL NOT NULL,
                recall REAL NOT NULL,
                f1 REAL NOT NULL,
                roc_auc REAL NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_runs_ts ON runs(ts);
            "#,
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert_run(&self, run: &RunRecord) -> Result<()> {
        let params_json = serde_json::to_string(&run.params)?;
        self.conn().execute(
            "INSERT OR REPLACE INTO runs (run_id, ts, trained_at, model, schema_tag, params, cv_score, \
             accuracy, precision, recall, f1, roc_auc) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                run.run_id.to_string(),
                run.trained_at.timestamp_millis(),
                run.trained_at.to_rfc3339(),
                run.model.as_str(),
                run.schema_tag,
                params_json,
                run.cv_score,
                run.metrics.accuracy,
                run.metrics.precision,
                run.metrics.recall,
                run.metrics.f1,
                run.metrics.roc_auc,
            ],
        )?;
        tracing::debug!(run_id = %run.run_id, model = %run.model, "training run recorded");
        Ok(())
    }

    pub fn get_run(&self, run_id: &Uuid) -> Result<Option<RunRecord>> {
        let row = self
            .conn()
            .query_row(&format!("{SELECT_RUN} WHERE run_id = ?1"), params![run_id.to_string()], read_row)
            .optional()?;
        row.map(decode).transpose()
    }

    /// Most recent runs first.
    pub fn list_runs(&self, limit: usize) -> Result<Vec<RunRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("{SELECT_RUN} ORDER BY ts DESC, rowid DESC LIMIT ?1"))?;
        let rows = stmt
            .query_map(params![limit as i64], read_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(decode).collect()
    }

    /// Best held-out ROC-AUC recorded for a model kind.
    pub fn best_run(&self, model: ModelKind) -> Result<Option<RunRecord>> {
        let row = self
            .conn()
            .query_row(
                &format!("{SELECT_RUN} WHERE model = ?1 ORDER BY roc_auc DESC, ts DESC LIMIT 1"),
                params![model.as_str()],
                read_row,
            )
            .optional()?;
        row.map(decode).transpose()
    }

    /// Retention: delete runs trained before the given time.
    pub fn prune_before(&self, before: DateTime<Utc>) -> Result<u64> {
        let n = self
            .conn()
            .execute("DELETE FROM runs WHERE ts < ?1", params![before.timestamp_millis()])?;
        Ok(n as u64)
    }
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RunRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
    ))
}

fn decode(row: RunRow) -> Result<RunRecord> {
    let (run_id, trained_at, model, schema_tag, params, cv_score, accuracy, precision, recall, f1, roc_auc) = row;
    let corrupt = |field: &str, e: &dyn std::fmt::Display| PipelineError::Parse {
        line: 0,
        message: format!("run store column {field}: {e}"),
    };
    Ok(RunRecord {
        run_id: Uuid::parse_str(&run_id).map_err(|e| corrupt("run_id", &e))?,
        trained_at: DateTime::parse_from_rfc3339(&trained_at)
            .map_err(|e| corrupt("trained_at", &e))?
            .with_timezone(&Utc),
        model: model.parse::<ModelKind>().map_err(|e| corrupt("model", &e))?,
        schema_tag,
        params: serde_json::from_str(&params)?,
        cv_score,
        metrics: Metrics {
            accuracy,
            precision,
            recall,
            f1,
            roc_auc,
        },
    })
}
