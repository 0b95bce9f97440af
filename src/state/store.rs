//! JSON persistence for [`EncodingState`], guarded by the schema tag.

use super::EncodingState;
use crate::error::{PipelineError, Result};
use crate::features::SchemaTag;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

pub struct EncodingStateStore;

impl EncodingStateStore {
    pub fn save(state: &EncodingState, path: &Path) -> Result<()> {
        write_json_atomic(state, path)?;
        info!(path = %path.display(), schema = %state.schema_tag, "encoding state saved");
        Ok(())
    }

    /// Load and check the stored tag against the tag the running engine expects.
    pub fn load(path: &Path, expected: &SchemaTag) -> Result<EncodingState> {
        let state: EncodingState = read_json(path)?;
        if &state.schema_tag != expected {
            return Err(PipelineError::IncompatibleState {
                expected: expected.to_string(),
                found: state.schema_tag.to_string(),
            });
        }
        info!(path = %path.display(), schema = %state.schema_tag, "encoding state loaded");
        Ok(state)
    }
}

/// Serialize to a sibling temp file, then rename over `path`.
pub(crate) fn write_json_atomic<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);
    {
        let mut w = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer_pretty(&mut w, value)?;
        w.flush()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(PipelineError::NotFound(path.to_path_buf()));
    }
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}
