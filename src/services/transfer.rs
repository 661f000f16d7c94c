//! Timer import/export files
//!
//! An export is a JSON array of timer snapshots in the persisted shape. An
//! import file must hold a JSON array of the same shape; individual records
//! are validated by the store, not here.

use std::path::{Path, PathBuf};
use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use tokio::fs;
use tracing::info;

use crate::state::TimerSnapshot;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Failed to access timer file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Timer file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Timer file must contain a JSON array of timers")]
    NotAnArray,

    #[error("There are no timers to export")]
    NothingToExport,
}

/// Write `timers` to a new `timer_configs_<epoch-ms>.json` file in `dir`
pub async fn export_timers(dir: &Path, timers: &[TimerSnapshot]) -> Result<PathBuf, TransferError> {
    if timers.is_empty() {
        return Err(TransferError::NothingToExport);
    }

    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| TransferError::Io { path, source }
    };

    fs::create_dir_all(dir).await.map_err(io_err(dir))?;

    let path = dir.join(format!("timer_configs_{}.json", Utc::now().timestamp_millis()));
    let json = serde_json::to_string_pretty(timers)?;
    fs::write(&path, json).await.map_err(io_err(&path))?;

    info!("Exported {} timers to {}", timers.len(), path.display());
    Ok(path)
}

/// Parse import file contents into raw timer records
pub fn parse_import(contents: &str) -> Result<Vec<Value>, TransferError> {
    match serde_json::from_str(contents)? {
        Value::Array(records) => Ok(records),
        _ => Err(TransferError::NotAnArray),
    }
}

/// Read raw timer records from an import file
pub async fn read_import_file(path: &Path) -> Result<Vec<Value>, TransferError> {
    let contents = fs::read_to_string(path).await.map_err(|source| TransferError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_import(&contents)
}
