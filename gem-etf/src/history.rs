//! Append-only CSV log of monthly decisions.
//!
//! One row per run. The header is written only when the file is new or
//! empty; existing rows are never rewritten.

use chrono::{DateTime, NaiveDate, Utc};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::data::AssetKey;
use crate::strategy::{Decision, Mode};

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("History IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("History CSV error on {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// One line of the decision log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Analysis date the decision was measured at
    pub date: NaiveDate,
    pub selected_asset: AssetKey,
    pub ticker: String,
    pub mode: Mode,
    pub momentum_us: f64,
    pub momentum_exus: f64,
    pub momentum_bonds: f64,
    pub momentum_cash: f64,
    /// When the run happened
    pub timestamp: DateTime<Utc>,
}

impl HistoryRecord {
    pub fn from_decision(
        decision: &Decision,
        analysis_date: NaiveDate,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            date: analysis_date,
            selected_asset: decision.selected_asset,
            ticker: decision.selected_ticker.clone(),
            mode: decision.mode,
            momentum_us: decision.momentum.us,
            momentum_exus: decision.momentum.exus,
            momentum_bonds: decision.momentum.bonds,
            momentum_cash: decision.momentum.cash_proxy,
            timestamp,
        }
    }
}

/// CSV decision log at a fixed path.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `record`, creating the file (and its directory) on first use.
    pub fn append(&self, record: &HistoryRecord) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| self.io_err(source))?;
        }

        let is_new = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.io_err(source))?;

        let mut writer = WriterBuilder::new().has_headers(is_new).from_writer(file);
        writer.serialize(record).map_err(|source| self.csv_err(source))?;
        writer.flush().map_err(|source| self.io_err(source))?;

        tracing::debug!(path = %self.path.display(), date = %record.date, "History updated");
        Ok(())
    }

    /// All records in file order. A missing file reads as empty.
    pub fn read_all(&self) -> Result<Vec<HistoryRecord>, HistoryError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)
            .map_err(|source| self.csv_err(source))?;

        reader
            .deserialize()
            .collect::<Result<Vec<HistoryRecord>, _>>()
            .map_err(|source| self.csv_err(source))
    }

    fn io_err(&self, source: std::io::Error) -> HistoryError {
        HistoryError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn csv_err(&self, source: csv::Error) -> HistoryError {
        HistoryError::Csv {
            path: self.path.clone(),
            source,
        }
    }
}
