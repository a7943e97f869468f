//! Errors raised by the decision core.
//!
//! Every variant is fatal to the current run: the core never retries and
//! never produces a partial decision.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::data::AssetKey;

/// Which of the two price snapshots an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotRole {
    /// Snapshot at the analysis date
    Current,
    /// Snapshot at the look-back date
    Previous,
}

impl fmt::Display for SnapshotRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Current => write!(f, "current"),
            Self::Previous => write!(f, "previous"),
        }
    }
}

/// Core decision errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GemError {
    /// No trading session on or before the requested date
    #[error("No price data on or before {target}")]
    NoData { target: NaiveDate },

    /// A required asset has no price in one of the snapshots
    #[error("Missing {key} price in {role} snapshot")]
    MissingAsset { key: AssetKey, role: SnapshotRole },

    /// The selected asset has no ticker mapping (configuration defect)
    #[error("No ticker configured for {0}")]
    UnknownTicker(AssetKey),
}
