//! Decision value types.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::data::{AssetKey, PriceSnapshot};

/// Market regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// US equities beat cash: hold the stronger equity index
    #[serde(rename = "RISK-ON")]
    RiskOn,
    /// US equities did not beat cash: hold bonds
    #[serde(rename = "RISK-OFF")]
    RiskOff,
}

impl Mode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RiskOn => "RISK-ON",
            Self::RiskOff => "RISK-OFF",
        }
    }

    pub const fn is_risk_on(self) -> bool {
        matches!(self, Self::RiskOn)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trailing returns over the look-back window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MomentumSet {
    #[serde(rename = "US")]
    pub us: f64,
    #[serde(rename = "EXUS")]
    pub exus: f64,
    #[serde(rename = "BONDS")]
    pub bonds: f64,
    #[serde(rename = "CASH_PROXY")]
    pub cash_proxy: f64,
    /// BONDS had no price in a snapshot and `bonds` was filled with 0.0
    #[serde(default)]
    pub(crate) bonds_defaulted: bool,
}

impl MomentumSet {
    pub fn get(&self, key: AssetKey) -> f64 {
        match key {
            AssetKey::Us => self.us,
            AssetKey::ExUs => self.exus,
            AssetKey::Bonds => self.bonds,
            AssetKey::CashProxy => self.cash_proxy,
        }
    }

    /// Whether the BONDS value was filled in rather than measured.
    pub fn bonds_defaulted(&self) -> bool {
        self.bonds_defaulted
    }

    /// Entries in report order.
    pub fn iter(&self) -> impl Iterator<Item = (AssetKey, f64)> + '_ {
        AssetKey::ALL.into_iter().map(|key| (key, self.get(key)))
    }
}

/// Outcome of one monthly evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub mode: Mode,
    pub selected_asset: AssetKey,
    pub selected_ticker: String,
    pub momentum: MomentumSet,
    pub prices_current: PriceSnapshot,
    pub prices_prev: PriceSnapshot,
}
