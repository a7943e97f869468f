//! Generalized Momentum decision rule.
//!
//! Two comparisons on trailing returns:
//! 1. Absolute momentum: US equities against the cash proxy decides the
//!    regime. Strictly greater means RISK-ON; a tie is RISK-OFF.
//! 2. Relative momentum (RISK-ON only): US against ex-US equities picks the
//!    holding. A tie keeps US.
//!
//! RISK-OFF always holds BONDS, whatever the bond return was.

use crate::data::{AssetKey, PriceSnapshot, TickerMap};
use crate::error::{GemError, SnapshotRole};

use super::decision::{Decision, Mode, MomentumSet};

/// Evaluate the rule on two snapshots.
///
/// `current` and `previous` must both price US, EXUS and CASH_PROXY. BONDS
/// may be missing in either, in which case its momentum is reported as 0.0
/// and flagged as defaulted. The chronological order of the snapshots is not
/// checked.
pub fn decide(
    current: &PriceSnapshot,
    previous: &PriceSnapshot,
    tickers: &TickerMap,
) -> Result<Decision, GemError> {
    let us = required_momentum(current, previous, AssetKey::Us)?;
    let exus = required_momentum(current, previous, AssetKey::ExUs)?;
    let cash_proxy = required_momentum(current, previous, AssetKey::CashProxy)?;

    let bonds_prices = (current.get(AssetKey::Bonds), previous.get(AssetKey::Bonds));
    let (bonds, bonds_defaulted) = match bonds_prices {
        (Some(now), Some(then)) => (now / then - 1.0, false),
        _ => (0.0, true),
    };

    let momentum = MomentumSet {
        us,
        exus,
        bonds,
        cash_proxy,
        bonds_defaulted,
    };

    let (mode, selected_asset) = if momentum.us > momentum.cash_proxy {
        let pick = if momentum.us >= momentum.exus {
            AssetKey::Us
        } else {
            AssetKey::ExUs
        };
        (Mode::RiskOn, pick)
    } else {
        (Mode::RiskOff, AssetKey::Bonds)
    };

    let selected_ticker = tickers
        .get(selected_asset)
        .ok_or(GemError::UnknownTicker(selected_asset))?
        .to_string();

    Ok(Decision {
        mode,
        selected_asset,
        selected_ticker,
        momentum,
        prices_current: current.clone(),
        prices_prev: previous.clone(),
    })
}

fn required_momentum(
    current: &PriceSnapshot,
    previous: &PriceSnapshot,
    key: AssetKey,
) -> Result<f64, GemError> {
    let now = current.get(key).ok_or(GemError::MissingAsset {
        key,
        role: SnapshotRole::Current,
    })?;
    let then = previous.get(key).ok_or(GemError::MissingAsset {
        key,
        role: SnapshotRole::Previous,
    })?;
    Ok(now / then - 1.0)
}
