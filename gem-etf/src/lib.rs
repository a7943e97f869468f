//! GEM ETF decision service.
//!
//! Once a month, decide which ETF to hold under the Generalized Momentum
//! (dual momentum) rule and report it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────────┐   ┌──────────────┐
//! │  calendar    │──▶│ data::resolve  │──▶│  strategy    │
//! │  (dates)     │   │ (as-of prices) │   │  (decide)    │
//! └──────────────┘   └────────────────┘   └──────┬───────┘
//!        ▲                   ▲                   │
//!        │            PriceProvider              ▼
//!   GemPipeline ──────────────────────▶ report / notification / history
//! ```
//!
//! # Rule
//!
//! - Trailing return of each asset over `lookback_months` (12 by default)
//! - US return strictly above the cash proxy: RISK-ON, hold the stronger
//!   of US and ex-US equities (US on a tie)
//! - Otherwise: RISK-OFF, hold bonds

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod calendar;
pub mod data;
pub mod error;
pub mod history;
pub mod notification;
pub mod pipeline;
pub mod report;
pub mod scheduler;
pub mod strategy;

pub use calendar::{last_trading_session_of_previous_month, lookback_date, AnalysisWindow};
pub use data::{resolve, AssetKey, PriceProvider, PriceSeries, PriceSnapshot, TickerMap};
pub use error::{GemError, SnapshotRole};
pub use history::{HistoryLog, HistoryRecord};
pub use notification::{DeliveryReceipt, EmailMessage, Notifier, NotifyError, ResendNotifier};
pub use pipeline::{DeliveryStatus, GemPipeline, RunOptions, RunSummary};
pub use report::{ReportContext, ReportRenderer};
pub use scheduler::MonthlyScheduler;
pub use strategy::{decide, Decision, Mode, MomentumSet};
