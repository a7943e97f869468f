//! Trading-calendar date arithmetic.
//!
//! Deterministic, pure logic. No IO, no wall-clock.
//!
//! Only weekends are treated as non-trading days. An exchange holiday that
//! falls on the last weekday of a month is NOT rolled back here; the price
//! snapshot resolver bridges it by picking the latest session on or before
//! the requested date. Changing this would change historical decisions.

use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Last business day (Mon-Fri) of the calendar month before `today`'s month.
pub fn last_trading_session_of_previous_month(today: NaiveDate) -> NaiveDate {
    let last_of_prev = today - Days::new(u64::from(today.day()));
    roll_back_to_weekday(last_of_prev)
}

/// `reference` minus `months` calendar months.
///
/// Day-of-month is preserved where it exists in the target month and clamped
/// to that month's last day otherwise (2024-03-31 minus 1 month is
/// 2024-02-29). The result is a calendar date, not necessarily a session.
/// A look-back reaching past the earliest representable date saturates to
/// [`NaiveDate::MIN`].
pub fn lookback_date(reference: NaiveDate, months: u32) -> NaiveDate {
    reference
        .checked_sub_months(Months::new(months))
        .unwrap_or(NaiveDate::MIN)
}

fn roll_back_to_weekday(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Days::new(1),
        Weekday::Sun => date - Days::new(2),
        _ => date,
    }
}

/// The dates one monthly run works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisWindow {
    /// Measurement point: last session of the previous month
    pub analysis_date: NaiveDate,
    /// `analysis_date` minus the look-back
    pub comparison_date: NaiveDate,
    /// First date requested from the data provider
    pub fetch_start: NaiveDate,
}

impl AnalysisWindow {
    /// Resolve the window for a run executed on `today`.
    ///
    /// `buffer_months` widens the fetch range before the comparison date so
    /// the snapshot resolver always finds a session on or before it.
    pub fn for_run(today: NaiveDate, lookback_months: u32, buffer_months: u32) -> Self {
        let analysis_date = last_trading_session_of_previous_month(today);
        let comparison_date = lookback_date(analysis_date, lookback_months);
        let fetch_start = lookback_date(comparison_date, buffer_months);

        Self {
            analysis_date,
            comparison_date,
            fetch_start,
        }
    }

    /// Report period label, `YYYY-MM` of the analysis date.
    pub fn period(&self) -> String {
        self.analysis_date.format("%Y-%m").to_string()
    }
}
