//! Signal schedules and backtest periods.

use chrono::{Datelike, Duration, Months, NaiveDate};
use quorum_common::{Error, Result};
use serde::{Deserialize, Serialize};

use super::simulator::SignalSeries;
use super::strategy::{HistoricalSignal, SignalProvenance};
use crate::signal::{Confidence, Signal};

/// How often retroactive signals are generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalGranularity {
    Monthly,
    Quarterly,
    Semiannual,
    Annual,
}

impl SignalGranularity {
    pub const fn months_interval(self) -> u32 {
        match self {
            Self::Monthly => 1,
            Self::Quarterly => 3,
            Self::Semiannual => 6,
            Self::Annual => 12,
        }
    }

    pub const fn signals_per_year(self) -> u32 {
        12 / self.months_interval()
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "monthly" => Some(Self::Monthly),
            "quarterly" => Some(Self::Quarterly),
            "semiannual" => Some(Self::Semiannual),
            "annual" => Some(Self::Annual),
            _ => None,
        }
    }
}

/// Dates from `start` to `end` inclusive, stepping by the granularity.
///
/// Month steps clamp to the month length and carry the clamped day forward
/// (Jan 31 -> Feb 29 -> Mar 29).
pub fn date_schedule(
    start: NaiveDate,
    end: NaiveDate,
    granularity: SignalGranularity,
) -> Vec<NaiveDate> {
    let step = Months::new(granularity.months_interval());
    let mut dates = Vec::new();
    let mut current = Some(start);

    while let Some(date) = current.filter(|d| *d <= end) {
        dates.push(date);
        current = date.checked_add_months(step);
    }

    dates
}

/// Placeholder signals: BUY on `start`, then alternating SELL/BUY on the
/// first of every following month.
pub fn simulated_signals(start: NaiveDate, end: NaiveDate) -> SignalSeries {
    let mut signals = SignalSeries::new();
    let mut current = Some(start);
    let mut is_buy = true;

    while let Some(date) = current.filter(|d| *d <= end) {
        let (signal, score) = if is_buy {
            (Signal::Buy, 50.0)
        } else {
            (Signal::Sell, -50.0)
        };
        signals.insert(
            date,
            HistoricalSignal::new(
                date,
                signal,
                score,
                Confidence::Medium.multiplier(),
                SignalProvenance::Simulated,
            ),
        );

        current = first_of_next_month(date);
        is_buy = !is_buy;
    }

    signals
}

fn first_of_next_month(date: NaiveDate) -> Option<NaiveDate> {
    if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
}

/// Parse a look-back period ("1y", "6m", "30d") ending at `today`.
///
/// # Errors
///
/// [`Error::InvalidInput`] for an unknown unit, a non-numeric count, or a
/// range outside the calendar.
pub fn parse_period(period: &str, today: NaiveDate) -> Result<(NaiveDate, NaiveDate)> {
    let period = period.trim().to_lowercase();
    let invalid = || {
        Error::invalid_input(format!(
            "invalid period '{}', use a format like '1y', '6m' or '30d'",
            period
        ))
    };

    let unit = period.chars().last().ok_or_else(invalid)?;
    let count: u32 = period[..period.len() - unit.len_utf8()]
        .parse()
        .map_err(|_| invalid())?;

    let start = match unit {
        'y' => count
            .checked_mul(12)
            .and_then(|months| today.checked_sub_months(Months::new(months))),
        'm' => today.checked_sub_months(Months::new(count)),
        'd' => today.checked_sub_signed(Duration::days(i64::from(count))),
        _ => None,
    }
    .ok_or_else(invalid)?;

    Ok((start, today))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_granularity_intervals() {
        assert_eq!(SignalGranularity::Monthly.signals_per_year(), 12);
        assert_eq!(SignalGranularity::Quarterly.signals_per_year(), 4);
        assert_eq!(SignalGranularity::Semiannual.signals_per_year(), 2);
        assert_eq!(SignalGranularity::Annual.months_interval(), 12);
        assert_eq!(SignalGranularity::from_str("Quarterly"), Some(SignalGranularity::Quarterly));
        assert_eq!(SignalGranularity::from_str("weekly"), None);
    }

    #[test]
    fn test_date_schedule_quarterly() {
        let dates = date_schedule(
            ymd(2023, 1, 15),
            ymd(2023, 12, 31),
            SignalGranularity::Quarterly,
        );
        assert_eq!(
            dates,
            vec![ymd(2023, 1, 15), ymd(2023, 4, 15), ymd(2023, 7, 15), ymd(2023, 10, 15)]
        );
    }

    #[test]
    fn test_date_schedule_clamps_month_end() {
        let dates = date_schedule(ymd(2024, 1, 31), ymd(2024, 4, 30), SignalGranularity::Monthly);
        assert_eq!(
            dates,
            vec![ymd(2024, 1, 31), ymd(2024, 2, 29), ymd(2024, 3, 29), ymd(2024, 4, 29)]
        );
    }

    #[test]
    fn test_simulated_signals_alternate_monthly() {
        let signals = simulated_signals(ymd(2023, 11, 15), ymd(2024, 2, 10));
        let dates: Vec<NaiveDate> = signals.keys().copied().collect();

        assert_eq!(
            dates,
            vec![ymd(2023, 11, 15), ymd(2023, 12, 1), ymd(2024, 1, 1), ymd(2024, 2, 1)]
        );
        let kinds: Vec<Signal> = signals.values().map(|s| s.signal).collect();
        assert_eq!(kinds, vec![Signal::Buy, Signal::Sell, Signal::Buy, Signal::Sell]);
        assert!(signals.values().all(|s| s.confidence == 0.7));
        assert!(signals.values().all(|s| s.provenance == SignalProvenance::Simulated));
    }

    #[test]
    fn test_parse_period() {
        let today = ymd(2024, 3, 31);
        assert_eq!(parse_period("1y", today).unwrap(), (ymd(2023, 3, 31), today));
        assert_eq!(parse_period("1m", today).unwrap().0, ymd(2024, 2, 29));
        assert_eq!(parse_period("6M", today).unwrap().0, ymd(2023, 9, 30));
        assert_eq!(parse_period(" 30d ", today).unwrap().0, ymd(2024, 3, 1));
    }

    #[test]
    fn test_parse_period_rejects_garbage() {
        let today = ymd(2024, 3, 31);
        for bad in ["", "y", "1w", "xy", "-1d", "1.5y"] {
            let err = parse_period(bad, today).unwrap_err();
            assert!(err.is_invalid_input(), "{} should be rejected", bad);
        }
    }
}
