//! Hour arithmetic for the time ledger.
//!
//! Durations are wall-clock hours as `f64`, rounded to 2 decimal places at
//! every computation boundary: once when a timer stops, and again after each
//! read-side aggregation. The repeated rounding is part of the contract, not
//! an accident; downstream consumers compare against these exact values.

use chrono::{DateTime, Utc};

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Rounds hours to 2 decimal places, half away from zero.
#[must_use]
pub fn round_hours(hours: f64) -> f64 {
    (hours * 100.0).round() / 100.0
}

/// Wall-clock hours between two instants, rounded to 2 decimals.
///
/// A negative interval (clock skew, bad input) clamps to 0.
#[must_use]
pub fn hours_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let ms = (end - start).num_milliseconds();
    if ms <= 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    round_hours(ms as f64 / MS_PER_HOUR)
}

/// A time entry suitable for ledger aggregation.
///
/// This trait lets the aggregation work with different entry representations
/// (e.g., `TimeEntryRecord` from sd-db, or test fixtures).
pub trait LedgerEntry {
    /// When the timer started.
    fn start_time(&self) -> DateTime<Utc>;

    /// When the timer stopped, if it has.
    fn end_time(&self) -> Option<DateTime<Utc>>;

    /// The stored duration for a completed entry, already rounded at stop time.
    fn duration_hours(&self) -> f64;
}

/// Total hours across a set of ledger entries as of `now`.
///
/// Completed entries contribute their stored duration; running entries
/// (no end time) contribute live elapsed time `now - start`. The sum is
/// rounded again at this boundary so a read never exposes more precision
/// than a stop would have persisted.
#[must_use]
pub fn elapsed_hours<E: LedgerEntry>(entries: &[E], now: DateTime<Utc>) -> f64 {
    let mut total = 0.0;
    for entry in entries {
        if entry.end_time().is_some() {
            total += entry.duration_hours();
        } else {
            total += hours_between(entry.start_time(), now);
        }
    }
    round_hours(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct Entry {
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        duration: f64,
    }

    impl LedgerEntry for Entry {
        fn start_time(&self) -> DateTime<Utc> {
            self.start
        }

        fn end_time(&self) -> Option<DateTime<Utc>> {
            self.end
        }

        fn duration_hours(&self) -> f64 {
            self.duration
        }
    }

    fn at(hms: (u32, u32, u32)) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, hms.0, hms.1, hms.2)
            .unwrap()
    }

    #[test]
    fn rounds_half_up_at_two_decimals() {
        assert!((round_hours(2.499) - 2.5).abs() < 1e-9);
        assert!((round_hours(2.494) - 2.49).abs() < 1e-9);
        assert!((round_hours(0.125) - 0.13).abs() < 1e-9);
    }

    #[test]
    fn ninety_minutes_is_one_and_a_half_hours() {
        assert!((hours_between(at((10, 0, 0)), at((11, 30, 0))) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn negative_interval_clamps_to_zero() {
        assert!(hours_between(at((11, 0, 0)), at((10, 0, 0))).abs() < 1e-9);
    }

    #[test]
    fn running_entry_contributes_live_elapsed_time() {
        let entries = vec![Entry {
            start: at((10, 0, 0)),
            end: None,
            duration: 0.0,
        }];
        let total = elapsed_hours(&entries, at((11, 30, 0)));
        assert!((total - 1.5).abs() < 1e-9);
    }

    #[test]
    fn mixes_completed_and_running_entries() {
        let entries = vec![
            Entry {
                start: at((8, 0, 0)),
                end: Some(at((10, 30, 0))),
                duration: 2.5,
            },
            Entry {
                start: at((10, 0, 0)),
                end: None,
                duration: 0.0,
            },
        ];
        // 2.5 completed + 1.0 running
        let total = elapsed_hours(&entries, at((11, 0, 0)));
        assert!((total - 3.5).abs() < 1e-9);
    }

    #[test]
    fn empty_ledger_is_zero() {
        let entries: Vec<Entry> = Vec::new();
        assert!(elapsed_hours(&entries, at((12, 0, 0))).abs() < 1e-9);
    }
}
