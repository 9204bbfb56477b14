//! Pricing calculator
//!
//! Pure fee computation from entry/exit timestamps, vehicle class, and a
//! tariff table. Deterministic by construction: identical inputs always
//! produce identical fees, which is what makes a disputed charge auditable
//! by replaying the computation.
//!
//! Guest fee structure:
//!
//! - A flat first-block rate covers any stay up to `first_block_hours`,
//!   with elapsed time rounded up to the nearest minute.
//! - Time beyond the first block is billed per started hour.
//! - The overnight surcharge is added once if the stay overlaps the
//!   configured overnight window at least once.
//!
//! Monthly-pass holders always pay zero here; their subscription is billed
//! outside the per-use path.
//!
//! Timestamps are treated as site-local wall-clock time; the overnight
//! window is compared against the naive date/time of the stay.

use chrono::{Duration as ChronoDuration, NaiveDateTime};
use rust_decimal::Decimal;

use crate::types::session::{Timestamp, VehicleClass};
use crate::types::tariff::TariffTable;
use crate::types::LaneEngineError;

/// Compute the fee for one completed stay
///
/// # Errors
///
/// Returns `InvalidDuration` if `exit_at` precedes `entry_at`, and
/// `ArithmeticOverflow` if the tariff arithmetic overflows.
pub fn compute_fee(
    entry_at: Timestamp,
    exit_at: Timestamp,
    vehicle_class: VehicleClass,
    is_monthly_pass: bool,
    tariff: &TariffTable,
) -> Result<Decimal, LaneEngineError> {
    if exit_at < entry_at {
        return Err(LaneEngineError::InvalidDuration {
            entry: entry_at,
            exit: exit_at,
        });
    }

    if is_monthly_pass {
        return Ok(Decimal::ZERO);
    }

    let rates = tariff.class(vehicle_class);

    // Elapsed time rounded up to the nearest minute.
    let elapsed_seconds = (exit_at - entry_at).num_seconds();
    let elapsed_minutes = ceil_div(elapsed_seconds, 60);

    let first_block_minutes = i64::from(rates.first_block_hours) * 60;
    let mut fee = rates.first_block_rate;

    if elapsed_minutes > first_block_minutes {
        let remaining_minutes = elapsed_minutes - first_block_minutes;
        let extra_hours = ceil_div(remaining_minutes, 60);

        let extra = rates
            .hourly_rate
            .checked_mul(Decimal::from(extra_hours))
            .ok_or_else(|| LaneEngineError::arithmetic_overflow("hourly fee"))?;
        fee = fee
            .checked_add(extra)
            .ok_or_else(|| LaneEngineError::arithmetic_overflow("fee total"))?;
    }

    if spans_overnight_window(entry_at.naive_utc(), exit_at.naive_utc(), tariff) {
        fee = fee
            .checked_add(rates.overnight_surcharge)
            .ok_or_else(|| LaneEngineError::arithmetic_overflow("overnight surcharge"))?;
    }

    Ok(fee)
}

/// Ceiling division for non-negative operands
fn ceil_div(value: i64, divisor: i64) -> i64 {
    debug_assert!(value >= 0 && divisor > 0);
    (value + divisor - 1) / divisor
}

/// Whether the stay overlaps the tariff's overnight window at least once
///
/// The window is anchored to each calendar day the stay touches; a window
/// with `end <= start` wraps past midnight into the next day. Overlap is
/// exclusive at the boundaries: exiting exactly when the window opens does
/// not incur the surcharge.
fn spans_overnight_window(entry: NaiveDateTime, exit: NaiveDateTime, tariff: &TariffTable) -> bool {
    let start_day = entry.date() - ChronoDuration::days(1);
    let end_day = exit.date();

    let mut day = start_day;
    while day <= end_day {
        let window_start = day.and_time(tariff.overnight_start);
        let window_end = if tariff.overnight_end > tariff.overnight_start {
            day.and_time(tariff.overnight_end)
        } else {
            (day + ChronoDuration::days(1)).and_time(tariff.overnight_end)
        };

        if entry < window_end && exit > window_start {
            return true;
        }
        day += ChronoDuration::days(1);
    }

    false
}
