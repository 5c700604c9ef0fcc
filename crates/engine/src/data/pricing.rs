//! Straddle pricing heuristics shared by the synthetic and broker feeds
//!
//! These are demo heuristics, not an options pricing model: the "theoretical"
//! straddle decays exponentially through the calendar month and the reverse
//! decay score measures how far the observed straddle sits above it.

use chrono::{Datelike, NaiveDate, Weekday};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Implied volatility considered "normal"
pub const IV_BASELINE: f64 = 0.25;
/// Exponential decay applied across one calendar month
pub const DECAY_RATE: f64 = 0.3;
/// ATM straddle ≈ STRADDLE_VOL_FACTOR · S · σ · √T
pub const STRADDLE_VOL_FACTOR: f64 = 0.8;

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Every Monday–Friday date in `[from, to]`
pub fn trading_days(from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    from.iter_days()
        .take_while(|d| *d <= to)
        .filter(|d| !is_weekend(*d))
        .collect()
}

pub fn days_in_month(date: NaiveDate) -> u32 {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    let first_of_next = NaiveDate::from_ymd_opt(year, month, 1);
    let first_of_this = date.with_day(1);

    match (first_of_next, first_of_this) {
        (Some(next), Some(this)) => (next - this).num_days() as u32,
        _ => 30,
    }
}

/// Calendar days left until the end of the month, counting `date` itself
pub fn days_to_month_end(date: NaiveDate) -> u32 {
    days_in_month(date) - date.day() + 1
}

/// Fraction of the straddle's value expected to survive time decay on `date`
pub fn decay_factor(date: NaiveDate) -> f64 {
    let elapsed = date.day() as f64 / days_in_month(date) as f64;
    (-DECAY_RATE * elapsed).exp()
}

/// Relative excess of the actual straddle over the expected one
pub fn reverse_decay_score(actual: f64, expected: f64) -> f64 {
    if expected <= 0.0 {
        return 0.0;
    }
    (actual - expected) / expected
}

/// Volatility implied by an ATM straddle, using the straddle ≈ 0.8·S·σ·√T approximation
pub fn implied_volatility(straddle: f64, spot: f64, days_to_expiry: u32) -> f64 {
    let t = days_to_expiry.max(1) as f64 / 365.0;
    let denom = STRADDLE_VOL_FACTOR * spot * t.sqrt();
    if denom <= 0.0 {
        return 0.0;
    }
    straddle / denom
}

pub fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Round a float to two decimal places as a Decimal
pub fn to_price(value: f64) -> Decimal {
    if !value.is_finite() {
        return Decimal::ZERO;
    }
    Decimal::from_str_exact(&format!("{:.2}", value)).unwrap_or(Decimal::ZERO)
}
