//! Synthetic daily series for when no broker data is available
//!
//! A random walk with a decaying trend and a clamped volatility term drives
//! the underlying; call/put prices are derived from price and volatility, and
//! one day in ten carries an injected reverse decay event so the strategies
//! always have something to trade.

use chrono::NaiveDate;
use rand::Rng;
use rust_decimal::Decimal;

use super::pricing::{decay_factor, reverse_decay_score, to_price, trading_days, IV_BASELINE};
use crate::types::HistoricalDataPoint;

const TREND_PERSISTENCE: f64 = 0.9;
const TREND_NOISE_WEIGHT: f64 = 0.2;
const VOL_PERSISTENCE: f64 = 0.95;
const VOL_MIN: f64 = 0.1;
const VOL_MAX: f64 = 0.4;
const INITIAL_VOLATILITY: f64 = 0.2;
/// Each ATM leg is worth roughly this share of price × volatility
const LEG_PRICE_FACTOR: f64 = 0.4;
const LEG_JITTER: f64 = 0.1;
const REVERSE_DECAY_EVENT_PROBABILITY: f64 = 0.1;
const PRICE_FLOOR: f64 = 1.0;

/// Generate one point per weekday in `[from, to]`
pub fn generate_synthetic_data(
    from: NaiveDate,
    to: NaiveDate,
    rng: &mut impl Rng,
) -> Vec<HistoricalDataPoint> {
    let days = trading_days(from, to);
    let mut points = Vec::with_capacity(days.len());

    let mut price: f64 = rng.gen_range(100.0..150.0);
    let mut trend: f64 = 0.0;
    let mut volatility = INITIAL_VOLATILITY;

    for date in days {
        let noise: f64 = rng.gen_range(-0.5..0.5);
        let vol_shock: f64 = rng.gen_range(0.0..0.05);
        trend = trend * TREND_PERSISTENCE + noise * TREND_NOISE_WEIGHT;
        volatility = (volatility * VOL_PERSISTENCE + vol_shock).clamp(VOL_MIN, VOL_MAX);

        let open = price;
        price = (price * (1.0 + trend + noise * volatility)).max(PRICE_FLOOR);
        let close = price;
        let wick_up: f64 = rng.gen_range(0.0..0.01);
        let wick_down: f64 = rng.gen_range(0.0..0.01);
        let high = open.max(close) * (1.0 + wick_up);
        let low = open.min(close) * (1.0 - wick_down);
        let volume: f64 = rng.gen_range(100_000.0..1_000_000.0);

        let call_jitter: f64 = rng.gen_range(-LEG_JITTER..LEG_JITTER);
        let put_jitter: f64 = rng.gen_range(-LEG_JITTER..LEG_JITTER);
        let fair_leg = LEG_PRICE_FACTOR * close * volatility;
        let call = fair_leg * (1.0 + call_jitter);
        let put = fair_leg * (1.0 + put_jitter);
        let theoretical = 2.0 * fair_leg * decay_factor(date);

        let mut rds = reverse_decay_score(call + put, theoretical);
        if rng.gen_bool(REVERSE_DECAY_EVENT_PROBABILITY) {
            let event: f64 = rng.gen_range(0.05..0.15);
            rds += event;
        }
        let iv_noise: f64 = rng.gen_range(-0.05..0.05);
        let iv_score = volatility - IV_BASELINE + iv_noise;

        let call_price = to_price(call);
        let put_price = to_price(put);

        points.push(HistoricalDataPoint {
            date,
            open: to_price(open),
            high: to_price(high),
            low: to_price(low),
            close: to_price(close),
            volume: Decimal::from(volume.round() as i64),
            call_price,
            put_price,
            straddle_price: call_price + put_price,
            theoretical_price: to_price(theoretical),
            rds,
            iv_score,
        });
    }

    points
}
