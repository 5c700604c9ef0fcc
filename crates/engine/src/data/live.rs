//! Historical series built from broker candles
//!
//! Fetches the underlying plus the at-the-money call and put for the requested
//! range and derives the same straddle metrics as the synthetic feed, without
//! injected events.

use chrono::{DateTime, FixedOffset, NaiveDate};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;

use super::pricing::{
    days_to_month_end, decay_factor, implied_volatility, is_weekend, reverse_decay_score, to_f64,
    to_price, IV_BASELINE,
};
use crate::api::{find_instrument, MarketDataSource, OptionType};
use crate::error::{DataError, DataResult};
use crate::types::{BacktestParams, HistoricalDataPoint, Kline};

/// Index names whose underlying trades under a different symbol than their options
const INDEX_ALIASES: &[(&str, &str)] = &[
    ("NIFTY", "NIFTY 50"),
    ("BANKNIFTY", "NIFTY BANK"),
    ("FINNIFTY", "NIFTY FIN SERVICE"),
    ("MIDCPNIFTY", "NIFTY MID SELECT"),
];

/// Where to look up instruments and how to pick the ATM strike
#[derive(Debug, Clone)]
pub struct InstrumentLookup {
    pub underlying_exchange: String,
    pub options_exchange: String,
    pub strike_step: Decimal,
    /// Exchange time zone offset, used to assign candles to trading dates
    pub utc_offset_minutes: i32,
}

impl Default for InstrumentLookup {
    fn default() -> Self {
        Self {
            underlying_exchange: "NSE".to_string(),
            options_exchange: "NFO".to_string(),
            strike_step: Decimal::from(50),
            utc_offset_minutes: 330,
        }
    }
}

fn underlying_symbol(symbol: &str) -> &str {
    INDEX_ALIASES
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(symbol))
        .map(|(_, underlying)| *underlying)
        .unwrap_or(symbol)
}

/// Round `price` to the nearest multiple of `step`
pub fn atm_strike(price: Decimal, step: Decimal) -> Decimal {
    if step <= Decimal::ZERO {
        return price.round();
    }
    (price / step).round() * step
}

fn kline_date(kline: &Kline, offset: FixedOffset) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(kline.open_time).map(|dt| dt.with_timezone(&offset).date_naive())
}

/// Fetch and derive a series from the broker. Errors are returned, not logged;
/// the caller decides whether to fall back.
pub async fn fetch_broker_data(
    source: &dyn MarketDataSource,
    params: &BacktestParams,
    lookup: &InstrumentLookup,
) -> DataResult<Vec<HistoricalDataPoint>> {
    let symbol = params.symbol.as_str();
    let (from, to) = (params.from_date, params.to_date);
    let offset = FixedOffset::east_opt(lookup.utc_offset_minutes * 60)
        .ok_or_else(|| DataError::Malformed(format!("bad UTC offset {}", lookup.utc_offset_minutes)))?;

    let underlying_list = source.instruments(&lookup.underlying_exchange).await?;
    let underlying = find_instrument(&underlying_list, underlying_symbol(symbol), None, None)
        .ok_or_else(|| DataError::InstrumentNotFound(symbol.to_string()))?;

    let bars: Vec<Kline> = source
        .historical_bars(underlying.instrument_token, from, to, params.time_frame)
        .await?
        .into_iter()
        .filter(|k| kline_date(k, offset).is_some_and(|d| !is_weekend(d)))
        .collect();

    let first_close = bars
        .first()
        .map(|k| k.close)
        .ok_or_else(|| DataError::Empty(symbol.to_string()))?;
    let strike = atm_strike(first_close, lookup.strike_step);

    let option_list = source.instruments(&lookup.options_exchange).await?;
    let call = find_instrument(&option_list, symbol, Some(strike), Some(OptionType::Call))
        .ok_or_else(|| DataError::InstrumentNotFound(format!("{} {} CE", symbol, strike)))?;
    let put = find_instrument(&option_list, symbol, Some(strike), Some(OptionType::Put))
        .ok_or_else(|| DataError::InstrumentNotFound(format!("{} {} PE", symbol, strike)))?;

    debug!(
        symbol,
        %strike,
        call = %call.tradingsymbol,
        put = %put.tradingsymbol,
        "Resolved ATM straddle"
    );

    let call_bars = source
        .historical_bars(call.instrument_token, from, to, params.time_frame)
        .await?;
    let put_bars = source
        .historical_bars(put.instrument_token, from, to, params.time_frame)
        .await?;

    let points = build_points(&bars, &call_bars, &put_bars, offset);
    if points.is_empty() {
        return Err(DataError::Malformed(format!(
            "no option candles overlap the {} series",
            symbol
        )));
    }

    Ok(points)
}

/// Join option closes onto underlying bars by timestamp and derive the straddle metrics
fn build_points(
    bars: &[Kline],
    call_bars: &[Kline],
    put_bars: &[Kline],
    offset: FixedOffset,
) -> Vec<HistoricalDataPoint> {
    let calls: HashMap<i64, Decimal> = call_bars.iter().map(|k| (k.open_time, k.close)).collect();
    let puts: HashMap<i64, Decimal> = put_bars.iter().map(|k| (k.open_time, k.close)).collect();

    let mut anchor: Option<(f64, f64)> = None;
    let mut points = Vec::with_capacity(bars.len());

    for bar in bars {
        let (Some(date), Some(&call_price), Some(&put_price)) =
            (kline_date(bar, offset), calls.get(&bar.open_time), puts.get(&bar.open_time))
        else {
            continue;
        };

        let straddle_price = call_price + put_price;
        let straddle = to_f64(straddle_price);
        let decay = decay_factor(date);

        // Theoretical price: first observed straddle decayed forward through the month
        let (anchor_straddle, anchor_decay) = *anchor.get_or_insert((straddle, decay));
        let theoretical = if anchor_decay > 0.0 {
            anchor_straddle * decay / anchor_decay
        } else {
            anchor_straddle
        };

        let sigma = implied_volatility(straddle, to_f64(bar.close), days_to_month_end(date));

        points.push(HistoricalDataPoint {
            date,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            call_price,
            put_price,
            straddle_price,
            theoretical_price: to_price(theoretical),
            rds: reverse_decay_score(straddle, theoretical),
            iv_score: sigma - IV_BASELINE,
        });
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(330 * 60).unwrap()
    }

    fn kline(date: (i32, u32, u32), close: Decimal) -> Kline {
        let ts = NaiveDate::from_ymd_opt(date.0, date.1, date.2)
            .unwrap()
            .and_hms_opt(3, 45, 0) // 09:15 IST
            .unwrap()
            .and_utc()
            .timestamp_millis();
        Kline {
            open_time: ts,
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(1000),
        }
    }

    #[test]
    fn test_atm_strike_rounding() {
        assert_eq!(atm_strike(dec!(21524), dec!(50)), dec!(21500));
        assert_eq!(atm_strike(dec!(21526), dec!(50)), dec!(21550));
        assert_eq!(atm_strike(dec!(101.4), Decimal::ZERO), dec!(101));
    }

    #[test]
    fn test_underlying_alias() {
        assert_eq!(underlying_symbol("nifty"), "NIFTY 50");
        assert_eq!(underlying_symbol("RELIANCE"), "RELIANCE");
    }

    #[test]
    fn test_build_points_joins_on_timestamp() {
        let bars = vec![
            kline((2024, 1, 2), dec!(21500)),
            kline((2024, 1, 3), dec!(21600)),
            kline((2024, 1, 4), dec!(21550)),
        ];
        // No call candle on the 3rd
        let calls = vec![kline((2024, 1, 2), dec!(150)), kline((2024, 1, 4), dec!(140))];
        let puts = vec![
            kline((2024, 1, 2), dec!(160)),
            kline((2024, 1, 3), dec!(150)),
            kline((2024, 1, 4), dec!(155)),
        ];

        let points = build_points(&bars, &calls, &puts, ist());
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].straddle_price, dec!(310));
        assert_eq!(points[1].straddle_price, dec!(295));
        // First point is its own anchor
        assert!(points[0].rds.abs() < 1e-9);
    }

    #[test]
    fn test_build_points_flags_straddle_richer_than_decay() {
        let bars = vec![kline((2024, 1, 2), dec!(100)), kline((2024, 1, 22), dec!(100))];
        let calls = vec![kline((2024, 1, 2), dec!(5)), kline((2024, 1, 22), dec!(5))];
        let puts = vec![kline((2024, 1, 2), dec!(5)), kline((2024, 1, 22), dec!(5))];

        let points = build_points(&bars, &calls, &puts, ist());
        // Unchanged straddle three weeks later is rich relative to the decayed expectation
        assert!(points[1].rds > 0.0);
        assert!(points[1].theoretical_price < points[0].theoretical_price);
    }
}
