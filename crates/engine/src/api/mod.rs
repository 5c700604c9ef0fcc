//! Market data collaborators
//!
//! The engine only depends on the [`MarketDataSource`] trait; [`BrokerClient`]
//! is the REST implementation used in production.

pub mod broker;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::data::InstrumentLookup;
use crate::error::DataResult;
use crate::types::{Kline, TimeFrame};

pub use broker::{BrokerClient, BrokerConfig};

/// Call or put
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionType {
    #[serde(rename = "CE")]
    Call,
    #[serde(rename = "PE")]
    Put,
}

/// A tradable instrument from the broker's instrument dump
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instrument {
    pub instrument_token: u64,
    pub tradingsymbol: String,
    /// Underlying name for derivatives, empty for some indices
    pub name: String,
    pub expiry: Option<NaiveDate>,
    pub strike: Decimal,
    /// `EQ`, `CE`, `PE`, `FUT` or the segment for indices
    pub instrument_type: String,
    pub segment: String,
    pub exchange: String,
}

impl Instrument {
    pub fn option_type(&self) -> Option<OptionType> {
        match self.instrument_type.as_str() {
            "CE" => Some(OptionType::Call),
            "PE" => Some(OptionType::Put),
            _ => None,
        }
    }
}

/// Source of instruments and historical bars
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Exchanges and strike spacing to resolve instruments with
    fn instrument_lookup(&self) -> InstrumentLookup {
        InstrumentLookup::default()
    }

    /// Full list of tradable instruments on an exchange
    async fn instruments(&self, exchange: &str) -> DataResult<Vec<Instrument>>;

    /// OHLCV bars for an instrument token between two dates (inclusive)
    async fn historical_bars(
        &self,
        instrument_token: u64,
        from: NaiveDate,
        to: NaiveDate,
        interval: TimeFrame,
    ) -> DataResult<Vec<Kline>>;
}

/// Find an instrument by symbol, and for options by strike and type.
///
/// Without an option type the underlying itself is matched by trading symbol
/// (indices and equities). Options match on the underlying name; among several
/// expiries the nearest one is returned.
pub fn find_instrument<'a>(
    instruments: &'a [Instrument],
    symbol: &str,
    strike: Option<Decimal>,
    option_type: Option<OptionType>,
) -> Option<&'a Instrument> {
    match option_type {
        None => instruments
            .iter()
            .filter(|i| i.option_type().is_none() && i.instrument_type != "FUT")
            .find(|i| i.tradingsymbol.eq_ignore_ascii_case(symbol)),
        Some(kind) => instruments
            .iter()
            .filter(|i| i.name.eq_ignore_ascii_case(symbol))
            .filter(|i| i.option_type() == Some(kind))
            .filter(|i| strike.map_or(true, |s| i.strike == s))
            .min_by_key(|i| i.expiry),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn instrument(token: u64, symbol: &str, name: &str, strike: Decimal, kind: &str, expiry: Option<(i32, u32, u32)>) -> Instrument {
        Instrument {
            instrument_token: token,
            tradingsymbol: symbol.to_string(),
            name: name.to_string(),
            expiry: expiry.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            strike,
            instrument_type: kind.to_string(),
            segment: "NFO-OPT".to_string(),
            exchange: "NFO".to_string(),
        }
    }

    fn sample() -> Vec<Instrument> {
        vec![
            instrument(1, "NIFTY 50", "NIFTY 50", Decimal::ZERO, "EQ", None),
            instrument(2, "NIFTY24FEB21500CE", "NIFTY", dec!(21500), "CE", Some((2024, 2, 29))),
            instrument(3, "NIFTY24JAN21500CE", "NIFTY", dec!(21500), "CE", Some((2024, 1, 25))),
            instrument(4, "NIFTY24JAN21500PE", "NIFTY", dec!(21500), "PE", Some((2024, 1, 25))),
            instrument(5, "NIFTY24JAN21550CE", "NIFTY", dec!(21550), "CE", Some((2024, 1, 25))),
            instrument(6, "NIFTY24JANFUT", "NIFTY", Decimal::ZERO, "FUT", Some((2024, 1, 25))),
        ]
    }

    #[test]
    fn test_find_underlying_by_trading_symbol() {
        let list = sample();
        let found = find_instrument(&list, "nifty 50", None, None).unwrap();
        assert_eq!(found.instrument_token, 1);
    }

    #[test]
    fn test_find_option_picks_nearest_expiry() {
        let list = sample();
        let found = find_instrument(&list, "NIFTY", Some(dec!(21500)), Some(OptionType::Call)).unwrap();
        assert_eq!(found.instrument_token, 3);
    }

    #[test]
    fn test_find_option_matches_type_and_strike() {
        let list = sample();
        let put = find_instrument(&list, "NIFTY", Some(dec!(21500)), Some(OptionType::Put)).unwrap();
        assert_eq!(put.instrument_token, 4);
        assert!(find_instrument(&list, "NIFTY", Some(dec!(21600)), Some(OptionType::Call)).is_none());
    }
}
