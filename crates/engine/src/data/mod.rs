//! Historical data provider
//!
//! [`load_historical_data`] tries the broker first and falls back to the
//! synthetic generator on any [`DataError`](crate::error::DataError), so a
//! backtest always has a series to run on.

pub mod live;
pub mod pricing;
pub mod synthetic;

use rand::Rng;
use tracing::{info, warn};

use crate::api::MarketDataSource;
use crate::types::{BacktestParams, DataSource, HistoricalDataPoint};

pub use live::{atm_strike, fetch_broker_data, InstrumentLookup};
pub use synthetic::generate_synthetic_data;

/// A series together with where it came from
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub points: Vec<HistoricalDataPoint>,
    pub source: DataSource,
}

/// Load the series for `params`, from `source` when given, else synthetic.
///
/// Never fails: broker errors are logged and replaced by generated data.
pub async fn load_historical_data(
    params: &BacktestParams,
    source: Option<&dyn MarketDataSource>,
    rng: &mut (impl Rng + Send),
) -> LoadedData {
    if let Some(source) = source.filter(|_| params.from_date <= params.to_date) {
        let lookup = source.instrument_lookup();
        match fetch_broker_data(source, params, &lookup).await {
            Ok(points) => {
                info!(symbol = %params.symbol, bars = points.len(), "Loaded broker data");
                return LoadedData {
                    points,
                    source: DataSource::Broker,
                };
            }
            Err(e) => {
                warn!(symbol = %params.symbol, error = %e, "Broker data unavailable, using synthetic series");
            }
        }
    }

    let points = generate_synthetic_data(params.from_date, params.to_date, rng);
    info!(symbol = %params.symbol, bars = points.len(), "Generated synthetic data");

    LoadedData {
        points,
        source: DataSource::Synthetic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Instrument;
    use crate::error::{DataError, DataResult};
    use crate::strategy::StrategyKind;
    use crate::types::{Kline, TimeFrame};
    use async_trait::async_trait;
    use chrono::{Datelike, NaiveDate, Weekday};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn params(from: (i32, u32, u32), to: (i32, u32, u32)) -> BacktestParams {
        BacktestParams {
            symbol: "NIFTY".to_string(),
            from_date: NaiveDate::from_ymd_opt(from.0, from.1, from.2).unwrap(),
            to_date: NaiveDate::from_ymd_opt(to.0, to.1, to.2).unwrap(),
            time_frame: TimeFrame::Day,
            strategy: StrategyKind::ReverseDecay,
            entry_threshold: 0.15,
            exit_threshold: 0.05,
            stop_loss: dec!(20),
            target_profit: dec!(30),
        }
    }

    struct FailingSource;

    #[async_trait]
    impl MarketDataSource for FailingSource {
        async fn instruments(&self, _exchange: &str) -> DataResult<Vec<Instrument>> {
            Err(DataError::Api {
                status: 403,
                body: "TokenException".to_string(),
            })
        }

        async fn historical_bars(
            &self,
            _token: u64,
            _from: NaiveDate,
            _to: NaiveDate,
            _interval: TimeFrame,
        ) -> DataResult<Vec<Kline>> {
            Ok(Vec::new())
        }
    }

    /// Serves a flat underlying with a fixed straddle for every weekday
    struct StaticSource;

    fn instrument(token: u64, symbol: &str, name: &str, strike: Decimal, kind: &str) -> Instrument {
        Instrument {
            instrument_token: token,
            tradingsymbol: symbol.to_string(),
            name: name.to_string(),
            expiry: NaiveDate::from_ymd_opt(2024, 1, 25),
            strike,
            instrument_type: kind.to_string(),
            segment: String::new(),
            exchange: String::new(),
        }
    }

    #[async_trait]
    impl MarketDataSource for StaticSource {
        async fn instruments(&self, exchange: &str) -> DataResult<Vec<Instrument>> {
            Ok(match exchange {
                "NSE" => vec![instrument(1, "NIFTY 50", "NIFTY 50", Decimal::ZERO, "EQ")],
                _ => vec![
                    instrument(2, "NIFTY24JAN21500CE", "NIFTY", dec!(21500), "CE"),
                    instrument(3, "NIFTY24JAN21500PE", "NIFTY", dec!(21500), "PE"),
                ],
            })
        }

        async fn historical_bars(
            &self,
            token: u64,
            from: NaiveDate,
            to: NaiveDate,
            _interval: TimeFrame,
        ) -> DataResult<Vec<Kline>> {
            let close = if token == 1 { dec!(21510) } else { dec!(150) };
            Ok(from
                .iter_days()
                .take_while(|d| *d <= to)
                .map(|d| {
                    let open_time = d.and_hms_opt(3, 45, 0).unwrap().and_utc().timestamp_millis();
                    Kline {
                        open_time,
                        open: close,
                        high: close,
                        low: close,
                        close,
                        volume: dec!(1),
                    }
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn test_without_source_uses_synthetic() {
        let mut rng = StdRng::seed_from_u64(5);
        let data = load_historical_data(&params((2024, 1, 1), (2024, 1, 31)), None, &mut rng).await;

        assert_eq!(data.source, DataSource::Synthetic);
        assert_eq!(data.points.len(), 23);
    }

    #[tokio::test]
    async fn test_source_error_falls_back_to_synthetic() {
        let mut rng = StdRng::seed_from_u64(5);
        let source = FailingSource;
        let data = load_historical_data(
            &params((2024, 1, 1), (2024, 1, 31)),
            Some(&source),
            &mut rng,
        )
        .await;

        assert_eq!(data.source, DataSource::Synthetic);
        assert!(!data.points.is_empty());
        assert!(data
            .points
            .iter()
            .all(|p| !matches!(p.date.weekday(), Weekday::Sat | Weekday::Sun)));
    }

    #[tokio::test]
    async fn test_broker_series_skips_weekends() {
        let mut rng = StdRng::seed_from_u64(5);
        let source = StaticSource;
        // Mon 2024-01-01 .. Sun 2024-01-07
        let data = load_historical_data(&params((2024, 1, 1), (2024, 1, 7)), Some(&source), &mut rng).await;

        assert_eq!(data.source, DataSource::Broker);
        assert_eq!(data.points.len(), 5);
        assert!(data.points.iter().all(|p| p.straddle_price == dec!(300)));
    }

    #[tokio::test]
    async fn test_inverted_range_is_empty() {
        let mut rng = StdRng::seed_from_u64(5);
        let source = StaticSource;
        let data = load_historical_data(&params((2024, 2, 1), (2024, 1, 1)), Some(&source), &mut rng).await;

        assert_eq!(data.source, DataSource::Synthetic);
        assert!(data.points.is_empty());
    }
}
