//! Broker REST client for instruments and historical candles
//!
//! Speaks the Kite Connect v3 wire format: the instrument dump is a CSV file,
//! historical candles come back as JSON arrays of
//! `[timestamp, open, high, low, close, volume(, oi)]`.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use tracing::{debug, info};

use super::{Instrument, MarketDataSource};
use crate::data::InstrumentLookup;
use crate::error::{DataError, DataResult};
use crate::types::{Kline, TimeFrame};

const DEFAULT_BASE_URL: &str = "https://api.kite.trade";
const API_VERSION: &str = "3";
const REQUEST_TIMEOUT_SECS: u64 = 30;
/// Pause between paginated historical requests (broker allows ~3 req/s)
const PAGE_DELAY_MS: u64 = 350;

/// Broker connection settings, usually read from the environment
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub api_key: String,
    pub access_token: String,
    pub base_url: String,
    pub lookup: InstrumentLookup,
}

impl BrokerConfig {
    /// Read `BROKER_*` variables. Returns `None` when key or token is missing.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("BROKER_API_KEY").ok().filter(|s| !s.is_empty())?;
        let access_token = std::env::var("BROKER_ACCESS_TOKEN")
            .ok()
            .filter(|s| !s.is_empty())?;

        let defaults = InstrumentLookup::default();
        let lookup = InstrumentLookup {
            underlying_exchange: std::env::var("BROKER_UNDERLYING_EXCHANGE")
                .unwrap_or(defaults.underlying_exchange),
            options_exchange: std::env::var("BROKER_OPTIONS_EXCHANGE")
                .unwrap_or(defaults.options_exchange),
            strike_step: std::env::var("BROKER_STRIKE_STEP")
                .ok()
                .and_then(|s| Decimal::from_str(&s).ok())
                .filter(|s| *s > Decimal::ZERO)
                .unwrap_or(defaults.strike_step),
            utc_offset_minutes: std::env::var("BROKER_UTC_OFFSET_MINUTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.utc_offset_minutes),
        };

        Some(Self {
            api_key,
            access_token,
            base_url: std::env::var("BROKER_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            lookup,
        })
    }
}

/// Broker market data client
#[derive(Clone)]
pub struct BrokerClient {
    client: Client,
    config: BrokerConfig,
}

#[derive(Debug, Deserialize)]
struct HistoricalResponse {
    data: HistoricalData,
}

#[derive(Debug, Deserialize)]
struct HistoricalData {
    candles: Vec<Vec<serde_json::Value>>,
}

impl BrokerClient {
    pub fn new(config: BrokerConfig) -> DataResult<Self> {
        if config.api_key.is_empty() || config.access_token.is_empty() {
            return Err(DataError::NotConfigured);
        }

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    fn authorization(&self) -> String {
        format!("token {}:{}", self.config.api_key, self.config.access_token)
    }

    async fn get_text(&self, url: &str, query: &[(&str, String)]) -> DataResult<String> {
        let response = self
            .client
            .get(url)
            .header("X-Kite-Version", API_VERSION)
            .header("Authorization", self.authorization())
            .query(query)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(DataError::Api { status, body });
        }

        Ok(response.text().await?)
    }

    /// Fetch candles for a single request window
    async fn get_candles(
        &self,
        instrument_token: u64,
        from: NaiveDate,
        to: NaiveDate,
        interval: TimeFrame,
    ) -> DataResult<Vec<Kline>> {
        let url = format!(
            "{}/instruments/historical/{}/{}",
            self.config.base_url, instrument_token, interval
        );
        let query = [
            ("from", format!("{} 00:00:00", from.format("%Y-%m-%d"))),
            ("to", format!("{} 23:59:59", to.format("%Y-%m-%d"))),
        ];

        debug!(instrument_token, %from, %to, %interval, "Fetching historical candles");

        let body = self.get_text(&url, &query).await?;
        let parsed: HistoricalResponse = serde_json::from_str(&body)
            .map_err(|e| DataError::Malformed(format!("historical response: {}", e)))?;

        parse_candles(&parsed.data.candles)
    }
}

#[async_trait]
impl MarketDataSource for BrokerClient {
    fn instrument_lookup(&self) -> InstrumentLookup {
        self.config.lookup.clone()
    }

    async fn instruments(&self, exchange: &str) -> DataResult<Vec<Instrument>> {
        let url = format!("{}/instruments/{}", self.config.base_url, exchange);
        debug!(exchange, "Fetching instrument dump");

        let body = self.get_text(&url, &[]).await?;
        let instruments = parse_instruments_csv(&body)?;

        debug!(count = instruments.len(), "Fetched instruments");
        Ok(instruments)
    }

    /// Splits long ranges into the broker's per-request span limit
    async fn historical_bars(
        &self,
        instrument_token: u64,
        from: NaiveDate,
        to: NaiveDate,
        interval: TimeFrame,
    ) -> DataResult<Vec<Kline>> {
        let mut all_klines = Vec::new();
        let mut window_start = from;
        let span = Duration::days(interval.max_days_per_request() - 1);

        info!(instrument_token, %interval, "Fetching paginated candles from broker");

        while window_start <= to {
            let window_end = (window_start + span).min(to);
            let klines = self
                .get_candles(instrument_token, window_start, window_end, interval)
                .await?;
            all_klines.extend(klines);

            window_start = window_end + Duration::days(1);
            if window_start <= to {
                tokio::time::sleep(std::time::Duration::from_millis(PAGE_DELAY_MS)).await;
            }
        }

        info!(total = all_klines.len(), "Paginated candle fetch complete");
        Ok(all_klines)
    }
}

/// One row of the instrument dump. Columns not listed here are ignored.
#[derive(Debug, Deserialize)]
struct InstrumentRow {
    instrument_token: String,
    tradingsymbol: String,
    name: String,
    expiry: String,
    strike: String,
    instrument_type: String,
    segment: String,
    exchange: String,
}

const REQUIRED_COLUMNS: [&str; 8] = [
    "instrument_token",
    "tradingsymbol",
    "name",
    "expiry",
    "strike",
    "instrument_type",
    "segment",
    "exchange",
];

/// Parse the broker's CSV instrument dump. Columns are matched by header name;
/// rows without a numeric token are skipped.
pub fn parse_instruments_csv(body: &str) -> DataResult<Vec<Instrument>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| DataError::Malformed(format!("instrument dump header: {}", e)))?;
    if let Some(missing) = REQUIRED_COLUMNS
        .iter()
        .find(|col| !headers.iter().any(|h| h == **col))
    {
        return Err(DataError::Malformed(format!(
            "instrument dump missing column {}",
            missing
        )));
    }

    let mut instruments = Vec::new();
    for result in reader.deserialize::<InstrumentRow>() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                debug!(error = %e, "Skipping unreadable instrument row");
                continue;
            }
        };
        let Ok(instrument_token) = row.instrument_token.parse::<u64>() else {
            continue;
        };

        instruments.push(Instrument {
            instrument_token,
            tradingsymbol: row.tradingsymbol,
            name: row.name,
            expiry: NaiveDate::parse_from_str(&row.expiry, "%Y-%m-%d").ok(),
            strike: Decimal::from_str(&row.strike).unwrap_or(Decimal::ZERO),
            instrument_type: row.instrument_type,
            segment: row.segment,
            exchange: row.exchange,
        });
    }

    Ok(instruments)
}

/// Convert raw candle arrays into klines, rejecting rows that do not parse
fn parse_candles(raw: &[Vec<serde_json::Value>]) -> DataResult<Vec<Kline>> {
    raw.iter()
        .map(|row| {
            if row.len() < 6 {
                return Err(DataError::Malformed(format!(
                    "candle has {} fields, expected at least 6",
                    row.len()
                )));
            }

            let timestamp = row[0]
                .as_str()
                .and_then(|s| DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z").ok())
                .ok_or_else(|| DataError::Malformed(format!("bad candle timestamp {}", row[0])))?;

            let num = |idx: usize| -> DataResult<Decimal> {
                let text = row[idx].to_string();
                Decimal::from_str(&text)
                    .or_else(|_| Decimal::from_scientific(&text))
                    .map_err(|_| DataError::Malformed(format!("bad candle value {}", row[idx])))
            };

            Ok(Kline {
                open_time: timestamp.timestamp_millis(),
                open: num(1)?,
                high: num(2)?,
                low: num(3)?,
                close: num(4)?,
                volume: num(5)?,
            })
        })
        .collect()
}
