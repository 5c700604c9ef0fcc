//! Types for the backtesting engine

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::strategy::StrategyKind;

/// A single candlestick (OHLCV) as returned by the broker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Kline {
    pub open_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// Sampling interval, named after the broker's interval identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeFrame {
    #[serde(rename = "minute")]
    Minute,
    #[serde(rename = "5minute")]
    FiveMinute,
    #[serde(rename = "15minute")]
    FifteenMinute,
    #[serde(rename = "30minute")]
    ThirtyMinute,
    #[serde(rename = "60minute")]
    Hour,
    #[default]
    #[serde(rename = "day")]
    Day,
}

impl TimeFrame {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFrame::Minute => "minute",
            TimeFrame::FiveMinute => "5minute",
            TimeFrame::FifteenMinute => "15minute",
            TimeFrame::ThirtyMinute => "30minute",
            TimeFrame::Hour => "60minute",
            TimeFrame::Day => "day",
        }
    }

    /// Longest date span the broker serves in a single historical request
    pub fn max_days_per_request(&self) -> i64 {
        match self {
            TimeFrame::Minute => 60,
            TimeFrame::FiveMinute | TimeFrame::FifteenMinute | TimeFrame::ThirtyMinute => 100,
            TimeFrame::Hour => 400,
            TimeFrame::Day => 2000,
        }
    }
}

impl std::fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TimeFrame {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minute" | "1m" => Ok(TimeFrame::Minute),
            "5minute" | "5m" => Ok(TimeFrame::FiveMinute),
            "15minute" | "15m" => Ok(TimeFrame::FifteenMinute),
            "30minute" | "30m" => Ok(TimeFrame::ThirtyMinute),
            "60minute" | "1h" => Ok(TimeFrame::Hour),
            "day" | "1d" => Ok(TimeFrame::Day),
            other => Err(format!("unknown time frame '{}'", other)),
        }
    }
}

/// Configuration for a backtest run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestParams {
    pub symbol: String,
    #[serde(with = "iso_date")]
    pub from_date: NaiveDate,
    #[serde(with = "iso_date")]
    pub to_date: NaiveDate,
    #[serde(default)]
    pub time_frame: TimeFrame,
    pub strategy: StrategyKind,
    pub entry_threshold: f64,
    pub exit_threshold: f64,
    /// Stop loss in percent of the entry price (e.g. 20 = 20%)
    pub stop_loss: Decimal,
    /// Target profit in percent of the entry price
    pub target_profit: Decimal,
}

/// One observation of the underlying plus the derived straddle metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalDataPoint {
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub call_price: Decimal,
    pub put_price: Decimal,
    pub straddle_price: Decimal,
    /// Straddle price expected from pure time decay
    pub theoretical_price: Decimal,
    /// Reverse decay score: relative excess of the actual straddle over the decayed one
    pub rds: f64,
    /// Implied volatility deviation from the 0.25 baseline
    pub iv_score: f64,
}

/// Why a position was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExitReason {
    Target,
    StopLoss,
    Threshold,
    EndOfPeriod,
}

/// Metrics observed on the entry bar
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryMetrics {
    pub rds: f64,
    pub iv_score: f64,
    /// 0–100
    pub risk_factor: f64,
}

/// A single completed trade
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestTrade {
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub entry_index: usize,
    pub exit_index: usize,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub pnl: Decimal,
    pub pnl_percent: Decimal,
    /// Holding period in bars
    pub duration: usize,
    pub exit_reason: ExitReason,
    pub entry_metrics: EntryMetrics,
}

/// Aggregate statistics over a trade list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestSummary {
    pub total_trades: u32,
    pub winning_trades: u32,
    pub losing_trades: u32,
    /// Fraction in [0, 1]
    pub win_rate: Decimal,
    pub average_win: Decimal,
    pub average_loss: Decimal,
    pub gross_profit: Decimal,
    pub gross_loss: Decimal,
    pub profit_factor: Decimal,
    pub max_drawdown: Decimal,
    pub net_pnl: Decimal,
    pub net_pnl_percent: Decimal,
    pub sharpe_ratio: Decimal,
    pub average_duration: Decimal,
}

/// A point on the equity curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: String,
    pub equity: Decimal,
}

/// Where the historical series came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Broker,
    Synthetic,
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSource::Broker => write!(f, "broker"),
            DataSource::Synthetic => write!(f, "synthetic"),
        }
    }
}

/// Result of a backtest run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestResult {
    pub symbol: String,
    pub strategy: StrategyKind,
    pub data_source: DataSource,
    pub bars: usize,
    pub trades: Vec<BacktestTrade>,
    pub summary: BacktestSummary,
    pub equity_curve: Vec<EquityPoint>,
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp, serializes as `YYYY-MM-DD`
mod iso_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format("%Y-%m-%d").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_iso_date(&raw).map_err(serde::de::Error::custom)
    }
}

/// Parse a calendar date from `YYYY-MM-DD` or an RFC 3339 timestamp
pub fn parse_iso_date(raw: &str) -> Result<NaiveDate, String> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .map_err(|_| format!("invalid date '{}', expected YYYY-MM-DD or RFC 3339", raw))
}
