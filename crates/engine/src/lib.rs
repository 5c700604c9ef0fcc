//! Reverse decay straddle backtesting engine
//!
//! Provides:
//! - Historical data provider (broker candles with a synthetic fallback)
//! - Reverse decay, IV spike and combined threshold strategies
//! - Single-position bar-by-bar executor
//! - Summary statistics and equity curve

pub mod api;
pub mod data;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod strategy;
pub mod types;

// Re-exports for convenience
pub use api::{BrokerClient, BrokerConfig, MarketDataSource};
pub use data::{generate_synthetic_data, load_historical_data, InstrumentLookup, LoadedData};
pub use engine::{run_backtest, BacktestEngine};
pub use error::{DataError, DataResult};
pub use metrics::{build_equity_curve, calculate_summary};
pub use strategy::{get_catalog, risk_factor, StrategyCatalogEntry, StrategyKind};
pub use types::*;
