//! Database schema definitions

/// SQL to create all tables
/// NOTE: Decimal summary fields are stored as TEXT to preserve rust_decimal::Decimal precision
pub const CREATE_TABLES: &str = r#"
-- Saved backtest runs
CREATE TABLE IF NOT EXISTS backtest_runs (
    id TEXT PRIMARY KEY,
    symbol TEXT NOT NULL,
    strategy TEXT NOT NULL,
    from_date TEXT NOT NULL,
    to_date TEXT NOT NULL,
    time_frame TEXT NOT NULL,
    data_source TEXT NOT NULL,
    seed INTEGER,
    params_json TEXT NOT NULL,
    total_trades INTEGER NOT NULL DEFAULT 0,
    win_rate TEXT NOT NULL DEFAULT '0',
    net_pnl TEXT NOT NULL DEFAULT '0',
    net_pnl_percent TEXT NOT NULL DEFAULT '0',
    profit_factor TEXT NOT NULL DEFAULT '0',
    max_drawdown TEXT NOT NULL DEFAULT '0',
    sharpe_ratio TEXT NOT NULL DEFAULT '0',
    summary_json TEXT NOT NULL,
    trades_json TEXT NOT NULL,
    equity_curve_json TEXT NOT NULL,
    created_at INTEGER DEFAULT (strftime('%s', 'now'))
);

-- ========== INDEXES ==========

CREATE INDEX IF NOT EXISTS idx_runs_symbol ON backtest_runs(symbol);
CREATE INDEX IF NOT EXISTS idx_runs_created ON backtest_runs(created_at DESC)
"#;
