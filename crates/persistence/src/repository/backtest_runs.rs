//! Backtest runs repository: saved results for the run history

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

/// A saved backtest run. Summary figures are Decimal strings; params, summary,
/// trades and equity curve are stored as JSON documents.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BacktestRunRecord {
    pub id: String,
    pub symbol: String,
    pub strategy: String,
    pub from_date: String,
    pub to_date: String,
    pub time_frame: String,
    pub data_source: String,
    pub seed: Option<i64>,
    pub params_json: String,
    pub total_trades: i64,
    pub win_rate: String,
    pub net_pnl: String,
    pub net_pnl_percent: String,
    pub profit_factor: String,
    pub max_drawdown: String,
    pub sharpe_ratio: String,
    pub summary_json: String,
    pub trades_json: String,
    pub equity_curve_json: String,
    pub created_at: Option<i64>,
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, symbol, strategy, from_date, to_date, time_frame, data_source, seed,
           params_json, total_trades, win_rate, net_pnl, net_pnl_percent,
           profit_factor, max_drawdown, sharpe_ratio,
           summary_json, trades_json, equity_curve_json, created_at
    FROM backtest_runs
"#;

/// Repository for saved backtest runs
pub struct BacktestRunRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> BacktestRunRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Save a run (INSERT OR REPLACE by id)
    pub async fn save(&self, record: &BacktestRunRecord) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO backtest_runs (
                id, symbol, strategy, from_date, to_date, time_frame, data_source, seed,
                params_json, total_trades, win_rate, net_pnl, net_pnl_percent,
                profit_factor, max_drawdown, sharpe_ratio,
                summary_json, trades_json, equity_curve_json
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.symbol)
        .bind(&record.strategy)
        .bind(&record.from_date)
        .bind(&record.to_date)
        .bind(&record.time_frame)
        .bind(&record.data_source)
        .bind(record.seed)
        .bind(&record.params_json)
        .bind(record.total_trades)
        .bind(&record.win_rate)
        .bind(&record.net_pnl)
        .bind(&record.net_pnl_percent)
        .bind(&record.profit_factor)
        .bind(&record.max_drawdown)
        .bind(&record.sharpe_ratio)
        .bind(&record.summary_json)
        .bind(&record.trades_json)
        .bind(&record.equity_curve_json)
        .execute(self.pool)
        .await?;

        debug!(id = %record.id, symbol = %record.symbol, "Saved backtest run");
        Ok(())
    }

    /// Most recent runs first, optionally for one symbol
    pub async fn get_recent(&self, limit: i64, symbol: Option<&str>) -> DbResult<Vec<BacktestRunRecord>> {
        let mut sql = format!("{SELECT_COLUMNS} WHERE 1=1");
        if symbol.is_some() {
            sql.push_str(" AND symbol = ? COLLATE NOCASE");
        }
        sql.push_str(" ORDER BY created_at DESC, rowid DESC LIMIT ?");

        let mut query = sqlx::query_as::<_, BacktestRunRecord>(&sql);
        if let Some(sym) = symbol {
            query = query.bind(sym);
        }
        let records = query.bind(limit).fetch_all(self.pool).await?;

        Ok(records)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<BacktestRunRecord>> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?");
        let record = sqlx::query_as::<_, BacktestRunRecord>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(record)
    }

    /// Delete a run. Returns whether a row was removed.
    pub async fn delete(&self, id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM backtest_runs WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM backtest_runs")
            .fetch_one(self.pool)
            .await?;

        Ok(row.0)
    }
}
