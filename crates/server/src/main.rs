//! rds-backtest - reverse decay straddle backtester
//!
//! Usage:
//!   rds-backtest run --symbol NIFTY --from 2024-01-01 --to 2024-06-30   - Backtest from CLI
//!   rds-backtest serve --port 3001                                     - Launch the HTTP API
//!   rds-backtest history --limit 20                                    - List saved runs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use engine::{
    get_catalog, parse_iso_date, run_backtest, BacktestParams, BacktestResult, BrokerClient,
    BrokerConfig, MarketDataSource, StrategyKind, TimeFrame,
};
use persistence::repository::{BacktestRunRecord, BacktestRunRepository};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

const APP_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "-", env!("GIT_HASH"));
const DEFAULT_DB_PATH: &str = "data/backtests.db";
/// Longest accepted backtest window (about ten years of calendar days)
const MAX_SPAN_DAYS: i64 = 3660;

#[derive(Parser)]
#[command(name = "rds-backtest")]
#[command(about = "Reverse decay and IV spike straddle backtester", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the HTTP API
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(short, long, default_value_t = 3001)]
        port: u16,
    },
    /// Run a single backtest from CLI
    Run {
        /// Underlying symbol (e.g. NIFTY, BANKNIFTY)
        #[arg(long)]
        symbol: String,
        /// First date, YYYY-MM-DD
        #[arg(long, value_parser = parse_iso_date)]
        from: NaiveDate,
        /// Last date, YYYY-MM-DD
        #[arg(long, value_parser = parse_iso_date)]
        to: NaiveDate,
        /// Bar interval: minute, 5minute, 15minute, 30minute, 60minute, day
        #[arg(long, default_value = "day")]
        time_frame: TimeFrame,
        /// Strategy: reverseDecay, ivSpike, combined
        #[arg(long, default_value = "reverseDecay")]
        strategy: StrategyKind,
        /// Entry threshold (strategy default if omitted)
        #[arg(long)]
        entry_threshold: Option<f64>,
        /// Exit threshold (strategy default if omitted)
        #[arg(long, allow_negative_numbers = true)]
        exit_threshold: Option<f64>,
        /// Stop loss in percent of the entry straddle price
        #[arg(long)]
        stop_loss: Option<Decimal>,
        /// Target profit in percent of the entry straddle price
        #[arg(long)]
        target_profit: Option<Decimal>,
        /// Seed for the synthetic series (random if omitted)
        #[arg(long)]
        seed: Option<u64>,
        /// Optional JSON export path
        #[arg(long)]
        export: Option<String>,
        /// Save the run to the history database
        #[arg(long)]
        save: bool,
        /// Skip the broker and use synthetic data
        #[arg(long)]
        synthetic: bool,
    },
    /// List saved backtest runs
    History {
        /// Number of runs to show
        #[arg(long, default_value_t = 20)]
        limit: i64,
        /// Only runs for this symbol
        #[arg(long)]
        symbol: Option<String>,
    },
}

#[derive(Clone)]
struct AppState {
    broker: Option<Arc<BrokerClient>>,
    db: Arc<persistence::Database>,
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,engine=debug,rds_backtest=debug,sqlx=warn,hyper=info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,engine=info,rds_backtest=info,sqlx=warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Serve { host, port } => {
            cmd_serve(&host, port).await?;
        }
        Commands::Run {
            symbol,
            from,
            to,
            time_frame,
            strategy,
            entry_threshold,
            exit_threshold,
            stop_loss,
            target_profit,
            seed,
            export,
            save,
            synthetic,
        } => {
            let defaults = get_catalog()
                .into_iter()
                .find(|entry| entry.id == strategy)
                .ok_or_else(|| anyhow::anyhow!("No catalog entry for strategy {}", strategy))?;

            let params = BacktestParams {
                symbol,
                from_date: from,
                to_date: to,
                time_frame,
                strategy,
                entry_threshold: entry_threshold.unwrap_or(defaults.entry_threshold),
                exit_threshold: exit_threshold.unwrap_or(defaults.exit_threshold),
                stop_loss: stop_loss.map_or_else(|| decimal_from_f64(defaults.stop_loss), Ok)?,
                target_profit: target_profit
                    .map_or_else(|| decimal_from_f64(defaults.target_profit), Ok)?,
            };
            cmd_run(params, seed, export, save, synthetic).await?;
        }
        Commands::History { limit, symbol } => {
            cmd_history(limit, symbol.as_deref()).await?;
        }
    }

    Ok(())
}

// ============================================================================
// Shared setup
// ============================================================================

fn db_path() -> String {
    std::env::var("BACKTEST_DB_PATH").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string())
}

async fn open_database() -> anyhow::Result<persistence::Database> {
    let path = db_path();
    let db = persistence::Database::new(&path).await.map_err(|e| {
        error!("Failed to initialize database: {}", e);
        anyhow::anyhow!("Database initialization failed: {}", e)
    })?;
    info!("Database initialized: {}", path);
    Ok(db)
}

/// Broker client from `BROKER_*` variables, `None` when not configured
fn broker_from_env() -> Option<BrokerClient> {
    let Some(config) = BrokerConfig::from_env() else {
        info!("Broker credentials not set, backtests will use synthetic data");
        return None;
    };

    match BrokerClient::new(config) {
        Ok(client) => {
            info!(base_url = %client.config().base_url, "Broker client configured");
            Some(client)
        }
        Err(e) => {
            warn!(error = %e, "Broker client unavailable, backtests will use synthetic data");
            None
        }
    }
}

fn decimal_from_f64(value: f64) -> anyhow::Result<Decimal> {
    Decimal::try_from(value).map_err(|e| anyhow::anyhow!("Invalid decimal {}: {}", value, e))
}

/// Run id: SHA-256 of the params, seed and wall-clock time
fn run_id(params: &BacktestParams, seed: u64) -> anyhow::Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(params)?);
    hasher.update(seed.to_le_bytes());
    hasher.update(Utc::now().timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

fn to_record(
    id: &str,
    params: &BacktestParams,
    seed: u64,
    result: &BacktestResult,
) -> anyhow::Result<BacktestRunRecord> {
    let summary = &result.summary;
    Ok(BacktestRunRecord {
        id: id.to_string(),
        symbol: params.symbol.clone(),
        strategy: params.strategy.to_string(),
        from_date: params.from_date.to_string(),
        to_date: params.to_date.to_string(),
        time_frame: params.time_frame.to_string(),
        data_source: result.data_source.to_string(),
        // SQLite has no unsigned integers; the bit pattern round-trips
        seed: Some(seed as i64),
        params_json: serde_json::to_string(params)?,
        total_trades: summary.total_trades as i64,
        win_rate: summary.win_rate.to_string(),
        net_pnl: summary.net_pnl.to_string(),
        net_pnl_percent: summary.net_pnl_percent.to_string(),
        profit_factor: summary.profit_factor.to_string(),
        max_drawdown: summary.max_drawdown.to_string(),
        sharpe_ratio: summary.sharpe_ratio.to_string(),
        summary_json: serde_json::to_string(summary)?,
        trades_json: serde_json::to_string(&result.trades)?,
        equity_curve_json: serde_json::to_string(&result.equity_curve)?,
        created_at: None,
    })
}

/// List view of a saved run (no trades or curve)
fn run_overview_json(r: &BacktestRunRecord) -> serde_json::Value {
    serde_json::json!({
        "id": r.id,
        "symbol": r.symbol,
        "strategy": r.strategy,
        "fromDate": r.from_date,
        "toDate": r.to_date,
        "timeFrame": r.time_frame,
        "dataSource": r.data_source,
        "seed": r.seed.map(|s| s as u64),
        "totalTrades": r.total_trades,
        "winRate": r.win_rate,
        "netPnl": r.net_pnl,
        "netPnlPercent": r.net_pnl_percent,
        "profitFactor": r.profit_factor,
        "maxDrawdown": r.max_drawdown,
        "sharpeRatio": r.sharpe_ratio,
        "createdAt": r.created_at,
    })
}

/// Full view of a saved run with the stored JSON documents expanded
fn run_detail_json(r: &BacktestRunRecord) -> serde_json::Value {
    let parse = |raw: &str| serde_json::from_str::<serde_json::Value>(raw).unwrap_or_default();

    let mut value = run_overview_json(r);
    value["params"] = parse(&r.params_json);
    value["summary"] = parse(&r.summary_json);
    value["trades"] = parse(&r.trades_json);
    value["equityCurve"] = parse(&r.equity_curve_json);
    value
}

// ============================================================================
// Serve command - Axum web server
// ============================================================================

async fn cmd_serve(host: &str, port: u16) -> anyhow::Result<()> {
    info!("rds-backtest v{} starting...", APP_VERSION);

    let db = open_database().await?;
    let state = AppState {
        broker: broker_from_env().map(Arc::new),
        db: Arc::new(db),
    };
    let data_mode = if state.broker.is_some() { "broker" } else { "synthetic" };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(api_health))
        .route("/strategies", get(api_strategies))
        .route("/backtest", post(api_run_backtest))
        .route("/backtests", get(api_list_backtests))
        .route("/backtests/:id", get(api_get_backtest).delete(api_delete_backtest))
        .with_state(state);

    let app = Router::new().nest("/api", api_routes).layer(cors);

    let addr: std::net::SocketAddr = format!("{}:{}", host, port).parse()?;
    println!("\n=== rds-backtest v{} ===", APP_VERSION);
    println!("Straddle Backtest Server");
    println!("Listening on http://{}", addr);
    println!("\nEndpoints:");
    println!("  GET    /api/health           - Health check");
    println!("  GET    /api/strategies       - Strategy catalog with default thresholds");
    println!("  POST   /api/backtest         - Run a backtest");
    println!("  GET    /api/backtests        - Saved runs (limit, symbol)");
    println!("  GET    /api/backtests/:id    - Saved run with trades and equity curve");
    println!("  DELETE /api/backtests/:id    - Delete a saved run");
    println!("\n  Data:     {}", data_mode);
    println!("  Database: {}", db_path());
    println!("\nPress Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Run command - CLI mode (no web server)
// ============================================================================

/// Reject date windows too long to simulate. Inverted ranges pass and yield no data.
fn check_span(params: &BacktestParams) -> Result<(), String> {
    let span = (params.to_date - params.from_date).num_days();
    if span > MAX_SPAN_DAYS {
        return Err(format!(
            "date range spans {} days, maximum is {}",
            span, MAX_SPAN_DAYS
        ));
    }
    Ok(())
}

async fn cmd_run(
    params: BacktestParams,
    seed: Option<u64>,
    export: Option<String>,
    save: bool,
    synthetic: bool,
) -> anyhow::Result<()> {
    info!("rds-backtest v{} - CLI mode", APP_VERSION);
    check_span(&params).map_err(anyhow::Error::msg)?;

    let broker = if synthetic { None } else { broker_from_env() };
    let seed = seed.unwrap_or_else(rand::random);
    let mut rng = StdRng::seed_from_u64(seed);

    let result = run_backtest(
        &params,
        broker.as_ref().map(|b| b as &dyn MarketDataSource),
        &mut rng,
    )
    .await;

    print_result(&params, seed, &result);

    if save {
        let db = open_database().await?;
        let id = run_id(&params, seed)?;
        let record = to_record(&id, &params, seed, &result)?;
        BacktestRunRepository::new(db.pool())
            .save(&record)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to save run: {}", e))?;
        println!("\nSaved run {}", id);
    }

    if let Some(export_path) = export {
        let export_data = serde_json::json!({
            "generatedAt": Utc::now().to_rfc3339(),
            "version": APP_VERSION,
            "params": params,
            "seed": seed,
            "result": result,
        });
        let json = serde_json::to_string_pretty(&export_data)?;
        std::fs::write(&export_path, &json)?;
        println!("\nResult exported to {}", export_path);
    }

    Ok(())
}

fn print_result(params: &BacktestParams, seed: u64, result: &BacktestResult) {
    let s = &result.summary;

    println!(
        "\n{} {} {} → {} ({} bars, {} data, seed {})",
        params.strategy.display_name(),
        params.symbol,
        params.from_date,
        params.to_date,
        result.bars,
        result.data_source,
        seed
    );

    if !result.trades.is_empty() {
        println!(
            "\n  {:>3}  {:<10} {:<10} {:>9} {:>9} {:>9} {:>8} {:>4}  {:<11}",
            "#", "Entry", "Exit", "EntryPx", "ExitPx", "PnL", "PnL%", "Bars", "Reason"
        );
        println!("  {}", "-".repeat(86));
        for (i, t) in result.trades.iter().enumerate() {
            println!(
                "  {:>3}  {:<10} {:<10} {:>9} {:>9} {:>9} {:>7}% {:>4}  {:<11}",
                i + 1,
                t.entry_date.to_string(),
                t.exit_date.to_string(),
                t.entry_price.round_dp(2).to_string(),
                t.exit_price.round_dp(2).to_string(),
                t.pnl.round_dp(2).to_string(),
                t.pnl_percent.round_dp(2).to_string(),
                t.duration,
                format!("{:?}", t.exit_reason),
            );
        }
    }

    println!("\nSummary:");
    println!("  Trades:         {} ({} won, {} lost)", s.total_trades, s.winning_trades, s.losing_trades);
    println!("  Win rate:       {}%", (s.win_rate * Decimal::ONE_HUNDRED).round_dp(2));
    println!("  Avg win/loss:   {} / {}", s.average_win.round_dp(2), s.average_loss.round_dp(2));
    println!("  Profit factor:  {}", s.profit_factor.round_dp(2));
    println!("  Net PnL:        {} ({}%)", s.net_pnl.round_dp(2), s.net_pnl_percent.round_dp(2));
    println!("  Max drawdown:   {}", s.max_drawdown.round_dp(2));
    println!("  Sharpe:         {}", s.sharpe_ratio.round_dp(2));
    println!("  Avg duration:   {} bars", s.average_duration.round_dp(1));
}

// ============================================================================
// History command
// ============================================================================

async fn cmd_history(limit: i64, symbol: Option<&str>) -> anyhow::Result<()> {
    let db = open_database().await?;
    let repo = BacktestRunRepository::new(db.pool());

    let runs = repo
        .get_recent(limit, symbol)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load history: {}", e))?;
    let total = repo
        .count()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to count runs: {}", e))?;

    if runs.is_empty() {
        println!("\nNo saved runs.");
        return Ok(());
    }

    println!("\n{} of {} saved runs:", runs.len(), total);
    println!(
        "  {:<12} {:<10} {:<13} {:<10} {:<10} {:<9} {:>6} {:>10} {:>7}",
        "Id", "Symbol", "Strategy", "From", "To", "Data", "Trades", "NetPnL", "Sharpe"
    );
    println!("  {}", "-".repeat(95));
    for r in &runs {
        println!(
            "  {:<12} {:<10} {:<13} {:<10} {:<10} {:<9} {:>6} {:>10} {:>7}",
            &r.id[..r.id.len().min(12)],
            r.symbol,
            r.strategy,
            r.from_date,
            r.to_date,
            r.data_source,
            r.total_trades,
            r.net_pnl,
            r.sharpe_ratio,
        );
    }

    Ok(())
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health
async fn api_health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "rds-backtest",
        "version": APP_VERSION,
        "broker": state.broker.is_some(),
    }))
}

/// GET /api/strategies - catalog with default thresholds
async fn api_strategies() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "strategies": get_catalog(),
    }))
}

/// Body for POST /api/backtest
#[derive(Deserialize)]
struct BacktestRequest {
    #[serde(flatten)]
    params: BacktestParams,
    seed: Option<u64>,
    #[serde(default)]
    save: bool,
}

/// POST /api/backtest - run a backtest, optionally saving it
async fn api_run_backtest(
    State(state): State<AppState>,
    Json(request): Json<BacktestRequest>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let BacktestRequest { params, seed, save } = request;
    if let Err(reason) = check_span(&params) {
        warn!(symbol = %params.symbol, "Rejected backtest request: {}", reason);
        return Err(StatusCode::BAD_REQUEST);
    }
    let seed = seed.unwrap_or_else(rand::random);

    info!(
        symbol = %params.symbol,
        strategy = %params.strategy,
        from = %params.from_date,
        to = %params.to_date,
        seed,
        "Backtest requested via API"
    );

    let mut rng = StdRng::seed_from_u64(seed);
    let result = run_backtest(
        &params,
        state.broker.as_deref().map(|b| b as &dyn MarketDataSource),
        &mut rng,
    )
    .await;

    let id = if save {
        let record = run_id(&params, seed)
            .and_then(|id| to_record(&id, &params, seed, &result))
            .map_err(|e| {
                error!("Failed to build run record: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            })?;
        BacktestRunRepository::new(state.db.pool())
            .save(&record)
            .await
            .map_err(|e| {
                error!("Failed to save run: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            })?;
        Some(record.id)
    } else {
        None
    };

    Ok(Json(serde_json::json!({
        "success": true,
        "id": id,
        "seed": seed,
        "result": result,
    })))
}

/// Query params for the run history
#[derive(Deserialize)]
struct HistoryParams {
    #[serde(default = "default_history_limit")]
    limit: i64,
    symbol: Option<String>,
}

fn default_history_limit() -> i64 {
    20
}

/// GET /api/backtests - saved runs, newest first
async fn api_list_backtests(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Json<serde_json::Value> {
    let repo = BacktestRunRepository::new(state.db.pool());
    let limit = params.limit.clamp(1, 500);

    let runs = repo.get_recent(limit, params.symbol.as_deref()).await;
    let total = repo.count().await;

    match (runs, total) {
        (Ok(records), Ok(total)) => Json(serde_json::json!({
            "success": true,
            "data": records.iter().map(run_overview_json).collect::<Vec<_>>(),
            "total": total,
            "limit": limit,
        })),
        (Err(e), _) | (_, Err(e)) => Json(serde_json::json!({
            "success": false,
            "error": format!("Failed to query run history: {}", e),
            "data": [],
            "total": 0,
        })),
    }
}

/// GET /api/backtests/:id - saved run with trades and equity curve
async fn api_get_backtest(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let repo = BacktestRunRepository::new(state.db.pool());
    match repo.get_by_id(&id).await {
        Ok(Some(record)) => Ok(Json(serde_json::json!({
            "success": true,
            "run": run_detail_json(&record),
        }))),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!("Failed to load run {}: {}", id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// DELETE /api/backtests/:id
async fn api_delete_backtest(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let repo = BacktestRunRepository::new(state.db.pool());
    match repo.delete(&id).await {
        Ok(true) => {
            info!(id = %id, "Deleted saved run");
            Ok(Json(serde_json::json!({ "success": true })))
        }
        Ok(false) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!("Failed to delete run {}: {}", id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::{BacktestEngine, DataSource};
    use rust_decimal_macros::dec;

    fn params() -> BacktestParams {
        BacktestParams {
            symbol: "NIFTY".to_string(),
            from_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            to_date: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            time_frame: TimeFrame::Day,
            strategy: StrategyKind::Combined,
            entry_threshold: 0.2,
            exit_threshold: 0.03,
            stop_loss: dec!(20),
            target_profit: dec!(35),
        }
    }

    #[test]
    fn test_span_limit() {
        let mut p = params();
        assert!(check_span(&p).is_ok());

        p.from_date = NaiveDate::from_ymd_opt(1, 1, 1).unwrap();
        p.to_date = NaiveDate::from_ymd_opt(9999, 12, 31).unwrap();
        assert!(check_span(&p).is_err());

        // Inverted ranges run and produce an empty series
        std::mem::swap(&mut p.from_date, &mut p.to_date);
        assert!(check_span(&p).is_ok());
    }

    #[tokio::test]
    async fn test_api_rejects_oversized_range() {
        let state = AppState {
            broker: None,
            db: Arc::new(persistence::Database::in_memory().await.unwrap()),
        };
        let mut p = params();
        p.from_date = NaiveDate::from_ymd_opt(1, 1, 1).unwrap();
        p.to_date = NaiveDate::from_ymd_opt(9999, 12, 31).unwrap();
        let request = BacktestRequest {
            params: p,
            seed: Some(1),
            save: false,
        };

        let response = api_run_backtest(State(state), Json(request)).await;
        assert_eq!(response.err(), Some(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_run_id_is_sha256_hex() {
        let id = run_id(&params(), 7).unwrap();
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_request_body_accepts_params_with_seed() {
        let body = r#"{
            "symbol": "BANKNIFTY",
            "fromDate": "2024-01-01",
            "toDate": "2024-02-01",
            "strategy": "ivSpike",
            "entryThreshold": 0.1,
            "exitThreshold": 0,
            "stopLoss": 15,
            "targetProfit": 25,
            "seed": 42
        }"#;
        let request: BacktestRequest = serde_json::from_str(body).unwrap();
        assert_eq!(request.params.symbol, "BANKNIFTY");
        assert_eq!(request.params.strategy, StrategyKind::IvSpike);
        assert_eq!(request.params.target_profit, dec!(25));
        assert_eq!(request.seed, Some(42));
        assert!(!request.save);
    }

    #[test]
    fn test_record_round_trips_documents() {
        let p = params();
        let data = engine::generate_synthetic_data(p.from_date, p.to_date, &mut StdRng::seed_from_u64(3));
        let result = BacktestEngine::run(&p, &data, DataSource::Synthetic);

        let record = to_record("run-1", &p, u64::MAX, &result).unwrap();
        assert_eq!(record.strategy, "combined");
        assert_eq!(record.data_source, "synthetic");
        assert_eq!(record.total_trades as usize, result.trades.len());

        let detail = run_detail_json(&record);
        assert_eq!(detail["seed"], serde_json::json!(u64::MAX));
        assert_eq!(detail["params"]["symbol"], "NIFTY");
        assert_eq!(
            detail["equityCurve"].as_array().map(Vec::len),
            Some(result.trades.len() + 1)
        );
        assert_eq!(detail["equityCurve"][0]["date"], "Start");
    }
}
