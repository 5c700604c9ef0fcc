//! Trade list aggregation: summary statistics and the equity curve

use rust_decimal::Decimal;

use crate::data::pricing::to_f64;
use crate::types::{BacktestSummary, BacktestTrade, EquityPoint};

/// Label of the zero point that opens every equity curve
pub const EQUITY_START_LABEL: &str = "Start";

/// Aggregate a trade list. An empty list yields an all-zero summary.
pub fn calculate_summary(trades: &[BacktestTrade]) -> BacktestSummary {
    if trades.is_empty() {
        return BacktestSummary::default();
    }

    let (wins, losses): (Vec<&BacktestTrade>, Vec<&BacktestTrade>) =
        trades.iter().partition(|t| t.pnl > Decimal::ZERO);

    let total_trades = trades.len() as u32;
    let winning_trades = wins.len() as u32;
    let losing_trades = losses.len() as u32;

    let gross_profit: Decimal = wins.iter().map(|t| t.pnl).sum();
    let gross_loss: Decimal = losses.iter().map(|t| t.pnl.abs()).sum();

    let average_win = mean(gross_profit, winning_trades);
    let average_loss = mean(gross_loss, losing_trades);

    let profit_factor = if gross_loss > Decimal::ZERO {
        gross_profit / gross_loss
    } else {
        Decimal::ZERO
    };

    let net_pnl: Decimal = trades.iter().map(|t| t.pnl).sum();
    let net_pnl_percent: Decimal = trades.iter().map(|t| t.pnl_percent).sum();
    let total_duration: usize = trades.iter().map(|t| t.duration).sum();

    BacktestSummary {
        total_trades,
        winning_trades,
        losing_trades,
        win_rate: Decimal::from(winning_trades) / Decimal::from(total_trades),
        average_win,
        average_loss,
        gross_profit,
        gross_loss,
        profit_factor,
        max_drawdown: max_drawdown(trades),
        net_pnl,
        net_pnl_percent,
        sharpe_ratio: sharpe_ratio(trades),
        average_duration: Decimal::from(total_duration as u64) / Decimal::from(total_trades),
    }
}

fn mean(total: Decimal, count: u32) -> Decimal {
    if count == 0 {
        Decimal::ZERO
    } else {
        total / Decimal::from(count)
    }
}

/// Largest peak-to-trough drop of cumulative P&L, in exit order
pub fn max_drawdown(trades: &[BacktestTrade]) -> Decimal {
    let mut cumulative = Decimal::ZERO;
    let mut peak = Decimal::ZERO;
    let mut max_dd = Decimal::ZERO;

    for trade in trades {
        cumulative += trade.pnl;
        peak = peak.max(cumulative);
        max_dd = max_dd.max(peak - cumulative);
    }

    max_dd
}

/// Mean over population standard deviation of per-trade percent returns
pub fn sharpe_ratio(trades: &[BacktestTrade]) -> Decimal {
    if trades.is_empty() {
        return Decimal::ZERO;
    }

    let returns: Vec<f64> = trades.iter().map(|t| to_f64(t.pnl_percent)).collect();
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    if std_dev < 1e-10 {
        return Decimal::ZERO;
    }

    Decimal::from_str_exact(&format!("{:.4}", mean / std_dev)).unwrap_or(Decimal::ZERO)
}

/// `Start` at zero, then cumulative P&L at each trade's exit date
pub fn build_equity_curve(trades: &[BacktestTrade]) -> Vec<EquityPoint> {
    let mut curve = Vec::with_capacity(trades.len() + 1);
    curve.push(EquityPoint {
        date: EQUITY_START_LABEL.to_string(),
        equity: Decimal::ZERO,
    });

    let mut equity = Decimal::ZERO;
    for trade in trades {
        equity += trade.pnl;
        curve.push(EquityPoint {
            date: trade.exit_date.format("%Y-%m-%d").to_string(),
            equity,
        });
    }

    curve
}
