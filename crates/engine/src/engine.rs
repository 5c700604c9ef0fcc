//! Bar-by-bar straddle backtesting engine

use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, info};

use crate::api::MarketDataSource;
use crate::data::load_historical_data;
use crate::metrics::{build_equity_curve, calculate_summary};
use crate::strategy::risk_factor;
use crate::types::*;

/// Position state during simulation
struct OpenPosition {
    entry_index: usize,
    entry_price: Decimal,
    metrics: EntryMetrics,
}

impl OpenPosition {
    fn pnl_percent(&self, price: Decimal) -> Decimal {
        if self.entry_price > Decimal::ZERO {
            (price - self.entry_price) / self.entry_price * dec!(100)
        } else {
            Decimal::ZERO
        }
    }
}

/// Backtesting engine that simulates a single straddle position bar by bar
pub struct BacktestEngine;

impl BacktestEngine {
    /// Walk the series and return the completed trades.
    ///
    /// Flat: enter on the strategy's entry signal. In position: exit on stop
    /// loss, then target, then the strategy's exit signal, checked in that
    /// order. A position still open on the last bar is closed there.
    pub fn execute(params: &BacktestParams, data: &[HistoricalDataPoint]) -> Vec<BacktestTrade> {
        let mut trades: Vec<BacktestTrade> = Vec::new();
        let mut position: Option<OpenPosition> = None;
        let last_index = data.len().saturating_sub(1);

        info!(
            symbol = %params.symbol,
            strategy = %params.strategy,
            bars = data.len(),
            entry_threshold = params.entry_threshold,
            exit_threshold = params.exit_threshold,
            "Starting backtest"
        );

        for (index, point) in data.iter().enumerate() {
            let price = point.straddle_price;

            let exit_reason = match &position {
                None => {
                    if params.strategy.entry_signal(point, params.entry_threshold) {
                        position = Some(OpenPosition {
                            entry_index: index,
                            entry_price: price,
                            metrics: EntryMetrics {
                                rds: point.rds,
                                iv_score: point.iv_score,
                                risk_factor: risk_factor(point.rds, point.iv_score),
                            },
                        });

                        debug!(
                            date = %point.date,
                            price = %price,
                            rds = point.rds,
                            iv_score = point.iv_score,
                            "Opened straddle position"
                        );
                    }
                    // Only the end of the series can close a position on its entry bar
                    (position.is_some() && index == last_index).then_some(ExitReason::EndOfPeriod)
                }
                Some(pos) => {
                    let pnl_pct = pos.pnl_percent(price);
                    if pnl_pct <= -params.stop_loss {
                        Some(ExitReason::StopLoss)
                    } else if pnl_pct >= params.target_profit {
                        Some(ExitReason::Target)
                    } else if params.strategy.exit_signal(point, params.exit_threshold) {
                        Some(ExitReason::Threshold)
                    } else if index == last_index {
                        Some(ExitReason::EndOfPeriod)
                    } else {
                        None
                    }
                }
            };

            if let Some(reason) = exit_reason {
                if let Some(pos) = position.take() {
                    let trade = Self::close(&pos, data, index, reason);
                    debug!(
                        entry = %trade.entry_price,
                        exit = %trade.exit_price,
                        pnl = %trade.pnl,
                        reason = ?reason,
                        "Closed straddle position"
                    );
                    trades.push(trade);
                }
            }
        }

        trades
    }

    fn close(
        pos: &OpenPosition,
        data: &[HistoricalDataPoint],
        exit_index: usize,
        exit_reason: ExitReason,
    ) -> BacktestTrade {
        let exit = &data[exit_index];
        let exit_price = exit.straddle_price;

        BacktestTrade {
            entry_date: data[pos.entry_index].date,
            exit_date: exit.date,
            entry_index: pos.entry_index,
            exit_index,
            entry_price: pos.entry_price,
            exit_price,
            pnl: exit_price - pos.entry_price,
            pnl_percent: pos.pnl_percent(exit_price),
            duration: exit_index - pos.entry_index,
            exit_reason,
            entry_metrics: pos.metrics,
        }
    }

    /// Execute and aggregate into a full result
    pub fn run(params: &BacktestParams, data: &[HistoricalDataPoint], source: DataSource) -> BacktestResult {
        let trades = Self::execute(params, data);
        let summary = calculate_summary(&trades);
        let equity_curve = build_equity_curve(&trades);

        info!(
            total_trades = summary.total_trades,
            winning_trades = summary.winning_trades,
            win_rate = %summary.win_rate.round_dp(4),
            net_pnl = %summary.net_pnl,
            max_drawdown = %summary.max_drawdown,
            data_source = %source,
            "Backtest complete"
        );

        BacktestResult {
            symbol: params.symbol.clone(),
            strategy: params.strategy,
            data_source: source,
            bars: data.len(),
            trades,
            summary,
            equity_curve,
        }
    }
}

/// Load data for `params` (broker with synthetic fallback) and run the backtest
pub async fn run_backtest(
    params: &BacktestParams,
    source: Option<&dyn MarketDataSource>,
    rng: &mut (impl Rng + Send),
) -> BacktestResult {
    let data = load_historical_data(params, source, rng).await;
    BacktestEngine::run(params, &data.points, data.source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::generate_synthetic_data;
    use crate::strategy::StrategyKind;
    use chrono::{Duration, NaiveDate};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn params(strategy: StrategyKind) -> BacktestParams {
        BacktestParams {
            symbol: "NIFTY".to_string(),
            from_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            to_date: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            time_frame: TimeFrame::Day,
            strategy,
            entry_threshold: 0.15,
            exit_threshold: 0.05,
            stop_loss: dec!(20),
            target_profit: dec!(30),
        }
    }

    /// Bars with the given (straddle, rds) pairs on consecutive days
    fn series(bars: &[(Decimal, f64)]) -> Vec<HistoricalDataPoint> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        bars.iter()
            .enumerate()
            .map(|(i, &(straddle, rds))| HistoricalDataPoint {
                date: start + Duration::days(i as i64),
                open: dec!(100),
                high: dec!(101),
                low: dec!(99),
                close: dec!(100),
                volume: dec!(1000),
                call_price: straddle / Decimal::TWO,
                put_price: straddle / Decimal::TWO,
                straddle_price: straddle,
                theoretical_price: straddle,
                rds,
                iv_score: 0.0,
            })
            .collect()
    }

    #[test]
    fn test_empty_series_has_no_trades() {
        let result = BacktestEngine::run(&params(StrategyKind::ReverseDecay), &[], DataSource::Synthetic);
        assert!(result.trades.is_empty());
        assert_eq!(result.summary, BacktestSummary::default());
        assert_eq!(result.equity_curve.len(), 1);
    }

    #[test]
    fn test_no_signal_no_trades() {
        let data = series(&[(dec!(10), 0.0), (dec!(10), 0.1), (dec!(10), 0.05)]);
        let trades = BacktestEngine::execute(&params(StrategyKind::ReverseDecay), &data);
        assert!(trades.is_empty());
    }

    #[test]
    fn test_threshold_exit() {
        let data = series(&[
            (dec!(10), 0.0),
            (dec!(10), 0.2),  // enter
            (dec!(11), 0.1),
            (dec!(11), 0.01), // rds below exit threshold
            (dec!(11), 0.1),
        ]);
        let trades = BacktestEngine::execute(&params(StrategyKind::ReverseDecay), &data);

        assert_eq!(trades.len(), 1);
        let t = &trades[0];
        assert_eq!(t.exit_reason, ExitReason::Threshold);
        assert_eq!((t.entry_index, t.exit_index), (1, 3));
        assert_eq!(t.duration, 2);
        assert_eq!(t.pnl, dec!(1));
        assert_eq!(t.pnl_percent, dec!(10));
        assert_eq!(t.entry_metrics.rds, 0.2);
    }

    #[test]
    fn test_forced_exit_at_end_of_period() {
        let data = series(&[
            (dec!(10), 0.0),
            (dec!(10), 0.0),
            (dec!(10), 0.2), // enter on second-to-last bar
            (dec!(10.5), 0.1),
        ]);
        let trades = BacktestEngine::execute(&params(StrategyKind::ReverseDecay), &data);

        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].exit_reason, ExitReason::EndOfPeriod);
        assert_eq!(trades[0].exit_date, data[3].date);
        assert_eq!(trades[0].exit_index, 3);
    }

    #[test]
    fn test_stop_loss_takes_priority_over_threshold() {
        let data = series(&[
            (dec!(10), 0.2), // enter
            (dec!(7), 0.0),  // -30% and rds below exit threshold
            (dec!(7), 0.0),
        ]);
        let trades = BacktestEngine::execute(&params(StrategyKind::ReverseDecay), &data);

        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].exit_reason, ExitReason::StopLoss);
        assert_eq!(trades[0].exit_index, 1);
    }

    #[test]
    fn test_target_takes_priority_over_threshold() {
        let data = series(&[(dec!(10), 0.2), (dec!(13), 0.0), (dec!(13), 0.0)]);
        let trades = BacktestEngine::execute(&params(StrategyKind::ReverseDecay), &data);

        assert_eq!(trades[0].exit_reason, ExitReason::Target);
        assert_eq!(trades[0].pnl_percent, dec!(30));
    }

    #[test]
    fn test_entry_on_last_bar_is_closed_there() {
        let data = series(&[(dec!(10), 0.0), (dec!(10), 0.0), (dec!(12), 0.5)]);
        let trades = BacktestEngine::execute(&params(StrategyKind::ReverseDecay), &data);

        assert_eq!(trades.len(), 1);
        let t = &trades[0];
        assert_eq!(t.exit_reason, ExitReason::EndOfPeriod);
        assert_eq!((t.entry_index, t.exit_index), (2, 2));
        assert_eq!(t.duration, 0);
        assert_eq!(t.pnl, Decimal::ZERO);
    }

    #[test]
    fn test_exit_bar_does_not_reenter() {
        // Target hit on bar 1; its rds would also signal an entry
        let data = series(&[
            (dec!(10), 0.2),
            (dec!(14), 0.3),
            (dec!(14), 0.3),
            (dec!(14), 0.0),
        ]);
        let trades = BacktestEngine::execute(&params(StrategyKind::ReverseDecay), &data);

        assert_eq!(trades.len(), 2);
        assert_eq!((trades[0].entry_index, trades[0].exit_index), (0, 1));
        assert_eq!((trades[1].entry_index, trades[1].exit_index), (2, 3));
    }

    #[test]
    fn test_trades_never_overlap_on_synthetic_data() {
        let mut rng = StdRng::seed_from_u64(2024);
        for strategy in StrategyKind::all() {
            let p = params(*strategy);
            let data = generate_synthetic_data(p.from_date, p.to_date, &mut rng);
            let trades = BacktestEngine::execute(&p, &data);
            let last = data.len() - 1;

            for t in &trades {
                assert!(
                    t.exit_index > t.entry_index || (t.exit_index == last && t.exit_reason == ExitReason::EndOfPeriod),
                    "trade exits before it enters: {:?}",
                    t
                );
                assert_eq!(t.duration, t.exit_index - t.entry_index);
                assert!(t.entry_metrics.risk_factor >= 0.0 && t.entry_metrics.risk_factor <= 100.0);
            }
            for pair in trades.windows(2) {
                assert!(pair[1].entry_index > pair[0].exit_index);
            }
        }
    }

    #[tokio::test]
    async fn test_run_backtest_without_source() {
        let mut rng = StdRng::seed_from_u64(99);
        let p = params(StrategyKind::Combined);
        let result = run_backtest(&p, None, &mut rng).await;

        assert_eq!(result.data_source, DataSource::Synthetic);
        assert_eq!(result.strategy, StrategyKind::Combined);
        assert_eq!(result.equity_curve.len(), result.trades.len() + 1);
        assert_eq!(result.summary.total_trades as usize, result.trades.len());
    }
}
