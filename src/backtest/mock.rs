use chrono::{Duration, NaiveDate};
use rand::Rng;

use super::metrics::derive_metrics;
use super::{BacktestMetrics, BacktestResult, DrawdownPoint, EquityPoint, MockTrade, ReturnBucket};
use crate::feed::types::Side;

pub const TRADING_DAYS: usize = 252;
pub const TRADE_COUNT: usize = 50;
pub const STARTING_EQUITY: f64 = 100_000.0;
pub const SYMBOLS: [&str; 5] = ["AAPL", "MSFT", "GOOGL", "AMZN", "TSLA"];

/// Static placeholder histogram; not derived from the simulated path.
pub const RETURNS_DISTRIBUTION: [(&str, u32); 6] = [
    ("-5% to -3%", 8),
    ("-3% to -1%", 15),
    ("-1% to 0%", 22),
    ("0% to 1%", 28),
    ("1% to 3%", 18),
    ("3% to 5%", 11),
];

const PLACEHOLDER_MAX_DRAWDOWN: f64 = -12.5;
const PLACEHOLDER_WIN_RATE: f64 = 58.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetricsMode {
    /// Sharpe is random, drawdown and win rate are fixed placeholders.
    #[default]
    Placeholder,
    /// Sharpe, drawdown and win rate computed from the generated series.
    Derived,
}

#[derive(Debug, Clone)]
pub struct MockOptions {
    pub start: NaiveDate,
    pub metrics: MetricsMode,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            metrics: MetricsMode::Placeholder,
        }
    }
}

/// Half-up rounding, so -0.5 goes to 0 rather than -1.
fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

fn round2(x: f64) -> f64 {
    round_half_up(x * 100.0) / 100.0
}

pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> BacktestResult {
    generate_with(rng, &MockOptions::default())
}

pub fn generate_with<R: Rng + ?Sized>(rng: &mut R, opts: &MockOptions) -> BacktestResult {
    let mut equity_data = Vec::with_capacity(TRADING_DAYS);
    let mut drawdown_data = Vec::with_capacity(TRADING_DAYS);
    let mut equity = STARTING_EQUITY;
    let mut peak = equity;

    for i in 0..TRADING_DAYS {
        let date = (opts.start + Duration::days(i as i64)).format("%b %-d").to_string();
        let change = (rng.gen::<f64>() - 0.45) * 1000.0;
        equity += change;
        peak = peak.max(equity);
        let drawdown = (equity - peak) / peak * 100.0;

        let benchmark = STARTING_EQUITY + i as f64 * 150.0 + rng.gen::<f64>() * 500.0;
        equity_data.push(EquityPoint {
            date: date.clone(),
            equity: round_half_up(equity),
            benchmark: round_half_up(benchmark),
        });
        drawdown_data.push(DrawdownPoint {
            date,
            drawdown: round2(drawdown),
        });
    }

    let returns_distribution = RETURNS_DISTRIBUTION
        .iter()
        .map(|&(range, count)| ReturnBucket { range, count })
        .collect();

    let mut trades = Vec::with_capacity(TRADE_COUNT);
    for i in 0..TRADE_COUNT {
        let is_sell = i % 2 == 1;
        let date = (opts.start + Duration::days(i as i64 * 5)).format("%-m/%-d/%Y").to_string();
        let symbol = SYMBOLS[rng.gen_range(0..SYMBOLS.len())];
        let quantity = rng.gen_range(10..110);
        let price = rng.gen::<f64>() * 500.0 + 100.0;
        let pnl = if is_sell {
            Some((rng.gen::<f64>() - 0.4) * 2000.0)
        } else {
            None
        };
        trades.push(MockTrade {
            id: i as u32 + 1,
            date,
            side: if is_sell { Side::Sell } else { Side::Buy },
            symbol,
            quantity,
            price,
            pnl,
        });
    }

    let total_return = (equity - STARTING_EQUITY) / STARTING_EQUITY * 100.0;
    let sharpe_ratio = 1.2 + rng.gen::<f64>() * 0.8;
    let metrics = match opts.metrics {
        MetricsMode::Placeholder => BacktestMetrics {
            total_return,
            annualized_return: total_return,
            sharpe_ratio,
            max_drawdown: PLACEHOLDER_MAX_DRAWDOWN,
            win_rate: PLACEHOLDER_WIN_RATE,
            total_trades: TRADE_COUNT as u32,
        },
        MetricsMode::Derived => derive_metrics(total_return, &equity_data, &drawdown_data, &trades),
    };

    BacktestResult {
        metrics,
        equity_data,
        drawdown_data,
        returns_distribution,
        trades,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn shape_is_fixed() {
        let mut rng = StdRng::seed_from_u64(7);
        let res = generate(&mut rng);
        assert_eq!(res.equity_data.len(), TRADING_DAYS);
        assert_eq!(res.drawdown_data.len(), TRADING_DAYS);
        assert_eq!(res.returns_distribution.len(), 6);
        assert_eq!(res.trades.len(), TRADE_COUNT);
        assert_eq!(res.metrics.total_trades, 50);
    }

    #[test]
    fn only_sells_carry_pnl() {
        let mut rng = StdRng::seed_from_u64(11);
        let res = generate(&mut rng);
        for (i, t) in res.trades.iter().enumerate() {
            assert_eq!(t.id as usize, i + 1);
            match t.side {
                Side::Sell => {
                    let pnl = t.pnl.expect("sell has pnl");
                    assert!((-800.0..1200.0).contains(&pnl));
                }
                Side::Buy => assert!(t.pnl.is_none()),
            }
            assert_eq!(t.side == Side::Sell, i % 2 == 1);
            assert!(SYMBOLS.contains(&t.symbol));
            assert!((10..110).contains(&t.quantity));
            assert!((100.0..600.0).contains(&t.price));
        }
    }

    #[test]
    fn drawdown_never_positive_and_benchmark_bounded() {
        let mut rng = StdRng::seed_from_u64(3);
        let res = generate(&mut rng);
        for (i, (eq, dd)) in res.equity_data.iter().zip(&res.drawdown_data).enumerate() {
            assert!(dd.drawdown <= 0.0);
            assert_eq!(eq.date, dd.date);
            let floor = STARTING_EQUITY + i as f64 * 150.0;
            assert!(eq.benchmark >= floor && eq.benchmark <= floor + 500.0);
        }
    }

    #[test]
    fn dates_follow_calendar_labels() {
        let mut rng = StdRng::seed_from_u64(1);
        let res = generate(&mut rng);
        assert_eq!(res.equity_data[0].date, "Jan 1");
        assert_eq!(res.equity_data[31].date, "Feb 1");
        assert_eq!(res.trades[0].date, "1/1/2024");
        assert_eq!(res.trades[1].date, "1/6/2024");
    }

    #[test]
    fn placeholder_metrics_are_not_path_derived() {
        let mut rng = StdRng::seed_from_u64(5);
        let res = generate(&mut rng);
        assert_eq!(res.metrics.max_drawdown, -12.5);
        assert_eq!(res.metrics.win_rate, 58.3);
        assert!((1.2..=2.0).contains(&res.metrics.sharpe_ratio));
        assert_eq!(res.metrics.annualized_return, res.metrics.total_return);
    }

    #[test]
    fn total_return_tracks_final_equity() {
        let mut rng = StdRng::seed_from_u64(9);
        let res = generate(&mut rng);
        let last = res.equity_data.last().unwrap().equity;
        let approx = (last - STARTING_EQUITY) / STARTING_EQUITY * 100.0;
        // Stored equity is rounded to whole dollars.
        assert!((approx - res.metrics.total_return).abs() < 0.001);
    }

    #[test]
    fn same_seed_same_result() {
        let a = generate(&mut StdRng::seed_from_u64(42));
        let b = generate(&mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn half_up_rounding() {
        assert_eq!(round_half_up(-0.5), 0.0);
        assert_eq!(round_half_up(2.5), 3.0);
        assert_eq!(round2(-1.234), -1.23);
    }
}
