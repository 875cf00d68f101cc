use super::{BacktestMetrics, DrawdownPoint, EquityPoint, MockTrade};

/// Metrics computed from the generated series instead of placeholders.
///
/// Sharpe is the annualized mean/std of daily equity returns. Max drawdown is
/// the deepest drawdown point. Win rate is the share of closed (SELL) trades
/// with positive P&L.
pub fn derive_metrics(
    total_return: f64,
    equity: &[EquityPoint],
    drawdown: &[DrawdownPoint],
    trades: &[MockTrade],
) -> BacktestMetrics {
    BacktestMetrics {
        total_return,
        annualized_return: total_return,
        sharpe_ratio: sharpe(equity),
        max_drawdown: drawdown.iter().map(|d| d.drawdown).fold(0.0, f64::min),
        win_rate: win_rate(trades),
        total_trades: trades.len() as u32,
    }
}

pub fn sharpe(equity: &[EquityPoint]) -> f64 {
    let returns: Vec<f64> = equity
        .windows(2)
        .filter(|w| w[0].equity > 0.0)
        .map(|w| (w[1].equity - w[0].equity) / w[0].equity)
        .collect();
    if returns.is_empty() {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    let std = var.sqrt();
    if std > 0.0 {
        mean / std * 252.0_f64.sqrt()
    } else {
        0.0
    }
}

pub fn win_rate(trades: &[MockTrade]) -> f64 {
    let closed: Vec<f64> = trades.iter().filter_map(|t| t.pnl).collect();
    if closed.is_empty() {
        return 0.0;
    }
    let wins = closed.iter().filter(|p| **p > 0.0).count();
    wins as f64 / closed.len() as f64 * 100.0
}
