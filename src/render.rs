//! Plain-text views of dashboard and backtest state.

use chrono::DateTime;
use std::fmt::Write;

use crate::backtest::BacktestResult;
use crate::feed::types::{Health, PortfolioSnapshot, TradeRecord};
use crate::state::DashboardState;

/// `HH:MM:SS` (UTC) for epoch milliseconds.
pub fn clock(ts_ms: i64) -> String {
    DateTime::from_timestamp_millis(ts_ms)
        .map(|dt| dt.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string())
}

pub fn health_line(health: Health) -> String {
    let dot = match health {
        Health::Unknown => "( )",
        Health::Healthy => "(+)",
        Health::Unhealthy => "(x)",
    };
    format!("{} {}", dot, health.label())
}

pub fn stats_panel(latest: Option<&PortfolioSnapshot>) -> String {
    let mut out = String::from("Current Statistics\n");
    match latest {
        Some(s) => {
            let _ = writeln!(out, "  Total Value  {:.3}", s.total_value);
            let _ = writeln!(out, "  Cash         {:.3}", s.total_cash);
            let _ = writeln!(out, "  Positions    {}", s.total_positions);
            let _ = writeln!(out, "  Timestamp    {}", clock(s.ts));
        }
        None => out.push_str("  No statistics available\n"),
    }
    out
}

pub fn portfolio_summary(history: &[PortfolioSnapshot]) -> String {
    match (history.first(), history.last()) {
        (Some(first), Some(last)) => format!(
            "Portfolio Performance Over Time: {} points, {} .. {}\n",
            history.len(),
            clock(first.ts),
            clock(last.ts)
        ),
        _ => "Portfolio Performance Over Time: no data\n".to_string(),
    }
}

pub fn trade_table(trades: &[TradeRecord]) -> String {
    let mut out = String::from("Trade History\n");
    if trades.is_empty() {
        out.push_str("  No trades yet\n");
        return out;
    }
    let _ = writeln!(
        out,
        "  {:<8} {:<5} {:<22} {:<9} {}",
        "Symbol", "Side", "Qty @ Price", "Time", "Strategy"
    );
    for t in trades {
        let fill = format!("{:.3} @ ${:.2}", t.quantity, t.price);
        let _ = writeln!(
            out,
            "  {:<8} {:<5} {:<22} {:<9} {}",
            t.symbol,
            t.side.as_str(),
            fill,
            clock(t.ts),
            t.strategy
        );
    }
    out
}

pub fn dashboard(state: &DashboardState) -> String {
    let mut out = String::new();
    out.push_str("Algory Capital Algorithmic Portfolio\n");
    out.push_str(&health_line(state.health));
    out.push_str("\n\n");
    out.push_str(&portfolio_summary(&state.portfolio));
    out.push('\n');
    out.push_str(&trade_table(&state.trades));
    out.push('\n');
    out.push_str(&stats_panel(state.latest()));
    out
}

fn signed_pct(x: f64) -> String {
    format!("{}{:.2}%", if x > 0.0 { "+" } else { "" }, x)
}

fn signed_dollars(x: f64) -> String {
    if x >= 0.0 {
        format!("+${:.2}", x)
    } else {
        format!("-${:.2}", x.abs())
    }
}

pub fn backtest_report(res: &BacktestResult) -> String {
    let m = &res.metrics;
    let mut out = String::from("Backtest Results\n\n");
    let _ = writeln!(
        out,
        "  Total Return   {} ({:.2}% annualized)",
        signed_pct(m.total_return),
        m.annualized_return
    );
    let _ = writeln!(out, "  Sharpe Ratio   {:.2}", m.sharpe_ratio);
    let _ = writeln!(out, "  Max Drawdown   {:.2}%", m.max_drawdown);
    let _ = writeln!(out, "  Win Rate       {:.1}%", m.win_rate);
    let _ = writeln!(out, "  Total Trades   {}", m.total_trades);
    let _ = writeln!(out, "  Profit Factor  {:.2}", m.profit_factor());

    if let (Some(eq), Some(dd)) = (res.equity_data.last(), res.drawdown_data.last()) {
        let _ = writeln!(
            out,
            "\n  Equity {} points, last {} equity={} benchmark={} drawdown={:.2}%",
            res.equity_data.len(),
            eq.date,
            eq.equity,
            eq.benchmark,
            dd.drawdown
        );
    }

    out.push_str("\nReturns Distribution\n");
    for b in &res.returns_distribution {
        let _ = writeln!(out, "  {:<11} {:>3} {}", b.range, b.count, "#".repeat(b.count as usize));
    }

    out.push_str("\nTrade History\n");
    let _ = writeln!(
        out,
        "  {:<11} {:<5} {:<6} {:>8} {:>10} {:>11}",
        "Date", "Type", "Symbol", "Quantity", "Price", "P&L"
    );
    for t in &res.trades {
        let pnl = t.pnl.map(signed_dollars).unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "  {:<11} {:<5} {:<6} {:>8} {:>10} {:>11}",
            t.date,
            t.side.as_str(),
            t.symbol,
            t.quantity,
            format!("${:.2}", t.price),
            pnl
        );
    }
    out
}
