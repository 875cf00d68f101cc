//! Mock backtest pipeline: synthetic results for an uploaded or pasted model.
//!
//! Nothing here runs the submitted model. Results are placeholder data drawn
//! from a random source, shaped like a real backtest report.

pub mod metrics;
pub mod mock;
pub mod session;

use serde::Serialize;

use crate::feed::types::Side;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestMetrics {
    /// Percent.
    pub total_return: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    /// Percent, non-positive.
    pub max_drawdown: f64,
    /// Percent.
    pub win_rate: f64,
    pub total_trades: u32,
}

impl BacktestMetrics {
    pub fn profit_factor(&self) -> f64 {
        1.0 + self.total_return / 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub date: String,
    pub equity: f64,
    pub benchmark: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrawdownPoint {
    pub date: String,
    pub drawdown: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnBucket {
    pub range: &'static str,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MockTrade {
    pub id: u32,
    pub date: String,
    #[serde(rename = "type")]
    pub side: Side,
    pub symbol: &'static str,
    pub quantity: u32,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pnl: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestResult {
    pub metrics: BacktestMetrics,
    pub equity_data: Vec<EquityPoint>,
    pub drawdown_data: Vec<DrawdownPoint>,
    pub returns_distribution: Vec<ReturnBucket>,
    pub trades: Vec<MockTrade>,
}
