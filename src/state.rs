use anyhow::{Context, Result};
use std::time::Duration;
use url::Url;

use crate::feed::types::{Health, PortfolioSnapshot, TradeRecord};

#[derive(Clone, Debug)]
pub struct Config {
    pub api_url: String,
    pub api_origin: String,
    pub portfolio_poll_ms: u64,
    pub trades_poll_ms: u64,
    pub health_poll_ms: u64,
    pub http_timeout_secs: u64,
    pub backtest_delay_ms: u64,
    pub mock_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "/api".to_string(),
            api_origin: "http://localhost:8000".to_string(),
            portfolio_poll_ms: 10_000,
            trades_poll_ms: 2_000,
            health_poll_ms: 10_000,
            http_timeout_secs: 10,
            backtest_delay_ms: 1_000,
            mock_seed: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            api_url: std::env::var("API_URL").unwrap_or(d.api_url),
            api_origin: std::env::var("API_ORIGIN").unwrap_or(d.api_origin),
            portfolio_poll_ms: std::env::var("PORTFOLIO_POLL_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.portfolio_poll_ms),
            trades_poll_ms: std::env::var("TRADES_POLL_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.trades_poll_ms),
            health_poll_ms: std::env::var("HEALTH_POLL_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.health_poll_ms),
            http_timeout_secs: std::env::var("HTTP_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.http_timeout_secs),
            backtest_delay_ms: std::env::var("BACKTEST_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.backtest_delay_ms),
            mock_seed: std::env::var("MOCK_SEED").ok().and_then(|v| v.parse().ok()),
        }
    }

    /// Absolute API base with any trailing slash removed. A relative
    /// `api_url` such as the default `/api` is resolved against `api_origin`.
    pub fn base_url(&self) -> Result<String> {
        let resolved = match Url::parse(&self.api_url) {
            Ok(abs) => abs,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let origin = Url::parse(&self.api_origin)
                    .with_context(|| format!("invalid API_ORIGIN {:?}", self.api_origin))?;
                origin
                    .join(&self.api_url)
                    .with_context(|| format!("cannot resolve API_URL {:?}", self.api_url))?
            }
            Err(err) => {
                return Err(err).with_context(|| format!("invalid API_URL {:?}", self.api_url))
            }
        };
        Ok(resolved.as_str().trim_end_matches('/').to_string())
    }

    pub fn portfolio_interval(&self) -> Duration {
        Duration::from_millis(self.portfolio_poll_ms.max(1))
    }

    pub fn trades_interval(&self) -> Duration {
        Duration::from_millis(self.trades_poll_ms.max(1))
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_millis(self.health_poll_ms.max(1))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn backtest_delay(&self) -> Duration {
        Duration::from_millis(self.backtest_delay_ms)
    }
}

/// Everything the live dashboard view renders. Each field is owned by exactly
/// one poller; the view only ever replaces a field wholesale.
#[derive(Clone, Debug, Default)]
pub struct DashboardState {
    pub portfolio: Vec<PortfolioSnapshot>,
    pub trades: Vec<TradeRecord>,
    pub health: Health,
}

impl DashboardState {
    /// Most recent snapshot: the last element in API order.
    pub fn latest(&self) -> Option<&PortfolioSnapshot> {
        self.portfolio.last()
    }
}
