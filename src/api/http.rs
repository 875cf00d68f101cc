use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::CACHE_CONTROL;
use reqwest::Client;

use super::DashboardApi;
use crate::feed::types::{interpret_health, parse_portfolio, parse_trades, Health, PortfolioSnapshot, TradeRecord};
use crate::feed::FetchError;
use crate::state::Config;

/// reqwest-backed client for the dashboard API.
#[derive(Clone)]
pub struct HttpApi {
    client: Client,
    base: String,
}

impl HttpApi {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = Client::builder().timeout(cfg.http_timeout()).build()?;
        Ok(Self {
            client,
            base: cfg.base_url()?,
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path)
    }

    async fn get_ok(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        let resp = self.client.get(self.url(path)).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

#[async_trait]
impl DashboardApi for HttpApi {
    async fn portfolio(&self) -> Result<Vec<PortfolioSnapshot>, FetchError> {
        let body = self.get_ok("portfolio").await?;
        parse_portfolio(&body)
    }

    async fn trades(&self) -> Result<Vec<TradeRecord>, FetchError> {
        let body = self.get_ok("trades").await?;
        parse_trades(&body)
    }

    async fn health(&self) -> Result<Health, FetchError> {
        let resp = self
            .client
            .get(self.url("health"))
            .header(CACHE_CONTROL, "no-store")
            .send()
            .await?;
        let status = resp.status().as_u16();
        // Body read failures after a response arrived still count as unhealthy.
        let body = resp.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
        Ok(interpret_health(status, &body))
    }
}
