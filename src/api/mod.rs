use async_trait::async_trait;

use crate::feed::types::{Health, PortfolioSnapshot, TradeRecord};
use crate::feed::FetchError;

mod http;

pub use http::HttpApi;

/// The three read-only endpoints the dashboard consumes. Every call fetches
/// the full collection; there is no paging and no auth.
#[async_trait]
pub trait DashboardApi: Send + Sync {
    /// `GET {base}/portfolio`, in API order with `ts` derived.
    async fn portfolio(&self) -> Result<Vec<PortfolioSnapshot>, FetchError>;
    /// `GET {base}/trades`, newest first.
    async fn trades(&self) -> Result<Vec<TradeRecord>, FetchError>;
    /// `GET {base}/health`. `Ok` carries the verdict for any response that
    /// arrived; `Err` means the request itself failed.
    async fn health(&self) -> Result<Health, FetchError>;
}
