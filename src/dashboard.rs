use futures_util::StreamExt;
use std::future::Future;
use std::sync::Arc;

use crate::api::DashboardApi;
use crate::feed::poller::{spawn_health, spawn_portfolio, spawn_trades, Poller, Publication};
use crate::feed::types::{Health, PortfolioSnapshot, TradeRecord};
use crate::logging::{self, obj, v_num, v_str, Domain};
use crate::state::{Config, DashboardState};

/// Applies publications to a [`DashboardState`], refusing any that are not
/// newer than what the field already holds.
#[derive(Debug, Default)]
pub struct StateApplier {
    state: DashboardState,
    portfolio_seq: u64,
    trades_seq: u64,
    health_seq: u64,
}

impl StateApplier {
    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    pub fn apply_portfolio(&mut self, p: Publication<Vec<PortfolioSnapshot>>) -> bool {
        if p.seq <= self.portfolio_seq {
            return false;
        }
        self.portfolio_seq = p.seq;
        self.state.portfolio = p.value;
        true
    }

    pub fn apply_trades(&mut self, p: Publication<Vec<TradeRecord>>) -> bool {
        if p.seq <= self.trades_seq {
            return false;
        }
        self.trades_seq = p.seq;
        self.state.trades = p.value;
        true
    }

    pub fn apply_health(&mut self, p: Publication<Health>) -> bool {
        if p.seq <= self.health_seq {
            return false;
        }
        self.health_seq = p.seq;
        let changed = self.state.health != p.value;
        if changed {
            logging::info(
                Domain::Health,
                "health_changed",
                obj(&[("from", v_str(self.state.health.label())), ("to", v_str(p.value.label()))]),
            );
        }
        self.state.health = p.value;
        changed
    }

    /// True once every feed has published a fetched result: health has
    /// resolved and portfolio and trades each loaded at least once.
    pub fn is_complete(&self) -> bool {
        self.portfolio_seq > 0 && self.trades_seq > 0 && self.health_seq > 0
    }
}

/// The live dashboard view: three pollers feeding one state. Dropping it
/// tears the pollers down.
pub struct Dashboard {
    portfolio: Poller<Vec<PortfolioSnapshot>>,
    trades: Poller<Vec<TradeRecord>>,
    health: Poller<Health>,
}

impl Dashboard {
    pub fn start(cfg: &Config, api: Arc<dyn DashboardApi>) -> Self {
        Self {
            portfolio: spawn_portfolio(api.clone(), cfg.portfolio_interval()),
            trades: spawn_trades(api.clone(), cfg.trades_interval()),
            health: spawn_health(api, cfg.health_interval()),
        }
    }

    /// Current state of all three feeds.
    pub fn snapshot(&self) -> DashboardState {
        let mut applier = StateApplier::default();
        applier.apply_portfolio(self.portfolio.latest());
        applier.apply_trades(self.trades.latest());
        applier.apply_health(self.health.latest());
        applier.state
    }

    /// Call `on_change` once up front and then every time a feed publishes
    /// something new, until `shutdown` resolves or every poller has stopped.
    pub async fn run<F, S>(&self, shutdown: S, mut on_change: F)
    where
        F: FnMut(&StateApplier),
        S: Future<Output = ()>,
    {
        let mut portfolio = Box::pin(self.portfolio.updates().fuse());
        let mut trades = Box::pin(self.trades.updates().fuse());
        let mut health = Box::pin(self.health.updates().fuse());
        let mut applier = StateApplier::default();
        let mut renders = 0u64;
        tokio::pin!(shutdown);
        on_change(&applier);

        loop {
            let changed = tokio::select! {
                _ = &mut shutdown => break,
                Some(p) = portfolio.next() => applier.apply_portfolio(p),
                Some(p) = trades.next() => applier.apply_trades(p),
                Some(p) = health.next() => applier.apply_health(p),
                else => break,
            };
            if changed {
                renders += 1;
                on_change(&applier);
            }
        }

        logging::info(
            Domain::System,
            "dashboard_stopped",
            obj(&[("renders", v_num(renders as f64))]),
        );
    }
}
