use anyhow::Result;
use std::sync::Arc;

use algory_dashboard::api::{DashboardApi, HttpApi};
use algory_dashboard::dashboard::{Dashboard, StateApplier};
use algory_dashboard::logging::{self, obj, v_num, v_str, Domain};
use algory_dashboard::render;
use algory_dashboard::state::Config;

/// Live dashboard. Polls the API and redraws on every change until Ctrl-C.
/// `--once` exits after the first complete view: health resolved and
/// portfolio and trades each loaded once.
#[tokio::main]
async fn main() -> Result<()> {
    let once = std::env::args().skip(1).any(|a| a == "--once");
    let cfg = Config::from_env();
    let http = HttpApi::new(&cfg)?;
    logging::info(
        Domain::System,
        "startup",
        obj(&[
            ("api_base", v_str(http.base())),
            ("portfolio_poll_ms", v_num(cfg.portfolio_poll_ms as f64)),
            ("trades_poll_ms", v_num(cfg.trades_poll_ms as f64)),
            ("health_poll_ms", v_num(cfg.health_poll_ms as f64)),
        ]),
    );

    let api: Arc<dyn DashboardApi> = Arc::new(http);
    let dashboard = Dashboard::start(&cfg, api);

    let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
    let mut done_tx = Some(done_tx);
    let shutdown = async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = done_rx => {}
        }
    };

    dashboard
        .run(shutdown, |view: &StateApplier| {
            // Clear screen and home the cursor before each redraw.
            print!("\x1b[2J\x1b[H{}", render::dashboard(view.state()));
            if once && view.is_complete() {
                if let Some(tx) = done_tx.take() {
                    let _ = tx.send(());
                }
            }
        })
        .await;

    logging::info(Domain::System, "shutdown", obj(&[]));
    Ok(())
}
