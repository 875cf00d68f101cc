use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempDir;

use algory_dashboard::backtest::mock::{generate, MockOptions};
use algory_dashboard::backtest::session::BacktestSession;
use algory_dashboard::render;

#[test]
fn json_shape_matches_report_consumers() {
    let res = generate(&mut StdRng::seed_from_u64(21));
    let v = serde_json::to_value(&res).unwrap();

    for key in ["totalReturn", "annualizedReturn", "sharpeRatio", "maxDrawdown", "winRate", "totalTrades"] {
        assert!(v["metrics"].get(key).is_some(), "missing metrics.{}", key);
    }
    assert_eq!(v["equityData"].as_array().unwrap().len(), 252);
    assert_eq!(v["drawdownData"].as_array().unwrap().len(), 252);
    assert_eq!(v["returnsDistribution"].as_array().unwrap().len(), 6);
    assert_eq!(v["returnsDistribution"][3], serde_json::json!({"range": "0% to 1%", "count": 28}));

    let trades = v["trades"].as_array().unwrap();
    assert_eq!(trades.len(), 50);
    for t in trades {
        match t["type"].as_str().unwrap() {
            "BUY" => assert!(t.get("pnl").is_none()),
            "SELL" => assert!(t["pnl"].is_number()),
            other => panic!("unexpected side {}", other),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn upload_reset_paste_cycle() {
    let dir = TempDir::new().unwrap();
    let model = dir.path().join("strategy.ts");
    std::fs::write(&model, "export const run = () => 0;").unwrap();

    let mut session = BacktestSession::new(
        StdRng::seed_from_u64(99),
        Duration::from_millis(1000),
        MockOptions::default(),
    );

    let report = render::backtest_report(session.submit_file(&model).await.unwrap());
    assert!(report.contains("Backtest Results"));
    assert!(report.contains("Win Rate       58.3%"));
    assert!(report.contains("Max Drawdown   -12.50%"));

    session.reset();
    assert!(session.is_idle());

    let res = session.submit_code("class Model: pass").await.unwrap();
    assert_eq!(res.equity_data.len(), 252);
    assert_eq!(session.ready().unwrap().submission.kind(), "code");
}
