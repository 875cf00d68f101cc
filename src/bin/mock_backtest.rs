use anyhow::{anyhow, bail, Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::Read;
use std::path::PathBuf;

use algory_dashboard::backtest::mock::{MetricsMode, MockOptions};
use algory_dashboard::backtest::session::BacktestSession;
use algory_dashboard::logging::{self, obj, v_str, Domain};
use algory_dashboard::render;
use algory_dashboard::state::Config;

const USAGE: &str = "usage: mock_backtest [--seed N] [--derived] [--json] (<model.py|.js|.ts> | --code <text> | --code -)";

enum Input {
    File(PathBuf),
    Code(String),
}

struct Args {
    input: Input,
    seed: Option<u64>,
    derived: bool,
    json: bool,
}

fn parse_args(mut it: impl Iterator<Item = String>) -> Result<Args> {
    let mut input = None;
    let mut seed = None;
    let mut derived = false;
    let mut json = false;
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--seed" => {
                let raw = it.next().ok_or_else(|| anyhow!("--seed needs a value"))?;
                seed = Some(raw.parse().with_context(|| format!("bad seed {:?}", raw))?);
            }
            "--derived" => derived = true,
            "--json" => json = true,
            "--code" => {
                let raw = it.next().ok_or_else(|| anyhow!("--code needs a value"))?;
                let code = if raw == "-" {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                } else {
                    raw
                };
                input = Some(Input::Code(code));
            }
            "-h" | "--help" => bail!(USAGE),
            other if other.starts_with("--") => bail!("unknown flag {}\n{}", other, USAGE),
            path => input = Some(Input::File(PathBuf::from(path))),
        }
    }
    let input = input.ok_or_else(|| anyhow!(USAGE))?;
    Ok(Args { input, seed, derived, json })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    let args = parse_args(std::env::args().skip(1))?;

    let rng = match args.seed.or(cfg.mock_seed) {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let options = MockOptions {
        metrics: if args.derived { MetricsMode::Derived } else { MetricsMode::Placeholder },
        ..MockOptions::default()
    };
    let mut session = BacktestSession::new(rng, cfg.backtest_delay(), options);

    eprintln!("[mock_backtest] processing...");
    let submitted = match &args.input {
        Input::File(path) => session.submit_file(path).await,
        Input::Code(code) => session.submit_code(code).await,
    };
    let result = match submitted {
        Ok(result) => result,
        Err(err) => {
            logging::error(
                Domain::Backtest,
                "submission_rejected",
                obj(&[("msg", v_str(&err.to_string()))]),
            );
            return Err(err.into());
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        print!("{}", render::backtest_report(result));
    }
    Ok(())
}
