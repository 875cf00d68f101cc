use rand::Rng;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

use super::mock::{generate_with, MockOptions};
use super::BacktestResult;
use crate::logging::{self, obj, v_num, v_str, Domain};

pub const ACCEPTED_EXTENSIONS: [&str; 3] = ["py", "js", "ts"];

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no code to run")]
    EmptyCode,
    #[error("unsupported model file {0:?}: expected .py, .js or .ts")]
    UnsupportedFile(String),
    #[error("cannot read model file {path:?}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("results are already showing; reset before submitting again")]
    ResultsShowing,
}

/// What the user handed in. Only a fingerprint is kept; the model itself is
/// never parsed or run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    File { name: String, digest: String, bytes: usize },
    Code { digest: String, chars: usize },
}

impl Submission {
    pub fn kind(&self) -> &'static str {
        match self {
            Submission::File { .. } => "file",
            Submission::Code { .. } => "code",
        }
    }

    pub fn digest(&self) -> &str {
        match self {
            Submission::File { digest, .. } | Submission::Code { digest, .. } => digest,
        }
    }
}

/// A finished run: what was submitted and the results shown for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Ready {
    pub submission: Submission,
    pub result: BacktestResult,
}

/// Upload-or-paste flow: `Idle -> Ready -> (reset) -> Idle`.
pub struct BacktestSession<R> {
    rng: R,
    delay: Duration,
    options: MockOptions,
    ready: Option<Ready>,
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

impl<R: Rng + Send> BacktestSession<R> {
    pub fn new(rng: R, delay: Duration, options: MockOptions) -> Self {
        Self {
            rng,
            delay,
            options,
            ready: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.ready.is_none()
    }

    pub fn ready(&self) -> Option<&Ready> {
        self.ready.as_ref()
    }

    pub fn result(&self) -> Option<&BacktestResult> {
        self.ready.as_ref().map(|r| &r.result)
    }

    /// Accept a model file. Only the extension is checked; the content is
    /// read solely to fingerprint it.
    pub async fn submit_file(&mut self, path: &Path) -> Result<&BacktestResult, SessionError> {
        self.ensure_idle()?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        if !matches!(ext.as_deref(), Some(e) if ACCEPTED_EXTENSIONS.contains(&e)) {
            return Err(SessionError::UnsupportedFile(name));
        }
        let bytes = std::fs::read(path).map_err(|source| SessionError::Unreadable {
            path: path.display().to_string(),
            source,
        })?;
        let submission = Submission::File {
            name,
            digest: sha256_hex(&bytes),
            bytes: bytes.len(),
        };
        self.process(submission).await
    }

    /// Accept pasted code. Whitespace-only input is rejected.
    pub async fn submit_code(&mut self, code: &str) -> Result<&BacktestResult, SessionError> {
        self.ensure_idle()?;
        if code.trim().is_empty() {
            return Err(SessionError::EmptyCode);
        }
        let submission = Submission::Code {
            digest: sha256_hex(code.as_bytes()),
            chars: code.chars().count(),
        };
        self.process(submission).await
    }

    /// Discard any results and return to the upload form.
    pub fn reset(&mut self) {
        if self.ready.take().is_some() {
            logging::info(Domain::Backtest, "session_reset", obj(&[]));
        }
    }

    fn ensure_idle(&self) -> Result<(), SessionError> {
        if self.is_idle() {
            Ok(())
        } else {
            Err(SessionError::ResultsShowing)
        }
    }

    async fn process(&mut self, submission: Submission) -> Result<&BacktestResult, SessionError> {
        logging::info(
            Domain::Backtest,
            "submission_accepted",
            obj(&[
                ("kind", v_str(submission.kind())),
                ("digest", v_str(submission.digest())),
                ("delay_ms", v_num(self.delay.as_millis() as f64)),
            ]),
        );
        // Simulated processing time. Nothing is stored until it elapses, so a
        // dropped future leaves the session idle.
        sleep(self.delay).await;

        let result = generate_with(&mut self.rng, &self.options);
        logging::info(
            Domain::Backtest,
            "results_ready",
            obj(&[
                ("total_return", v_num(result.metrics.total_return)),
                ("sharpe_ratio", v_num(result.metrics.sharpe_ratio)),
            ]),
        );
        let ready = self.ready.insert(Ready { submission, result });
        Ok(&ready.result)
    }
}
