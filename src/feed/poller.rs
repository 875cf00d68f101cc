//! Cancellable polling tasks.
//!
//! A poller owns one [`PollSource`], fetches it immediately and then on a
//! fixed interval, and publishes every accepted result through a `watch`
//! channel. Subscribers read the latest publication or consume a lazy stream
//! of them. The fetch is awaited inside the task, so a poller never has more
//! than one request in flight; ticks that elapse during a slow request are
//! skipped rather than queued. Publications carry a sequence number that only
//! ever increases.

use async_trait::async_trait;
use futures_util::stream::{self, Stream};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};

use super::types::{Health, PortfolioSnapshot, TradeRecord};
use super::FetchError;
use crate::api::DashboardApi;
use crate::logging::{self, obj, v_num, v_str, Domain};

/// Something a poller can fetch repeatedly.
#[async_trait]
pub trait PollSource: Send + Sync + 'static {
    type Output: Clone + Send + Sync + 'static;

    fn name(&self) -> &'static str;

    fn domain(&self) -> Domain {
        Domain::Feed
    }

    async fn fetch(&self) -> Result<Self::Output, FetchError>;

    /// What to publish after a failed fetch. `None` keeps the previous value.
    fn on_failure(&self, _err: &FetchError) -> Option<Self::Output> {
        None
    }

    /// Size of a result, for logs.
    fn count(_out: &Self::Output) -> usize {
        1
    }
}

/// One published value. `seq` is 0 for the initial value and increases by one
/// per publication.
#[derive(Debug, Clone, PartialEq)]
pub struct Publication<T> {
    pub seq: u64,
    pub value: T,
}

/// Handle to a running poll task. Dropping it cancels the task.
pub struct Poller<T> {
    name: &'static str,
    rx: watch::Receiver<Publication<T>>,
    task: JoinHandle<()>,
}

impl<T: Clone + Send + Sync + 'static> Poller<T> {
    /// Start polling `source` every `every`, with the first fetch issued
    /// immediately. Subscribers see `initial` until the first result lands.
    pub fn spawn<S>(source: S, every: Duration, initial: T) -> Self
    where
        S: PollSource<Output = T>,
    {
        let name = source.name();
        let (tx, rx) = watch::channel(Publication { seq: 0, value: initial });
        let task = tokio::spawn(run(source, every, tx));
        logging::info(
            Domain::System,
            "poller_started",
            obj(&[("poller", v_str(name)), ("interval_ms", v_num(every.as_millis() as f64))]),
        );
        Self { name, rx, task }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Current publication.
    pub fn latest(&self) -> Publication<T> {
        self.rx.borrow().clone()
    }

    /// Lazy sequence of publications: the current one first, then each newer
    /// one as it lands. Intermediate values may be skipped by a slow consumer.
    /// Ends once the poller is cancelled.
    pub fn updates(&self) -> impl Stream<Item = Publication<T>> + Send + 'static {
        let mut rx = self.rx.clone();
        rx.mark_changed();
        stream::unfold(rx, |mut rx| async move {
            rx.changed().await.ok()?;
            let item = rx.borrow_and_update().clone();
            Some((item, rx))
        })
    }

    /// Stop polling. Any request in flight is dropped with the task.
    pub fn cancel(self) {
        // Drop does the work.
    }
}

impl<T> Drop for Poller<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run<S: PollSource>(source: S, every: Duration, tx: watch::Sender<Publication<S::Output>>) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut seq = 0u64;

    loop {
        ticker.tick().await;
        let started = Instant::now();
        let next = match source.fetch().await {
            Ok(value) => {
                logging::debug(
                    source.domain(),
                    "poll_ok",
                    obj(&[
                        ("poller", v_str(source.name())),
                        ("count", v_num(S::count(&value) as f64)),
                        ("elapsed_ms", v_num(started.elapsed().as_millis() as f64)),
                    ]),
                );
                Some(value)
            }
            Err(err) => {
                logging::warn(
                    source.domain(),
                    "poll_error",
                    obj(&[
                        ("poller", v_str(source.name())),
                        ("kind", v_str(err.kind())),
                        ("msg", v_str(&err.to_string())),
                    ]),
                );
                source.on_failure(&err)
            }
        };

        if let Some(value) = next {
            seq += 1;
            tx.send_replace(Publication { seq, value });
        }

        let elapsed = started.elapsed();
        if elapsed > every {
            let skipped = (elapsed.as_millis() / every.as_millis().max(1)) as f64;
            logging::debug(
                source.domain(),
                "ticks_skipped",
                obj(&[("poller", v_str(source.name())), ("skipped", v_num(skipped))]),
            );
        }
    }
}

// =============================================================================
// Dashboard sources
// =============================================================================

pub struct PortfolioSource {
    api: Arc<dyn DashboardApi>,
}

#[async_trait]
impl PollSource for PortfolioSource {
    type Output = Vec<PortfolioSnapshot>;

    fn name(&self) -> &'static str {
        "portfolio"
    }

    async fn fetch(&self) -> Result<Self::Output, FetchError> {
        self.api.portfolio().await
    }

    fn count(out: &Self::Output) -> usize {
        out.len()
    }
}

pub struct TradesSource {
    api: Arc<dyn DashboardApi>,
}

#[async_trait]
impl PollSource for TradesSource {
    type Output = Vec<TradeRecord>;

    fn name(&self) -> &'static str {
        "trades"
    }

    async fn fetch(&self) -> Result<Self::Output, FetchError> {
        self.api.trades().await
    }

    fn count(out: &Self::Output) -> usize {
        out.len()
    }
}

pub struct HealthSource {
    api: Arc<dyn DashboardApi>,
}

#[async_trait]
impl PollSource for HealthSource {
    type Output = Health;

    fn name(&self) -> &'static str {
        "health"
    }

    fn domain(&self) -> Domain {
        Domain::Health
    }

    async fn fetch(&self) -> Result<Self::Output, FetchError> {
        self.api.health().await
    }

    fn on_failure(&self, _err: &FetchError) -> Option<Self::Output> {
        Some(Health::Unhealthy)
    }
}

pub fn spawn_portfolio(api: Arc<dyn DashboardApi>, every: Duration) -> Poller<Vec<PortfolioSnapshot>> {
    Poller::spawn(PortfolioSource { api }, every, Vec::new())
}

pub fn spawn_trades(api: Arc<dyn DashboardApi>, every: Duration) -> Poller<Vec<TradeRecord>> {
    Poller::spawn(TradesSource { api }, every, Vec::new())
}

pub fn spawn_health(api: Arc<dyn DashboardApi>, every: Duration) -> Poller<Health> {
    Poller::spawn(HealthSource { api }, every, Health::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::sleep;

    struct Scripted {
        script: Mutex<VecDeque<Result<Vec<i32>, FetchError>>>,
        calls: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn new(script: Vec<Result<Vec<i32>, FetchError>>) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let src = Self {
                script: Mutex::new(script.into()),
                calls: calls.clone(),
            };
            (src, calls)
        }
    }

    #[async_trait]
    impl PollSource for Scripted {
        type Output = Vec<i32>;

        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn fetch(&self) -> Result<Vec<i32>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::Network("script exhausted".into())))
        }
    }

    struct Slow {
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PollSource for Slow {
        type Output = usize;

        fn name(&self) -> &'static str {
            "slow"
        }

        async fn fetch(&self) -> Result<usize, FetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            sleep(Duration::from_secs(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(n)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_fetch_is_immediate_then_on_interval() {
        let (src, calls) = Scripted::new(vec![Ok(vec![1]), Ok(vec![2]), Ok(vec![3])]);
        let poller = Poller::spawn(src, Duration::from_secs(2), Vec::new());
        assert_eq!(poller.latest().seq, 0);

        sleep(Duration::from_millis(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(poller.latest(), Publication { seq: 1, value: vec![1] });

        sleep(Duration::from_secs(2)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(poller.latest().value, vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_keeps_previous_value() {
        let (src, _calls) = Scripted::new(vec![
            Ok(vec![1]),
            Err(FetchError::Malformed("bad json".into())),
            Ok(vec![2]),
        ]);
        let poller = Poller::spawn(src, Duration::from_secs(2), Vec::new());

        sleep(Duration::from_millis(10)).await;
        assert_eq!(poller.latest(), Publication { seq: 1, value: vec![1] });

        sleep(Duration::from_secs(2)).await;
        assert_eq!(poller.latest(), Publication { seq: 1, value: vec![1] });

        sleep(Duration::from_secs(2)).await;
        assert_eq!(poller.latest(), Publication { seq: 2, value: vec![2] });
    }

    #[tokio::test(start_paused = true)]
    async fn never_more_than_one_request_in_flight() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let src = Slow {
            in_flight: in_flight.clone(),
            max_in_flight: max_in_flight.clone(),
            calls: calls.clone(),
        };
        let poller = Poller::spawn(src, Duration::from_secs(2), 0);

        sleep(Duration::from_secs(21)).await;
        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
        // 2s ticks against 5s requests: far fewer fetches than ticks.
        assert!(calls.load(Ordering::SeqCst) <= 5);

        let latest = poller.latest();
        assert_eq!(latest.seq as usize, latest.value);
    }

    #[tokio::test(start_paused = true)]
    async fn updates_stream_is_monotonic_and_ends_on_cancel() {
        let (src, calls) = Scripted::new(vec![Ok(vec![1]), Ok(vec![2])]);
        let poller = Poller::spawn(src, Duration::from_secs(1), Vec::new());
        let mut updates = Box::pin(poller.updates());

        let first = updates.next().await.unwrap();
        assert_eq!(first.seq, 0);
        let second = updates.next().await.unwrap();
        assert!(second.seq > first.seq);
        assert_eq!(second.value, vec![1]);

        poller.cancel();
        let seen = calls.load(Ordering::SeqCst);
        while let Some(p) = updates.next().await {
            assert!(p.seq > second.seq);
        }
        sleep(Duration::from_secs(10)).await;
        assert!(calls.load(Ordering::SeqCst) <= seen + 1);
    }

    struct DownApi;

    #[async_trait]
    impl DashboardApi for DownApi {
        async fn portfolio(&self) -> Result<Vec<PortfolioSnapshot>, FetchError> {
            Err(FetchError::Network("connection refused".into()))
        }
        async fn trades(&self) -> Result<Vec<TradeRecord>, FetchError> {
            Err(FetchError::Status(500))
        }
        async fn health(&self) -> Result<Health, FetchError> {
            Err(FetchError::Network("connection refused".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn health_failure_publishes_unhealthy_but_feeds_stay_put() {
        let api: Arc<dyn DashboardApi> = Arc::new(DownApi);
        let health = spawn_health(api.clone(), Duration::from_secs(10));
        let trades = spawn_trades(api, Duration::from_secs(2));
        assert_eq!(health.latest().value, Health::Unknown);

        sleep(Duration::from_millis(10)).await;
        assert_eq!(health.latest(), Publication { seq: 1, value: Health::Unhealthy });
        assert_eq!(trades.latest().seq, 0);
        assert!(trades.latest().value.is_empty());
    }
}
