//! Pollers: indefinitely repeating fetch cycles for coins and market totals
//!
//! Both pollers share one loop shape:
//!
//! ```text
//! fetch ──ok──▶ install snapshot ─▶ release first-fetch latch ─▶ wait(refresh)
//!   │                                                              │
//!   └──err──▶ keep previous snapshot ─────────────────────────▶ wait(retry)
//!                                                                  │
//!            stop signal ◀── raced against the timer ◀─────────────┘
//! ```
//!
//! A fetch already in flight always runs to completion; the stop signal is
//! only observed while waiting.

use crate::{
    diff::detect_changes,
    error::ProviderError,
    metrics::MetricsCollector,
    provider::CoinProvider,
    publisher::ChangePublisher,
    store::SnapshotStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::sleep;

/// Resolves once the signal is set (or its sender is gone)
pub(crate) async fn wait_until_set(signal: &mut watch::Receiver<bool>) {
    loop {
        let set = *signal.borrow_and_update();
        if set {
            return;
        }
        if signal.changed().await.is_err() {
            return;
        }
    }
}

/// Two-state latch (pending / released) marking a poller's first success
#[derive(Clone)]
pub struct FirstFetchLatch {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for FirstFetchLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl FirstFetchLatch {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Releases the latch. Returns true only for the call that released it.
    pub fn release(&self) -> bool {
        self.tx.send_if_modified(|released| {
            if *released {
                false
            } else {
                *released = true;
                true
            }
        })
    }

    pub fn is_released(&self) -> bool {
        *self.tx.borrow()
    }

    /// Suspends until the latch is released
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        wait_until_set(&mut rx).await;
    }
}

/// Success / retry cadence of a poller
#[derive(Debug, Clone, Copy)]
pub struct PollSchedule {
    pub refresh: Duration,
    pub retry: Duration,
}

/// One fetch source driven by [`run_poller`]
#[async_trait]
pub(crate) trait PollCycle: Send + Sync {
    /// Name used in logs and metrics
    fn source(&self) -> &'static str;

    /// Fetches and installs a new snapshot, returning its fetch timestamp
    async fn run_once(&self) -> Result<DateTime<Utc>, ProviderError>;

    /// Records when the next attempt is due
    async fn schedule_next(&self, at: DateTime<Utc>);

    /// Called once after the loop has exited
    async fn finish(&self) {}
}

/// Runs `cycle` until the stop signal is raised
pub(crate) async fn run_poller<C: PollCycle>(
    cycle: C,
    schedule: PollSchedule,
    latch: FirstFetchLatch,
    metrics: Arc<MetricsCollector>,
    mut shutdown: watch::Receiver<bool>,
) {
    let source = cycle.source();
    tracing::info!(
        source,
        refresh_secs = schedule.refresh.as_secs(),
        retry_secs = schedule.retry.as_secs(),
        "Poller started"
    );

    let mut last_success: Option<DateTime<Utc>> = None;

    loop {
        let start = Instant::now();
        let delay = match cycle.run_once().await {
            Ok(fetched_at) => {
                metrics.record_fetch(start.elapsed(), true).await;
                last_success = Some(fetched_at);
                if latch.release() {
                    tracing::info!(source, "First fetch completed");
                }
                schedule.refresh
            }
            Err(e) => {
                metrics.record_fetch(start.elapsed(), false).await;
                tracing::warn!(
                    source,
                    error = %e,
                    retry_secs = schedule.retry.as_secs(),
                    "Fetch failed, retrying"
                );
                schedule.retry
            }
        };

        let next_fetch = next_fetch_time(last_success, delay);
        cycle.schedule_next(next_fetch).await;
        tracing::debug!(source, next_fetch = %next_fetch, "Next fetch scheduled");

        tokio::select! {
            biased;

            _ = wait_until_set(&mut shutdown) => break,
            _ = sleep(delay) => {}
        }
    }

    cycle.finish().await;
    tracing::info!(source, "Poller stopped");
}

/// Last success plus the chosen delay; `now` stands in before any success
fn next_fetch_time(last_success: Option<DateTime<Utc>>, delay: Duration) -> DateTime<Utc> {
    let base = last_success.unwrap_or_else(Utc::now);
    let delay = chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::MAX);
    base.checked_add_signed(delay).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Coin listing cycle: fetch, diff against the previous snapshot, install, publish
pub(crate) struct CoinCycle {
    pub provider: Arc<dyn CoinProvider>,
    pub store: Arc<SnapshotStore>,
    pub publisher: ChangePublisher,
    pub limit: usize,
}

#[async_trait]
impl PollCycle for CoinCycle {
    fn source(&self) -> &'static str {
        "coins"
    }

    async fn run_once(&self) -> Result<DateTime<Utc>, ProviderError> {
        let index = self.provider.fetch_all_coins(self.limit).await?;

        let previous = self.store.coin_snapshot().await;
        let delta = detect_changes(
            previous.as_deref().map(|snapshot| snapshot.index.by_symbol()),
            index.by_symbol(),
        );

        let fetched_at = Utc::now();
        let count = index.len();
        self.store.install_coins(index, fetched_at).await;

        tracing::debug!(
            count,
            changed = delta.len(),
            provider = self.provider.provider_name(),
            "Fetched coins"
        );
        self.publisher.publish(delta);

        Ok(fetched_at)
    }

    async fn schedule_next(&self, at: DateTime<Utc>) {
        self.store.set_next_coin_fetch(at).await;
    }

    async fn finish(&self) {
        self.publisher.close();
    }
}

/// Market totals cycle
pub(crate) struct MarketCycle {
    pub provider: Arc<dyn CoinProvider>,
    pub store: Arc<SnapshotStore>,
}

#[async_trait]
impl PollCycle for MarketCycle {
    fn source(&self) -> &'static str {
        "market"
    }

    async fn run_once(&self) -> Result<DateTime<Utc>, ProviderError> {
        let totals = self.provider.fetch_market_totals().await?;
        let fetched_at = Utc::now();
        self.store.install_market(totals, fetched_at).await;
        tracing::debug!(provider = self.provider.provider_name(), "Fetched market totals");
        Ok(fetched_at)
    }

    async fn schedule_next(&self, at: DateTime<Utc>) {
        self.store.set_next_market_fetch(at).await;
    }
}
