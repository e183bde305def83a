//! Coin fetcher service
//!
//! Owns the snapshot store and both pollers, and is the only entry point
//! callers need. Every piece of state lives on the instance, so several
//! independent fetchers can run side by side.

use crate::{
    config::FetcherConfig,
    constants::STALE_FACTOR,
    error::FetcherError,
    metrics::{FetchMetrics, MetricsCollector},
    poller::{run_poller, wait_until_set, CoinCycle, FirstFetchLatch, MarketCycle, PollSchedule},
    provider::CoinProvider,
    providers::CoinMarketCapProvider,
    publisher::{ChangePublisher, CoinUpdates},
    search,
    store::SnapshotStore,
    types::{Coin, ComponentHealth, HealthStatus, MarketTotals, SearchResults, SymbolIndex},
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// Handles of a running pair of pollers
struct Running {
    coin_stop: watch::Sender<bool>,
    market_stop: watch::Sender<bool>,
    coin_task: JoinHandle<()>,
    market_task: JoinHandle<()>,
}

enum Lifecycle {
    NotStarted,
    Started(Running),
    Stopped,
}

/// Periodically refreshed cache of coin listings and market totals
///
/// # Example
/// ```no_run
/// use coin_fetcher::{CoinFetcher, FetcherConfig};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = CoinFetcher::from_config(FetcherConfig::from_env())?;
/// let mut updates = fetcher.start(Duration::from_secs(300), 0).await?;
///
/// fetcher.wait_for_first_fetch().await;
/// if let Some(btc) = fetcher.get("BTC").await {
///     println!("BTC: {:?}", btc.price_usd);
/// }
///
/// while let Some(changed) = updates.recv().await {
///     println!("{} coins changed", changed.len());
/// }
/// # Ok(())
/// # }
/// ```
pub struct CoinFetcher {
    provider: Arc<dyn CoinProvider>,
    config: FetcherConfig,
    store: Arc<SnapshotStore>,
    coin_latch: FirstFetchLatch,
    market_latch: FirstFetchLatch,
    coin_metrics: Arc<MetricsCollector>,
    market_metrics: Arc<MetricsCollector>,
    refresh_interval: RwLock<Duration>,
    stopped: watch::Sender<bool>,
    lifecycle: Mutex<Lifecycle>,
}

impl CoinFetcher {
    /// Creates a fetcher backed by the CoinMarketCap provider
    pub fn from_config(config: FetcherConfig) -> Result<Self, FetcherError> {
        let provider = CoinMarketCapProvider::new(&config)?;
        Ok(Self::new(Arc::new(provider), config))
    }

    /// Creates a fetcher with a custom provider
    pub fn new(provider: Arc<dyn CoinProvider>, config: FetcherConfig) -> Self {
        let (stopped, _) = watch::channel(false);

        Self {
            provider,
            store: Arc::new(SnapshotStore::new()),
            coin_latch: FirstFetchLatch::new(),
            market_latch: FirstFetchLatch::new(),
            coin_metrics: Arc::new(MetricsCollector::new("coins")),
            market_metrics: Arc::new(MetricsCollector::new("market")),
            refresh_interval: RwLock::new(config.effective_refresh_interval()),
            stopped,
            lifecycle: Mutex::new(Lifecycle::NotStarted),
            config,
        }
    }

    /// Starts the coin and market pollers
    ///
    /// # Arguments
    /// * `delay` - Refresh interval after a successful fetch; zero uses the
    ///   configured interval
    /// * `limit` - Number of coins to fetch; zero uses the configured limit,
    ///   which defaults to the provider maximum
    ///
    /// # Returns
    /// The stream of changed-coin batches, or `AlreadyRunning` / `Stopped`
    /// without touching the running pollers
    pub async fn start(&self, delay: Duration, limit: usize) -> Result<CoinUpdates, FetcherError> {
        let mut lifecycle = self.lifecycle.lock().await;
        match *lifecycle {
            Lifecycle::NotStarted => {}
            Lifecycle::Started(_) => return Err(FetcherError::AlreadyRunning),
            Lifecycle::Stopped => return Err(FetcherError::Stopped),
        }

        let refresh = if delay.is_zero() {
            self.config.effective_refresh_interval()
        } else {
            delay
        };
        let limit = if limit == 0 {
            self.config.effective_coin_limit()
        } else {
            limit
        };
        let schedule = PollSchedule {
            refresh,
            retry: self.config.effective_retry_interval(),
        };
        *self.refresh_interval.write() = refresh;

        tracing::info!(
            provider = self.provider.provider_name(),
            refresh_secs = refresh.as_secs(),
            retry_secs = schedule.retry.as_secs(),
            limit,
            "Starting coin fetcher"
        );

        let (coin_stop, coin_stop_rx) = watch::channel(false);
        let (market_stop, market_stop_rx) = watch::channel(false);
        let (publisher, updates) =
            ChangePublisher::new(self.config.publish_buffer, coin_stop_rx.clone());

        let market_task = tokio::spawn(run_poller(
            MarketCycle {
                provider: self.provider.clone(),
                store: self.store.clone(),
            },
            schedule,
            self.market_latch.clone(),
            self.market_metrics.clone(),
            market_stop_rx,
        ));

        let coin_task = tokio::spawn(run_poller(
            CoinCycle {
                provider: self.provider.clone(),
                store: self.store.clone(),
                publisher,
                limit,
            },
            schedule,
            self.coin_latch.clone(),
            self.coin_metrics.clone(),
            coin_stop_rx,
        ));

        *lifecycle = Lifecycle::Started(Running {
            coin_stop,
            market_stop,
            coin_task,
            market_task,
        });

        Ok(updates)
    }

    /// Suspends until both pollers have completed at least one successful fetch
    ///
    /// Returns immediately when the fetcher was never started, and gives up
    /// once the fetcher is stopped.
    pub async fn wait_for_first_fetch(&self) {
        if matches!(*self.lifecycle.lock().await, Lifecycle::NotStarted) {
            return;
        }

        let mut stopped = self.stopped.subscribe();
        tokio::select! {
            _ = async {
                self.coin_latch.wait().await;
                self.market_latch.wait().await;
            } => {}
            _ = wait_until_set(&mut stopped) => {
                tracing::debug!("Fetcher stopped before the first fetch completed");
            }
        }
    }

    /// True once both pollers have succeeded at least once
    pub fn is_fetched(&self) -> bool {
        self.is_coin_fetched() && self.is_market_fetched()
    }

    pub fn is_coin_fetched(&self) -> bool {
        self.coin_latch.is_released()
    }

    pub fn is_market_fetched(&self) -> bool {
        self.market_latch.is_released()
    }

    /// Number of coins in the current snapshot
    pub async fn size(&self) -> usize {
        self.store.size().await
    }

    /// Copy of every coin, keyed by uppercase symbol
    pub async fn all(&self) -> SymbolIndex {
        self.store.all().await
    }

    /// Gets a coin by symbol, case-insensitively
    pub async fn get(&self, symbol: &str) -> Option<Coin> {
        self.store.get(symbol).await
    }

    /// Gets a coin by name, case-insensitively
    pub async fn get_by_name(&self, name: &str) -> Option<Coin> {
        self.store.get_by_name(name).await
    }

    /// Searches symbols and names for whitespace-separated keywords
    pub async fn search(&self, keywords: &str) -> SearchResults {
        match self.store.coin_snapshot().await {
            Some(snapshot) => search::search(&snapshot.index, keywords),
            None => SearchResults::default(),
        }
    }

    pub async fn total_market(&self) -> Option<MarketTotals> {
        self.store.total_market().await
    }

    pub async fn coin_fetched_at(&self) -> Option<DateTime<Utc>> {
        self.store.coin_fetched_at().await
    }

    pub async fn market_fetched_at(&self) -> Option<DateTime<Utc>> {
        self.store.market_fetched_at().await
    }

    pub async fn next_coin_fetch_time(&self) -> Option<DateTime<Utc>> {
        self.store.next_coin_fetch().await
    }

    pub async fn next_market_fetch_time(&self) -> Option<DateTime<Utc>> {
        self.store.next_market_fetch().await
    }

    /// Returns the name of the current provider
    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    /// Fetch latency and success metrics, as (coins, market)
    pub async fn fetch_metrics(&self) -> (FetchMetrics, FetchMetrics) {
        (
            self.coin_metrics.get_metrics().await,
            self.market_metrics.get_metrics().await,
        )
    }

    /// Stops both pollers and closes the change stream
    ///
    /// Returns once both pollers have exited. A fetch in flight is allowed to
    /// finish first. Calling it again, or before `start`, is a no-op.
    pub async fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        let previous = std::mem::replace(&mut *lifecycle, Lifecycle::Stopped);
        self.stopped.send_replace(true);

        let Lifecycle::Started(running) = previous else {
            return;
        };

        tracing::info!("Stopping coin fetcher");
        running.coin_stop.send_replace(true);
        running.market_stop.send_replace(true);

        if let Err(e) = running.coin_task.await {
            tracing::warn!(error = %e, "Coin poller ended abnormally");
        }
        if let Err(e) = running.market_task.await {
            tracing::warn!(error = %e, "Market poller ended abnormally");
        }

        tracing::info!("Coin fetcher stopped");
    }

    /// Perform a health check on the coin fetcher
    ///
    /// # Returns
    /// ComponentHealth indicating the freshness of both snapshots
    pub async fn health_check(&self) -> ComponentHealth {
        let now = Utc::now();
        let stale_after = self
            .refresh_interval
            .read()
            .checked_mul(STALE_FACTOR)
            .unwrap_or(Duration::MAX);
        let is_stale = |fetched_at: Option<DateTime<Utc>>| {
            fetched_at.map_or(true, |at| (now - at).to_std().unwrap_or_default() > stale_after)
        };

        let coin_fetched_at = self.coin_fetched_at().await;
        let market_fetched_at = self.market_fetched_at().await;

        let mut details = HashMap::new();
        details.insert("coins".to_string(), serde_json::json!(self.size().await));
        details.insert(
            "provider_name".to_string(),
            serde_json::json!(self.provider_name()),
        );
        details.insert(
            "coin_fetched_at".to_string(),
            serde_json::json!(coin_fetched_at.map(|t| t.to_rfc3339())),
        );
        details.insert(
            "market_fetched_at".to_string(),
            serde_json::json!(market_fetched_at.map(|t| t.to_rfc3339())),
        );

        let mut stale_sources = Vec::new();
        if is_stale(coin_fetched_at) {
            stale_sources.push("coins");
        }
        if is_stale(market_fetched_at) {
            stale_sources.push("market");
        }
        details.insert("stale".to_string(), serde_json::json!(stale_sources));

        let status = if coin_fetched_at.is_none() && market_fetched_at.is_none() {
            HealthStatus::Unhealthy
        } else if !stale_sources.is_empty() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        let message = match status {
            HealthStatus::Healthy => "Coin fetcher is operational with fresh data".to_string(),
            HealthStatus::Degraded => {
                format!("Coin fetcher has stale or missing {}", stale_sources.join(" and "))
            }
            HealthStatus::Unhealthy => "Coin fetcher has no data yet".to_string(),
        };

        ComponentHealth {
            name: "coin_fetcher".to_string(),
            status,
            message: Some(message),
            details,
            last_checked: now,
        }
    }
}
