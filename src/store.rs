//! In-memory snapshot store
//!
//! Holds the latest coin indices and market totals. Both are replaced
//! wholesale by their owning poller; readers never see a half-updated pair of
//! indices because the pair lives behind a single lock as one `Arc`.

use crate::types::{Coin, CoinIndex, MarketTotals, SymbolIndex};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Coin indices produced by one successful coin cycle
#[derive(Debug, Clone)]
pub struct CoinSnapshot {
    pub index: CoinIndex,
    pub fetched_at: DateTime<Utc>,
}

/// Market totals produced by one successful market cycle
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub totals: MarketTotals,
    pub fetched_at: DateTime<Utc>,
}

/// In-memory store for the latest snapshots
#[derive(Default)]
pub struct SnapshotStore {
    coins: RwLock<Option<Arc<CoinSnapshot>>>,
    market: RwLock<Option<MarketSnapshot>>,
    next_coin_fetch: RwLock<Option<DateTime<Utc>>>,
    next_market_fetch: RwLock<Option<DateTime<Utc>>>,
}

impl SnapshotStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the coin snapshot
    pub async fn install_coins(&self, index: CoinIndex, fetched_at: DateTime<Utc>) {
        let snapshot = Arc::new(CoinSnapshot { index, fetched_at });
        let count = snapshot.index.len();
        *self.coins.write().await = Some(snapshot);
        tracing::debug!(count, "Installed coin snapshot");
    }

    /// Replaces the market snapshot
    pub async fn install_market(&self, totals: MarketTotals, fetched_at: DateTime<Utc>) {
        *self.market.write().await = Some(MarketSnapshot { totals, fetched_at });
        tracing::debug!("Installed market snapshot");
    }

    pub async fn set_next_coin_fetch(&self, at: DateTime<Utc>) {
        *self.next_coin_fetch.write().await = Some(at);
    }

    pub async fn set_next_market_fetch(&self, at: DateTime<Utc>) {
        *self.next_market_fetch.write().await = Some(at);
    }

    /// Current coin snapshot, if any cycle has succeeded
    pub async fn coin_snapshot(&self) -> Option<Arc<CoinSnapshot>> {
        self.coins.read().await.clone()
    }

    /// Current market snapshot, if any cycle has succeeded
    pub async fn market_snapshot(&self) -> Option<MarketSnapshot> {
        self.market.read().await.clone()
    }

    /// Number of coins in the current snapshot
    pub async fn size(&self) -> usize {
        self.coins
            .read()
            .await
            .as_ref()
            .map_or(0, |snapshot| snapshot.index.len())
    }

    /// Copy of the symbol index
    ///
    /// The caller owns the returned map; changing it has no effect on the store.
    pub async fn all(&self) -> SymbolIndex {
        self.coins
            .read()
            .await
            .as_ref()
            .map(|snapshot| snapshot.index.by_symbol().clone())
            .unwrap_or_default()
    }

    /// Gets a coin by symbol, case-insensitively
    pub async fn get(&self, symbol: &str) -> Option<Coin> {
        let coins = self.coins.read().await;
        coins.as_ref()?.index.get(symbol).cloned()
    }

    /// Gets a coin by name, case-insensitively
    pub async fn get_by_name(&self, name: &str) -> Option<Coin> {
        let coins = self.coins.read().await;
        coins.as_ref()?.index.get_by_name(name).cloned()
    }

    pub async fn total_market(&self) -> Option<MarketTotals> {
        self.market
            .read()
            .await
            .as_ref()
            .map(|snapshot| snapshot.totals.clone())
    }

    pub async fn coin_fetched_at(&self) -> Option<DateTime<Utc>> {
        self.coins.read().await.as_ref().map(|s| s.fetched_at)
    }

    pub async fn market_fetched_at(&self) -> Option<DateTime<Utc>> {
        self.market.read().await.as_ref().map(|s| s.fetched_at)
    }

    pub async fn next_coin_fetch(&self) -> Option<DateTime<Utc>> {
        *self.next_coin_fetch.read().await
    }

    pub async fn next_market_fetch(&self) -> Option<DateTime<Utc>> {
        *self.next_market_fetch.read().await
    }
}
