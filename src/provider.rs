//! Provider abstraction for fetching listings and market totals from external APIs

use crate::{
    error::ProviderError,
    types::{CoinIndex, MarketTotals},
};
use async_trait::async_trait;

/// Trait for market data providers
///
/// The fetcher only ever needs two calls: one for market-wide totals and one
/// for the coin listing. Implementations can wrap any source (CoinMarketCap,
/// a local mirror, a fixture).
#[async_trait]
pub trait CoinProvider: Send + Sync {
    /// Fetches the market-wide totals
    async fn fetch_market_totals(&self) -> Result<MarketTotals, ProviderError>;

    /// Fetches up to `limit` coins and indexes them by symbol and by name
    ///
    /// # Arguments
    /// * `limit` - Maximum number of coins to retrieve, highest ranked first
    async fn fetch_all_coins(&self, limit: usize) -> Result<CoinIndex, ProviderError>;

    /// Returns the name of this provider
    fn provider_name(&self) -> &'static str;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use crate::types::Coin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Mock provider for testing
    ///
    /// Serves a fixed coin list and market totals, optionally failing a
    /// number of calls first.
    #[derive(Default)]
    pub struct MockProvider {
        coins: Mutex<Option<Vec<Coin>>>,
        market: Mutex<Option<MarketTotals>>,
        coin_failures: AtomicUsize,
        market_failures: AtomicUsize,
        coin_calls: AtomicUsize,
        market_calls: AtomicUsize,
        last_limit: AtomicUsize,
    }

    impl MockProvider {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_data(coins: Vec<Coin>, market: MarketTotals) -> Self {
            let provider = Self::new();
            provider.set_coins(coins);
            provider.set_market(market);
            provider
        }

        pub fn set_coins(&self, coins: Vec<Coin>) {
            *self.coins.lock().unwrap() = Some(coins);
        }

        pub fn set_market(&self, market: MarketTotals) {
            *self.market.lock().unwrap() = Some(market);
        }

        /// Makes the next `n` coin fetches fail
        pub fn fail_coin_fetches(&self, n: usize) {
            self.coin_failures.store(n, Ordering::SeqCst);
        }

        /// Makes the next `n` market fetches fail
        pub fn fail_market_fetches(&self, n: usize) {
            self.market_failures.store(n, Ordering::SeqCst);
        }

        pub fn coin_calls(&self) -> usize {
            self.coin_calls.load(Ordering::SeqCst)
        }

        pub fn market_calls(&self) -> usize {
            self.market_calls.load(Ordering::SeqCst)
        }

        pub fn last_limit(&self) -> usize {
            self.last_limit.load(Ordering::SeqCst)
        }

        fn take_failure(counter: &AtomicUsize) -> bool {
            counter
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        }
    }

    #[async_trait]
    impl CoinProvider for MockProvider {
        async fn fetch_market_totals(&self) -> Result<MarketTotals, ProviderError> {
            self.market_calls.fetch_add(1, Ordering::SeqCst);
            if Self::take_failure(&self.market_failures) {
                return Err(ProviderError::ApiError("scripted market failure".to_string()));
            }
            self.market
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| ProviderError::InvalidResponse("no market data".to_string()))
        }

        async fn fetch_all_coins(&self, limit: usize) -> Result<CoinIndex, ProviderError> {
            self.coin_calls.fetch_add(1, Ordering::SeqCst);
            self.last_limit.store(limit, Ordering::SeqCst);
            if Self::take_failure(&self.coin_failures) {
                return Err(ProviderError::RateLimitExceeded);
            }
            let coins = self
                .coins
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| ProviderError::InvalidResponse("no coin data".to_string()))?;
            Ok(CoinIndex::from_coins(coins.into_iter().take(limit)))
        }

        fn provider_name(&self) -> &'static str {
            "mock"
        }
    }
}
