//! # Coin Fetcher
//!
//! Keeps an in-memory, periodically refreshed copy of the cryptocurrency
//! listing and the market-wide totals published by a market-data provider
//! (CoinMarketCap by default).
//!
//! Two independent pollers refresh the data: one for the coin listing, one
//! for the market totals. Each retries quickly after a failure and otherwise
//! waits for the configured refresh interval. Callers can:
//!
//! - read the latest snapshot (`get`, `get_by_name`, `all`, `total_market`)
//! - search symbols and names (`search`)
//! - consume a stream of the coins that changed in each cycle
//!
//! ## Usage
//!
//! ```no_run
//! use coin_fetcher::{CoinFetcher, FetcherConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = CoinFetcher::from_config(FetcherConfig::default())?;
//! let _updates = fetcher.start(Duration::from_secs(300), 100).await?;
//!
//! fetcher.wait_for_first_fetch().await;
//! println!("{} coins, next refresh at {:?}", fetcher.size().await, fetcher.next_coin_fetch_time().await);
//!
//! let results = fetcher.search("bitcoin eth").await;
//! for coin in results.exact.iter().chain(&results.partial) {
//!     println!("{} ({}): {:?}", coin.name, coin.symbol, coin.price_usd);
//! }
//!
//! fetcher.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! CoinFetcher::start()
//!     ├─▶ coin poller ──▶ CoinProvider::fetch_all_coins ──▶ diff ──▶ SnapshotStore
//!     │                                                       └──▶ ChangePublisher ──▶ CoinUpdates
//!     └─▶ market poller ─▶ CoinProvider::fetch_market_totals ──────▶ SnapshotStore
//!
//! Your Code ──▶ get / all / search / total_market ──▶ SnapshotStore
//! ```
//!
//! ## Error Handling
//!
//! Provider failures never reach callers: they are logged, and the poller
//! retries after the retry interval while the previous snapshot stays in
//! place. Only `start` returns an error, when the fetcher is already running
//! or has been stopped.

pub mod config;
pub mod constants;
pub mod diff;
pub mod error;
pub mod fetcher;
pub mod metrics;
pub mod poller;
pub mod provider;
pub mod providers;
pub mod publisher;
pub mod search;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::FetcherConfig;
pub use error::{FetcherError, ProviderError};
pub use fetcher::CoinFetcher;
pub use metrics::FetchMetrics;
pub use provider::CoinProvider;
pub use publisher::{CoinBatch, CoinUpdates};
pub use types::{
    Coin, CoinIndex, ComponentHealth, HealthStatus, MarketTotals, NameIndex, SearchResults,
    SymbolIndex,
};
