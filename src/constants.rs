//! Constants for the coin fetcher
//!
//! Compile-time defaults. Every value here can be overridden at runtime
//! through [`FetcherConfig`](crate::config::FetcherConfig).

/// How often to refetch after a successful cycle (in seconds)
///
/// See <https://coinmarketcap.com/api/#Limits>
pub const REFRESH_INTERVAL_SECS: u64 = 5 * 60;

/// How long to wait before retrying after a failed cycle (in seconds)
pub const RETRY_INTERVAL_SECS: u64 = 5;

/// Number of coins requested when the caller asks for "all" of them
pub const ALL_COIN_LIMIT: usize = 10_000;

/// HTTP request timeout when fetching from the provider (in seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Number of changed-coin batches buffered for a slow consumer
pub const PUBLISH_BUFFER: usize = 16;

/// A snapshot older than this many refresh intervals is reported as stale
pub const STALE_FACTOR: u32 = 3;

/// CoinMarketCap public API base URL
pub const COINMARKETCAP_API_URL: &str = "https://api.coinmarketcap.com/v1";

/// Endpoint listing every coin with its market fields
pub const COINMARKETCAP_TICKER_ENDPOINT: &str = "/ticker/";

/// Endpoint with market-wide totals
pub const COINMARKETCAP_GLOBAL_ENDPOINT: &str = "/global/";

/// User agent for HTTP requests
pub const USER_AGENT: &str = "coin-fetcher/0.1.0";
