//! Runtime configuration for the coin fetcher

use crate::constants::{
    ALL_COIN_LIMIT, COINMARKETCAP_API_URL, PUBLISH_BUFFER, REFRESH_INTERVAL_SECS,
    REQUEST_TIMEOUT_SECS, RETRY_INTERVAL_SECS,
};
use std::str::FromStr;
use std::time::Duration;

/// Environment variable overriding the refresh interval (seconds)
pub const ENV_REFRESH_SECS: &str = "COIN_FETCHER_REFRESH_SECS";
/// Environment variable overriding the retry interval (seconds)
pub const ENV_RETRY_SECS: &str = "COIN_FETCHER_RETRY_SECS";
/// Environment variable overriding the number of coins requested
pub const ENV_COIN_LIMIT: &str = "COIN_FETCHER_COIN_LIMIT";
/// Environment variable overriding the provider base URL
pub const ENV_API_URL: &str = "COIN_FETCHER_API_URL";

#[derive(Clone, Debug)]
pub struct FetcherConfig {
    /// Delay between cycles after a successful fetch.
    pub refresh_interval: Duration,

    /// Delay between cycles after a failed fetch.
    ///
    /// Kept short so that a transient provider outage is bridged quickly,
    /// but it is a fixed cadence: there is no adaptive rate-limit handling.
    pub retry_interval: Duration,

    /// Number of coins to request per cycle. Zero means `ALL_COIN_LIMIT`.
    pub coin_limit: usize,

    /// Provider base URL, without trailing slash.
    pub api_base_url: String,

    /// HTTP request timeout.
    pub request_timeout: Duration,

    /// Capacity of the changed-coin stream, in batches.
    pub publish_buffer: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(REFRESH_INTERVAL_SECS),
            retry_interval: Duration::from_secs(RETRY_INTERVAL_SECS),
            coin_limit: ALL_COIN_LIMIT,
            api_base_url: COINMARKETCAP_API_URL.to_string(),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            publish_buffer: PUBLISH_BUFFER,
        }
    }
}

impl FetcherConfig {
    /// Builds a configuration from `COIN_FETCHER_*` environment variables,
    /// falling back to the defaults for anything unset.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let refresh_secs = parse_interval_or(&lookup, ENV_REFRESH_SECS, REFRESH_INTERVAL_SECS);
        let retry_secs = parse_interval_or(&lookup, ENV_RETRY_SECS, RETRY_INTERVAL_SECS);
        let coin_limit = parse_or(&lookup, ENV_COIN_LIMIT, defaults.coin_limit);
        let api_base_url = lookup(ENV_API_URL)
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or(defaults.api_base_url);

        Self {
            refresh_interval: Duration::from_secs(refresh_secs),
            retry_interval: Duration::from_secs(retry_secs),
            coin_limit,
            api_base_url,
            ..defaults
        }
    }

    /// Refresh interval, or the default when zero
    pub fn effective_refresh_interval(&self) -> Duration {
        non_zero_or(self.refresh_interval, REFRESH_INTERVAL_SECS)
    }

    /// Retry interval, or the default when zero
    pub fn effective_retry_interval(&self) -> Duration {
        non_zero_or(self.retry_interval, RETRY_INTERVAL_SECS)
    }

    /// Coin limit with the "zero means all" rule applied
    pub fn effective_coin_limit(&self) -> usize {
        if self.coin_limit == 0 {
            ALL_COIN_LIMIT
        } else {
            self.coin_limit
        }
    }
}

fn non_zero_or(interval: Duration, default_secs: u64) -> Duration {
    if interval.is_zero() {
        Duration::from_secs(default_secs)
    } else {
        interval
    }
}

/// Parses an interval in seconds; zero would make a poller spin
fn parse_interval_or<F>(lookup: &F, key: &str, default: u64) -> u64
where
    F: Fn(&str) -> Option<String>,
{
    match parse_or(lookup, key, default) {
        0 => {
            tracing::warn!(key, default, "Ignoring zero interval");
            default
        }
        secs => secs,
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, value = %raw, "Ignoring unparseable configuration value");
                default
            }
        },
        None => default,
    }
}
