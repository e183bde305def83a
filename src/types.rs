//! Types for the coin fetcher

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Mapping from uppercase symbol to coin
pub type SymbolIndex = HashMap<String, Coin>;

/// Mapping from lowercase name to coin
pub type NameIndex = HashMap<String, Coin>;

/// One listed cryptocurrency
///
/// Compared by full equality: any field that differs from the previous
/// snapshot makes the coin part of that cycle's delta.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Coin {
    /// Provider identifier (slug)
    pub id: String,
    /// Display name
    pub name: String,
    /// Ticker symbol
    pub symbol: String,
    /// Rank by market cap, 1 being the largest
    pub rank: u32,
    pub price_usd: Option<f64>,
    pub price_btc: Option<f64>,
    pub volume_usd_24h: Option<f64>,
    pub market_cap_usd: Option<f64>,
    pub available_supply: Option<f64>,
    pub total_supply: Option<f64>,
    pub max_supply: Option<f64>,
    pub percent_change_1h: Option<f64>,
    pub percent_change_24h: Option<f64>,
    pub percent_change_7d: Option<f64>,
    /// Provider-side update time (unix seconds)
    pub last_updated: Option<i64>,
}

impl Coin {
    /// Key of this coin in the symbol index
    pub fn symbol_key(&self) -> String {
        self.symbol.to_uppercase()
    }

    /// Key of this coin in the name index
    pub fn name_key(&self) -> String {
        self.name.to_lowercase()
    }
}

/// Market-wide totals
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MarketTotals {
    pub total_market_cap_usd: f64,
    pub total_24h_volume_usd: f64,
    pub bitcoin_percentage_of_market_cap: f64,
    pub active_currencies: u64,
    pub active_assets: u64,
    pub active_markets: u64,
    /// Provider-side update time (unix seconds)
    pub last_updated: Option<i64>,
}

/// Symbol and name indices built from one coin population
///
/// The only way to build one is [`CoinIndex::from_coins`], so the two maps
/// can never drift apart.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoinIndex {
    by_symbol: SymbolIndex,
    by_name: NameIndex,
}

impl CoinIndex {
    /// Builds both indices from a coin list
    ///
    /// When two coins share a symbol the one with the lower rank wins.
    /// Coins without a symbol are dropped.
    pub fn from_coins(coins: impl IntoIterator<Item = Coin>) -> Self {
        let mut by_symbol: SymbolIndex = HashMap::new();

        for coin in coins {
            let key = coin.symbol_key();
            if key.is_empty() {
                continue;
            }
            match by_symbol.get(&key) {
                Some(existing) if existing.rank <= coin.rank => {}
                _ => {
                    by_symbol.insert(key, coin);
                }
            }
        }

        let by_name = by_symbol
            .values()
            .filter(|coin| !coin.name.is_empty())
            .map(|coin| (coin.name_key(), coin.clone()))
            .collect();

        Self { by_symbol, by_name }
    }

    pub fn by_symbol(&self) -> &SymbolIndex {
        &self.by_symbol
    }

    pub fn by_name(&self) -> &NameIndex {
        &self.by_name
    }

    /// Looks up a coin by symbol, case-insensitively
    pub fn get(&self, symbol: &str) -> Option<&Coin> {
        self.by_symbol.get(&symbol.to_uppercase())
    }

    /// Looks up a coin by name, case-insensitively
    pub fn get_by_name(&self, name: &str) -> Option<&Coin> {
        self.by_name.get(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }
}

/// Result of a keyword search
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    /// Coins whose symbol or name equals one of the keywords
    pub exact: Vec<Coin>,
    /// Coins whose symbol or name overlaps one of the keywords
    pub partial: Vec<Coin>,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.partial.is_empty()
    }
}

/// Overall system health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// Both snapshots are present and fresh
    Healthy,
    /// Only part of the data is available, or some of it is stale
    Degraded,
    /// Nothing has been fetched yet
    Unhealthy,
}

/// Component health information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional status message
    pub message: Option<String>,
    /// Component-specific details
    pub details: HashMap<String, serde_json::Value>,
    /// Last checked timestamp
    pub last_checked: DateTime<Utc>,
}

#[cfg(test)]
pub(crate) fn coin(symbol: &str, name: &str, rank: u32) -> Coin {
    Coin {
        id: name.to_lowercase().replace(' ', "-"),
        name: name.to_string(),
        symbol: symbol.to_string(),
        rank,
        price_usd: Some(rank as f64),
        ..Coin::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_keys_are_normalized() {
        let index = CoinIndex::from_coins(vec![coin("eos", "EOS", 5), coin("BTC", "Bitcoin", 1)]);

        assert_eq!(index.len(), 2);
        assert!(index.by_symbol().contains_key("EOS"));
        assert!(index.by_name().contains_key("bitcoin"));
        assert_eq!(index.get("btc").map(|c| c.rank), Some(1));
        assert_eq!(index.get_by_name("BITCOIN").map(|c| c.rank), Some(1));
    }

    #[test]
    fn test_duplicate_symbol_keeps_lowest_rank() {
        let index = CoinIndex::from_coins(vec![
            coin("BTG", "Bitgem", 900),
            coin("BTG", "Bitcoin Gold", 20),
        ]);

        assert_eq!(index.len(), 1);
        assert_eq!(index.get("BTG").map(|c| c.name.as_str()), Some("Bitcoin Gold"));
        assert!(index.get_by_name("bitgem").is_none());
        assert_eq!(index.by_name().len(), 1);
    }

    #[test]
    fn test_coins_without_symbol_are_dropped() {
        let index = CoinIndex::from_coins(vec![coin("", "Nothing", 3)]);
        assert!(index.is_empty());
        assert!(index.by_name().is_empty());
    }
}
