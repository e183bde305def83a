//! CoinMarketCap provider implementation

use crate::{
    config::FetcherConfig,
    constants::{COINMARKETCAP_GLOBAL_ENDPOINT, COINMARKETCAP_TICKER_ENDPOINT, USER_AGENT},
    error::ProviderError,
    provider::CoinProvider,
    types::{Coin, CoinIndex, MarketTotals},
};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::Value;

/// One entry of the ticker listing
///
/// The ticker encodes every number as a JSON string, so fields are kept as
/// raw values and parsed leniently.
#[derive(Debug, Deserialize)]
struct TickerEntry {
    id: String,
    name: String,
    symbol: String,
    rank: Option<Value>,
    price_usd: Option<Value>,
    price_btc: Option<Value>,
    #[serde(rename = "24h_volume_usd")]
    volume_usd_24h: Option<Value>,
    market_cap_usd: Option<Value>,
    available_supply: Option<Value>,
    total_supply: Option<Value>,
    max_supply: Option<Value>,
    percent_change_1h: Option<Value>,
    percent_change_24h: Option<Value>,
    percent_change_7d: Option<Value>,
    last_updated: Option<Value>,
}

impl From<TickerEntry> for Coin {
    fn from(entry: TickerEntry) -> Self {
        Coin {
            id: entry.id,
            name: entry.name,
            symbol: entry.symbol,
            rank: as_u64(&entry.rank)
                .and_then(|r| u32::try_from(r).ok())
                .unwrap_or(u32::MAX),
            price_usd: as_f64(&entry.price_usd),
            price_btc: as_f64(&entry.price_btc),
            volume_usd_24h: as_f64(&entry.volume_usd_24h),
            market_cap_usd: as_f64(&entry.market_cap_usd),
            available_supply: as_f64(&entry.available_supply),
            total_supply: as_f64(&entry.total_supply),
            max_supply: as_f64(&entry.max_supply),
            percent_change_1h: as_f64(&entry.percent_change_1h),
            percent_change_24h: as_f64(&entry.percent_change_24h),
            percent_change_7d: as_f64(&entry.percent_change_7d),
            last_updated: as_u64(&entry.last_updated).and_then(|t| i64::try_from(t).ok()),
        }
    }
}

/// Global market response
#[derive(Debug, Deserialize)]
struct GlobalResponse {
    total_market_cap_usd: Option<Value>,
    total_24h_volume_usd: Option<Value>,
    bitcoin_percentage_of_market_cap: Option<Value>,
    active_currencies: Option<Value>,
    active_assets: Option<Value>,
    active_markets: Option<Value>,
    last_updated: Option<Value>,
}

/// Error body returned by the API
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

fn as_f64(value: &Option<Value>) -> Option<f64> {
    let parsed = match value.as_ref()? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    // "NaN" never compares equal, so the coin would look changed every cycle
    parsed.filter(|f: &f64| f.is_finite())
}

fn as_u64(value: &Option<Value>) -> Option<u64> {
    match value.as_ref()? {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parses a ticker listing body
fn parse_ticker(body: &str) -> Result<Vec<Coin>, ProviderError> {
    if let Ok(err) = serde_json::from_str::<ErrorResponse>(body) {
        return Err(ProviderError::ApiError(err.error));
    }

    let entries: Vec<TickerEntry> = serde_json::from_str(body).map_err(|e| {
        ProviderError::InvalidResponse(format!("Failed to parse ticker response: {}", e))
    })?;

    Ok(entries.into_iter().map(Coin::from).collect())
}

/// Parses a global market body
fn parse_global(body: &str) -> Result<MarketTotals, ProviderError> {
    if let Ok(err) = serde_json::from_str::<ErrorResponse>(body) {
        return Err(ProviderError::ApiError(err.error));
    }

    let global: GlobalResponse = serde_json::from_str(body).map_err(|e| {
        ProviderError::InvalidResponse(format!("Failed to parse global response: {}", e))
    })?;

    let total_market_cap_usd = as_f64(&global.total_market_cap_usd).ok_or_else(|| {
        ProviderError::InvalidResponse("Global response has no market cap".to_string())
    })?;

    Ok(MarketTotals {
        total_market_cap_usd,
        total_24h_volume_usd: as_f64(&global.total_24h_volume_usd).unwrap_or_default(),
        bitcoin_percentage_of_market_cap: as_f64(&global.bitcoin_percentage_of_market_cap)
            .unwrap_or_default(),
        active_currencies: as_u64(&global.active_currencies).unwrap_or_default(),
        active_assets: as_u64(&global.active_assets).unwrap_or_default(),
        active_markets: as_u64(&global.active_markets).unwrap_or_default(),
        last_updated: as_u64(&global.last_updated).and_then(|t| i64::try_from(t).ok()),
    })
}

/// CoinMarketCap provider
pub struct CoinMarketCapProvider {
    client: Client,
    base_url: String,
}

impl CoinMarketCapProvider {
    /// Creates a new CoinMarketCap provider
    pub fn new(config: &FetcherConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(ProviderError::NetworkError)?;

        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
        })
    }

    fn ticker_url(&self, limit: usize) -> String {
        format!(
            "{}{}?limit={}",
            self.base_url, COINMARKETCAP_TICKER_ENDPOINT, limit
        )
    }

    fn global_url(&self) -> String {
        format!("{}{}", self.base_url, COINMARKETCAP_GLOBAL_ENDPOINT)
    }

    /// Sends a GET and returns the body of a successful response
    async fn get_body(&self, url: &str) -> Result<String, ProviderError> {
        tracing::debug!(url, "Fetching from CoinMarketCap");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else {
                ProviderError::NetworkError(e)
            }
        })?;

        Self::check_status(response).await
    }

    async fn check_status(response: Response) -> Result<String, ProviderError> {
        // Check for rate limiting
        if response.status().as_u16() == 429 {
            return Err(ProviderError::RateLimitExceeded);
        }

        // Check for other errors
        if !response.status().is_success() {
            return Err(ProviderError::ApiError(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        response.text().await.map_err(ProviderError::NetworkError)
    }
}

#[async_trait]
impl CoinProvider for CoinMarketCapProvider {
    async fn fetch_market_totals(&self) -> Result<MarketTotals, ProviderError> {
        let body = self.get_body(&self.global_url()).await?;
        parse_global(&body)
    }

    async fn fetch_all_coins(&self, limit: usize) -> Result<CoinIndex, ProviderError> {
        let body = self.get_body(&self.ticker_url(limit)).await?;
        let coins = parse_ticker(&body)?;

        if coins.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "No coins returned from CoinMarketCap".to_string(),
            ));
        }

        tracing::debug!(count = coins.len(), "Successfully fetched coins from CoinMarketCap");

        Ok(CoinIndex::from_coins(coins))
    }

    fn provider_name(&self) -> &'static str {
        "coinmarketcap"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICKER: &str = r#"[
        {
            "id": "bitcoin", "name": "Bitcoin", "symbol": "BTC", "rank": "1",
            "price_usd": "573.137", "price_btc": "1.0", "24h_volume_usd": "72855700.0",
            "market_cap_usd": "9080883500.0", "available_supply": "15844176.0",
            "total_supply": "15844176.0", "max_supply": "21000000.0",
            "percent_change_1h": "0.04", "percent_change_24h": "-0.3",
            "percent_change_7d": "-0.57", "last_updated": "1472762067"
        },
        {
            "id": "eos", "name": "EOS", "symbol": "EOS", "rank": "5",
            "price_usd": "5.1", "price_btc": null, "24h_volume_usd": "not-a-number",
            "market_cap_usd": null, "available_supply": null, "total_supply": null,
            "max_supply": null, "percent_change_1h": null, "percent_change_24h": null,
            "percent_change_7d": null, "last_updated": null
        }
    ]"#;

    #[test]
    fn test_non_finite_numbers_are_dropped() {
        let body = r#"[{
            "id": "odd", "name": "Odd", "symbol": "ODD", "rank": "9",
            "price_usd": "NaN", "24h_volume_usd": "inf", "market_cap_usd": "-infinity",
            "percent_change_1h": "1.5"
        }]"#;
        let coins = parse_ticker(body).unwrap();
        let odd = &coins[0];
        assert_eq!(odd.price_usd, None);
        assert_eq!(odd.volume_usd_24h, None);
        assert_eq!(odd.market_cap_usd, None);
        assert_eq!(odd.percent_change_1h, Some(1.5));
        assert_eq!(parse_ticker(body).unwrap(), coins);
    }

    #[test]
    fn test_parse_ticker_string_numbers() {
        let coins = parse_ticker(TICKER).unwrap();
        assert_eq!(coins.len(), 2);

        let btc = &coins[0];
        assert_eq!(btc.symbol, "BTC");
        assert_eq!(btc.rank, 1);
        assert_eq!(btc.price_usd, Some(573.137));
        assert_eq!(btc.volume_usd_24h, Some(72855700.0));
        assert_eq!(btc.max_supply, Some(21000000.0));
        assert_eq!(btc.last_updated, Some(1472762067));

        let eos = &coins[1];
        assert_eq!(eos.price_usd, Some(5.1));
        assert_eq!(eos.volume_usd_24h, None);
        assert_eq!(eos.price_btc, None);
    }

    #[test]
    fn test_parse_ticker_error_body() {
        let err = parse_ticker(r#"{"error": "id not found"}"#).unwrap_err();
        assert!(matches!(err, ProviderError::ApiError(msg) if msg == "id not found"));
    }

    #[test]
    fn test_parse_ticker_garbage() {
        let err = parse_ticker("<html>busy</html>").unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[test]
    fn test_parse_global() {
        let totals = parse_global(
            r#"{
                "total_market_cap_usd": 201241796675.0,
                "total_24h_volume_usd": 4548680009,
                "bitcoin_percentage_of_market_cap": 62.54,
                "active_currencies": 896,
                "active_assets": 360,
                "active_markets": 6439,
                "last_updated": 1509909852
            }"#,
        )
        .unwrap();

        assert_eq!(totals.total_market_cap_usd, 201241796675.0);
        assert_eq!(totals.total_24h_volume_usd, 4548680009.0);
        assert_eq!(totals.active_markets, 6439);
        assert_eq!(totals.last_updated, Some(1509909852));
    }

    #[test]
    fn test_parse_global_without_market_cap() {
        let err = parse_global(r#"{"active_markets": 1}"#).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[test]
    fn test_urls() {
        let config = FetcherConfig {
            api_base_url: "http://localhost:9000/v1".to_string(),
            ..FetcherConfig::default()
        };
        let provider = CoinMarketCapProvider::new(&config).unwrap();
        assert_eq!(provider.ticker_url(100), "http://localhost:9000/v1/ticker/?limit=100");
        assert_eq!(provider.global_url(), "http://localhost:9000/v1/global/");
    }
}
