//! Market data provider implementations

pub mod coinmarketcap;

pub use coinmarketcap::CoinMarketCapProvider;
