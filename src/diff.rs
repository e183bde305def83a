//! Change detection between two coin snapshots

use crate::types::{Coin, SymbolIndex};

/// Returns the coins of `next` that are new or changed relative to `previous`
///
/// A coin is part of the delta when its symbol is absent from `previous` or
/// when it differs from the previous entry in any field. The result is sorted
/// by rank so consumers receive the most prominent coins first.
pub fn detect_changes(previous: Option<&SymbolIndex>, next: &SymbolIndex) -> Vec<Coin> {
    let mut changed: Vec<Coin> = next
        .iter()
        .filter(|(symbol, coin)| {
            !matches!(
                previous.and_then(|prev| prev.get(*symbol)),
                Some(old) if old == *coin
            )
        })
        .map(|(_, coin)| coin.clone())
        .collect();

    changed.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.symbol.cmp(&b.symbol)));
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{coin, CoinIndex};

    fn index() -> CoinIndex {
        CoinIndex::from_coins(vec![
            coin("BTC", "Bitcoin", 1),
            coin("ETH", "Ethereum", 2),
            coin("EOS", "EOS", 5),
        ])
    }

    #[test]
    fn test_first_snapshot_is_all_new() {
        let next = index();
        let delta = detect_changes(None, next.by_symbol());
        let symbols: Vec<_> = delta.iter().map(|c| c.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTC", "ETH", "EOS"]);
    }

    #[test]
    fn test_identical_refetch_is_empty() {
        let prev = index();
        let next = index();
        assert!(detect_changes(Some(prev.by_symbol()), next.by_symbol()).is_empty());
    }

    #[test]
    fn test_one_changed_price() {
        let prev = index();
        let mut eth = coin("ETH", "Ethereum", 2);
        eth.price_usd = Some(3_000.0);
        let next = CoinIndex::from_coins(vec![coin("BTC", "Bitcoin", 1), eth, coin("EOS", "EOS", 5)]);

        let delta = detect_changes(Some(prev.by_symbol()), next.by_symbol());
        assert_eq!(delta.len(), 1);
        assert_eq!(delta[0].symbol, "ETH");
        assert_eq!(delta[0].price_usd, Some(3_000.0));
    }

    #[test]
    fn test_removed_coins_are_not_reported() {
        let prev = index();
        let next = CoinIndex::from_coins(vec![coin("BTC", "Bitcoin", 1), coin("NEO", "NEO", 9)]);

        let delta = detect_changes(Some(prev.by_symbol()), next.by_symbol());
        assert_eq!(delta.len(), 1);
        assert_eq!(delta[0].symbol, "NEO");
        assert!(delta.iter().all(|c| next.get(&c.symbol).is_some()));
    }
}
