//! Keyword search over the coin indices
//!
//! Each whitespace-separated keyword is matched on its own, in order:
//!
//! 1. exact: symbol or name equal to the keyword (case-insensitive)
//! 2. partial, in four buckets appended in this order:
//!    symbol contains keyword, name contains keyword,
//!    keyword contains symbol, keyword contains name.
//!    Each bucket is sorted by the length of the matched field, then by rank.
//!
//! A coin is reported at most once per search, under the first keyword and
//! bucket that matched it.

use crate::types::{Coin, CoinIndex, SearchResults};
use std::collections::HashSet;

/// Which field of the coin a bucket compares against
#[derive(Clone, Copy)]
enum Field {
    Symbol,
    Name,
}

/// Searches `index` for `keywords`
pub fn search(index: &CoinIndex, keywords: &str) -> SearchResults {
    let mut matched: HashSet<String> = HashSet::new();
    let mut results = SearchResults::default();

    for token in keywords.split_whitespace() {
        let upper = token.to_uppercase();
        let lower = token.to_lowercase();

        let exact_candidates = [index.by_symbol().get(&upper), index.by_name().get(&lower)];
        for coin in exact_candidates.into_iter().flatten() {
            if matched.insert(coin.symbol_key()) {
                results.exact.push(coin.clone());
                break;
            }
        }

        let remaining: Vec<&Coin> = index
            .by_symbol()
            .iter()
            .filter(|(symbol, _)| !matched.contains(*symbol))
            .map(|(_, coin)| coin)
            .collect();

        let buckets = [
            bucket(&remaining, Field::Symbol, |symbol| symbol.contains(&upper)),
            bucket(&remaining, Field::Name, |name| name.contains(&lower)),
            bucket(&remaining, Field::Symbol, |symbol| upper.contains(symbol)),
            bucket(&remaining, Field::Name, |name| lower.contains(name)),
        ];

        for coin in buckets.into_iter().flatten() {
            if matched.insert(coin.symbol_key()) {
                results.partial.push(coin.clone());
            }
        }
    }

    results
}

/// Collects the coins whose normalized `field` satisfies `pred`, most relevant first
fn bucket<'a, P>(coins: &[&'a Coin], field: Field, pred: P) -> Vec<&'a Coin>
where
    P: Fn(&str) -> bool,
{
    let mut hits: Vec<(usize, &'a Coin)> = coins
        .iter()
        .filter_map(|coin| {
            let key = match field {
                Field::Symbol => coin.symbol_key(),
                Field::Name => coin.name_key(),
            };
            // an empty field would "contain" in every keyword
            if key.is_empty() || !pred(&key) {
                return None;
            }
            Some((key.chars().count(), *coin))
        })
        .collect();

    hits.sort_by(|(len_a, a), (len_b, b)| {
        len_a
            .cmp(len_b)
            .then_with(|| a.rank.cmp(&b.rank))
            .then_with(|| a.symbol.cmp(&b.symbol))
    });

    hits.into_iter().map(|(_, coin)| coin).collect()
}
