//! Depth aggregation: bucketing, spread and display helpers, plus the
//! pipeline that turns a raw book into an [`OrderBookSnapshot`].

pub mod aggregate;
pub mod buckets;
pub mod cache;
pub mod precision;
pub mod spread;

pub use aggregate::aggregate;
pub use buckets::{BucketSelector, bucket_sizes};
pub use cache::AggregationCache;
pub use precision::{display_precision, format_price, price_precision};

use crate::errors::EngineError;
use crate::models::{Grouping, OrderBookSnapshot, Side};
use crate::orderbook::RawBook;

/// Aggregates both sides of `book` and derives the spread. Pure apart from
/// the cache, which only memoizes.
pub fn build_snapshot(
    book: &RawBook,
    grouping: Grouping,
    cache: &mut AggregationCache,
    timestamp_ms: u64,
) -> Result<OrderBookSnapshot, EngineError> {
    let asks = cache.side(book, Side::Ask, grouping)?;
    let bids = cache.side(book, Side::Bid, grouping)?;
    let spread = spread::compute(&asks, &bids);

    if let Some(warning) = spread.crossed {
        tracing::warn!(
            "[{}] {} crossed book: bid={} ask={}",
            book.exchange,
            book.symbol,
            warning.best_bid,
            warning.best_ask
        );
    }

    Ok(OrderBookSnapshot {
        exchange: book.exchange.clone(),
        symbol: book.symbol.clone(),
        asks,
        bids,
        spread: spread.spread,
        spread_percentage: spread.spread_percentage,
        crossed: spread.crossed,
        bucket_size: grouping.bucket_size(),
        depth: grouping.depth(),
        timestamp_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawLevel;
    use crate::orderbook::BookStore;

    fn store_with(bids: &[(f64, f64)], asks: &[(f64, f64)]) -> BookStore {
        let store = BookStore::new();
        let to_raw = |v: &[(f64, f64)]| -> Vec<RawLevel> {
            v.iter().map(|&(p, q)| RawLevel::new(p, q)).collect()
        };
        store.ingest_snapshot("binance", "BTCUSDT", Side::Bid, &to_raw(bids), 1);
        store.ingest_snapshot("binance", "BTCUSDT", Side::Ask, &to_raw(asks), 1);
        store
    }

    #[test]
    fn snapshot_carries_both_sides_and_spread() {
        let store = store_with(&[(99.9, 2.0)], &[(100.1, 3.0)]);
        let book = store.get("binance", "BTCUSDT").unwrap();
        let mut cache = AggregationCache::default();

        let snapshot =
            build_snapshot(&book, Grouping::new(0.1, 10).unwrap(), &mut cache, 42).unwrap();
        assert_eq!(snapshot.asks.len(), 1);
        assert_eq!(snapshot.bids.len(), 1);
        assert!((snapshot.spread.unwrap() - 0.2).abs() < 1e-9);
        assert!((snapshot.spread_percentage.unwrap() - 0.2002).abs() < 1e-4);
        assert!(snapshot.crossed.is_none());
        assert_eq!(snapshot.timestamp_ms, 42);
    }

    #[test]
    fn empty_asks_leave_spread_undefined() {
        let store = store_with(&[(99.0, 1.0)], &[]);
        let book = store.get("binance", "BTCUSDT").unwrap();
        let mut cache = AggregationCache::default();

        let snapshot =
            build_snapshot(&book, Grouping::new(1.0, 10).unwrap(), &mut cache, 0).unwrap();
        assert!(snapshot.asks.is_empty());
        assert_eq!(snapshot.bids.len(), 1);
        assert_eq!(snapshot.spread, None);
        assert!(snapshot.crossed.is_none());
    }

    #[test]
    fn crossed_book_still_builds() {
        let store = store_with(&[(101.0, 1.0)], &[(100.0, 1.0)]);
        let book = store.get("binance", "BTCUSDT").unwrap();
        let mut cache = AggregationCache::default();

        let snapshot =
            build_snapshot(&book, Grouping::new(1.0, 10).unwrap(), &mut cache, 0).unwrap();
        assert_eq!(snapshot.spread, Some(-1.0));
        assert!(snapshot.crossed.is_some());
    }
}
