use std::collections::HashMap;

use crate::depth::aggregate::aggregate;
use crate::errors::EngineError;
use crate::models::{Grouping, OrderBookLevel, Side};
use crate::orderbook::RawBook;

const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    exchange: String,
    symbol: String,
    side: Side,
    bucket_bits: u64,
    depth: usize,
    revision: u64,
}

/// Memoizes aggregation per `(book, side, bucket size, depth, revision)`.
/// A new revision of a book never hits an older entry, so stale output is
/// impossible; old entries are simply dropped when the cache fills up.
#[derive(Debug)]
pub struct AggregationCache {
    entries: HashMap<CacheKey, Vec<OrderBookLevel>>,
    capacity: usize,
    hits: u64,
    misses: u64,
}

impl Default for AggregationCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl AggregationCache {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            hits: 0,
            misses: 0,
        }
    }

    pub fn side(
        &mut self,
        book: &RawBook,
        side: Side,
        grouping: Grouping,
    ) -> Result<Vec<OrderBookLevel>, EngineError> {
        let key = CacheKey {
            exchange: book.exchange.clone(),
            symbol: book.symbol.clone(),
            side,
            bucket_bits: grouping.bucket_size().to_bits(),
            depth: grouping.depth(),
            revision: book.revision,
        };

        if let Some(levels) = self.entries.get(&key) {
            self.hits += 1;
            return Ok(levels.clone());
        }

        let levels = aggregate(
            &book.levels(side),
            grouping.bucket_size(),
            grouping.depth(),
            side,
        )?;
        self.misses += 1;

        if self.entries.len() >= self.capacity {
            self.entries.clear();
        }
        self.entries.insert(key, levels.clone());
        Ok(levels)
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
