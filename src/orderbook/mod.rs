pub mod store;

use crate::models::{RawLevel, Side};
use ordered_float::OrderedFloat;
use std::collections::BTreeMap;
pub use store::BookStore;

/// Latest raw levels for one exchange/symbol pair, exactly as the feed
/// reported them (no bucketing).
#[derive(Debug, Clone)]
pub struct RawBook {
    pub exchange: String,
    pub symbol: String,
    // price → quantity. BTreeMap keeps keys sorted ascending.
    pub bids: BTreeMap<OrderedFloat<f64>, f64>,
    pub asks: BTreeMap<OrderedFloat<f64>, f64>,
    /// Bumped on every mutation; part of the aggregation cache key.
    pub revision: u64,
    pub updated_ms: u64,
}

impl RawBook {
    pub fn new(exchange: &str, symbol: &str) -> Self {
        Self {
            exchange: exchange.to_string(),
            symbol: symbol.to_string(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            revision: 0,
            updated_ms: 0,
        }
    }

    pub fn side(&self, side: Side) -> &BTreeMap<OrderedFloat<f64>, f64> {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    pub(crate) fn side_mut(&mut self, side: Side) -> &mut BTreeMap<OrderedFloat<f64>, f64> {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }

    /// Raw levels of one side in ascending price order.
    pub fn levels(&self, side: Side) -> Vec<RawLevel> {
        self.side(side)
            .iter()
            .map(|(price, quantity)| RawLevel::new(price.into_inner(), *quantity))
            .collect()
    }

    /// Highest bid price
    pub fn best_bid(&self) -> Option<f64> {
        self.bids.keys().next_back().map(|p| p.into_inner())
    }

    /// Lowest ask price
    pub fn best_ask(&self) -> Option<f64> {
        self.asks.keys().next().map(|p| p.into_inner())
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}
