use crate::errors::EngineError;
use crate::models::{RawLevel, Side};
use crate::orderbook::RawBook;
use dashmap::DashMap;
use ordered_float::OrderedFloat;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct BookStore {
    inner: Arc<DashMap<String, RawBook>>,
}

impl BookStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key format e.g.: "binance:BTCUSDT"
    fn key(exchange: &str, symbol: &str) -> String {
        format!("{}:{}", exchange, symbol)
    }

    /// Replaces every raw level of one side. Prices repeated within the batch
    /// are summed; unusable levels (non-finite, non-positive) are skipped.
    pub fn ingest_snapshot(
        &self,
        exchange: &str,
        symbol: &str,
        side: Side,
        levels: &[RawLevel],
        updated_ms: u64,
    ) {
        let mut fresh = BTreeMap::new();
        let mut skipped = 0usize;

        for level in levels {
            if !is_usable(level.price) || !is_usable(level.quantity) {
                skipped += 1;
                continue;
            }
            *fresh.entry(OrderedFloat(level.price)).or_insert(0.0) += level.quantity;
        }

        if skipped > 0 {
            tracing::debug!(
                "[{exchange}] {symbol} skipped {skipped} unusable {} levels",
                side.as_str()
            );
        }

        let mut book = self
            .inner
            .entry(Self::key(exchange, symbol))
            .or_insert_with(|| RawBook::new(exchange, symbol));
        *book.side_mut(side) = fresh;
        book.revision += 1;
        book.updated_ms = updated_ms;
    }

    /// Sets a single level, or removes it when `quantity` is zero.
    /// `updated_ms` is when the change happened.
    pub fn upsert(
        &self,
        exchange: &str,
        symbol: &str,
        side: Side,
        price: f64,
        quantity: f64,
        updated_ms: u64,
    ) -> Result<(), EngineError> {
        validate_level(price, quantity)?;

        let mut book = self
            .inner
            .entry(Self::key(exchange, symbol))
            .or_insert_with(|| RawBook::new(exchange, symbol));
        let levels = book.side_mut(side);
        if quantity == 0.0 {
            levels.remove(&OrderedFloat(price));
        } else {
            levels.insert(OrderedFloat(price), quantity);
        }
        book.revision += 1;
        book.updated_ms = updated_ms;
        Ok(())
    }

    /// Gets a book from the store
    pub fn get(&self, exchange: &str, symbol: &str) -> Option<RawBook> {
        self.inner
            .get(&Self::key(exchange, symbol))
            .map(|r| r.clone())
    }

    pub fn revision(&self, exchange: &str, symbol: &str) -> Option<u64> {
        self.inner
            .get(&Self::key(exchange, symbol))
            .map(|r| r.revision)
    }

    /// Gets all stored books
    pub fn all(&self) -> Vec<RawBook> {
        self.inner.iter().map(|r| r.value().clone()).collect()
    }
}

/// Checks a single-level update: positive price, zero (removal) or positive
/// quantity.
pub fn validate_level(price: f64, quantity: f64) -> Result<(), EngineError> {
    if !is_usable(price) {
        return Err(EngineError::InvalidLevel(format!(
            "price must be positive, got {price}"
        )));
    }
    if !quantity.is_finite() || quantity < 0.0 {
        return Err(EngineError::InvalidLevel(format!(
            "quantity must be zero or positive, got {quantity}"
        )));
    }
    Ok(())
}

fn is_usable(value: f64) -> bool {
    value.is_finite() && value > 0.0
}
