use super::{DepthFeed, FeedDepth};
use crate::depth::bucket_sizes;
use crate::errors::ExchangeError;
use crate::models::RawLevel;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Supplies the price a synthetic book is centred on.
pub trait PriceReference: Send + Sync {
    fn reference_price(&self, symbol: &str) -> Option<f64>;
}

/// Fixed symbol → price table, typically from `REFERENCE_PRICES`.
#[derive(Debug, Clone, Default)]
pub struct StaticPrices {
    prices: HashMap<String, f64>,
}

impl StaticPrices {
    pub fn new(prices: HashMap<String, f64>) -> Self {
        Self { prices }
    }
}

impl PriceReference for StaticPrices {
    fn reference_price(&self, symbol: &str) -> Option<f64> {
        self.prices.get(symbol).copied()
    }
}

/// Offline feed producing a deterministic ladder around a reference price.
/// The touch drifts by one tick per call so consecutive books differ.
pub struct Simulated {
    reference: Arc<dyn PriceReference>,
    calls: AtomicU64,
}

impl Simulated {
    pub fn new(reference: Arc<dyn PriceReference>) -> Self {
        Self {
            reference,
            calls: AtomicU64::new(0),
        }
    }

    fn ladder(&self, symbol: &str, limit: usize) -> Result<FeedDepth, ExchangeError> {
        let reference = self.reference.reference_price(symbol).ok_or_else(|| {
            ExchangeError::UnexpectedData(format!("no reference price for {}", symbol))
        })?;
        let tick = bucket_sizes(reference)
            .first()
            .copied()
            .ok_or_else(|| ExchangeError::UnexpectedData(format!("unusable reference price {reference}")))?;

        let call = self.calls.fetch_add(1, Ordering::Relaxed);
        let mid = reference + (call % 5) as f64 * tick;

        let quantity = |i: usize| 0.5 + ((i * 7 + call as usize) % 11) as f64 * 0.25;
        let bids = (0..limit)
            .map(|i| RawLevel::new(mid - (i + 1) as f64 * tick, quantity(i)))
            .filter(|l| l.price > 0.0)
            .collect();
        let asks = (0..limit)
            .map(|i| RawLevel::new(mid + (i + 1) as f64 * tick, quantity(i + 3)))
            .collect();

        Ok(FeedDepth {
            bids,
            asks,
            event_ms: now_ms(),
        })
    }
}

#[async_trait]
impl DepthFeed for Simulated {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn fetch_depth(&self, symbol: &str, limit: usize) -> Result<FeedDepth, ExchangeError> {
        let depth = self.ladder(symbol, limit)?;
        if depth.bids.is_empty() && depth.asks.is_empty() {
            return Err(ExchangeError::EmptyBook(symbol.to_string()));
        }
        Ok(depth)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
