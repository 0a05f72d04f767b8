use serde::{Deserialize, Serialize};

use crate::errors::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Bid => "bid",
            Side::Ask => "ask",
        }
    }
}

/// One price/quantity tick as delivered by a feed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawLevel {
    pub price: f64,
    pub quantity: f64,
}

impl RawLevel {
    pub fn new(price: f64, quantity: f64) -> Self {
        Self { price, quantity }
    }
}

/// A bucketed, display-ready level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OrderBookLevel {
    pub price: f64,
    pub quantity: f64,
    pub cumulative_total: f64,
    pub percentage_of_max: f64,
}

/// Raised (not fatal) when the best bid sits above the best ask.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CrossedBookWarning {
    pub best_bid: f64,
    pub best_ask: f64,
}

/// Immutable point-in-time view of both sides. Shared behind an `Arc` and
/// replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderBookSnapshot {
    pub exchange: String,
    pub symbol: String,
    pub asks: Vec<OrderBookLevel>,
    pub bids: Vec<OrderBookLevel>,
    pub spread: Option<f64>,
    pub spread_percentage: Option<f64>,
    pub crossed: Option<CrossedBookWarning>,
    pub bucket_size: f64,
    pub depth: usize,
    pub timestamp_ms: u64,
}

impl OrderBookSnapshot {
    pub fn best_bid(&self) -> Option<f64> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.asks.first().map(|l| l.price)
    }

    /// Midpoint of the touch, falling back to whichever side is present.
    pub fn reference_price(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / 2.0),
            (bid, ask) => bid.or(ask),
        }
    }
}

/// Bucket size and number of display levels per side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Grouping {
    bucket_size: f64,
    depth: usize,
}

impl Grouping {
    pub fn new(bucket_size: f64, depth: usize) -> Result<Self, EngineError> {
        if !bucket_size.is_finite() || bucket_size <= 0.0 {
            return Err(EngineError::InvalidGrouping(format!(
                "bucket size must be a positive number, got {bucket_size}"
            )));
        }
        if depth == 0 {
            return Err(EngineError::InvalidGrouping(
                "depth must be at least 1".to_string(),
            ));
        }
        Ok(Self { bucket_size, depth })
    }

    pub fn bucket_size(&self) -> f64 {
        self.bucket_size
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// Emitted when a consumer picks a level, e.g. to prefill an order form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelSelected {
    pub side: Side,
    pub price: f64,
}
