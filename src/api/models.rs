use crate::models::{CrossedBookWarning, OrderBookLevel};
use crate::scheduler::{CycleState, PublishedBook};
use serde::{Deserialize, Serialize};

/// Response for GET /book
#[derive(Debug, Serialize)]
pub struct BookResponse {
    pub exchange: String,
    pub symbol: String,
    pub sequence: u64,
    pub state: CycleState,
    pub stale: bool,
    pub last_error: Option<String>,
    pub bucket_size: f64,
    pub depth: usize,
    /// Decimals the renderer should show prices with.
    pub precision: usize,
    pub asks: Vec<OrderBookLevel>,
    pub bids: Vec<OrderBookLevel>,
    pub spread: Option<f64>,
    pub spread_percentage: Option<f64>,
    pub crossed: Option<CrossedBookWarning>,
    pub timestamp_ms: u64,
}

impl BookResponse {
    pub fn new(book: &PublishedBook, state: CycleState, precision: usize) -> Self {
        let snapshot = &book.snapshot;
        Self {
            exchange: snapshot.exchange.clone(),
            symbol: snapshot.symbol.clone(),
            sequence: book.sequence,
            state,
            stale: book.stale,
            last_error: book.last_error.clone(),
            bucket_size: snapshot.bucket_size,
            depth: snapshot.depth,
            precision,
            asks: snapshot.asks.clone(),
            bids: snapshot.bids.clone(),
            spread: snapshot.spread,
            spread_percentage: snapshot.spread_percentage,
            crossed: snapshot.crossed,
            timestamp_ms: snapshot.timestamp_ms,
        }
    }
}

/// Response for GET /buckets
#[derive(Debug, Serialize)]
pub struct BucketsResponse {
    pub current: f64,
    pub options: Vec<f64>,
}

/// Body for POST /grouping; `depth` keeps the current one when omitted.
#[derive(Debug, Deserialize)]
pub struct GroupingRequest {
    pub bucket_size: f64,
    pub depth: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct GroupingResponse {
    pub bucket_size: f64,
    pub depth: usize,
}

/// Body for POST /auto-refresh
#[derive(Debug, Deserialize)]
pub struct AutoRefreshRequest {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
