use super::{DepthFeed, FeedDepth, parse_levels};
use crate::errors::ExchangeError;
use async_trait::async_trait;
use serde::Deserialize;

/// Depth limits accepted by the futures depth endpoint.
const LIMITS: [usize; 7] = [5, 10, 20, 50, 100, 500, 1000];

/// The raw JSON shape Binance sends back for `/fapi/v1/depth`
#[derive(Debug, Deserialize)]
struct DepthResponse {
    #[serde(rename = "E", default)]
    event_time: u64,
    bids: Vec<[String; 2]>,
    asks: Vec<[String; 2]>,
}

pub struct Binance {
    client: reqwest::Client,
}

impl Binance {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for Binance {
    fn default() -> Self {
        Self::new()
    }
}

/// Smallest supported limit that covers `requested`, capped at the largest.
fn supported_limit(requested: usize) -> usize {
    LIMITS
        .iter()
        .copied()
        .find(|&l| l >= requested)
        .unwrap_or(LIMITS[LIMITS.len() - 1])
}

fn into_feed_depth(symbol: &str, response: DepthResponse) -> Result<FeedDepth, ExchangeError> {
    if response.bids.is_empty() && response.asks.is_empty() {
        return Err(ExchangeError::EmptyBook(symbol.to_string()));
    }

    Ok(FeedDepth {
        bids: parse_levels(&response.bids, "bid")?,
        asks: parse_levels(&response.asks, "ask")?,
        event_ms: response.event_time,
    })
}

#[async_trait]
impl DepthFeed for Binance {
    fn name(&self) -> &'static str {
        "binance"
    }

    /// Fetches a depth snapshot via REST from Binance's futures depth
    /// endpoint and maps it into raw levels.
    async fn fetch_depth(&self, symbol: &str, limit: usize) -> Result<FeedDepth, ExchangeError> {
        let url = format!(
            "https://fapi.binance.com/fapi/v1/depth?symbol={}&limit={}",
            symbol,
            supported_limit(limit)
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<DepthResponse>()
            .await?;

        into_feed_depth(symbol, response)
    }
}
