use super::{DepthFeed, FeedDepth, parse_levels};
use crate::errors::ExchangeError;
use async_trait::async_trait;
use serde::Deserialize;

const MAX_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
struct BybitResponse {
    #[serde(rename = "retCode")]
    ret_code: i32,
    #[serde(rename = "retMsg", default)]
    ret_msg: String,
    result: Option<BybitBook>,
}

#[derive(Debug, Deserialize)]
struct BybitBook {
    #[serde(default)]
    b: Vec<[String; 2]>, // bids
    #[serde(default)]
    a: Vec<[String; 2]>, // asks
    #[serde(default)]
    ts: u64,
}

pub struct Bybit {
    client: reqwest::Client,
}

impl Bybit {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for Bybit {
    fn default() -> Self {
        Self::new()
    }
}

fn into_feed_depth(symbol: &str, response: BybitResponse) -> Result<FeedDepth, ExchangeError> {
    // Bybit signals errors via retCode, not just HTTP status
    if response.ret_code != 0 {
        return Err(ExchangeError::UnexpectedData(format!(
            "Bybit retCode: {} ({})",
            response.ret_code, response.ret_msg
        )));
    }

    let book = response.result.ok_or_else(|| {
        ExchangeError::UnexpectedData(format!("Bybit returned no result for {}", symbol))
    })?;

    if book.b.is_empty() && book.a.is_empty() {
        return Err(ExchangeError::EmptyBook(symbol.to_string()));
    }

    Ok(FeedDepth {
        bids: parse_levels(&book.b, "bid")?,
        asks: parse_levels(&book.a, "ask")?,
        event_ms: book.ts,
    })
}

#[async_trait]
impl DepthFeed for Bybit {
    fn name(&self) -> &'static str {
        "bybit"
    }

    async fn fetch_depth(&self, symbol: &str, limit: usize) -> Result<FeedDepth, ExchangeError> {
        let url = format!(
            "https://api.bybit.com/v5/market/orderbook?category=linear&symbol={}&limit={}",
            symbol,
            limit.clamp(1, MAX_LIMIT)
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await?
            .json::<BybitResponse>()
            .await?;

        into_feed_depth(symbol, response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawLevel;

    #[test]
    fn maps_orderbook_response() {
        let json = r#"{
            "retCode": 0,
            "retMsg": "OK",
            "result": {
                "s": "BTCUSDT",
                "b": [["65000.5", "1.2"], ["65000", "0.4"]],
                "a": [["65001", "0.8"]],
                "ts": 1716863719031,
                "u": 230704
            }
        }"#;
        let response: BybitResponse = serde_json::from_str(json).unwrap();
        let depth = into_feed_depth("BTCUSDT", response).unwrap();
        assert_eq!(
            depth.bids,
            vec![RawLevel::new(65000.5, 1.2), RawLevel::new(65000.0, 0.4)]
        );
        assert_eq!(depth.asks, vec![RawLevel::new(65001.0, 0.8)]);
        assert_eq!(depth.event_ms, 1716863719031);
    }

    #[test]
    fn non_zero_ret_code_is_an_error() {
        let json = r#"{"retCode": 10001, "retMsg": "params error", "result": {}}"#;
        let response: BybitResponse = serde_json::from_str(json).unwrap();
        let err = into_feed_depth("BTCUSDT", response).unwrap_err();
        assert!(matches!(err, ExchangeError::UnexpectedData(msg) if msg.contains("10001")));
    }

    #[test]
    fn empty_book_is_an_error() {
        let json = r#"{"retCode": 0, "retMsg": "OK", "result": {"s": "BTCUSDT", "b": [], "a": []}}"#;
        let response: BybitResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(
            into_feed_depth("BTCUSDT", response),
            Err(ExchangeError::EmptyBook(_))
        ));
    }
}
