use crate::config::Config;
use crate::errors::{ConfigError, ExchangeError};
use crate::models::RawLevel;
use async_trait::async_trait;
use std::sync::Arc;

pub mod binance;
pub mod bybit;
pub mod simulated;

pub use binance::Binance;
pub use bybit::Bybit;
pub use simulated::{PriceReference, Simulated, StaticPrices};

/// Both sides of one depth response, in whatever order the exchange sent them.
#[derive(Debug, Clone, Default)]
pub struct FeedDepth {
    pub bids: Vec<RawLevel>,
    pub asks: Vec<RawLevel>,
    pub event_ms: u64,
}

#[async_trait]
pub trait DepthFeed: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fetches up to `limit` raw levels per side for `symbol`. Exchanges with
    /// fixed limit steps round up to the next supported one.
    async fn fetch_depth(&self, symbol: &str, limit: usize) -> Result<FeedDepth, ExchangeError>;
}

/// Picks the feed named by `EXCHANGE`.
pub fn from_config(config: &Config) -> Result<Arc<dyn DepthFeed>, ConfigError> {
    match config.exchange.as_str() {
        "binance" => Ok(Arc::new(Binance::new())),
        "bybit" => Ok(Arc::new(Bybit::new())),
        "simulated" => Ok(Arc::new(Simulated::new(Arc::new(StaticPrices::new(
            config.reference_prices.clone(),
        ))))),
        other => Err(ConfigError::UnknownExchange(other.to_string())),
    }
}

/// Parses `[["price", "qty"], ...]` string pairs as sent by most exchanges.
pub(crate) fn parse_levels(
    raw: &[[String; 2]],
    side: &str,
) -> Result<Vec<RawLevel>, ExchangeError> {
    raw.iter()
        .map(|[price_str, qty_str]| {
            let price = price_str.parse::<f64>().map_err(|_| {
                ExchangeError::UnexpectedData(format!("invalid {side} price {price_str:?}"))
            })?;
            let quantity = qty_str.parse::<f64>().map_err(|_| {
                ExchangeError::UnexpectedData(format!("invalid {side} quantity {qty_str:?}"))
            })?;
            Ok(RawLevel::new(price, quantity))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(p: &str, q: &str) -> [String; 2] {
        [p.to_string(), q.to_string()]
    }

    #[test]
    fn parses_string_pairs() {
        let levels = parse_levels(&[pair("100.5", "2"), pair("101", "0.25")], "ask").unwrap();
        assert_eq!(levels, vec![RawLevel::new(100.5, 2.0), RawLevel::new(101.0, 0.25)]);
    }

    #[test]
    fn rejects_malformed_numbers() {
        let err = parse_levels(&[pair("abc", "1")], "bid").unwrap_err();
        assert!(matches!(err, ExchangeError::UnexpectedData(msg) if msg.contains("bid price")));
    }

    #[test]
    fn unknown_exchange_is_a_config_error() {
        let mut config = Config::from_lookup(|_| None).unwrap();
        config.exchange = "kraken".to_string();
        assert!(matches!(
            from_config(&config),
            Err(ConfigError::UnknownExchange(name)) if name == "kraken"
        ));

        config.exchange = "simulated".to_string();
        assert_eq!(from_config(&config).unwrap().name(), "simulated");
    }
}
