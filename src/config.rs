use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::ConfigError;
use crate::models::Grouping;

#[derive(Debug, Clone)]
pub struct Config {
    pub symbol: String,
    pub exchange: String,
    pub grouping: Grouping,
    /// Raw levels requested from the feed per side. Bucketing collapses many
    /// raw levels into one, so this is usually well above the display depth.
    pub fetch_depth: usize,
    pub refresh_interval: Duration,
    pub auto_refresh: bool,
    pub api_port: u16,
    pub reference_prices: HashMap<String, f64>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, falling back to defaults for
    /// missing keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let symbol = lookup("SYMBOL")
            .unwrap_or_else(|| "BTCUSDT".to_string())
            .trim()
            .to_uppercase();
        if symbol.is_empty() {
            return Err(ConfigError::Invalid {
                key: "SYMBOL",
                reason: "must not be empty".to_string(),
            });
        }

        let exchange = lookup("EXCHANGE")
            .unwrap_or_else(|| "binance".to_string())
            .trim()
            .to_lowercase();

        let depth: usize = parse(&lookup, "DEPTH", 20)?;
        let bucket_size: f64 = parse(&lookup, "BUCKET_SIZE", 1.0)?;
        let grouping = Grouping::new(bucket_size, depth).map_err(|e| ConfigError::Invalid {
            key: if depth == 0 { "DEPTH" } else { "BUCKET_SIZE" },
            reason: e.to_string(),
        })?;

        let fetch_depth: usize = parse(&lookup, "FETCH_DEPTH", 500)?;
        if fetch_depth == 0 {
            return Err(ConfigError::Invalid {
                key: "FETCH_DEPTH",
                reason: "must be at least 1".to_string(),
            });
        }

        let interval_ms: u64 = parse(&lookup, "REFRESH_INTERVAL_MS", 1000)?;
        if interval_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "REFRESH_INTERVAL_MS",
                reason: "must be a positive duration".to_string(),
            });
        }

        let auto_refresh: bool = parse(&lookup, "AUTO_REFRESH", true)?;
        let api_port: u16 = parse(&lookup, "API_PORT", 3000)?;

        let reference_prices = parse_reference_prices(
            &lookup("REFERENCE_PRICES").unwrap_or_else(|| "BTCUSDT=65000,ETHUSDT=3200".to_string()),
        )?;

        Ok(Self {
            symbol,
            exchange,
            grouping,
            fetch_depth,
            refresh_interval: Duration::from_millis(interval_ms),
            auto_refresh,
            api_port,
            reference_prices,
        })
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            key,
            reason: format!("{raw:?}: {e}"),
        }),
    }
}

// "BTCUSDT=65000,ETHUSDT=3200"
fn parse_reference_prices(raw: &str) -> Result<HashMap<String, f64>, ConfigError> {
    let mut prices = HashMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let invalid = |reason: &str| ConfigError::Invalid {
            key: "REFERENCE_PRICES",
            reason: format!("{entry:?}: {reason}"),
        };
        let (symbol, price) = entry
            .split_once('=')
            .ok_or_else(|| invalid("expected SYMBOL=PRICE"))?;
        let price = price
            .trim()
            .parse::<f64>()
            .map_err(|_| invalid("price is not a number"))?;
        if !price.is_finite() || price <= 0.0 {
            return Err(invalid("price must be positive"));
        }
        prices.insert(symbol.trim().to_uppercase(), price);
    }
    Ok(prices)
}
