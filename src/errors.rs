use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unexpected data from exchange: {0}")]
    UnexpectedData(String),

    #[error("Exchange returned an empty book for {0}")]
    EmptyBook(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid grouping: {0}")]
    InvalidGrouping(String),

    #[error("Feed unavailable: {0}")]
    FeedUnavailable(#[from] ExchangeError),

    #[error("Invalid level: {0}")]
    InvalidLevel(String),

    #[error("Refresh scheduler has stopped")]
    SchedulerStopped,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("Unknown exchange: {0}")]
    UnknownExchange(String),
}
