//! Order book depth aggregation: raw feed levels in, bucketed display-ready
//! books with cumulative depth and spread out, refreshed on a schedule.

pub mod api;
pub mod config;
pub mod depth;
pub mod errors;
pub mod exchanges;
pub mod models;
pub mod orderbook;
pub mod scheduler;
