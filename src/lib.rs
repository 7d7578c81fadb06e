pub mod binance;
pub mod bucket;
pub mod config;
pub mod error;
pub mod model;
pub mod recorder;
pub mod sink;
