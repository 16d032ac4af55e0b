pub mod config;
pub mod error;
pub mod ports;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use ports::{Clock, MarketDataPort, NewsWindowProvider, OrderExecutionPort, SentimentClassifier};
pub use types::*;
