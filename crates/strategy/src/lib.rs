//! Pure decision pieces of the news-sentiment strategy: configuration,
//! cash-at-risk sizing, the trailing sentiment signal and the
//! sentiment-to-action table. Nothing here submits orders.

pub mod config;
pub mod decision;
pub mod sentiment;
pub mod sizing;

pub use config::{parse_sleeptime, SameDirection, StrategyConfig, StrategyFileConfig};
pub use decision::{action_for, bracket, decide, Decision, CONFIDENCE_THRESHOLD};
pub use sentiment::{news_window, SentimentSignal, NEWS_WINDOW_DAYS};
pub use sizing::{size, PositionSizer, SizingResult};
