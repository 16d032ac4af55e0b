//! Seams between the strategy engine and the outside world.
//!
//! `AlpacaClient` implements the market, news and execution ports for live
//! and paper trading; `SimulatedBroker` implements market and execution for
//! backtests. The engine only ever sees these traits, so both modes run the
//! same decision code.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::{NewsItem, OrderAcceptance, OrderIntent, Result, SentimentJudgment};

/// Account and quote lookups.
#[async_trait]
pub trait MarketDataPort: Send + Sync {
    /// Cash currently available to the account.
    async fn cash(&self) -> Result<f64>;

    /// Last traded price for `symbol`.
    async fn last_price(&self, symbol: &str) -> Result<f64>;
}

/// Source of news headlines for a symbol over a calendar-date range.
#[async_trait]
pub trait NewsWindowProvider: Send + Sync {
    /// Items for `symbol` published from the start of `start` up to `end`.
    /// How `end` is bounded is up to the source: Alpaca reads a bare date as
    /// midnight, so that day's own news is left out. An empty vec means no
    /// news, not an error.
    async fn headlines(&self, symbol: &str, start: NaiveDate, end: NaiveDate)
        -> Result<Vec<NewsItem>>;
}

/// Black-box sentiment model.
#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    /// Score a batch of headlines as a whole. Behaviour on an empty batch is
    /// up to the implementation.
    async fn classify(&self, headlines: &[String]) -> Result<SentimentJudgment>;
}

/// Order submission and position liquidation.
///
/// Only the strategy engine calls this.
#[async_trait]
pub trait OrderExecutionPort: Send + Sync {
    /// Submit a bracket order. `Ok` means the order was accepted, not filled.
    async fn submit(&self, intent: &OrderIntent) -> Result<OrderAcceptance>;

    /// Close the entire open position in `symbol`, long or short. Closing a
    /// flat symbol succeeds.
    async fn liquidate_all(&self, symbol: &str) -> Result<()>;
}

/// Time source for the engine. Wall time live, simulated time in backtests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
