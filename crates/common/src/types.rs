use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Side of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

/// Bracket order handed to the execution port: a market entry plus one
/// take-profit and one stop-loss exit.
///
/// Constructed by the strategy engine and submitted immediately; never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub symbol: String,
    /// Whole shares, always > 0.
    pub quantity: u64,
    pub side: OrderSide,
    pub take_profit_price: f64,
    pub stop_loss_price: f64,
}

/// Acknowledgement that the execution port accepted an order.
/// Acceptance only. Says nothing about fills.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAcceptance {
    pub order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: u64,
    pub accepted_at: DateTime<Utc>,
}

/// A single news record returned by a news provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub headline: String,
}

impl NewsItem {
    pub fn new(headline: impl Into<String>) -> Self {
        Self {
            headline: headline.into(),
        }
    }
}

/// Classified sentiment direction for a set of headlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Positive,
    Negative,
    Neutral,
}

impl std::fmt::Display for Polarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Polarity::Positive => write!(f, "positive"),
            Polarity::Negative => write!(f, "negative"),
            Polarity::Neutral => write!(f, "neutral"),
        }
    }
}

/// Output of the sentiment classifier. Recomputed every tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentJudgment {
    /// Probability of `polarity`, in `[0, 1]`.
    pub confidence: f64,
    pub polarity: Polarity,
}

impl SentimentJudgment {
    pub fn new(confidence: f64, polarity: Polarity) -> Self {
        Self {
            confidence,
            polarity,
        }
    }

    /// Judgment returned when there is nothing to classify.
    pub fn neutral() -> Self {
        Self::new(0.0, Polarity::Neutral)
    }
}

/// Directional intent of the last accepted entry order.
///
/// This is all the exposure the engine remembers. It is not the held
/// quantity: a bracket exit on the broker side does not reset it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LastAction {
    #[default]
    None,
    Long,
    Short,
}

impl std::fmt::Display for LastAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LastAction::None => write!(f, "none"),
            LastAction::Long => write!(f, "long"),
            LastAction::Short => write!(f, "short"),
        }
    }
}

/// In-memory exposure state owned by one strategy engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExposureState {
    pub last_action: LastAction,
}

/// Where the process is trading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Live,
    Paper,
    Backtest,
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradingMode::Live => write!(f, "live"),
            TradingMode::Paper => write!(f, "paper"),
            TradingMode::Backtest => write!(f, "backtest"),
        }
    }
}

/// Reason an order or liquidation was refused by the execution port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RejectionReason {
    InsufficientFunds,
    NoPrice,
    Broker(String),
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectionReason::InsufficientFunds => write!(f, "insufficient funds"),
            RejectionReason::NoPrice => write!(f, "no price available"),
            RejectionReason::Broker(s) => write!(f, "{s}"),
        }
    }
}

/// Commands sent to the runner via its command channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerCommand {
    Stop,
}
