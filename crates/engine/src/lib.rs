pub mod alpaca;
pub mod classifier;
pub mod clock;
pub mod executor;
pub mod lifecycle;
pub mod strategy_engine;

pub use alpaca::AlpacaClient;
pub use classifier::HttpClassifier;
pub use clock::WallClock;
pub use executor::OrderExecutor;
pub use lifecycle::{Runner, RunnerHandle};
pub use strategy_engine::{SkipReason, StrategyEngine, TickOutcome};
