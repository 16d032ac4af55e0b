//! Backtest mode: a simulated clock and broker standing in for wall time
//! and the brokerage, plus the driver that steps the strategy engine
//! through a historical price series.

pub mod broker;
pub mod clock;
pub mod driver;
pub mod prices;

pub use broker::{BracketExit, ExitKind, SimPosition, SimulatedBroker};
pub use clock::SimulatedClock;
pub use driver::{Backtest, BacktestSummary};
pub use prices::PriceSeries;
