use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use tracing::{info, warn};

use common::{Error, MarketDataPort, Result};
use engine::{StrategyEngine, TickOutcome};

use crate::broker::SimulatedBroker;
use crate::clock::SimulatedClock;
use crate::prices::PriceSeries;

/// Totals from one backtest run.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestSummary {
    pub ticks: u64,
    pub entries: u64,
    pub holds: u64,
    pub skipped: u64,
    pub errors: u64,
    pub bracket_exits: u64,
    pub final_cash: f64,
    /// Signed shares held at the end, negative when short.
    pub final_position: i64,
    pub final_value: f64,
}

/// Replays a price series through the simulated broker and ticks the engine
/// on the simulated clock.
///
/// Steps advance by the strategy's tick interval from the start of
/// `start` to the end of `end`. Steps on dates without a close (weekends,
/// holidays) are skipped. Tick errors are counted and logged; they never stop
/// the run.
pub struct Backtest {
    engine: StrategyEngine,
    broker: Arc<SimulatedBroker>,
    clock: SimulatedClock,
    prices: PriceSeries,
    start: NaiveDate,
    end: NaiveDate,
}

impl Backtest {
    /// `engine` must have been built with `broker` as its market and
    /// execution ports and a clone of `clock` as its clock.
    pub fn new(
        engine: StrategyEngine,
        broker: Arc<SimulatedBroker>,
        clock: SimulatedClock,
        prices: PriceSeries,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Self> {
        if end < start {
            return Err(Error::Config(format!(
                "backtest end {end} is before start {start}"
            )));
        }
        if prices.is_empty() {
            return Err(Error::Config("backtest price series is empty".into()));
        }
        Ok(Self {
            engine,
            broker,
            clock,
            prices,
            start,
            end,
        })
    }

    pub async fn run(mut self) -> Result<BacktestSummary> {
        let step = chrono::Duration::from_std(self.engine.config().tick_interval)
            .map_err(|e| Error::Config(format!("tick interval out of range: {e}")))?;
        let symbol = self.engine.config().symbol.clone();
        let stop = self.end.and_time(NaiveTime::MIN).and_utc() + chrono::Duration::days(1);
        let mut at = self.start.and_time(NaiveTime::MIN).and_utc();

        info!(%symbol, start = %self.start, end = %self.end, step = %step, "Backtest started");

        let mut summary = BacktestSummary {
            ticks: 0,
            entries: 0,
            holds: 0,
            skipped: 0,
            errors: 0,
            bracket_exits: 0,
            final_cash: 0.0,
            final_position: 0,
            final_value: 0.0,
        };

        while at < stop {
            if let Some(price) = self.prices.close_on(at.date_naive()) {
                self.clock.set(at);
                if self.broker.update_price(&symbol, price, at).await.is_some() {
                    summary.bracket_exits += 1;
                }

                summary.ticks += 1;
                match self.engine.run_tick().await {
                    Some(TickOutcome::Entered { .. }) => summary.entries += 1,
                    Some(TickOutcome::Held(_)) => summary.holds += 1,
                    Some(TickOutcome::Skipped(_)) => summary.skipped += 1,
                    None => summary.errors += 1,
                }
            }
            at += step;
        }

        summary.final_cash = self.broker.cash().await?;
        summary.final_position = self
            .broker
            .position(&symbol)
            .await
            .map(|p| p.signed_quantity())
            .unwrap_or(0);
        summary.final_value = self.broker.portfolio_value().await;

        if summary.ticks == 0 {
            warn!(%symbol, "Backtest window contains no priced dates");
        }
        info!(
            %symbol,
            ticks = summary.ticks,
            entries = summary.entries,
            bracket_exits = summary.bracket_exits,
            errors = summary.errors,
            final_cash = summary.final_cash,
            final_position = summary.final_position,
            final_value = summary.final_value,
            last_action = %self.engine.last_action(),
            "Backtest finished"
        );
        Ok(summary)
    }
}
