use std::sync::Arc;

use tracing::{debug, error, info, warn};

use common::{
    Clock, Error, ExposureState, LastAction, MarketDataPort, OrderSide, Result, SentimentJudgment,
};
use strategy::{action_for, bracket, decide, Decision, PositionSizer, SentimentSignal, StrategyConfig};

use crate::executor::OrderExecutor;

/// Why a tick ended before sentiment was consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// `cash <= price * quantity`.
    InsufficientBuyingPower,
    /// Allocation rounds to zero shares.
    ZeroQuantity,
}

/// Result of one successful tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Skipped(SkipReason),
    Held(SentimentJudgment),
    Entered {
        side: OrderSide,
        quantity: u64,
        order_id: String,
        /// A liquidation of the opposite exposure was issued first.
        liquidated: bool,
    },
}

/// The decision engine: sizing, sentiment and the exposure state machine.
///
/// Owns its `ExposureState`. Ticks take `&mut self`, so two ticks on the
/// same engine can never overlap.
pub struct StrategyEngine {
    config: StrategyConfig,
    sizer: PositionSizer,
    signal: SentimentSignal,
    market: Arc<dyn MarketDataPort>,
    executor: OrderExecutor,
    clock: Arc<dyn Clock>,
    exposure: ExposureState,
}

impl StrategyEngine {
    pub fn new(
        config: StrategyConfig,
        market: Arc<dyn MarketDataPort>,
        signal: SentimentSignal,
        executor: OrderExecutor,
        clock: Arc<dyn Clock>,
    ) -> Self {
        info!(
            name = %config.name,
            symbol = %config.symbol,
            cash_at_risk = config.cash_at_risk,
            interval = ?config.tick_interval,
            "Strategy engine initialized"
        );
        Self {
            sizer: PositionSizer::new(config.cash_at_risk),
            config,
            signal,
            market,
            executor,
            clock,
            exposure: ExposureState::default(),
        }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn last_action(&self) -> LastAction {
        self.exposure.last_action
    }

    /// Run one tick and decide at most one entry.
    ///
    /// `last_action` moves only after the entry is accepted. If a
    /// liquidation was accepted and the entry then fails, `last_action` is
    /// left at `None` and the entry error is returned.
    pub async fn tick(&mut self) -> Result<TickOutcome> {
        let symbol = self.config.symbol.clone();

        let cash = self
            .market
            .cash()
            .await
            .map_err(|e| e.into_unavailable("cash"))?;
        let price = self
            .market
            .last_price(&symbol)
            .await
            .map_err(|e| e.into_unavailable(&format!("price for {symbol}")))?;

        let sizing = self.sizer.sizing(cash, price)?;
        if !sizing.affordable() {
            debug!(%symbol, cash, price, qty = sizing.quantity, "Insufficient buying power");
            return Ok(TickOutcome::Skipped(SkipReason::InsufficientBuyingPower));
        }
        if sizing.quantity == 0 {
            debug!(%symbol, cash, price, "Allocation rounds to zero shares");
            return Ok(TickOutcome::Skipped(SkipReason::ZeroQuantity));
        }

        let now = self.clock.now();
        let judgment = self.signal.evaluate(&symbol, now).await?;

        let (side, liquidate_first) = match decide(
            &judgment,
            self.exposure.last_action,
            self.config.same_direction,
        ) {
            Decision::Hold => {
                debug!(
                    %symbol,
                    polarity = %judgment.polarity,
                    confidence = judgment.confidence,
                    last_action = %self.exposure.last_action,
                    "Holding"
                );
                return Ok(TickOutcome::Held(judgment));
            }
            Decision::Enter { side, liquidate_first } => (side, liquidate_first),
        };

        if liquidate_first {
            self.executor.liquidate(&symbol).await?;
            self.exposure.last_action = LastAction::None;
        }

        let intent = bracket(&symbol, side, sizing.quantity, price);
        let acceptance = self.executor.submit(&intent).await?;
        self.exposure.last_action = action_for(side);

        info!(
            %symbol,
            side = %side,
            qty = sizing.quantity,
            price,
            confidence = judgment.confidence,
            at = %now,
            "Entered position"
        );

        Ok(TickOutcome::Entered {
            side,
            quantity: sizing.quantity,
            order_id: acceptance.order_id,
            liquidated: liquidate_first,
        })
    }

    /// Run one tick and log any failure. Tick errors never escape, so a
    /// scheduler or backtest loop keeps going.
    pub async fn run_tick(&mut self) -> Option<TickOutcome> {
        match self.tick().await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                let symbol = &self.config.symbol;
                match &e {
                    Error::DataUnavailable(_) => {
                        warn!(%symbol, error = %e, "Tick skipped: data unavailable")
                    }
                    Error::OrderRejected { .. } => warn!(
                        %symbol,
                        error = %e,
                        last_action = %self.exposure.last_action,
                        "Tick order rejected"
                    ),
                    Error::InvalidInput(_) => {
                        error!(%symbol, error = %e, "Tick aborted: invalid sizing input")
                    }
                    _ => error!(%symbol, error = %e, "Tick failed"),
                }
                None
            }
        }
    }
}
