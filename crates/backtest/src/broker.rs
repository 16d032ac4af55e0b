use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

use common::{
    Error, MarketDataPort, OrderAcceptance, OrderExecutionPort, OrderIntent, OrderSide,
    RejectionReason, Result,
};

/// An open simulated position with the bracket it was entered with.
#[derive(Debug, Clone, PartialEq)]
pub struct SimPosition {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: u64,
    /// Volume-weighted entry price.
    pub entry_price: f64,
    pub take_profit: f64,
    pub stop_loss: f64,
    pub opened_at: DateTime<Utc>,
}

impl SimPosition {
    /// Positive when long, negative when short.
    pub fn signed_quantity(&self) -> i64 {
        match self.side {
            OrderSide::Buy => self.quantity as i64,
            OrderSide::Sell => -(self.quantity as i64),
        }
    }

    /// Which bracket leg, if any, `price` has crossed.
    fn triggered(&self, price: f64) -> Option<ExitKind> {
        match self.side {
            OrderSide::Buy if price >= self.take_profit => Some(ExitKind::TakeProfit),
            OrderSide::Buy if price <= self.stop_loss => Some(ExitKind::StopLoss),
            OrderSide::Sell if price <= self.take_profit => Some(ExitKind::TakeProfit),
            OrderSide::Sell if price >= self.stop_loss => Some(ExitKind::StopLoss),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    TakeProfit,
    StopLoss,
}

/// A bracket leg that closed a position on a price update.
#[derive(Debug, Clone, PartialEq)]
pub struct BracketExit {
    pub symbol: String,
    pub kind: ExitKind,
    pub close_price: f64,
}

#[derive(Debug, Default)]
struct Ledger {
    cash: f64,
    positions: HashMap<String, SimPosition>,
    prices: HashMap<String, f64>,
    now: Option<DateTime<Utc>>,
    orders_accepted: u64,
}

impl Ledger {
    /// Close `symbol` at `price` (before slippage). Returns the closed position.
    fn close(&mut self, symbol: &str, price: f64, slippage: f64) -> Option<SimPosition> {
        let position = self.positions.remove(symbol)?;
        let qty = position.quantity as f64;
        match position.side {
            // Selling out of a long
            OrderSide::Buy => self.cash += price * (1.0 - slippage) * qty,
            // Buying back a short
            OrderSide::Sell => self.cash -= price * (1.0 + slippage) * qty,
        }
        Some(position)
    }
}

/// Simulated broker for backtests.
///
/// Fills are simulated at the latest known price with configurable slippage.
/// Shorts credit their proceeds to cash and debit the buy-back on close.
/// Each position carries the bracket of its latest entry, and every price
/// update checks it.
pub struct SimulatedBroker {
    ledger: Arc<RwLock<Ledger>>,
    /// Slippage as a fraction (basis points / 10 000).
    slippage: f64,
}

impl SimulatedBroker {
    pub fn new(initial_cash: f64, slippage_bps: f64) -> Self {
        info!(
            cash = initial_cash,
            slippage_bps = slippage_bps,
            "SimulatedBroker initialized"
        );
        Self {
            ledger: Arc::new(RwLock::new(Ledger {
                cash: initial_cash,
                ..Ledger::default()
            })),
            slippage: slippage_bps / 10_000.0,
        }
    }

    /// Move the market for `symbol` to `price` at time `at` and fire any
    /// bracket leg the new price crosses.
    pub async fn update_price(
        &self,
        symbol: &str,
        price: f64,
        at: DateTime<Utc>,
    ) -> Option<BracketExit> {
        let mut ledger = self.ledger.write().await;
        ledger.prices.insert(symbol.to_string(), price);
        ledger.now = Some(at);

        let kind = ledger.positions.get(symbol)?.triggered(price)?;
        let closed = ledger.close(symbol, price, self.slippage)?;
        info!(
            %symbol,
            kind = ?kind,
            side = %closed.side,
            qty = closed.quantity,
            entry = closed.entry_price,
            close = price,
            "Bracket exit triggered"
        );
        Some(BracketExit {
            symbol: symbol.to_string(),
            kind,
            close_price: price,
        })
    }

    pub async fn position(&self, symbol: &str) -> Option<SimPosition> {
        self.ledger.read().await.positions.get(symbol).cloned()
    }

    pub async fn orders_accepted(&self) -> u64 {
        self.ledger.read().await.orders_accepted
    }

    /// Cash plus the marked value of all open positions.
    pub async fn portfolio_value(&self) -> f64 {
        let ledger = self.ledger.read().await;
        let marked: f64 = ledger
            .positions
            .values()
            .map(|p| {
                let price = ledger.prices.get(&p.symbol).copied().unwrap_or(p.entry_price);
                p.signed_quantity() as f64 * price
            })
            .sum();
        ledger.cash + marked
    }
}

#[async_trait]
impl MarketDataPort for SimulatedBroker {
    async fn cash(&self) -> Result<f64> {
        Ok(self.ledger.read().await.cash)
    }

    async fn last_price(&self, symbol: &str) -> Result<f64> {
        self.ledger
            .read()
            .await
            .prices
            .get(symbol)
            .copied()
            .ok_or_else(|| Error::DataUnavailable(format!("no simulated price for {symbol}")))
    }
}

#[async_trait]
impl OrderExecutionPort for SimulatedBroker {
    async fn submit(&self, intent: &OrderIntent) -> Result<OrderAcceptance> {
        if intent.quantity == 0 {
            return Err(Error::rejected(RejectionReason::Broker("zero quantity".into())));
        }

        let mut ledger = self.ledger.write().await;
        let mid = ledger
            .prices
            .get(&intent.symbol)
            .copied()
            .ok_or_else(|| Error::rejected(RejectionReason::NoPrice))?;
        let now = ledger.now.unwrap_or_else(Utc::now);

        // Apply slippage: buys pay more, sells receive less
        let fill_price = match intent.side {
            OrderSide::Buy => mid * (1.0 + self.slippage),
            OrderSide::Sell => mid * (1.0 - self.slippage),
        };
        let qty = intent.quantity as f64;
        let notional = fill_price * qty;

        // An entry against an open opposite position closes that position first
        let opposite = ledger
            .positions
            .get(&intent.symbol)
            .is_some_and(|p| p.side != intent.side);
        let cash_after_close = if opposite {
            let p = &ledger.positions[&intent.symbol];
            match p.side {
                OrderSide::Buy => ledger.cash + mid * (1.0 - self.slippage) * p.quantity as f64,
                OrderSide::Sell => ledger.cash - mid * (1.0 + self.slippage) * p.quantity as f64,
            }
        } else {
            ledger.cash
        };
        if notional > cash_after_close {
            return Err(Error::rejected(RejectionReason::InsufficientFunds));
        }
        if opposite {
            ledger.close(&intent.symbol, mid, self.slippage);
        }

        match intent.side {
            OrderSide::Buy => ledger.cash -= notional,
            OrderSide::Sell => ledger.cash += notional,
        }

        let position = match ledger.positions.remove(&intent.symbol) {
            Some(existing) => {
                let total = existing.quantity + intent.quantity;
                let entry = (existing.entry_price * existing.quantity as f64 + notional)
                    / total as f64;
                SimPosition {
                    quantity: total,
                    entry_price: entry,
                    take_profit: intent.take_profit_price,
                    stop_loss: intent.stop_loss_price,
                    ..existing
                }
            }
            None => SimPosition {
                symbol: intent.symbol.clone(),
                side: intent.side,
                quantity: intent.quantity,
                entry_price: fill_price,
                take_profit: intent.take_profit_price,
                stop_loss: intent.stop_loss_price,
                opened_at: now,
            },
        };
        ledger.positions.insert(intent.symbol.clone(), position);
        ledger.orders_accepted += 1;

        debug!(
            symbol = %intent.symbol,
            side = %intent.side,
            mid = mid,
            fill = fill_price,
            qty = intent.quantity,
            cash = ledger.cash,
            "Simulated fill"
        );

        Ok(OrderAcceptance {
            order_id: uuid::Uuid::new_v4().to_string(),
            symbol: intent.symbol.clone(),
            side: intent.side,
            quantity: intent.quantity,
            accepted_at: now,
        })
    }

    async fn liquidate_all(&self, symbol: &str) -> Result<()> {
        let mut ledger = self.ledger.write().await;
        if !ledger.positions.contains_key(symbol) {
            return Ok(());
        }
        let price = ledger
            .prices
            .get(symbol)
            .copied()
            .ok_or_else(|| Error::rejected(RejectionReason::NoPrice))?;
        if let Some(closed) = ledger.close(symbol, price, self.slippage) {
            debug!(%symbol, side = %closed.side, qty = closed.quantity, price, "Simulated liquidation");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent(side: OrderSide, quantity: u64, price: f64) -> OrderIntent {
        let (tp, sl) = match side {
            OrderSide::Buy => (price * 1.2, price * 0.95),
            OrderSide::Sell => (price * 0.8, price * 1.05),
        };
        OrderIntent {
            symbol: "GOOGL".into(),
            quantity,
            side,
            take_profit_price: tp,
            stop_loss_price: sl,
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[tokio::test]
    async fn buy_fill_applies_positive_slippage() {
        let broker = SimulatedBroker::new(10_000.0, 10.0); // 10 bps
        broker.update_price("GOOGL", 100.0, Utc::now()).await;

        broker.submit(&intent(OrderSide::Buy, 10, 100.0)).await.unwrap();

        let pos = broker.position("GOOGL").await.unwrap();
        assert!(approx(pos.entry_price, 100.0 * 1.001));
        assert!(approx(broker.cash().await.unwrap(), 10_000.0 - 10.0 * 100.1));
    }

    #[tokio::test]
    async fn short_credits_cash_and_cover_debits_it() {
        let broker = SimulatedBroker::new(10_000.0, 0.0);
        broker.update_price("GOOGL", 100.0, Utc::now()).await;

        broker.submit(&intent(OrderSide::Sell, 20, 100.0)).await.unwrap();
        assert!(approx(broker.cash().await.unwrap(), 12_000.0));
        assert_eq!(broker.position("GOOGL").await.unwrap().signed_quantity(), -20);

        broker.update_price("GOOGL", 90.0, Utc::now()).await;
        broker.liquidate_all("GOOGL").await.unwrap();
        assert!(approx(broker.cash().await.unwrap(), 12_000.0 - 1_800.0));
        assert!(broker.position("GOOGL").await.is_none());
    }

    #[tokio::test]
    async fn unfunded_order_is_rejected() {
        let broker = SimulatedBroker::new(1_000.0, 0.0);
        broker.update_price("GOOGL", 100.0, Utc::now()).await;

        let err = broker.submit(&intent(OrderSide::Buy, 11, 100.0)).await.unwrap_err();
        assert!(matches!(
            err,
            Error::OrderRejected { reason: RejectionReason::InsufficientFunds }
        ));
        assert!(broker.position("GOOGL").await.is_none());
    }

    #[tokio::test]
    async fn order_without_price_is_rejected() {
        let broker = SimulatedBroker::new(1_000.0, 0.0);
        let err = broker.submit(&intent(OrderSide::Buy, 1, 100.0)).await.unwrap_err();
        assert!(matches!(err, Error::OrderRejected { reason: RejectionReason::NoPrice }));
        assert!(matches!(
            broker.last_price("GOOGL").await,
            Err(Error::DataUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn same_side_entry_averages_and_replaces_bracket() {
        let broker = SimulatedBroker::new(10_000.0, 0.0);
        broker.update_price("GOOGL", 100.0, Utc::now()).await;
        broker.submit(&intent(OrderSide::Buy, 10, 100.0)).await.unwrap();

        broker.update_price("GOOGL", 110.0, Utc::now()).await;
        broker.submit(&intent(OrderSide::Buy, 10, 110.0)).await.unwrap();

        let pos = broker.position("GOOGL").await.unwrap();
        assert_eq!(pos.quantity, 20);
        assert!(approx(pos.entry_price, 105.0));
        assert!(approx(pos.take_profit, 132.0));
        assert_eq!(broker.orders_accepted().await, 2);
    }

    #[tokio::test]
    async fn long_take_profit_fires() {
        let broker = SimulatedBroker::new(10_000.0, 0.0);
        broker.update_price("GOOGL", 100.0, Utc::now()).await;
        broker.submit(&intent(OrderSide::Buy, 10, 100.0)).await.unwrap();

        assert!(broker.update_price("GOOGL", 119.0, Utc::now()).await.is_none());
        let exit = broker.update_price("GOOGL", 121.0, Utc::now()).await.unwrap();

        assert_eq!(exit.kind, ExitKind::TakeProfit);
        assert!(broker.position("GOOGL").await.is_none());
        assert!(approx(broker.cash().await.unwrap(), 9_000.0 + 1_210.0));
    }

    #[tokio::test]
    async fn short_stop_loss_fires() {
        let broker = SimulatedBroker::new(10_000.0, 0.0);
        broker.update_price("GOOGL", 100.0, Utc::now()).await;
        broker.submit(&intent(OrderSide::Sell, 10, 100.0)).await.unwrap();

        let exit = broker.update_price("GOOGL", 106.0, Utc::now()).await.unwrap();
        assert_eq!(exit.kind, ExitKind::StopLoss);
        assert!(approx(broker.cash().await.unwrap(), 11_000.0 - 1_060.0));
    }

    #[tokio::test]
    async fn liquidating_flat_symbol_is_ok() {
        let broker = SimulatedBroker::new(1_000.0, 0.0);
        broker.liquidate_all("GOOGL").await.unwrap();
    }

    #[tokio::test]
    async fn portfolio_value_marks_positions() {
        let broker = SimulatedBroker::new(10_000.0, 0.0);
        broker.update_price("GOOGL", 100.0, Utc::now()).await;
        broker.submit(&intent(OrderSide::Buy, 10, 100.0)).await.unwrap();
        broker.update_price("GOOGL", 105.0, Utc::now()).await;

        assert!(approx(broker.portfolio_value().await, 9_000.0 + 1_050.0));
    }
}
