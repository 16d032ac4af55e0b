use std::sync::Arc;

use tracing::{info, warn};

use common::{OrderAcceptance, OrderExecutionPort, OrderIntent, Result};

/// Order path from the strategy engine to the execution port.
///
/// This is the ONLY component that calls `OrderExecutionPort`. It logs every
/// instruction and its outcome; it never retries.
#[derive(Clone)]
pub struct OrderExecutor {
    port: Arc<dyn OrderExecutionPort>,
}

impl OrderExecutor {
    pub fn new(port: Arc<dyn OrderExecutionPort>) -> Self {
        Self { port }
    }

    pub async fn liquidate(&self, symbol: &str) -> Result<()> {
        info!(%symbol, "Liquidating open position");
        match self.port.liquidate_all(symbol).await {
            Ok(()) => {
                info!(%symbol, "Liquidation accepted");
                Ok(())
            }
            Err(e) => {
                warn!(%symbol, error = %e, "Liquidation failed");
                Err(e)
            }
        }
    }

    pub async fn submit(&self, intent: &OrderIntent) -> Result<OrderAcceptance> {
        info!(
            symbol = %intent.symbol,
            side = %intent.side,
            qty = intent.quantity,
            take_profit = intent.take_profit_price,
            stop_loss = intent.stop_loss_price,
            "Submitting bracket order"
        );
        match self.port.submit(intent).await {
            Ok(acceptance) => {
                info!(
                    symbol = %acceptance.symbol,
                    order_id = %acceptance.order_id,
                    "Order accepted"
                );
                Ok(acceptance)
            }
            Err(e) => {
                warn!(symbol = %intent.symbol, error = %e, "Order submission failed");
                Err(e)
            }
        }
    }
}
