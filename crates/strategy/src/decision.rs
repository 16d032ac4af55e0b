use common::{LastAction, OrderIntent, OrderSide, Polarity, SentimentJudgment};

use crate::config::SameDirection;

/// Confidence a judgment must strictly exceed before the engine trades.
pub const CONFIDENCE_THRESHOLD: f64 = 0.999;

/// Long bracket: take profit at +20%, stop out at -5%.
pub const LONG_TAKE_PROFIT: f64 = 1.20;
pub const LONG_STOP_LOSS: f64 = 0.95;

/// Short bracket: take profit at -20%, stop out at +5%.
pub const SHORT_TAKE_PROFIT: f64 = 0.80;
pub const SHORT_STOP_LOSS: f64 = 1.05;

/// What one tick should do, before any I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Hold,
    Enter {
        side: OrderSide,
        /// Close the opposite exposure before entering.
        liquidate_first: bool,
    },
}

/// Map a judgment and the last entry direction to an action.
pub fn decide(
    judgment: &SentimentJudgment,
    last_action: LastAction,
    same_direction: SameDirection,
) -> Decision {
    if judgment.confidence <= CONFIDENCE_THRESHOLD || judgment.confidence.is_nan() {
        return Decision::Hold;
    }

    let (side, same, opposite) = match judgment.polarity {
        Polarity::Positive => (OrderSide::Buy, LastAction::Long, LastAction::Short),
        Polarity::Negative => (OrderSide::Sell, LastAction::Short, LastAction::Long),
        Polarity::Neutral => return Decision::Hold,
    };

    if last_action == same && same_direction == SameDirection::Hold {
        return Decision::Hold;
    }

    Decision::Enter {
        side,
        liquidate_first: last_action == opposite,
    }
}

/// Bracket entry for `side` around `price`.
pub fn bracket(symbol: &str, side: OrderSide, quantity: u64, price: f64) -> OrderIntent {
    let (tp, sl) = match side {
        OrderSide::Buy => (LONG_TAKE_PROFIT, LONG_STOP_LOSS),
        OrderSide::Sell => (SHORT_TAKE_PROFIT, SHORT_STOP_LOSS),
    };
    OrderIntent {
        symbol: symbol.to_string(),
        quantity,
        side,
        take_profit_price: price * tp,
        stop_loss_price: price * sl,
    }
}

/// Exposure recorded once an entry on `side` has been accepted.
pub fn action_for(side: OrderSide) -> LastAction {
    match side {
        OrderSide::Buy => LastAction::Long,
        OrderSide::Sell => LastAction::Short,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn judgment(polarity: Polarity, confidence: f64) -> SentimentJudgment {
        SentimentJudgment::new(confidence, polarity)
    }

    #[test]
    fn threshold_is_strict() {
        let at = judgment(Polarity::Positive, 0.999);
        assert_eq!(decide(&at, LastAction::None, SameDirection::Reenter), Decision::Hold);

        let above = judgment(Polarity::Positive, 0.9991);
        assert_eq!(
            decide(&above, LastAction::None, SameDirection::Reenter),
            Decision::Enter { side: OrderSide::Buy, liquidate_first: false }
        );
    }

    #[test]
    fn neutral_never_trades() {
        for last in [LastAction::None, LastAction::Long, LastAction::Short] {
            let j = judgment(Polarity::Neutral, 1.0);
            assert_eq!(decide(&j, last, SameDirection::Reenter), Decision::Hold);
        }
    }

    #[test]
    fn reversal_liquidates_first() {
        let neg = judgment(Polarity::Negative, 0.9995);
        assert_eq!(
            decide(&neg, LastAction::Long, SameDirection::Reenter),
            Decision::Enter { side: OrderSide::Sell, liquidate_first: true }
        );
        let pos = judgment(Polarity::Positive, 0.9995);
        assert_eq!(
            decide(&pos, LastAction::Short, SameDirection::Reenter),
            Decision::Enter { side: OrderSide::Buy, liquidate_first: true }
        );
    }

    #[test]
    fn same_direction_follows_policy() {
        let pos = judgment(Polarity::Positive, 0.9995);
        assert_eq!(
            decide(&pos, LastAction::Long, SameDirection::Reenter),
            Decision::Enter { side: OrderSide::Buy, liquidate_first: false }
        );
        assert_eq!(decide(&pos, LastAction::Long, SameDirection::Hold), Decision::Hold);
        // Hold only applies to repeats
        assert_eq!(
            decide(&pos, LastAction::Short, SameDirection::Hold),
            Decision::Enter { side: OrderSide::Buy, liquidate_first: true }
        );
    }

    #[test]
    fn nan_confidence_holds() {
        let j = judgment(Polarity::Negative, f64::NAN);
        assert_eq!(decide(&j, LastAction::None, SameDirection::Reenter), Decision::Hold);
    }

    #[test]
    fn brackets_around_price() {
        let long = bracket("GOOGL", OrderSide::Buy, 50, 100.0);
        assert!((long.take_profit_price - 120.0).abs() < 1e-9);
        assert!((long.stop_loss_price - 95.0).abs() < 1e-9);

        let short = bracket("GOOGL", OrderSide::Sell, 45, 110.0);
        assert!((short.take_profit_price - 88.0).abs() < 1e-9);
        assert!((short.stop_loss_price - 115.5).abs() < 1e-9);
        assert_eq!(short.quantity, 45);
    }
}
