use common::{Error, Result};

/// Cash, price and the quantity derived from them for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingResult {
    pub available_cash: f64,
    pub reference_price: f64,
    pub quantity: u64,
}

impl SizingResult {
    /// Strictly more cash than the full notional of `quantity` at
    /// `reference_price`.
    pub fn affordable(&self) -> bool {
        self.available_cash > self.reference_price * self.quantity as f64
    }
}

/// Cash-at-risk position sizer.
#[derive(Debug, Clone, Copy)]
pub struct PositionSizer {
    pub risk_fraction: f64,
}

impl PositionSizer {
    pub fn new(risk_fraction: f64) -> Self {
        Self { risk_fraction }
    }

    pub fn sizing(&self, cash: f64, price: f64) -> Result<SizingResult> {
        Ok(SizingResult {
            available_cash: cash,
            reference_price: price,
            quantity: size(cash, price, self.risk_fraction)?,
        })
    }
}

/// Whole-share quantity for `cash * risk_fraction` at `price`.
///
/// Rounds half to even, so `size(250.0, 100.0, 1.0)` is 2 and
/// `size(350.0, 100.0, 1.0)` is 4.
pub fn size(cash: f64, price: f64, risk_fraction: f64) -> Result<u64> {
    if !price.is_finite() || price <= 0.0 {
        return Err(Error::InvalidInput(format!("price must be > 0, got {price}")));
    }
    if !cash.is_finite() || cash < 0.0 {
        return Err(Error::InvalidInput(format!("cash must be >= 0, got {cash}")));
    }
    if !(risk_fraction > 0.0 && risk_fraction <= 1.0) {
        return Err(Error::InvalidInput(format!(
            "risk fraction must be in (0, 1], got {risk_fraction}"
        )));
    }
    let raw = cash * risk_fraction / price;
    if raw > u64::MAX as f64 {
        return Err(Error::InvalidInput(format!(
            "quantity {raw} does not fit in a share count"
        )));
    }
    Ok(raw.round_ties_even() as u64)
}
