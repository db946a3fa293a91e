// 2.0: liquidation multiplier accumulator.
//
// a single running multiplier that reprices every open position's liquidation
// price as funding accrues, without rewriting stored positions. a tick's
// effective liquidation price is `nominal_tick_price * multiplier`, so one
// update moves every bucket at once. updates are multiplicative: two
// consecutive factors compose into their product, and a zero-elapsed-time
// settlement contributes a factor of exactly one.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiqMultiplier(Decimal);

impl LiqMultiplier {
    pub fn new() -> Self {
        Self(Decimal::ONE)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Effective price of a nominal (tick-space) price at the current funding state.
    pub fn effective_price(&self, nominal: Decimal) -> Decimal {
        nominal * self.0
    }

    /// Maps a desired effective liquidation price back into tick space.
    pub fn nominal_price(&self, effective: Decimal) -> Decimal {
        effective / self.0
    }

    /// Applies one funding drift step. `rate_per_period` is the signed funding
    /// rate over a full period; the factor is `1 + rate * elapsed / period`.
    pub fn accrue(&mut self, rate_per_period: Decimal, elapsed_ms: i64, period_ms: i64) {
        let factor = drift_factor(rate_per_period, elapsed_ms, period_ms);
        self.0 *= factor;
    }
}

impl Default for LiqMultiplier {
    fn default() -> Self {
        Self::new()
    }
}

pub fn drift_factor(rate_per_period: Decimal, elapsed_ms: i64, period_ms: i64) -> Decimal {
    if elapsed_ms <= 0 {
        return Decimal::ONE;
    }
    let elapsed = Decimal::from(elapsed_ms);
    let period = Decimal::from(period_ms);
    let factor = Decimal::ONE + rate_per_period * elapsed / period;
    // funding can never invert or zero out liquidation prices in one step
    factor.max(Decimal::new(1, 4))
}
