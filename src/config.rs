// 7.0: protocol parameters. everything tunable lives here so tests can pin
// exact values instead of relying on magic numbers scattered through the engine.

use crate::types::Bps;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

// the source protocol shipped two withdrawal-boundary conventions across
// parameter versions. ratio division is the dimensionally consistent one and
// the default; linear subtraction keeps the pre-action vault expo as denominator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WithdrawalImbalanceFormula {
    RatioDivision,
    LinearSubtraction,
}

// 7.1: the six directional imbalance bounds, in bps of the reference side's expo.
// `None` disables a bound. deposit/open get one bound each; withdrawal gets a
// soft bound (checked at initiate) and a hard bound (checked at finalization,
// where the deferred price may have moved). close detaches its exposure at
// initiate, so both close bounds gate initiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImbalanceLimits {
    pub deposit: Option<Bps>,
    pub open: Option<Bps>,
    pub withdrawal_soft: Option<Bps>,
    pub withdrawal_hard: Option<Bps>,
    pub close_soft: Option<Bps>,
    pub close_hard: Option<Bps>,
}

impl ImbalanceLimits {
    pub fn disabled() -> Self {
        Self {
            deposit: None,
            open: None,
            withdrawal_soft: None,
            withdrawal_hard: None,
            close_soft: None,
            close_hard: None,
        }
    }
}

impl Default for ImbalanceLimits {
    fn default() -> Self {
        Self {
            deposit: Some(Bps::new(2000)),
            open: Some(Bps::new(2000)),
            withdrawal_soft: Some(Bps::new(2500)),
            withdrawal_hard: Some(Bps::new(6000)),
            close_soft: Some(Bps::new(2500)),
            close_hard: Some(Bps::new(6000)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreParams {
    /// Width of one liquidation-price bucket in quote units.
    pub tick_size: Decimal,
    /// Leverage floor for new positions (total_expo / amount).
    pub min_leverage: Decimal,
    /// Leverage cap for new positions.
    pub max_leverage: Decimal,
    /// Minimum distance between entry price and liquidation price, in bps of
    /// the entry price. A tick at or above `entry * (1 - margin)` is rejected.
    pub min_liq_price_margin: Bps,
    /// Funding scaling factor applied to the squared exposure imbalance.
    pub funding_sf: Decimal,
    /// Funding accrual period in milliseconds (rate is per full period).
    pub funding_period_ms: i64,
    /// Age past which a pending action becomes actionable by third parties
    /// and evictable by a displacing initiate.
    pub validation_deadline_ms: i64,
    /// Security deposit posted at initiate, refunded to whoever finalizes.
    pub security_deposit: Decimal,
    /// Flat liquidator reward accrued per fully liquidated tick.
    pub liquidation_reward_per_tick: Decimal,
    /// Cap on ticks processed per liquidation pass.
    pub max_liquidation_iterations: usize,
    /// Burn-token units charged per vault share minted on deposit.
    pub burn_ratio: Decimal,
    pub withdrawal_formula: WithdrawalImbalanceFormula,
    pub limits: ImbalanceLimits,
}

impl Default for CoreParams {
    fn default() -> Self {
        Self {
            tick_size: dec!(100),
            min_leverage: dec!(1.1),
            max_leverage: dec!(10),
            min_liq_price_margin: Bps::new(100),
            funding_sf: dec!(0.12),
            funding_period_ms: 86_400_000,
            validation_deadline_ms: 60_000,
            security_deposit: dec!(0.5),
            liquidation_reward_per_tick: dec!(0.2),
            max_liquidation_iterations: 10,
            burn_ratio: dec!(0.01),
            withdrawal_formula: WithdrawalImbalanceFormula::RatioDivision,
            limits: ImbalanceLimits::default(),
        }
    }
}

impl CoreParams {
    // loosest parameters for unit tests that want to isolate one guard
    pub fn permissive() -> Self {
        Self {
            limits: ImbalanceLimits::disabled(),
            ..Self::default()
        }
    }
}
