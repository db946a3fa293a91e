// 8.0: liquidation executor. walks populated ticks down from the highest one
// while they are crossed at the current price, bounded by an iteration cap so
// a single call never does unbounded work. each crossed tick is wiped whole:
// its generation is bumped, its exposure leaves the long side, and whatever
// value the tick still had at the current price moves to the vault. a flat
// reward accrues per tick for the caller that triggered the pass.

use crate::tick::{position_value, TickLedger};
use crate::types::{Price, Tick};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickLiquidation {
    pub tick: Tick,
    /// Generation the tick now carries (post-bump).
    pub version: u64,
    pub positions: usize,
    pub expo: Decimal,
    /// Tick value at the liquidation price, moved from long to vault.
    /// Negative when the price had already fallen through the tick.
    pub tick_value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidationReport {
    pub ticks: Vec<TickLiquidation>,
    /// Exposure removed from the long side.
    pub liquidated_expo: Decimal,
    /// Net asset value moved from the long balance to the vault.
    pub remaining_collateral: Decimal,
    /// Reward owed to the liquidator (uncapped; the engine caps at the vault).
    pub reward: Decimal,
    /// True when the iteration cap was reached with crossed ticks left over.
    pub pending: bool,
}

impl LiquidationReport {
    pub fn ticks_liquidated(&self) -> usize {
        self.ticks.len()
    }

    pub fn positions_liquidated(&self) -> usize {
        self.ticks.iter().map(|t| t.positions).sum()
    }
}

// 8.1: the walk. mutates only the ledger; balance moves are reported back so
// the caller can apply them against protocol state in one place.
pub fn liquidate_crossed_ticks(
    ledger: &mut TickLedger,
    price: Price,
    max_iterations: usize,
    reward_per_tick: Decimal,
) -> LiquidationReport {
    let mut ticks = Vec::new();
    let mut liquidated_expo = Decimal::ZERO;
    let mut remaining_collateral = Decimal::ZERO;

    for _ in 0..max_iterations {
        let Some(tick) = ledger.next_crossed_tick(price) else {
            break;
        };
        let liq_price = ledger.effective_liq_price(tick);
        let (positions, expo) = ledger.liquidate_tick(tick);
        let tick_value = position_value(expo, liq_price, price);

        liquidated_expo += expo;
        remaining_collateral += tick_value;
        ticks.push(TickLiquidation {
            tick,
            version: ledger.tick_version(tick),
            positions,
            expo,
            tick_value,
        });
    }

    let pending = ledger.next_crossed_tick(price).is_some();
    let reward = reward_per_tick * Decimal::from(ticks.len() as u64);

    LiquidationReport {
        ticks,
        liquidated_expo,
        remaining_collateral,
        reward,
        pending,
    }
}
