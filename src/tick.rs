// 3.0: the tick ledger. open long positions bucketed by liquidation-price tick.
//
// each bucket carries a generation counter bumped when the tick is liquidated,
// so a stored (tick, version, index) handle detects that the position it
// pointed at is gone. slots are tombstoned on close to keep indices stable
// within a generation. the liquidation multiplier (accumulator.rs) converts
// nominal tick prices into effective liquidation prices under funding drift.

use crate::accumulator::LiqMultiplier;
use crate::config::CoreParams;
use crate::types::{Addr, PositionId, Price, Tick, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LedgerError {
    #[error("stale tick version: held v{held}, current v{current}")]
    StaleTickVersion { held: u64, current: u64 },

    #[error("position {0} not found")]
    PositionNotFound(PositionId),

    #[error("invalid liquidation price {liq_price}, must be below {max_liq_price}")]
    InvalidLiquidationPrice {
        liq_price: Decimal,
        max_liq_price: Decimal,
    },

    #[error("leverage {leverage} above maximum {max}")]
    LeverageTooHigh { leverage: Decimal, max: Decimal },

    #[error("leverage {leverage} below minimum {min}")]
    LeverageTooLow { leverage: Decimal, min: Decimal },

    #[error("amount to close {requested} exceeds position amount {available}")]
    CloseAmountTooLarge {
        requested: Decimal,
        available: Decimal,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub user: Addr,
    pub to: Addr,
    /// Collateral in settlement-asset units.
    pub amount: Decimal,
    /// Leveraged exposure in settlement-asset units.
    pub total_expo: Decimal,
    pub opened_at: Timestamp,
}

impl Position {
    pub fn leverage(&self) -> Decimal {
        self.total_expo / self.amount
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TickBucket {
    // tombstoned on close so (version, index) handles stay valid
    slots: Vec<Option<Position>>,
    total_expo: Decimal,
    live: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickLedger {
    tick_size: Decimal,
    buckets: BTreeMap<Tick, TickBucket>,
    // generations survive bucket removal, otherwise a re-populated tick would
    // resurrect handles from before its liquidation
    versions: HashMap<Tick, u64>,
    multiplier: LiqMultiplier,
}

/// Value of an exposure at `price` given its liquidation price, in asset units.
/// Negative when the price is already below the liquidation price.
pub fn position_value(total_expo: Decimal, liq_price: Decimal, price: Price) -> Decimal {
    total_expo * (price.value() - liq_price) / price.value()
}

/// Exposure needed so `amount` of collateral liquidates exactly at `liq_price`.
pub fn expo_for_liq_price(amount: Decimal, entry_price: Price, liq_price: Decimal) -> Decimal {
    amount * entry_price.value() / (entry_price.value() - liq_price)
}

impl TickLedger {
    pub fn new(tick_size: Decimal) -> Self {
        Self {
            tick_size,
            buckets: BTreeMap::new(),
            versions: HashMap::new(),
            multiplier: LiqMultiplier::new(),
        }
    }

    pub fn multiplier(&self) -> &LiqMultiplier {
        &self.multiplier
    }

    pub fn accrue_funding(&mut self, rate_per_period: Decimal, elapsed_ms: i64, period_ms: i64) {
        self.multiplier.accrue(rate_per_period, elapsed_ms, period_ms);
    }

    pub fn effective_liq_price(&self, tick: Tick) -> Decimal {
        self.multiplier.effective_price(tick.nominal_price(self.tick_size))
    }

    /// Highest tick whose effective liquidation price does not exceed `desired`.
    pub fn tick_for_desired_price(&self, desired: Decimal) -> Tick {
        Tick::from_nominal_price(self.multiplier.nominal_price(desired), self.tick_size)
    }

    pub fn tick_version(&self, tick: Tick) -> u64 {
        self.versions.get(&tick).copied().unwrap_or(0)
    }

    pub fn tick_expo(&self, tick: Tick) -> Decimal {
        self.buckets
            .get(&tick)
            .map(|b| b.total_expo)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn highest_populated_tick(&self) -> Option<Tick> {
        self.buckets.keys().next_back().copied()
    }

    pub fn live_positions(&self) -> usize {
        self.buckets.values().map(|b| b.live).sum()
    }

    pub fn positions_in_tick(&self, tick: Tick) -> usize {
        self.buckets.get(&tick).map(|b| b.live).unwrap_or(0)
    }

    // 3.1: open. validates the requested liquidation price against the
    // minimum-margin bound and the resulting leverage against [min, max].
    pub fn open_position(
        &mut self,
        user: Addr,
        to: Addr,
        amount: Decimal,
        desired_liq_price: Decimal,
        entry_price: Price,
        opened_at: Timestamp,
        params: &CoreParams,
    ) -> Result<(PositionId, Position), LedgerError> {
        let tick = self.tick_for_desired_price(desired_liq_price);
        let liq_price = self.effective_liq_price(tick);

        let max_liq_price =
            entry_price.value() * (Decimal::ONE - params.min_liq_price_margin.as_fraction());
        if liq_price <= Decimal::ZERO || liq_price >= max_liq_price {
            return Err(LedgerError::InvalidLiquidationPrice {
                liq_price,
                max_liq_price,
            });
        }

        let total_expo = expo_for_liq_price(amount, entry_price, liq_price);
        let leverage = total_expo / amount;
        if leverage > params.max_leverage {
            return Err(LedgerError::LeverageTooHigh {
                leverage,
                max: params.max_leverage,
            });
        }
        if leverage < params.min_leverage {
            return Err(LedgerError::LeverageTooLow {
                leverage,
                min: params.min_leverage,
            });
        }

        let position = Position {
            user,
            to,
            amount,
            total_expo,
            opened_at,
        };
        let id = self.insert(tick, position.clone());
        Ok((id, position))
    }

    /// Inserts an already-validated position into a tick.
    pub fn insert(&mut self, tick: Tick, position: Position) -> PositionId {
        let version = self.tick_version(tick);
        let bucket = self.buckets.entry(tick).or_default();
        bucket.total_expo += position.total_expo;
        bucket.live += 1;
        bucket.slots.push(Some(position));
        PositionId {
            tick,
            version,
            index: bucket.slots.len() - 1,
        }
    }

    fn check_version(&self, id: &PositionId) -> Result<(), LedgerError> {
        let current = self.tick_version(id.tick);
        if current != id.version {
            return Err(LedgerError::StaleTickVersion {
                held: id.version,
                current,
            });
        }
        Ok(())
    }

    pub fn get(&self, id: &PositionId) -> Result<&Position, LedgerError> {
        self.check_version(id)?;
        self.buckets
            .get(&id.tick)
            .and_then(|b| b.slots.get(id.index))
            .and_then(|slot| slot.as_ref())
            .ok_or(LedgerError::PositionNotFound(*id))
    }

    // 3.2: partial or full detach of (amount, expo) from a position. a full
    // detach tombstones the slot. returns the detached exposure.
    pub fn reduce(&mut self, id: &PositionId, amount_to_close: Decimal) -> Result<Decimal, LedgerError> {
        self.check_version(id)?;
        let bucket = self
            .buckets
            .get_mut(&id.tick)
            .ok_or(LedgerError::PositionNotFound(*id))?;
        let slot = bucket
            .slots
            .get_mut(id.index)
            .ok_or(LedgerError::PositionNotFound(*id))?;
        let position = slot.as_mut().ok_or(LedgerError::PositionNotFound(*id))?;

        if amount_to_close > position.amount {
            return Err(LedgerError::CloseAmountTooLarge {
                requested: amount_to_close,
                available: position.amount,
            });
        }

        let expo_to_close = if amount_to_close == position.amount {
            position.total_expo
        } else {
            position.total_expo * amount_to_close / position.amount
        };

        position.amount -= amount_to_close;
        position.total_expo -= expo_to_close;
        bucket.total_expo -= expo_to_close;
        if position.amount.is_zero() {
            *slot = None;
            bucket.live -= 1;
        }
        if bucket.live == 0 {
            self.buckets.remove(&id.tick);
        }
        Ok(expo_to_close)
    }

    /// Replaces a position's exposure in place, e.g. when a confirmed price
    /// reprices a freshly opened position within the same tick.
    pub fn update_expo(&mut self, id: &PositionId, new_expo: Decimal) -> Result<Decimal, LedgerError> {
        self.check_version(id)?;
        let bucket = self
            .buckets
            .get_mut(&id.tick)
            .ok_or(LedgerError::PositionNotFound(*id))?;
        let position = bucket
            .slots
            .get_mut(id.index)
            .and_then(|slot| slot.as_mut())
            .ok_or(LedgerError::PositionNotFound(*id))?;
        let old_expo = position.total_expo;
        position.total_expo = new_expo;
        bucket.total_expo += new_expo - old_expo;
        Ok(old_expo)
    }

    /// Removes a whole position, e.g. when validation moves it to another tick.
    pub fn remove(&mut self, id: &PositionId) -> Result<Position, LedgerError> {
        self.check_version(id)?;
        let bucket = self
            .buckets
            .get_mut(&id.tick)
            .ok_or(LedgerError::PositionNotFound(*id))?;
        let slot = bucket
            .slots
            .get_mut(id.index)
            .ok_or(LedgerError::PositionNotFound(*id))?;
        let position = slot.take().ok_or(LedgerError::PositionNotFound(*id))?;
        bucket.total_expo -= position.total_expo;
        bucket.live -= 1;
        if bucket.live == 0 {
            self.buckets.remove(&id.tick);
        }
        Ok(position)
    }

    // 3.3: crossing check. closed at the tick's own price (a tick exactly at
    // the current price is crossed), open below, so a tick liquidated at its
    // exact boundary cannot be selected twice.
    pub fn is_crossed(&self, tick: Tick, price: Price) -> bool {
        price.value() <= self.effective_liq_price(tick)
    }

    /// Highest populated tick crossed at `price`, if any.
    pub fn next_crossed_tick(&self, price: Price) -> Option<Tick> {
        let highest = self.highest_populated_tick()?;
        self.is_crossed(highest, price).then_some(highest)
    }

    // 3.4: wipe a whole tick. bumps the generation so held handles go stale.
    // returns (liquidated position count, liquidated exposure).
    pub fn liquidate_tick(&mut self, tick: Tick) -> (usize, Decimal) {
        let Some(bucket) = self.buckets.remove(&tick) else {
            return (0, Decimal::ZERO);
        };
        *self.versions.entry(tick).or_insert(0) += 1;
        (bucket.live, bucket.total_expo)
    }
}
