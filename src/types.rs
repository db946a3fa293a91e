// 1.0: all the primitives live here. nothing in the engine works without these types.
// addresses, prices, ticks, basis points, timestamps, position handles.
// each is a newtype so the compiler catches type mixups.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// opaque account address. 0 is the reserved zero address and always invalid as a party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Addr(pub u64);

impl Addr {
    pub const ZERO: Addr = Addr(0);

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "addr:{}", self.0)
    }
}

// 1.1: price in settlement-asset quote per unit of the traded asset. must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Price(Decimal);

impl Price {
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn new_unchecked(value: Decimal) -> Self {
        debug_assert!(value > Decimal::ZERO);
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.2: basis points. 100 bps = 1%. used for imbalance ratios and limit bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Bps(pub i64);

impl Bps {
    pub fn new(bps: i64) -> Self {
        Self(bps)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn as_decimal(&self) -> Decimal {
        Decimal::from(self.0)
    }

    pub fn as_fraction(&self) -> Decimal {
        Decimal::new(self.0, 4)
    }
}

impl fmt::Display for Bps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}bps", self.0)
    }
}

// 1.3: a tick is a discretized liquidation-price bucket. nominal price = tick * tick_size,
// before the liquidation multiplier is applied. always >= 1 for an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tick(pub i32);

impl Tick {
    pub fn nominal_price(&self, tick_size: Decimal) -> Decimal {
        Decimal::from(self.0) * tick_size
    }

    // highest tick whose nominal price does not exceed the given price
    pub fn from_nominal_price(price: Decimal, tick_size: Decimal) -> Self {
        let ratio = price / tick_size;
        Self(ratio.floor().to_i32().unwrap_or(i32::MAX))
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tick:{}", self.0)
    }
}

// 1.4: monotonic handle into the pending-action queue. never reused, so a raw index
// that fails to resolve means the action was already finalized or evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RawIndex(pub u64);

impl fmt::Display for RawIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// 1.5: weak reference to a stored position: (tick, tick generation, slot within generation).
// every dereference must compare `version` against the tick's current generation;
// a mismatch means the tick was liquidated since the reference was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PositionId {
    pub tick: Tick,
    pub version: u64,
    pub index: usize,
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/v{}/{}", self.tick, self.version, self.index)
    }
}

// 1.6: millisecond timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }

    pub fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    pub fn age_millis(&self, now: Timestamp) -> i64 {
        (now.0 - self.0).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn tick_nominal_price_round_trip() {
        let tick_size = dec!(100);
        let tick = Tick::from_nominal_price(dec!(47_560), tick_size);
        assert_eq!(tick, Tick(475));
        assert_eq!(tick.nominal_price(tick_size), dec!(47_500));

        // exact multiples map onto themselves
        let exact = Tick::from_nominal_price(dec!(47_500), tick_size);
        assert_eq!(exact, Tick(475));
    }

    #[test]
    fn bps_conversions() {
        assert_eq!(Bps::new(100).as_fraction(), dec!(0.01));
        assert_eq!(Bps::new(2500).as_decimal(), dec!(2500));
    }

    #[test]
    fn timestamp_elapsed() {
        let t0 = Timestamp::from_millis(10_000);
        let t1 = Timestamp::from_millis(25_500);
        assert_eq!(t0.age_millis(t1), 15_500);
        // clock going backwards clamps at zero
        assert_eq!(t1.age_millis(t0), 0);
    }

    #[test]
    fn zero_addr() {
        assert!(Addr::ZERO.is_zero());
        assert!(!Addr(7).is_zero());
    }
}
