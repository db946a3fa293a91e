// 9.0: external collaborators: asset custody, auxiliary burn token, reward
// sink. the core only ever talks to these through the narrow traits below;
// the mock implementations are plain balance maps for tests and the sim.

use crate::types::Addr;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CustodyError {
    #[error("insufficient funds: {holder} has {available}, needs {required}")]
    InsufficientFunds {
        holder: Addr,
        available: Decimal,
        required: Decimal,
    },

    #[error("payment callback did not increase custody by {expected}")]
    CallbackShortfall { expected: Decimal },
}

/// Settlement-asset custody. `transfer_in` must strictly increase the custody
/// balance by `amount` before returning, otherwise the calling action fails
/// with `PaymentCallbackFailed` and leaves no partial effect.
pub trait AssetCustody: fmt::Debug {
    fn transfer_in(&mut self, from: Addr, amount: Decimal) -> Result<(), CustodyError>;
    fn transfer_out(&mut self, to: Addr, amount: Decimal) -> Result<(), CustodyError>;
    fn custody_balance(&self) -> Decimal;
}

/// Auxiliary burn token charged on deposit validation. The core computes the
/// burn amount; the token mechanics live behind this trait.
pub trait BurnToken: fmt::Debug {
    fn burn(&mut self, from: Addr, amount: Decimal) -> Result<(), CustodyError>;
    fn total_burned(&self) -> Decimal;
}

/// Liquidator reward payout, already capped by the caller.
pub trait RewardSink: fmt::Debug {
    fn pay_reward(&mut self, liquidator: Addr, amount: Decimal);
    fn total_paid(&self) -> Decimal;
}

// 9.1: mock custody. just balance moves between user accounts and the pool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MockCustody {
    balances: HashMap<Addr, Decimal>,
    custody: Decimal,
    /// When set, the next transfer_in silently keeps custody unchanged,
    /// emulating a misbehaving payment callback.
    pub break_next_transfer_in: bool,
    /// When set, the next transfer_out refuses without moving anything.
    pub break_next_transfer_out: bool,
}

impl MockCustody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fund(&mut self, holder: Addr, amount: Decimal) {
        *self.balances.entry(holder).or_insert(Decimal::ZERO) += amount;
    }

    pub fn balance_of(&self, holder: Addr) -> Decimal {
        self.balances.get(&holder).copied().unwrap_or(Decimal::ZERO)
    }
}

impl AssetCustody for MockCustody {
    fn transfer_in(&mut self, from: Addr, amount: Decimal) -> Result<(), CustodyError> {
        if self.break_next_transfer_in {
            self.break_next_transfer_in = false;
            return Err(CustodyError::CallbackShortfall { expected: amount });
        }
        let balance = self.balances.entry(from).or_insert(Decimal::ZERO);
        if *balance < amount {
            return Err(CustodyError::InsufficientFunds {
                holder: from,
                available: *balance,
                required: amount,
            });
        }
        *balance -= amount;
        self.custody += amount;
        Ok(())
    }

    fn transfer_out(&mut self, to: Addr, amount: Decimal) -> Result<(), CustodyError> {
        if self.break_next_transfer_out {
            self.break_next_transfer_out = false;
            return Err(CustodyError::CallbackShortfall { expected: amount });
        }
        if self.custody < amount {
            return Err(CustodyError::InsufficientFunds {
                holder: Addr::ZERO,
                available: self.custody,
                required: amount,
            });
        }
        self.custody -= amount;
        *self.balances.entry(to).or_insert(Decimal::ZERO) += amount;
        Ok(())
    }

    fn custody_balance(&self) -> Decimal {
        self.custody
    }
}

// 9.2: mock burn token with per-holder balances seeded on demand.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MockBurnToken {
    burned_by: HashMap<Addr, Decimal>,
    total: Decimal,
}

impl MockBurnToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn burned_by(&self, holder: Addr) -> Decimal {
        self.burned_by.get(&holder).copied().unwrap_or(Decimal::ZERO)
    }
}

impl BurnToken for MockBurnToken {
    fn burn(&mut self, from: Addr, amount: Decimal) -> Result<(), CustodyError> {
        *self.burned_by.entry(from).or_insert(Decimal::ZERO) += amount;
        self.total += amount;
        Ok(())
    }

    fn total_burned(&self) -> Decimal {
        self.total
    }
}

// 9.3: mock reward sink: records payouts per liquidator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MockRewardSink {
    paid: HashMap<Addr, Decimal>,
    total: Decimal,
}

impl MockRewardSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paid_to(&self, liquidator: Addr) -> Decimal {
        self.paid.get(&liquidator).copied().unwrap_or(Decimal::ZERO)
    }
}

impl RewardSink for MockRewardSink {
    fn pay_reward(&mut self, liquidator: Addr, amount: Decimal) {
        *self.paid.entry(liquidator).or_insert(Decimal::ZERO) += amount;
        self.total += amount;
    }

    fn total_paid(&self) -> Decimal {
        self.total
    }
}
