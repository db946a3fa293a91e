// 10.0: price oracle seam. MOCKED. the engine takes already-resolved prices
// as arguments and never validates oracle timestamps itself; recency is
// enforced by the pending queue's deadline logic. callers (the sim, tests,
// an off-chain driver) resolve prices through this trait.

use crate::types::{Price, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolAction {
    InitiateDeposit,
    ValidateDeposit,
    InitiateWithdrawal,
    ValidateWithdrawal,
    InitiateOpen,
    ValidateOpen,
    InitiateClose,
    ValidateClose,
    Liquidation,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OraclePrice {
    pub price: Price,
    pub publish_time: Timestamp,
    /// Cost billed by the oracle for validating this price, in asset units.
    pub validation_cost: Decimal,
}

pub trait PriceOracle: fmt::Debug {
    fn get_price(&self, action: ProtocolAction, extra_data: &[u8]) -> OraclePrice;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockOracle {
    price: Price,
    publish_time: Timestamp,
    validation_cost: Decimal,
}

impl MockOracle {
    pub fn new(price: Price) -> Self {
        Self {
            price,
            publish_time: Timestamp::from_millis(0),
            validation_cost: Decimal::ZERO,
        }
    }

    pub fn set_price(&mut self, price: Price, publish_time: Timestamp) {
        self.price = price;
        self.publish_time = publish_time;
    }
}

impl PriceOracle for MockOracle {
    fn get_price(&self, _action: ProtocolAction, _extra_data: &[u8]) -> OraclePrice {
        OraclePrice {
            price: self.price,
            publish_time: self.publish_time,
            validation_cost: self.validation_cost,
        }
    }
}
