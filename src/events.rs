// 11.0: every state change produces an event. used for audit trails, state
// reconstruction, and notifying external systems. the EventPayload enum lists
// all event types.

use crate::types::{Addr, PositionId, Price, RawIndex, Tick, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // vault side
    DepositInitiated(DepositInitiatedEvent),
    DepositValidated(DepositValidatedEvent),
    WithdrawalInitiated(WithdrawalInitiatedEvent),
    WithdrawalValidated(WithdrawalValidatedEvent),

    // long side
    PositionOpened(PositionOpenedEvent),
    PositionOpenValidated(PositionOpenValidatedEvent),
    PositionCloseInitiated(PositionCloseInitiatedEvent),
    PositionCloseValidated(PositionCloseValidatedEvent),

    // settlement and risk
    FundingSettled(FundingSettledEvent),
    TickLiquidated(TickLiquidatedEvent),
    LiquidationRewardPaid(LiquidationRewardPaidEvent),

    // queue maintenance
    StaleActionEvicted(StaleActionEvictedEvent),
    SecurityDepositRefundFailed(SecurityDepositRefundFailedEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositInitiatedEvent {
    pub user: Addr,
    pub to: Addr,
    pub validator: Addr,
    pub amount: Decimal,
    pub raw_index: RawIndex,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositValidatedEvent {
    pub user: Addr,
    pub to: Addr,
    pub amount: Decimal,
    pub shares_minted: Decimal,
    pub burn_amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalInitiatedEvent {
    pub user: Addr,
    pub to: Addr,
    pub validator: Addr,
    pub shares: Decimal,
    pub raw_index: RawIndex,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalValidatedEvent {
    pub user: Addr,
    pub to: Addr,
    pub shares: Decimal,
    pub assets_out: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionOpenedEvent {
    pub user: Addr,
    pub to: Addr,
    pub validator: Addr,
    pub position: PositionId,
    pub amount: Decimal,
    pub total_expo: Decimal,
    pub raw_index: RawIndex,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionOpenValidatedEvent {
    pub position: PositionId,
    pub total_expo: Decimal,
    /// Set when the confirmed price forced a move to a lower tick.
    pub repositioned: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionCloseInitiatedEvent {
    pub user: Addr,
    pub position: PositionId,
    pub amount_to_close: Decimal,
    pub raw_index: RawIndex,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionCloseValidatedEvent {
    pub to: Addr,
    pub paid_out: Decimal,
    pub returned_to_vault: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingSettledEvent {
    pub price: Price,
    pub rate_per_period: Decimal,
    pub funding_amount: Decimal,
    pub pnl: Decimal,
    pub elapsed_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickLiquidatedEvent {
    pub tick: Tick,
    pub version: u64,
    pub positions: usize,
    pub expo: Decimal,
    pub remaining_collateral: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationRewardPaidEvent {
    pub liquidator: Addr,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaleActionEvictedEvent {
    pub validator: Addr,
    pub kind: String,
    pub evictor: Addr,
    pub security_deposit: Decimal,
}

/// Custody refused the security-deposit payout; the amount stays in custody
/// and is not counted as earned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityDepositRefundFailedEvent {
    pub recipient: Addr,
    pub amount: Decimal,
}
