// 6.0: pending action queue. every deposit/withdrawal/open/close is two-phase:
// an initiate call parks the action here and a later validate/execute call
// supplies the deferred price and finalizes it.
//
// one slot per validator address. actions are keyed by a monotonic raw index
// that is never reused; enqueue order is kept so third parties can scan for
// actionable (deadline-exceeded) entries and earn the security deposit.

use crate::types::{Addr, PositionId, Price, RawIndex, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueueError {
    #[error("validator {validator} already has a pending action")]
    PendingActionExists { validator: Addr },

    #[error("validator {validator} has no pending action")]
    NoPendingAction { validator: Addr },
}

/// Fields shared by every pending action kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionMeta {
    pub user: Addr,
    pub to: Addr,
    pub validator: Addr,
    pub timestamp: Timestamp,
    pub security_deposit: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingDeposit {
    pub meta: ActionMeta,
    pub amount: Decimal,
    pub price_snapshot: Price,
    pub vault_balance_snapshot: Decimal,
    pub shares_supply_snapshot: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingWithdrawal {
    pub meta: ActionMeta,
    pub shares: Decimal,
    pub price_snapshot: Price,
    pub vault_balance_snapshot: Decimal,
    pub shares_supply_snapshot: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOpen {
    pub meta: ActionMeta,
    pub position: PositionId,
    pub amount: Decimal,
    pub price_snapshot: Price,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingClose {
    pub meta: ActionMeta,
    pub amount_to_close: Decimal,
    pub expo_to_close: Decimal,
    /// Effective liquidation price of the source tick at initiate time.
    pub liq_price: Decimal,
    /// Accumulator value at initiate, so the liquidation price can be
    /// re-dragged to the validation-time funding state.
    pub liq_multiplier_snapshot: Decimal,
    /// Value detached from the long balance at initiate; the payout cap.
    pub detached_value: Decimal,
}

// one variant per action kind with kind-specific payloads; the discriminant
// is what validate/execute dispatch on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PendingAction {
    Deposit(PendingDeposit),
    Withdrawal(PendingWithdrawal),
    Open(PendingOpen),
    Close(PendingClose),
}

impl PendingAction {
    pub fn meta(&self) -> &ActionMeta {
        match self {
            PendingAction::Deposit(a) => &a.meta,
            PendingAction::Withdrawal(a) => &a.meta,
            PendingAction::Open(a) => &a.meta,
            PendingAction::Close(a) => &a.meta,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PendingAction::Deposit(_) => "deposit",
            PendingAction::Withdrawal(_) => "withdrawal",
            PendingAction::Open(_) => "open",
            PendingAction::Close(_) => "close",
        }
    }

    pub fn is_stale(&self, now: Timestamp, deadline_ms: i64) -> bool {
        self.meta().timestamp.age_millis(now) > deadline_ms
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PendingQueue {
    actions: HashMap<RawIndex, PendingAction>,
    // enqueue order; entries whose raw index no longer resolves are skipped
    order: VecDeque<RawIndex>,
    by_validator: HashMap<Addr, RawIndex>,
    next_raw: u64,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    // 6.1: take the validator's slot. a fresh occupant rejects the caller; a
    // stale one (age past the deadline) is handed back for displacement.
    pub fn push(
        &mut self,
        action: PendingAction,
        now: Timestamp,
        deadline_ms: i64,
    ) -> Result<(RawIndex, Option<PendingAction>), QueueError> {
        let validator = action.meta().validator;
        let evicted = match self.by_validator.get(&validator).copied() {
            Some(raw) => {
                let existing = self
                    .actions
                    .get(&raw)
                    .expect("by_validator points at a live action");
                if !existing.is_stale(now, deadline_ms) {
                    return Err(QueueError::PendingActionExists { validator });
                }
                self.remove(raw)
            }
            None => None,
        };

        let raw = RawIndex(self.next_raw);
        self.next_raw += 1;
        self.actions.insert(raw, action);
        self.order.push_back(raw);
        self.by_validator.insert(validator, raw);
        Ok((raw, evicted))
    }

    pub fn get(&self, raw: RawIndex) -> Option<&PendingAction> {
        self.actions.get(&raw)
    }

    pub fn get_for_validator(&self, validator: Addr) -> Option<(RawIndex, &PendingAction)> {
        let raw = self.by_validator.get(&validator).copied()?;
        self.actions.get(&raw).map(|a| (raw, a))
    }

    /// Removes and returns the action at `raw`, freeing its validator slot.
    pub fn remove(&mut self, raw: RawIndex) -> Option<PendingAction> {
        let action = self.actions.remove(&raw)?;
        let validator = action.meta().validator;
        if self.by_validator.get(&validator) == Some(&raw) {
            self.by_validator.remove(&validator);
        }
        self.drop_dead_front();
        Some(action)
    }

    pub fn take_for_validator(
        &mut self,
        validator: Addr,
    ) -> Result<(RawIndex, PendingAction), QueueError> {
        let raw = self
            .by_validator
            .get(&validator)
            .copied()
            .ok_or(QueueError::NoPendingAction { validator })?;
        let action = self
            .remove(raw)
            .expect("by_validator points at a live action");
        Ok((raw, action))
    }

    // 6.2: deadline-exceeded entries in enqueue order, starting at live queue
    // position `start`, at most `count` of them.
    pub fn actionable(
        &self,
        now: Timestamp,
        deadline_ms: i64,
        start: usize,
        count: usize,
    ) -> Vec<(RawIndex, &PendingAction)> {
        self.order
            .iter()
            .filter_map(|raw| self.actions.get(raw).map(|a| (*raw, a)))
            .skip(start)
            .take_while(|(_, a)| a.is_stale(now, deadline_ms))
            .take(count)
            .collect()
    }

    /// Live entries in enqueue order.
    pub fn iter(&self) -> impl Iterator<Item = (RawIndex, &PendingAction)> {
        self.order
            .iter()
            .filter_map(|raw| self.actions.get(raw).map(|a| (*raw, a)))
    }

    fn drop_dead_front(&mut self) {
        while let Some(front) = self.order.front() {
            if self.actions.contains_key(front) {
                break;
            }
            self.order.pop_front();
        }
    }
}
