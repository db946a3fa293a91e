// 12.0.2: result types and errors for engine operations.

use crate::custody::CustodyError;
use crate::imbalance::ImbalanceError;
use crate::pending::QueueError;
use crate::tick::LedgerError;
use crate::types::{PositionId, RawIndex};
use rust_decimal::Decimal;

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum CoreError {
    #[error("amount must be positive")]
    ZeroAmount,

    #[error("zero address")]
    ZeroAddress,

    #[error("price list and index list lengths differ: {prices} vs {indices}")]
    LengthMismatch { prices: usize, indices: usize },

    #[error("payment callback failed: {0}")]
    PaymentCallbackFailed(CustodyError),

    #[error("caller does not own position {0}")]
    NotPositionOwner(PositionId),

    #[error("requested {requested} shares, only {supply} in supply")]
    InsufficientShares { requested: Decimal, supply: Decimal },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Imbalance(#[from] ImbalanceError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Result of an initiate call. `PendingLiquidations` is the structured
/// "try again after liquidation settles" signal, not an error: the bounded
/// liquidation pass ran out of iterations, so downstream balances are not
/// final yet and the action was not enqueued.
#[derive(Debug, Clone, PartialEq)]
pub enum Initiated {
    Queued {
        raw_index: RawIndex,
        /// Security deposit of a displaced stale action, credited to the caller.
        evicted_refund: Decimal,
    },
    PendingLiquidations,
}

impl Initiated {
    pub fn raw_index(&self) -> Option<RawIndex> {
        match self {
            Initiated::Queued { raw_index, .. } => Some(*raw_index),
            Initiated::PendingLiquidations => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DepositOutcome {
    pub shares_minted: Decimal,
    pub burn_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WithdrawalOutcome {
    pub assets_out: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenOutcome {
    pub position: PositionId,
    pub total_expo: Decimal,
    pub leverage: Decimal,
    pub repositioned: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CloseOutcome {
    pub paid_out: Decimal,
    pub returned_to_vault: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidateOutcome {
    Deposit(DepositOutcome),
    Withdrawal(WithdrawalOutcome),
    Open(OpenOutcome),
    Close(CloseOutcome),
}

/// Result of a validate call, mirroring [`Initiated`]: when the bounded
/// liquidation pass saturates, the slot is left untouched and the validator
/// should retry once liquidations have caught up.
#[derive(Debug, Clone, PartialEq)]
pub enum Validated {
    Done(ValidateOutcome),
    PendingLiquidations,
}

/// Per-item outcome of a bulk execution. Stale or missing entries fail soft
/// so one bad index does not abort the rest of the batch.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Executed {
        raw_index: RawIndex,
        outcome: ValidateOutcome,
    },
    /// The raw index no longer resolves (already finalized or evicted).
    NotFound { raw_index: RawIndex },
    /// The entry exists but has not aged past the validation deadline yet.
    NotActionable { raw_index: RawIndex },
    /// The settlement pass at this item's price ran out of liquidation
    /// iterations; the entry is left in place.
    LiquidationsPending { raw_index: RawIndex },
    /// The action resolved but its effect failed; the entry is consumed.
    Failed {
        raw_index: RawIndex,
        error: CoreError,
    },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecutionReport {
    pub outcomes: Vec<ItemOutcome>,
    pub security_deposits_earned: Decimal,
}

impl ExecutionReport {
    pub fn any_executed(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| matches!(o, ItemOutcome::Executed { .. }))
    }

    pub fn executed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ItemOutcome::Executed { .. }))
            .count()
    }
}
