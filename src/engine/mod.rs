// 12.0: the protocol engine. coordinates settlement, liquidation, the
// imbalance guards, and the two-phase action queue over the tick ledger.
// deterministic and event-driven with no external I/O.

mod config;
mod core;
mod execute;
mod long;
mod results;
mod vault;

pub use config::EngineConfig;
pub use core::{CoreState, Engine, MockEngine};
pub use results::{
    CloseOutcome, CoreError, DepositOutcome, ExecutionReport, Initiated, ItemOutcome,
    OpenOutcome, Validated, ValidateOutcome, WithdrawalOutcome,
};
