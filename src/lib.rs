// deltavault-core: leveraged-exposure accounting engine.
// solvency-first architecture: every action settles funding and runs a
// bounded liquidation pass before it touches balances.
// all computation is deterministic with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: Addr, Price, Bps, Tick, RawIndex, Timestamp
//   2.x  accumulator.rs: liquidation multiplier under funding drift
//   3.x  tick.rs: tick ledger: positions bucketed by liquidation price
//   4.x  imbalance.rs: vault/long imbalance guards with bps bounds
//   5.x  funding.rs: funding rate, PnL repricing, settlement math
//   6.x  pending.rs: two-phase pending action queue, validator slots
//   7.x  config.rs: protocol parameters, limits, presets
//   8.x  liquidation.rs: bounded crossed-tick liquidation walk
//   9.x  custody.rs: asset custody, burn token, reward sink (mocked)
//   10.x oracle.rs: price oracle abstraction (mocked)
//   11.x events.rs: state transition events for audit
//   12.x engine/: core engine: initiates, validation, execution

// core accounting modules
pub mod accumulator;
pub mod engine;
pub mod events;
pub mod funding;
pub mod imbalance;
pub mod liquidation;
pub mod pending;
pub mod tick;
pub mod types;

// integration modules
pub mod config;
pub mod custody;
pub mod oracle;

// re exports for convenience
pub use accumulator::*;
pub use config::*;
pub use custody::*;
pub use engine::*;
pub use events::*;
pub use funding::*;
pub use imbalance::*;
pub use liquidation::*;
pub use oracle::*;
pub use pending::*;
pub use tick::*;
pub use types::*;
