// 4.0: imbalance guard. pure evaluators that compute the vault/long exposure
// imbalance a hypothetical action would leave behind and reject it past the
// configured bound. all four checks use post-action balances, including the
// pending (initiated, not yet validated) vault deltas.
//
// sign convention: the numerator is (side being grown - opposite side), so a
// positive result always means the action worsens one-sidedness in its own
// direction. the reference side is the long trading expo for deposit/open and
// the vault expo for withdrawal/close. bounds are closed: exactly at the
// limit passes.

use crate::config::WithdrawalImbalanceFormula;
use crate::types::Bps;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const BPS: Decimal = dec!(10000);

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ImbalanceError {
    #[error("imbalance limit reached: {imbalance_bps}bps")]
    ImbalanceLimitReached { imbalance_bps: Decimal },

    #[error("long trading expo is zero")]
    InvalidLongExpo,

    #[error("vault expo is zero")]
    InvalidVaultExpo,

    #[error("vault is empty")]
    EmptyVault,
}

/// Balance view the evaluators run against. Snapshot of `CoreState` plus the
/// in-flight pending vault delta.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExposureSnapshot {
    pub balance_vault: Decimal,
    pub balance_long: Decimal,
    pub total_expo: Decimal,
    pub pending_vault: Decimal,
}

impl ExposureSnapshot {
    pub fn long_trading_expo(&self) -> Decimal {
        self.total_expo - self.balance_long
    }

    pub fn vault_expo(&self) -> Decimal {
        self.balance_vault + self.pending_vault
    }
}

fn over_limit(imbalance_bps: Decimal, limit: Bps) -> Result<(), ImbalanceError> {
    if imbalance_bps > limit.as_decimal() {
        Err(ImbalanceError::ImbalanceLimitReached { imbalance_bps })
    } else {
        Ok(())
    }
}

// 4.1: deposit grows the vault side. reference side: current long trading expo.
pub fn check_deposit(
    snap: &ExposureSnapshot,
    amount: Decimal,
    limit: Option<Bps>,
) -> Result<(), ImbalanceError> {
    let Some(limit) = limit else { return Ok(()) };
    let long_expo = snap.long_trading_expo();
    if long_expo <= Decimal::ZERO {
        return Err(ImbalanceError::InvalidLongExpo);
    }
    let vault_after = snap.vault_expo() + amount;
    over_limit((vault_after - long_expo) * BPS / long_expo, limit)
}

// 4.2: open grows the long side by (expo - collateral). reference side: the
// post-action long trading expo.
pub fn check_open(
    snap: &ExposureSnapshot,
    amount: Decimal,
    total_expo_delta: Decimal,
    limit: Option<Bps>,
) -> Result<(), ImbalanceError> {
    let Some(limit) = limit else { return Ok(()) };
    let long_after = snap.long_trading_expo() + (total_expo_delta - amount);
    if long_after <= Decimal::ZERO {
        return Err(ImbalanceError::InvalidLongExpo);
    }
    over_limit((long_after - snap.vault_expo()) * BPS / long_after, limit)
}

// 4.3: withdrawal shrinks the vault side. the denominator convention is
// configurable (see config.rs); ratio division is the primary form.
pub fn check_withdrawal(
    snap: &ExposureSnapshot,
    assets_out: Decimal,
    limit: Option<Bps>,
    formula: WithdrawalImbalanceFormula,
) -> Result<(), ImbalanceError> {
    let Some(limit) = limit else { return Ok(()) };
    let vault_pre = snap.vault_expo();
    if vault_pre <= Decimal::ZERO {
        return Err(ImbalanceError::InvalidVaultExpo);
    }
    let vault_after = vault_pre - assets_out;
    let denom = match formula {
        WithdrawalImbalanceFormula::RatioDivision => vault_after,
        WithdrawalImbalanceFormula::LinearSubtraction => vault_pre,
    };
    if denom <= Decimal::ZERO {
        return Err(ImbalanceError::InvalidVaultExpo);
    }
    over_limit((snap.long_trading_expo() - vault_after) * BPS / denom, limit)
}

// 4.4: close shrinks the long side. reference side: current vault expo.
pub fn check_close(
    snap: &ExposureSnapshot,
    amount_to_close: Decimal,
    expo_to_close: Decimal,
    limit: Option<Bps>,
) -> Result<(), ImbalanceError> {
    let Some(limit) = limit else { return Ok(()) };
    let vault = snap.vault_expo();
    if vault <= Decimal::ZERO {
        return Err(ImbalanceError::EmptyVault);
    }
    let long_after = snap.long_trading_expo() - (expo_to_close - amount_to_close);
    over_limit((vault - long_after) * BPS / vault, limit)
}
