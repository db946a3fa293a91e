// 5.0: funding and settlement. given elapsed time and a new price, recompute
// the vault/long split: move unrealized long PnL between the sides and apply
// a funding transfer sized by the exposure imbalance. runs before any guard
// or liquidation logic so everything downstream sees up-to-date balances.
//
// all functions are pure; the engine applies the returned settlement.

use crate::config::CoreParams;
use crate::types::Price;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub new_balance_vault: Decimal,
    pub new_balance_long: Decimal,
    /// Signed funding rate over a full period. Positive: longs pay the vault.
    pub rate_per_period: Decimal,
    /// Asset units moved from long to vault for this settlement (signed).
    pub funding_amount: Decimal,
    /// Asset-denominated long PnL moved from vault to long (signed).
    pub pnl: Decimal,
    pub elapsed_ms: i64,
}

// 5.1: signed imbalance of the two exposures, normalized by the larger side.
// zero when both sides are empty. result is in (-1, 1].
pub fn imbalance_ratio(long_expo: Decimal, vault_expo: Decimal) -> Decimal {
    let reference = long_expo.max(vault_expo);
    if reference <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (long_expo - vault_expo) / reference
}

// 5.2: sign-preserving square keeps small imbalances cheap and punishes
// one-sided books quadratically.
pub fn funding_rate(imbalance: Decimal, funding_sf: Decimal) -> Decimal {
    funding_sf * imbalance * imbalance.abs()
}

/// Asset-denominated PnL of the whole long side when the price moves from
/// `last_price` to `price`.
pub fn long_pnl(total_expo: Decimal, last_price: Price, price: Price) -> Decimal {
    total_expo * (price.value() - last_price.value()) / price.value()
}

// 5.3: the full settlement computation. conserves vault + long exactly; if a
// transfer would overdraw one side it is capped at that side's balance.
pub fn compute_settlement(
    balance_vault: Decimal,
    balance_long: Decimal,
    total_expo: Decimal,
    last_price: Price,
    price: Price,
    elapsed_ms: i64,
    params: &CoreParams,
) -> Settlement {
    let long_expo = total_expo - balance_long;
    let vault_expo = balance_vault;

    let rate = funding_rate(imbalance_ratio(long_expo, vault_expo), params.funding_sf);
    let funding_amount = if elapsed_ms > 0 {
        rate * Decimal::from(elapsed_ms) / Decimal::from(params.funding_period_ms) * long_expo
    } else {
        Decimal::ZERO
    };
    let pnl = long_pnl(total_expo, last_price, price);

    let total = balance_vault + balance_long;
    let mut new_long = balance_long + pnl - funding_amount;
    let mut new_vault = balance_vault - pnl + funding_amount;
    if new_long < Decimal::ZERO {
        new_long = Decimal::ZERO;
        new_vault = total;
    } else if new_vault < Decimal::ZERO {
        new_vault = Decimal::ZERO;
        new_long = total;
    }

    Settlement {
        new_balance_vault: new_vault,
        new_balance_long: new_long,
        rate_per_period: rate,
        funding_amount,
        pnl,
        elapsed_ms,
    }
}
