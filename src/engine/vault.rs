// 12.3: vault-side entry points: two-phase deposits and withdrawals.
// initiate parks the action with a price snapshot; validate (execute.rs)
// supplies the confirmed price and applies the ledger effect.

use super::core::Engine;
use super::results::{CoreError, Initiated};
use crate::custody::{AssetCustody, BurnToken, RewardSink};
use crate::events::{DepositInitiatedEvent, EventPayload, WithdrawalInitiatedEvent};
use crate::imbalance::{check_deposit, check_withdrawal};
use crate::pending::{ActionMeta, PendingAction, PendingDeposit, PendingWithdrawal};
use crate::types::{Addr, Price};
use rust_decimal::Decimal;

impl<C: AssetCustody, B: BurnToken, R: RewardSink> Engine<C, B, R> {
    // 12.3.1: deposit `amount` of the settlement asset against future vault
    // shares. assets and the security deposit move into custody now; shares
    // are minted at validation against validation-time balances.
    pub fn initiate_deposit(
        &mut self,
        user: Addr,
        to: Addr,
        validator: Addr,
        amount: Decimal,
        price: Price,
    ) -> Result<Initiated, CoreError> {
        if amount <= Decimal::ZERO {
            return Err(CoreError::ZeroAmount);
        }
        if user.is_zero() || to.is_zero() || validator.is_zero() {
            return Err(CoreError::ZeroAddress);
        }

        let report = self.settle_and_liquidate(price, user);
        if report.pending {
            return Ok(Initiated::PendingLiquidations);
        }

        let evicted_refund = self.displace_stale(validator, user)?;

        check_deposit(&self.state.snapshot(), amount, self.params.limits.deposit)?;

        self.custody
            .transfer_in(user, amount + self.params.security_deposit)
            .map_err(CoreError::PaymentCallbackFailed)?;

        let action = PendingAction::Deposit(PendingDeposit {
            meta: ActionMeta {
                user,
                to,
                validator,
                timestamp: self.current_time,
                security_deposit: self.params.security_deposit,
            },
            amount,
            price_snapshot: price,
            vault_balance_snapshot: self.state.balance_vault,
            shares_supply_snapshot: self.state.shares_supply,
        });
        let (raw_index, _) = self.queue.push(
            action,
            self.current_time,
            self.params.validation_deadline_ms,
        )?;

        self.state.pending_vault += amount;

        self.emit_event(EventPayload::DepositInitiated(DepositInitiatedEvent {
            user,
            to,
            validator,
            amount,
            raw_index,
        }));

        Ok(Initiated::Queued {
            raw_index,
            evicted_refund,
        })
    }

    // 12.3.2: redeem `shares` for settlement assets. only the security deposit
    // moves now; the asset amount is fixed at validation-time balances. the
    // estimated payout is subtracted from the pending vault delta so guard
    // checks see the withdrawal coming.
    pub fn initiate_withdrawal(
        &mut self,
        user: Addr,
        to: Addr,
        validator: Addr,
        shares: Decimal,
        price: Price,
    ) -> Result<Initiated, CoreError> {
        if shares <= Decimal::ZERO {
            return Err(CoreError::ZeroAmount);
        }
        if user.is_zero() || to.is_zero() || validator.is_zero() {
            return Err(CoreError::ZeroAddress);
        }
        if shares > self.state.shares_supply {
            return Err(CoreError::InsufficientShares {
                requested: shares,
                supply: self.state.shares_supply,
            });
        }

        let report = self.settle_and_liquidate(price, user);
        if report.pending {
            return Ok(Initiated::PendingLiquidations);
        }

        let evicted_refund = self.displace_stale(validator, user)?;

        let estimate = shares * self.state.balance_vault / self.state.shares_supply;
        check_withdrawal(
            &self.state.snapshot(),
            estimate,
            self.params.limits.withdrawal_soft,
            self.params.withdrawal_formula,
        )?;

        self.custody
            .transfer_in(user, self.params.security_deposit)
            .map_err(CoreError::PaymentCallbackFailed)?;

        let action = PendingAction::Withdrawal(PendingWithdrawal {
            meta: ActionMeta {
                user,
                to,
                validator,
                timestamp: self.current_time,
                security_deposit: self.params.security_deposit,
            },
            shares,
            price_snapshot: price,
            vault_balance_snapshot: self.state.balance_vault,
            shares_supply_snapshot: self.state.shares_supply,
        });
        let (raw_index, _) = self.queue.push(
            action,
            self.current_time,
            self.params.validation_deadline_ms,
        )?;

        self.state.pending_vault -= estimate;

        self.emit_event(EventPayload::WithdrawalInitiated(WithdrawalInitiatedEvent {
            user,
            to,
            validator,
            shares,
            raw_index,
        }));

        Ok(Initiated::Queued {
            raw_index,
            evicted_refund,
        })
    }
}
