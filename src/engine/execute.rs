// 12.5: the second phase. validate/execute resolve a parked action against a
// confirmed price: deposits mint shares at validation-time balances,
// withdrawals pay out and burn, opens reprice (and reposition past the
// leverage cap), closes settle the escrowed value against the dragged
// liquidation price. stale-slot displacement lives here too since it reuses
// the same apply path.

use super::core::Engine;
use super::results::{
    CloseOutcome, CoreError, DepositOutcome, ExecutionReport, ItemOutcome, OpenOutcome,
    Validated, ValidateOutcome, WithdrawalOutcome,
};
use crate::custody::{AssetCustody, BurnToken, RewardSink};
use crate::events::{
    DepositValidatedEvent, EventPayload, PositionCloseValidatedEvent,
    PositionOpenValidatedEvent, SecurityDepositRefundFailedEvent, StaleActionEvictedEvent,
    WithdrawalValidatedEvent,
};
use crate::imbalance::check_withdrawal;
use crate::pending::{
    PendingAction, PendingClose, PendingDeposit, PendingOpen, PendingWithdrawal, QueueError,
};
use crate::tick::{expo_for_liq_price, position_value, Position};
use crate::types::{Addr, Price, RawIndex};
use rust_decimal::Decimal;

impl<C: AssetCustody, B: BurnToken, R: RewardSink> Engine<C, B, R> {
    // 12.5.1: validate the caller's own pending action at the confirmed price.
    // the security deposit comes back to the validator whether or not the
    // deferred effect succeeds; the slot is consumed either way. a refund the
    // custody refuses surfaces as PaymentCallbackFailed.
    pub fn validate(&mut self, validator: Addr, price: Price) -> Result<Validated, CoreError> {
        let report = self.settle_and_liquidate(price, validator);
        if report.pending {
            return Ok(Validated::PendingLiquidations);
        }

        let (_, action) = self.queue.take_for_validator(validator)?;
        let deposit = action.meta().security_deposit;
        let result = self.apply_pending(action, price);
        self.custody
            .transfer_out(validator, deposit)
            .map_err(CoreError::PaymentCallbackFailed)?;
        result.map(Validated::Done)
    }

    /// Deadline-exceeded entries in enqueue order, for third-party executors.
    pub fn get_actionable(&self, start: usize, count: usize) -> Vec<(RawIndex, &PendingAction)> {
        self.queue.actionable(
            self.current_time,
            self.params.validation_deadline_ms,
            start,
            count,
        )
    }

    // 12.5.2: third-party execution of deadline-exceeded actions, one confirmed
    // price per raw index. the whole batch is rejected before any settlement
    // when the slices disagree in length; after that each item fails soft.
    pub fn execute_pending(
        &mut self,
        caller: Addr,
        prices: &[Price],
        raw_indices: &[RawIndex],
    ) -> Result<ExecutionReport, CoreError> {
        if prices.len() != raw_indices.len() {
            return Err(CoreError::LengthMismatch {
                prices: prices.len(),
                indices: raw_indices.len(),
            });
        }

        let mut report = ExecutionReport::default();
        for (&price, &raw_index) in prices.iter().zip(raw_indices) {
            let stale = match self.queue.get(raw_index) {
                Some(action) => {
                    action.is_stale(self.current_time, self.params.validation_deadline_ms)
                }
                None => {
                    report.outcomes.push(ItemOutcome::NotFound { raw_index });
                    continue;
                }
            };
            if !stale {
                report.outcomes.push(ItemOutcome::NotActionable { raw_index });
                continue;
            }

            let liq = self.settle_and_liquidate(price, caller);
            if liq.pending {
                report
                    .outcomes
                    .push(ItemOutcome::LiquidationsPending { raw_index });
                continue;
            }

            // re-resolve: the settlement pass cannot remove queue entries, but
            // keep the lookup fallible rather than assuming
            let Some(action) = self.queue.remove(raw_index) else {
                report.outcomes.push(ItemOutcome::NotFound { raw_index });
                continue;
            };
            let deposit = action.meta().security_deposit;
            match self.apply_pending(action, price) {
                Ok(outcome) => report
                    .outcomes
                    .push(ItemOutcome::Executed { raw_index, outcome }),
                Err(error) => report
                    .outcomes
                    .push(ItemOutcome::Failed { raw_index, error }),
            }
            // only deposits custody actually paid count as earned
            match self.custody.transfer_out(caller, deposit) {
                Ok(()) => report.security_deposits_earned += deposit,
                Err(_) => self.emit_event(EventPayload::SecurityDepositRefundFailed(
                    SecurityDepositRefundFailedEvent {
                        recipient: caller,
                        amount: deposit,
                    },
                )),
            }
        }
        Ok(report)
    }

    // 12.5.3: displace a stale occupant of `validator`'s slot on behalf of a
    // new initiate. the displaced action is finalized at the last settled
    // price and its security deposit goes to the caller. a fresh occupant
    // still rejects the initiate.
    pub(super) fn displace_stale(
        &mut self,
        validator: Addr,
        caller: Addr,
    ) -> Result<Decimal, CoreError> {
        match self.queue.get_for_validator(validator) {
            None => return Ok(Decimal::ZERO),
            Some((_, occupant)) => {
                if !occupant.is_stale(self.current_time, self.params.validation_deadline_ms) {
                    return Err(QueueError::PendingActionExists { validator }.into());
                }
            }
        }

        let (_, action) = self.queue.take_for_validator(validator)?;
        let deposit = action.meta().security_deposit;
        let kind = action.kind().to_string();
        let price = self.state.last_price;
        // a failed deferred effect still frees the slot
        let _ = self.apply_pending(action, price);
        let refunded = match self.custody.transfer_out(caller, deposit) {
            Ok(()) => deposit,
            Err(_) => {
                self.emit_event(EventPayload::SecurityDepositRefundFailed(
                    SecurityDepositRefundFailedEvent {
                        recipient: caller,
                        amount: deposit,
                    },
                ));
                Decimal::ZERO
            }
        };

        self.emit_event(EventPayload::StaleActionEvicted(StaleActionEvictedEvent {
            validator,
            kind,
            evictor: caller,
            security_deposit: refunded,
        }));
        Ok(refunded)
    }

    // 12.6: the shared apply path. callers have already settled at `price` and
    // removed the action from the queue; whatever happens here the slot stays
    // free.
    pub(super) fn apply_pending(
        &mut self,
        action: PendingAction,
        price: Price,
    ) -> Result<ValidateOutcome, CoreError> {
        match action {
            PendingAction::Deposit(a) => self.apply_deposit(a).map(ValidateOutcome::Deposit),
            PendingAction::Withdrawal(a) => {
                self.apply_withdrawal(a).map(ValidateOutcome::Withdrawal)
            }
            PendingAction::Open(a) => self.apply_open(a, price).map(ValidateOutcome::Open),
            PendingAction::Close(a) => self.apply_close(a, price).map(ValidateOutcome::Close),
        }
    }

    // 12.6.1: mint shares against validation-time balances. the asset amount
    // moved into custody at initiate; here it leaves the pending bucket and
    // becomes vault balance.
    fn apply_deposit(&mut self, a: PendingDeposit) -> Result<DepositOutcome, CoreError> {
        self.state.pending_vault -= a.amount;

        let shares = if self.state.shares_supply.is_zero()
            || self.state.balance_vault <= Decimal::ZERO
        {
            a.amount
        } else {
            a.amount * self.state.shares_supply / self.state.balance_vault
        };
        self.state.balance_vault += a.amount;
        self.state.shares_supply += shares;

        let burn_amount = shares * self.params.burn_ratio;
        self.burner
            .burn(a.meta.user, burn_amount)
            .map_err(CoreError::PaymentCallbackFailed)?;

        self.emit_event(EventPayload::DepositValidated(DepositValidatedEvent {
            user: a.meta.user,
            to: a.meta.to,
            amount: a.amount,
            shares_minted: shares,
            burn_amount,
        }));
        Ok(DepositOutcome {
            shares_minted: shares,
            burn_amount,
        })
    }

    // 12.6.2: pay out at validation-time balances. the hard bound gates here,
    // not at initiate: a failed check consumes the action and leaves the
    // shares unburned.
    fn apply_withdrawal(&mut self, a: PendingWithdrawal) -> Result<WithdrawalOutcome, CoreError> {
        // undo the initiate-time pending estimate before anything can fail
        let estimate = a.shares * a.vault_balance_snapshot / a.shares_supply_snapshot;
        self.state.pending_vault += estimate;

        // a concurrent withdrawal may have burned supply below this one
        if a.shares > self.state.shares_supply {
            return Err(CoreError::InsufficientShares {
                requested: a.shares,
                supply: self.state.shares_supply,
            });
        }
        let assets_out = a.shares * self.state.balance_vault / self.state.shares_supply;
        check_withdrawal(
            &self.state.snapshot(),
            assets_out,
            self.params.limits.withdrawal_hard,
            self.params.withdrawal_formula,
        )?;

        self.custody
            .transfer_out(a.meta.to, assets_out)
            .map_err(CoreError::PaymentCallbackFailed)?;
        self.state.balance_vault -= assets_out;
        self.state.shares_supply -= a.shares;

        self.emit_event(EventPayload::WithdrawalValidated(WithdrawalValidatedEvent {
            user: a.meta.user,
            to: a.meta.to,
            shares: a.shares,
            assets_out,
        }));
        Ok(WithdrawalOutcome { assets_out })
    }

    // 12.6.3: reprice the position at the confirmed price. the tick (and so
    // the liquidation price) is fixed at initiate; only the exposure moves,
    // unless the confirmed price pushes leverage past the cap, in which case
    // the position moves to the tick targeting max leverage.
    //
    // a stale tick version here means the tick was liquidated while pending;
    // the collateral was swept with it and there is nothing left to validate.
    fn apply_open(&mut self, a: PendingOpen, price: Price) -> Result<OpenOutcome, CoreError> {
        let position = self.ledger.get(&a.position)?.clone();
        let liq_now = self.ledger.effective_liq_price(a.position.tick);
        let new_expo = expo_for_liq_price(position.amount, price, liq_now);
        let leverage = new_expo / position.amount;

        let (id, total_expo, repositioned) = if leverage > self.params.max_leverage {
            let removed = self.ledger.remove(&a.position)?;
            let target_liq =
                price.value() * (Decimal::ONE - Decimal::ONE / self.params.max_leverage);
            let tick = self.ledger.tick_for_desired_price(target_liq);
            let liq = self.ledger.effective_liq_price(tick);
            let expo = expo_for_liq_price(removed.amount, price, liq);
            let id = self.ledger.insert(
                tick,
                Position {
                    total_expo: expo,
                    ..removed
                },
            );
            (id, expo, true)
        } else {
            self.ledger.update_expo(&a.position, new_expo)?;
            (a.position, new_expo, false)
        };

        self.state.total_expo += total_expo - position.total_expo;

        self.emit_event(EventPayload::PositionOpenValidated(
            PositionOpenValidatedEvent {
                position: id,
                total_expo,
                repositioned,
            },
        ));
        Ok(OpenOutcome {
            position: id,
            total_expo,
            leverage: total_expo / position.amount,
            repositioned,
        })
    }

    // 12.6.4: settle the escrowed close. the initiate-time liquidation price
    // is dragged to the current funding state through the multiplier ratio;
    // the payout is the exposure's value there, capped at what was detached.
    // the remainder accrues to the vault.
    fn apply_close(&mut self, a: PendingClose, price: Price) -> Result<CloseOutcome, CoreError> {
        let liq_now = a.liq_price * self.ledger.multiplier().value() / a.liq_multiplier_snapshot;
        let paid_out = position_value(a.expo_to_close, liq_now, price)
            .max(Decimal::ZERO)
            .min(a.detached_value);
        let returned_to_vault = a.detached_value - paid_out;

        if paid_out > Decimal::ZERO {
            self.custody
                .transfer_out(a.meta.to, paid_out)
                .map_err(CoreError::PaymentCallbackFailed)?;
        }
        self.state.balance_vault += returned_to_vault;

        self.emit_event(EventPayload::PositionCloseValidated(
            PositionCloseValidatedEvent {
                to: a.meta.to,
                paid_out,
                returned_to_vault,
            },
        ));
        Ok(CloseOutcome {
            paid_out,
            returned_to_vault,
        })
    }
}
