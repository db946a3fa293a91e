// 12.4: long-side entry points: two-phase position opens and closes.
//
// open inserts the position into the tick ledger immediately so its exposure
// is visible to funding and guards; validation reprices it at the confirmed
// price (and repositions it if that pushes leverage past the cap). close
// detaches (amount, expo) from the ledger immediately and escrows the
// detached value; validation settles the payout against the confirmed price.

use super::core::Engine;
use super::results::{CoreError, Initiated};
use crate::custody::{AssetCustody, BurnToken, RewardSink};
use crate::events::{EventPayload, PositionCloseInitiatedEvent, PositionOpenedEvent};
use crate::imbalance::{check_close, check_open};
use crate::pending::{ActionMeta, PendingAction, PendingClose, PendingOpen};
use crate::tick::{position_value, LedgerError};
use crate::types::{Addr, PositionId, Price};
use rust_decimal::Decimal;

impl<C: AssetCustody, B: BurnToken, R: RewardSink> Engine<C, B, R> {
    // 12.4.1: open a leveraged position with `amount` collateral liquidating
    // near `desired_liq_price`.
    pub fn initiate_open(
        &mut self,
        user: Addr,
        to: Addr,
        validator: Addr,
        amount: Decimal,
        desired_liq_price: Decimal,
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

        // insert first so the guard sees the exact exposure; roll back the
        // insertion if the guard or the payment callback rejects
        let (position_id, position) = self.ledger.open_position(
            user,
            to,
            amount,
            desired_liq_price,
            price,
            self.current_time,
            &self.params,
        )?;

        if let Err(e) = check_open(
            &self.state.snapshot(),
            amount,
            position.total_expo,
            self.params.limits.open,
        ) {
            self.ledger.remove(&position_id)?;
            return Err(e.into());
        }

        if let Err(e) = self
            .custody
            .transfer_in(user, amount + self.params.security_deposit)
        {
            self.ledger.remove(&position_id)?;
            return Err(CoreError::PaymentCallbackFailed(e));
        }

        self.state.balance_long += amount;
        self.state.total_expo += position.total_expo;

        let action = PendingAction::Open(PendingOpen {
            meta: ActionMeta {
                user,
                to,
                validator,
                timestamp: self.current_time,
                security_deposit: self.params.security_deposit,
            },
            position: position_id,
            amount,
            price_snapshot: price,
        });
        let (raw_index, _) = self.queue.push(
            action,
            self.current_time,
            self.params.validation_deadline_ms,
        )?;

        self.emit_event(EventPayload::PositionOpened(PositionOpenedEvent {
            user,
            to,
            validator,
            position: position_id,
            amount,
            total_expo: position.total_expo,
            raw_index,
        }));

        Ok(Initiated::Queued {
            raw_index,
            evicted_refund,
        })
    }

    // 12.4.2: close part or all of a position. fails hard with
    // StaleTickVersion when the position's tick was liquidated, including by
    // the settlement pass this very call just ran.
    pub fn initiate_close(
        &mut self,
        user: Addr,
        to: Addr,
        validator: Addr,
        position_id: PositionId,
        amount_to_close: Decimal,
        price: Price,
    ) -> Result<Initiated, CoreError> {
        if amount_to_close <= Decimal::ZERO {
            return Err(CoreError::ZeroAmount);
        }
        if user.is_zero() || to.is_zero() || validator.is_zero() {
            return Err(CoreError::ZeroAddress);
        }

        let report = self.settle_and_liquidate(price, user);
        if report.pending {
            return Ok(Initiated::PendingLiquidations);
        }

        let position = self.ledger.get(&position_id)?.clone();
        if position.user != user {
            return Err(CoreError::NotPositionOwner(position_id));
        }
        if amount_to_close > position.amount {
            return Err(LedgerError::CloseAmountTooLarge {
                requested: amount_to_close,
                available: position.amount,
            }
            .into());
        }

        let evicted_refund = self.displace_stale(validator, user)?;

        let expo_preview = if amount_to_close == position.amount {
            position.total_expo
        } else {
            position.total_expo * amount_to_close / position.amount
        };
        // the close bounds both gate initiate: the detach happens here, not at
        // validation, and either may be individually disabled
        let snap = self.state.snapshot();
        check_close(&snap, amount_to_close, expo_preview, self.params.limits.close_soft)?;
        check_close(&snap, amount_to_close, expo_preview, self.params.limits.close_hard)?;

        self.custody
            .transfer_in(user, self.params.security_deposit)
            .map_err(CoreError::PaymentCallbackFailed)?;

        let expo_closed = self.ledger.reduce(&position_id, amount_to_close)?;
        let liq_price = self.ledger.effective_liq_price(position_id.tick);
        let detached_value = position_value(expo_closed, liq_price, price)
            .max(Decimal::ZERO)
            .min(self.state.balance_long);

        self.state.balance_long -= detached_value;
        self.state.total_expo -= expo_closed;

        let action = PendingAction::Close(PendingClose {
            meta: ActionMeta {
                user,
                to,
                validator,
                timestamp: self.current_time,
                security_deposit: self.params.security_deposit,
            },
            amount_to_close,
            expo_to_close: expo_closed,
            liq_price,
            liq_multiplier_snapshot: self.ledger.multiplier().value(),
            detached_value,
        });
        let (raw_index, _) = self.queue.push(
            action,
            self.current_time,
            self.params.validation_deadline_ms,
        )?;

        self.emit_event(EventPayload::PositionCloseInitiated(
            PositionCloseInitiatedEvent {
                user,
                position: position_id,
                amount_to_close,
                raw_index,
            },
        ));

        Ok(Initiated::Queued {
            raw_index,
            evicted_refund,
        })
    }
}
