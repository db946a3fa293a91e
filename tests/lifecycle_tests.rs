//! End-to-end lifecycle tests.
//!
//! Each test drives the engine through a full initiate/validate (or
//! initiate/execute) cycle and checks balances, share supply, and queue
//! state at every step.

use deltavault_core::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const ALICE: Addr = Addr(1);
const BOB: Addr = Addr(2);
const KEEPER: Addr = Addr(9);

fn price(value: Decimal) -> Price {
    Price::new_unchecked(value)
}

fn engine() -> MockEngine {
    let mut engine = MockEngine::with_mocks(CoreParams::permissive(), price(dec!(2000)));
    engine.set_time(Timestamp::from_millis(1_000));
    for user in [ALICE, BOB, KEEPER] {
        engine.custody_mut().fund(user, dec!(10_000));
    }
    engine
}

fn seed_vault(engine: &mut MockEngine, amount: Decimal) {
    engine
        .initiate_deposit(ALICE, ALICE, ALICE, amount, price(dec!(2000)))
        .unwrap();
    engine.advance_time(24_000);
    engine.validate(ALICE, price(dec!(2000))).unwrap();
}

fn open_validated(engine: &mut MockEngine, user: Addr, amount: Decimal, liq: Decimal) -> PositionId {
    engine
        .initiate_open(user, user, user, amount, liq, price(dec!(2000)))
        .unwrap();
    engine.advance_time(24_000);
    match engine.validate(user, price(dec!(2000))).unwrap() {
        Validated::Done(ValidateOutcome::Open(o)) => o.position,
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn bootstrap_deposit_mints_one_to_one() {
    let mut e = engine();

    let initiated = e
        .initiate_deposit(ALICE, ALICE, ALICE, dec!(1000), price(dec!(2000)))
        .unwrap();
    assert!(initiated.raw_index().is_some());
    // the amount is in the pending bucket, not the vault yet
    assert_eq!(e.state().balance_vault, Decimal::ZERO);
    assert_eq!(e.state().pending_vault, dec!(1000));

    e.advance_time(24_000);
    let outcome = e.validate(ALICE, price(dec!(2000))).unwrap();
    let Validated::Done(ValidateOutcome::Deposit(d)) = outcome else {
        panic!("expected a deposit outcome");
    };
    assert_eq!(d.shares_minted, dec!(1000));
    assert_eq!(d.burn_amount, dec!(10));
    assert_eq!(e.state().balance_vault, dec!(1000));
    assert_eq!(e.state().pending_vault, Decimal::ZERO);
    assert_eq!(e.state().shares_supply, dec!(1000));
    assert_eq!(e.burner().burned_by(ALICE), dec!(10));
    assert_eq!(e.pending_count(), 0);
}

#[test]
fn second_deposit_mints_against_validation_time_balances() {
    let mut e = engine();
    seed_vault(&mut e, dec!(1000));
    // a long position so a price move actually reprices the vault
    open_validated(&mut e, BOB, dec!(10), dec!(1600));

    e.advance_time(1_000);
    e.initiate_deposit(BOB, BOB, BOB, dec!(100), price(dec!(2000)))
        .unwrap();
    e.advance_time(24_000);

    // the price rises before validation: PnL drains the vault, so the same
    // 100 assets buy more shares than they would have at initiate time
    let vault_before = {
        // preview the settlement the validate call will apply
        let s = compute_settlement(
            e.state().balance_vault,
            e.state().balance_long,
            e.state().total_expo,
            e.state().last_price,
            price(dec!(2100)),
            24_000,
            e.params(),
        );
        s.new_balance_vault
    };
    let supply = e.state().shares_supply;

    let outcome = e.validate(BOB, price(dec!(2100))).unwrap();
    let Validated::Done(ValidateOutcome::Deposit(d)) = outcome else {
        panic!("expected a deposit outcome");
    };
    assert_eq!(d.shares_minted, dec!(100) * supply / vault_before);
    assert!(d.shares_minted > dec!(100));
}

#[test]
fn deposit_withdraw_round_trip_at_same_price() {
    let mut e = engine();
    let alice_start = e.custody().balance_of(ALICE);
    seed_vault(&mut e, dec!(500));

    let shares = e.state().shares_supply;
    e.initiate_withdrawal(ALICE, ALICE, ALICE, shares, price(dec!(2000)))
        .unwrap();
    e.advance_time(24_000);
    let outcome = e.validate(ALICE, price(dec!(2000))).unwrap();
    let Validated::Done(ValidateOutcome::Withdrawal(w)) = outcome else {
        panic!("expected a withdrawal outcome");
    };

    assert_eq!(w.assets_out, dec!(500));
    assert_eq!(e.state().balance_vault, Decimal::ZERO);
    assert_eq!(e.state().shares_supply, Decimal::ZERO);
    // both security deposits came back too
    assert_eq!(e.custody().balance_of(ALICE), alice_start);
}

#[test]
fn withdrawal_rejects_more_shares_than_supply() {
    let mut e = engine();
    seed_vault(&mut e, dec!(500));

    let err = e
        .initiate_withdrawal(ALICE, ALICE, ALICE, dec!(501), price(dec!(2000)))
        .unwrap_err();
    assert_eq!(
        err,
        CoreError::InsufficientShares {
            requested: dec!(501),
            supply: dec!(500),
        }
    );
}

#[test]
fn fresh_slot_rejects_second_initiate() {
    let mut e = engine();
    e.initiate_deposit(ALICE, ALICE, ALICE, dec!(100), price(dec!(2000)))
        .unwrap();

    e.advance_time(10_000);
    let err = e
        .initiate_deposit(BOB, BOB, ALICE, dec!(100), price(dec!(2000)))
        .unwrap_err();
    assert_eq!(
        err,
        CoreError::Queue(QueueError::PendingActionExists { validator: ALICE })
    );
}

#[test]
fn stale_slot_is_displaced_with_refund() {
    let mut e = engine();
    let bob_start = e.custody().balance_of(BOB);

    e.initiate_deposit(ALICE, ALICE, ALICE, dec!(100), price(dec!(2000)))
        .unwrap();
    e.advance_time(e.params().validation_deadline_ms + 1);

    // bob initiates into the same validator slot: alice's stale deposit is
    // finalized at the last settled price and bob collects her deposit
    let initiated = e
        .initiate_deposit(BOB, BOB, ALICE, dec!(50), price(dec!(2000)))
        .unwrap();
    let Initiated::Queued { evicted_refund, .. } = initiated else {
        panic!("expected a queued action");
    };
    assert_eq!(evicted_refund, e.params().security_deposit);

    // alice's deposit went through: shares exist, only bob's action is pending
    assert_eq!(e.state().balance_vault, dec!(100));
    assert_eq!(e.state().shares_supply, dec!(100));
    assert_eq!(e.state().pending_vault, dec!(50));
    assert_eq!(e.pending_count(), 1);
    assert_eq!(
        e.custody().balance_of(BOB),
        bob_start - dec!(50) - e.params().security_deposit + evicted_refund
    );

    let evicted = e
        .events()
        .iter()
        .any(|ev| matches!(&ev.payload, EventPayload::StaleActionEvicted(s) if s.evictor == BOB));
    assert!(evicted);
}

#[test]
fn third_party_executes_actionable_entries() {
    let mut e = engine();
    let raw = e
        .initiate_deposit(ALICE, ALICE, ALICE, dec!(100), price(dec!(2000)))
        .unwrap()
        .raw_index()
        .unwrap();

    // not actionable before the deadline
    assert!(e.get_actionable(0, 10).is_empty());
    let report = e
        .execute_pending(KEEPER, &[price(dec!(2000))], &[raw])
        .unwrap();
    assert_eq!(report.outcomes, vec![ItemOutcome::NotActionable { raw_index: raw }]);
    assert!(!report.any_executed());
    assert_eq!(e.pending_count(), 1);

    e.advance_time(e.params().validation_deadline_ms + 1);
    let actionable = e.get_actionable(0, 10);
    assert_eq!(actionable.len(), 1);
    assert_eq!(actionable[0].0, raw);

    let keeper_start = e.custody().balance_of(KEEPER);
    let report = e
        .execute_pending(KEEPER, &[price(dec!(2100))], &[raw])
        .unwrap();
    assert_eq!(report.executed_count(), 1);
    assert!(report.any_executed());
    assert_eq!(report.security_deposits_earned, e.params().security_deposit);
    assert_eq!(
        e.custody().balance_of(KEEPER),
        keeper_start + e.params().security_deposit
    );
    assert_eq!(e.state().balance_vault, dec!(100));
    assert_eq!(e.pending_count(), 0);

    // the raw index is spent
    let report = e
        .execute_pending(KEEPER, &[price(dec!(2100))], &[raw])
        .unwrap();
    assert_eq!(report.outcomes, vec![ItemOutcome::NotFound { raw_index: raw }]);
}

#[test]
fn rejected_deposit_refund_is_recorded_not_earned() {
    let mut e = engine();
    let raw = e
        .initiate_deposit(ALICE, ALICE, ALICE, dec!(100), price(dec!(2000)))
        .unwrap()
        .raw_index()
        .unwrap();
    e.advance_time(e.params().validation_deadline_ms + 1);

    let keeper_start = e.custody().balance_of(KEEPER);
    e.custody_mut().break_next_transfer_out = true;
    let report = e
        .execute_pending(KEEPER, &[price(dec!(2000))], &[raw])
        .unwrap();

    // the deposit itself went through, but the refund did not
    assert_eq!(report.executed_count(), 1);
    assert_eq!(report.security_deposits_earned, Decimal::ZERO);
    assert_eq!(e.custody().balance_of(KEEPER), keeper_start);
    assert_eq!(e.state().balance_vault, dec!(100));

    let deposit = e.params().security_deposit;
    let recorded = e.events().iter().any(|ev| {
        matches!(&ev.payload, EventPayload::SecurityDepositRefundFailed(r)
            if r.recipient == KEEPER && r.amount == deposit)
    });
    assert!(recorded);
}

#[test]
fn validate_surfaces_a_rejected_deposit_refund() {
    let mut e = engine();
    e.initiate_deposit(ALICE, ALICE, ALICE, dec!(100), price(dec!(2000)))
        .unwrap();
    e.advance_time(24_000);

    e.custody_mut().break_next_transfer_out = true;
    let err = e.validate(ALICE, price(dec!(2000))).unwrap_err();
    assert!(matches!(err, CoreError::PaymentCallbackFailed(_)));
    // the deferred effect still applied and the slot is free
    assert_eq!(e.state().balance_vault, dec!(100));
    assert_eq!(e.pending_count(), 0);
}

#[test]
fn execute_length_mismatch_leaves_state_untouched() {
    let mut e = engine();
    let raw = e
        .initiate_deposit(ALICE, ALICE, ALICE, dec!(100), price(dec!(2000)))
        .unwrap()
        .raw_index()
        .unwrap();
    e.advance_time(e.params().validation_deadline_ms + 1);

    let state_before = e.state().clone();
    let err = e
        .execute_pending(KEEPER, &[price(dec!(2000)), price(dec!(2100))], &[raw])
        .unwrap_err();
    assert_eq!(err, CoreError::LengthMismatch { prices: 2, indices: 1 });
    assert_eq!(e.state(), &state_before);
    assert_eq!(e.pending_count(), 1);
}

#[test]
fn open_validation_repositions_past_the_leverage_cap() {
    let mut e = engine();
    seed_vault(&mut e, dec!(1000));

    // liq 1800 at entry 2000 is exactly 10x, the cap
    e.initiate_open(BOB, BOB, BOB, dec!(10), dec!(1800), price(dec!(2000)))
        .unwrap();
    e.advance_time(24_000);

    // confirmed price of 1900 against liq 1800 would be 19x: the position
    // moves down to the tick targeting max leverage at 1900
    let outcome = e.validate(BOB, price(dec!(1900))).unwrap();
    let Validated::Done(ValidateOutcome::Open(o)) = outcome else {
        panic!("expected an open outcome");
    };
    assert!(o.repositioned);
    assert!(o.leverage <= e.params().max_leverage);
    assert_eq!(o.position.tick, Tick(17));
    assert_eq!(e.ledger().positions_in_tick(Tick(18)), 0);
    assert_eq!(e.ledger().positions_in_tick(Tick(17)), 1);
    // protocol expo tracks the repriced position
    assert_eq!(e.state().total_expo, o.total_expo);
}

#[test]
fn open_validation_reprices_in_place_within_the_cap() {
    let mut e = engine();
    seed_vault(&mut e, dec!(1000));

    e.initiate_open(BOB, BOB, BOB, dec!(10), dec!(1600), price(dec!(2000)))
        .unwrap();
    e.advance_time(24_000);

    let outcome = e.validate(BOB, price(dec!(2100))).unwrap();
    let Validated::Done(ValidateOutcome::Open(o)) = outcome else {
        panic!("expected an open outcome");
    };
    assert!(!o.repositioned);
    assert_eq!(o.position.tick, Tick(16));
    // cheaper leverage at a higher entry against the same liq price
    assert!(o.leverage < dec!(5));
    assert_eq!(e.state().total_expo, o.total_expo);
}

#[test]
fn close_pays_value_and_returns_remainder_to_vault() {
    let mut e = engine();
    seed_vault(&mut e, dec!(1000));
    let id = open_validated(&mut e, BOB, dec!(10), dec!(1600));

    let long_before = e.state().balance_long;
    e.advance_time(1_000);
    e.initiate_close(BOB, BOB, BOB, id, dec!(10), price(dec!(2000)))
        .unwrap();
    // the full value is detached from the long side up front
    assert!(e.state().balance_long < long_before);
    assert_eq!(e.ledger().live_positions(), 0);

    let vault_before = e.state().balance_vault;
    let bob_before = e.custody().balance_of(BOB);
    e.advance_time(24_000);
    let outcome = e.validate(BOB, price(dec!(1900))).unwrap();
    let Validated::Done(ValidateOutcome::Close(c)) = outcome else {
        panic!("expected a close outcome");
    };

    // the price fell between initiate and validate, so part of the escrowed
    // value flows back to the vault instead of the closer
    assert!(c.paid_out > Decimal::ZERO);
    assert!(c.returned_to_vault > Decimal::ZERO);
    assert_eq!(e.state().balance_vault, vault_before + c.returned_to_vault);
    assert_eq!(
        e.custody().balance_of(BOB),
        bob_before + c.paid_out + e.params().security_deposit
    );
}

#[test]
fn close_underwater_at_validation_pays_nothing() {
    let mut e = engine();
    seed_vault(&mut e, dec!(1000));
    let id = open_validated(&mut e, BOB, dec!(10), dec!(1600));

    e.advance_time(1_000);
    e.initiate_close(BOB, BOB, BOB, id, dec!(10), price(dec!(2000)))
        .unwrap();
    let detached = match e.pending_for(BOB) {
        Some((_, PendingAction::Close(c))) => c.detached_value,
        other => panic!("expected a pending close, got {other:?}"),
    };

    // the price falls through the liquidation price before validation: the
    // whole escrowed value goes to the vault
    let vault_before = e.state().balance_vault;
    e.advance_time(24_000);
    let outcome = e.validate(BOB, price(dec!(1550))).unwrap();
    let Validated::Done(ValidateOutcome::Close(c)) = outcome else {
        panic!("expected a close outcome");
    };
    assert_eq!(c.paid_out, Decimal::ZERO);
    assert_eq!(c.returned_to_vault, detached);
    assert!(e.state().balance_vault >= vault_before + detached);
}

#[test]
fn close_rejects_non_owner_and_oversized_amount() {
    let mut e = engine();
    seed_vault(&mut e, dec!(1000));
    let id = open_validated(&mut e, BOB, dec!(10), dec!(1600));
    e.advance_time(1_000);

    let err = e
        .initiate_close(ALICE, ALICE, ALICE, id, dec!(5), price(dec!(2000)))
        .unwrap_err();
    assert_eq!(err, CoreError::NotPositionOwner(id));

    let err = e
        .initiate_close(BOB, BOB, BOB, id, dec!(11), price(dec!(2000)))
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::Ledger(LedgerError::CloseAmountTooLarge { .. })
    ));
}

#[test]
fn either_close_bound_gates_initiate() {
    // the close detaches its exposure up front, so both close bounds are
    // enforced at initiate; validation applies no further bound
    for limits in [
        ImbalanceLimits {
            close_hard: Some(Bps::new(1)),
            ..ImbalanceLimits::disabled()
        },
        ImbalanceLimits {
            close_soft: Some(Bps::new(1)),
            ..ImbalanceLimits::disabled()
        },
    ] {
        let mut e = MockEngine::with_mocks(
            CoreParams {
                limits,
                ..CoreParams::permissive()
            },
            price(dec!(2000)),
        );
        e.set_time(Timestamp::from_millis(1_000));
        for user in [ALICE, BOB] {
            e.custody_mut().fund(user, dec!(10_000));
        }
        seed_vault(&mut e, dec!(1000));
        let id = open_validated(&mut e, BOB, dec!(10), dec!(1600));

        // a full close empties the long side: the imbalance lands at the
        // whole vault expo, far past a 1bps bound
        e.advance_time(1_000);
        let err = e
            .initiate_close(BOB, BOB, BOB, id, dec!(10), price(dec!(2000)))
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Imbalance(ImbalanceError::ImbalanceLimitReached { .. })
        ));
        assert_eq!(e.pending_count(), 0);
        assert_eq!(e.ledger().live_positions(), 1);
    }

    // wide enough at initiate means no rejection later either
    let mut e = MockEngine::with_mocks(
        CoreParams {
            limits: ImbalanceLimits {
                close_hard: Some(Bps::new(10_100)),
                ..ImbalanceLimits::disabled()
            },
            ..CoreParams::permissive()
        },
        price(dec!(2000)),
    );
    e.set_time(Timestamp::from_millis(1_000));
    for user in [ALICE, BOB] {
        e.custody_mut().fund(user, dec!(10_000));
    }
    seed_vault(&mut e, dec!(1000));
    let id = open_validated(&mut e, BOB, dec!(10), dec!(1600));
    e.advance_time(1_000);
    e.initiate_close(BOB, BOB, BOB, id, dec!(10), price(dec!(2000)))
        .unwrap();
    e.advance_time(24_000);
    let outcome = e.validate(BOB, price(dec!(2000))).unwrap();
    assert!(matches!(outcome, Validated::Done(ValidateOutcome::Close(_))));
}

#[test]
fn close_fails_hard_once_the_tick_is_liquidated() {
    let mut e = engine();
    seed_vault(&mut e, dec!(1000));
    let id = open_validated(&mut e, BOB, dec!(10), dec!(1600));

    e.advance_time(1_000);
    // the settlement pass inside initiate_close liquidates the crossed tick
    // before the position lookup runs
    let err = e
        .initiate_close(BOB, BOB, BOB, id, dec!(10), price(dec!(1500)))
        .unwrap_err();
    assert_eq!(
        err,
        CoreError::Ledger(LedgerError::StaleTickVersion { held: 0, current: 1 })
    );
    assert_eq!(e.ledger().live_positions(), 0);
}

#[test]
fn liquidation_pays_capped_reward_and_moves_value_to_vault() {
    let mut e = engine();
    seed_vault(&mut e, dec!(1000));
    for liq in [dec!(1800), dec!(1700), dec!(1600)] {
        open_validated(&mut e, BOB, dec!(10), liq);
    }

    let keeper_before = e.custody().balance_of(KEEPER);
    e.advance_time(1_000);
    let report = e.liquidate(KEEPER, price(dec!(1550)));

    assert_eq!(report.ticks_liquidated(), 3);
    assert!(!report.pending);
    assert_eq!(e.ledger().live_positions(), 0);
    assert_eq!(e.state().total_expo, Decimal::ZERO);
    assert_eq!(e.state().balance_long, Decimal::ZERO);
    assert_eq!(
        e.custody().balance_of(KEEPER),
        keeper_before + report.reward
    );
    assert_eq!(e.rewards().paid_to(KEEPER), report.reward);
}

#[test]
fn saturated_liquidation_pass_blocks_initiates() {
    let mut e = MockEngine::with_mocks(
        CoreParams {
            max_liquidation_iterations: 2,
            ..CoreParams::permissive()
        },
        price(dec!(2000)),
    );
    e.set_time(Timestamp::from_millis(1_000));
    for user in [ALICE, BOB] {
        e.custody_mut().fund(user, dec!(10_000));
    }
    seed_vault(&mut e, dec!(1000));
    for liq in [dec!(1800), dec!(1700), dec!(1600), dec!(1500)] {
        open_validated(&mut e, BOB, dec!(10), liq);
    }

    // four crossed ticks against a two-tick cap: the initiate is refused
    // without touching the queue
    e.advance_time(1_000);
    let initiated = e
        .initiate_deposit(ALICE, ALICE, ALICE, dec!(100), price(dec!(1400)))
        .unwrap();
    assert_eq!(initiated, Initiated::PendingLiquidations);
    assert_eq!(e.pending_count(), 0);

    // a dedicated pass catches up, then the deposit goes through
    e.liquidate(ALICE, price(dec!(1400)));
    let initiated = e
        .initiate_deposit(ALICE, ALICE, ALICE, dec!(100), price(dec!(1400)))
        .unwrap();
    assert!(initiated.raw_index().is_some());
}

#[test]
fn zero_amount_and_zero_address_are_rejected() {
    let mut e = engine();
    assert_eq!(
        e.initiate_deposit(ALICE, ALICE, ALICE, Decimal::ZERO, price(dec!(2000)))
            .unwrap_err(),
        CoreError::ZeroAmount
    );
    assert_eq!(
        e.initiate_deposit(ALICE, Addr::ZERO, ALICE, dec!(1), price(dec!(2000)))
            .unwrap_err(),
        CoreError::ZeroAddress
    );
    assert_eq!(
        e.initiate_open(ALICE, ALICE, Addr::ZERO, dec!(1), dec!(1600), price(dec!(2000)))
            .unwrap_err(),
        CoreError::ZeroAddress
    );
}

#[test]
fn failed_payment_callback_leaves_no_partial_effect() {
    let mut e = engine();
    seed_vault(&mut e, dec!(1000));
    let state_before = e.state().clone();
    let positions_before = e.ledger().live_positions();

    e.custody_mut().break_next_transfer_in = true;
    e.advance_time(1_000);
    let err = e
        .initiate_open(BOB, BOB, BOB, dec!(10), dec!(1600), price(dec!(2000)))
        .unwrap_err();
    assert!(matches!(err, CoreError::PaymentCallbackFailed(_)));
    // the speculative ledger insert was rolled back
    assert_eq!(e.ledger().live_positions(), positions_before);
    assert_eq!(e.state().balance_long, state_before.balance_long);
    assert_eq!(e.state().total_expo, state_before.total_expo);
    assert_eq!(e.pending_count(), 0);
}
