//! Delta-neutral Vault Core Simulation.
//!
//! Demonstrates the full engine lifecycle including two-phase deposits and
//! withdrawals, leveraged position opens and closes, funding settlement,
//! stale-action eviction, and liquidation cascades.

use deltavault_core::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const ALICE: Addr = Addr(1);
const BOB: Addr = Addr(2);
const KEEPER: Addr = Addr(9);

fn price(value: Decimal) -> Price {
    Price::new_unchecked(value)
}

fn main() {
    println!("Delta-neutral Vault Core Engine Simulation");
    println!("Vault Pool vs Tick-bucketed Longs, Deferred-price Settlement\n");

    scenario_1_vault_bootstrap();
    scenario_2_position_lifecycle();
    scenario_3_funding_and_pnl();
    scenario_4_imbalance_guards();
    scenario_5_stale_action_execution();
    scenario_6_liquidation_cascade();

    println!("\nAll simulations completed successfully.");
}

fn fresh_engine() -> MockEngine {
    let mut engine = MockEngine::with_mocks(CoreParams::permissive(), price(dec!(2000)));
    engine.set_time(Timestamp::now());
    for user in [ALICE, BOB, KEEPER] {
        engine.custody_mut().fund(user, dec!(10_000));
    }
    engine
}

/// Two-phase deposit and withdrawal with share minting.
fn scenario_1_vault_bootstrap() {
    println!("Scenario 1: Vault Bootstrap\n");

    let mut engine = fresh_engine();

    let initiated = engine
        .initiate_deposit(ALICE, ALICE, ALICE, dec!(1000), price(dec!(2000)))
        .unwrap();
    println!("  Alice initiates a 1000 deposit, queued as {}", initiated.raw_index().unwrap());

    engine.advance_time(24_000);
    let outcome = engine.validate(ALICE, price(dec!(2000))).unwrap();
    if let Validated::Done(ValidateOutcome::Deposit(d)) = outcome {
        println!("  Validated at 2000: {} shares minted, {} burn charged", d.shares_minted, d.burn_amount);
    }
    println!("  Vault balance: {}, share supply: {}\n", engine.state().balance_vault, engine.state().shares_supply);

    engine
        .initiate_withdrawal(ALICE, ALICE, ALICE, dec!(400), price(dec!(2000)))
        .unwrap();
    engine.advance_time(24_000);
    let outcome = engine.validate(ALICE, price(dec!(2000))).unwrap();
    if let Validated::Done(ValidateOutcome::Withdrawal(w)) = outcome {
        println!("  Alice redeems 400 shares for {} assets", w.assets_out);
    }
    println!("  Vault balance: {}, share supply: {}\n", engine.state().balance_vault, engine.state().shares_supply);
}

/// Open, validate, partially close, validate the close.
fn scenario_2_position_lifecycle() {
    println!("Scenario 2: Position Lifecycle\n");

    let mut engine = fresh_engine();
    seed_vault(&mut engine, dec!(1000));

    let initiated = engine
        .initiate_open(BOB, BOB, BOB, dec!(10), dec!(1600), price(dec!(2000)))
        .unwrap();
    println!("  Bob opens 10 collateral targeting liq 1600, queued as {}", initiated.raw_index().unwrap());

    engine.advance_time(24_000);
    let outcome = engine.validate(BOB, price(dec!(2010))).unwrap();
    let position = match outcome {
        Validated::Done(ValidateOutcome::Open(o)) => {
            println!("  Validated at 2010: expo {}, leverage {}, repositioned: {}", o.total_expo, o.leverage, o.repositioned);
            o.position
        }
        other => panic!("unexpected outcome: {other:?}"),
    };
    println!("  Long balance: {}, total expo: {}\n", engine.state().balance_long, engine.state().total_expo);

    engine
        .initiate_close(BOB, BOB, BOB, position, dec!(4), price(dec!(2010)))
        .unwrap();
    engine.advance_time(24_000);
    let outcome = engine.validate(BOB, price(dec!(2010))).unwrap();
    if let Validated::Done(ValidateOutcome::Close(c)) = outcome {
        println!("  Partial close of 4: paid out {}, returned to vault {}", c.paid_out, c.returned_to_vault);
    }
    println!("  Long balance: {}, total expo: {}\n", engine.state().balance_long, engine.state().total_expo);
}

/// Funding transfer and PnL repricing as time and price move.
fn scenario_3_funding_and_pnl() {
    println!("Scenario 3: Funding and PnL Settlement\n");

    let mut engine = fresh_engine();
    seed_vault(&mut engine, dec!(100));
    open_and_validate(&mut engine, BOB, dec!(50), dec!(1600));

    println!(
        "  Before: vault {}, long {}, long trading expo {}",
        engine.state().balance_vault,
        engine.state().balance_long,
        engine.state().long_trading_expo()
    );

    // a full funding period at an unchanged price: the heavier long side pays
    engine.advance_time(86_400_000);
    engine.liquidate(KEEPER, price(dec!(2000)));
    println!(
        "  After one period at 2000: vault {}, long {}",
        engine.state().balance_vault,
        engine.state().balance_long
    );

    // price rises: PnL flows from the vault to the long side
    engine.advance_time(1_000);
    engine.liquidate(KEEPER, price(dec!(2200)));
    println!(
        "  After repricing to 2200: vault {}, long {}\n",
        engine.state().balance_vault,
        engine.state().balance_long
    );
}

/// The directional bps bounds, evaluated against a balanced book.
fn scenario_4_imbalance_guards() {
    println!("Scenario 4: Imbalance Guards\n");

    // vault expo 100 against long trading expo 100
    let snap = ExposureSnapshot {
        balance_vault: dec!(100),
        balance_long: dec!(50),
        total_expo: dec!(150),
        pending_vault: Decimal::ZERO,
    };
    let limit = Some(Bps::new(2000));

    println!("  Balanced book, 2000bps bound on each side");
    println!("  Deposit of 20 (exactly at the bound): {:?}", check_deposit(&snap, dec!(20), limit));
    println!("  Deposit of 30: {:?}", check_deposit(&snap, dec!(30), limit));
    println!(
        "  Withdrawal of 30 (ratio form): {:?}\n",
        check_withdrawal(&snap, dec!(30), Some(Bps::new(2500)), WithdrawalImbalanceFormula::RatioDivision)
    );
}

/// Third parties finalize deadline-exceeded actions for the security deposit.
fn scenario_5_stale_action_execution() {
    println!("Scenario 5: Stale Action Execution\n");

    let mut engine = fresh_engine();
    seed_vault(&mut engine, dec!(1000));

    let initiated = engine
        .initiate_deposit(ALICE, ALICE, ALICE, dec!(100), price(dec!(2000)))
        .unwrap();
    let raw = initiated.raw_index().unwrap();
    println!("  Alice initiates a deposit but never validates it");

    engine.advance_time(engine.params().validation_deadline_ms + 1_000);
    let actionable = engine.get_actionable(0, 10);
    println!("  After the deadline, {} actionable entry found", actionable.len());

    let report = engine
        .execute_pending(KEEPER, &[price(dec!(2000))], &[raw])
        .unwrap();
    println!(
        "  Keeper executes it: executed={}, {} security deposit earned\n",
        report.any_executed(),
        report.security_deposits_earned
    );
}

/// Price collapse across several ticks, bounded pass by bounded pass.
fn scenario_6_liquidation_cascade() {
    println!("Scenario 6: Liquidation Cascade\n");

    let mut engine = fresh_engine();
    seed_vault(&mut engine, dec!(2000));
    for liq in [dec!(1800), dec!(1700), dec!(1600), dec!(1500)] {
        open_and_validate(&mut engine, BOB, dec!(10), liq);
    }
    println!("  Four positions opened with liq prices 1800 down to 1500");
    println!("  Live positions: {}, total expo: {}", engine.ledger().live_positions(), engine.state().total_expo);

    // the keeper resolves the crash price through its oracle
    let mut oracle = MockOracle::new(price(dec!(2000)));
    engine.advance_time(1_000);
    oracle.set_price(price(dec!(1450)), engine.time());
    let quote = oracle.get_price(ProtocolAction::Liquidation, &[]);
    let report = engine.liquidate(KEEPER, quote.price);
    println!(
        "  Price crashes to {}: {} ticks wiped, {} positions liquidated, reward {}",
        quote.price,
        report.ticks_liquidated(),
        report.positions_liquidated(),
        report.reward
    );
    println!(
        "  Live positions: {}, vault {}, long {}",
        engine.ledger().live_positions(),
        engine.state().balance_vault,
        engine.state().balance_long
    );
    println!("  Audit tail:");
    for event in engine.recent_events(3) {
        println!("    [{}] {:?}", event.id.0, event.payload);
    }
    println!();
}

// helpers

fn seed_vault(engine: &mut MockEngine, amount: Decimal) {
    engine
        .initiate_deposit(ALICE, ALICE, ALICE, amount, price(dec!(2000)))
        .unwrap();
    engine.advance_time(24_000);
    engine.validate(ALICE, price(dec!(2000))).unwrap();
}

fn open_and_validate(engine: &mut MockEngine, user: Addr, amount: Decimal, desired_liq: Decimal) -> PositionId {
    engine
        .initiate_open(user, user, user, amount, desired_liq, price(dec!(2000)))
        .unwrap();
    engine.advance_time(24_000);
    match engine.validate(user, price(dec!(2000))).unwrap() {
        Validated::Done(ValidateOutcome::Open(o)) => o.position,
        other => panic!("unexpected outcome: {other:?}"),
    }
}
