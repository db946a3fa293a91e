// 12.0 engine/core.rs: the protocol engine. owns all mutable state: balances,
// tick ledger, pending queue, event log, and the collaborator handles. every
// externally triggered action runs settle -> liquidate -> guard -> mutate on
// an exclusive borrow, which is what makes each action transactional.

use super::config::EngineConfig;
use crate::config::CoreParams;
use crate::custody::{
    AssetCustody, BurnToken, MockBurnToken, MockCustody, MockRewardSink, RewardSink,
};
use crate::events::{
    Event, EventId, EventPayload, FundingSettledEvent, LiquidationRewardPaidEvent,
    TickLiquidatedEvent,
};
use crate::funding::compute_settlement;
use crate::imbalance::ExposureSnapshot;
use crate::liquidation::{liquidate_crossed_ticks, LiquidationReport};
use crate::pending::{PendingAction, PendingQueue};
use crate::tick::TickLedger;
use crate::types::{Addr, Price, RawIndex, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Global protocol balances, threaded through every operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreState {
    /// Settlement-asset value held for depositors.
    pub balance_vault: Decimal,
    /// Settlement-asset value held as long-position collateral (plus PnL).
    pub balance_long: Decimal,
    /// In-flight vault deltas from initiated, not-yet-validated actions.
    pub pending_vault: Decimal,
    /// Sum of all open positions' leveraged exposure.
    pub total_expo: Decimal,
    pub last_price: Price,
    pub last_update: Timestamp,
    /// Vault share token supply.
    pub shares_supply: Decimal,
}

impl CoreState {
    pub fn long_trading_expo(&self) -> Decimal {
        self.total_expo - self.balance_long
    }

    pub fn snapshot(&self) -> ExposureSnapshot {
        ExposureSnapshot {
            balance_vault: self.balance_vault,
            balance_long: self.balance_long,
            total_expo: self.total_expo,
            pending_vault: self.pending_vault,
        }
    }
}

// 12.1: the engine struct. generic over the collaborator seams so tests and
// the sim can reach into the mocks.
#[derive(Debug)]
pub struct Engine<C: AssetCustody, B: BurnToken, R: RewardSink> {
    pub(super) cfg: EngineConfig,
    pub(super) params: CoreParams,
    pub(super) state: CoreState,
    pub(super) ledger: TickLedger,
    pub(super) queue: PendingQueue,
    pub(super) custody: C,
    pub(super) burner: B,
    pub(super) rewards: R,
    pub(super) events: Vec<Event>,
    pub(super) next_event_id: u64,
    pub(super) current_time: Timestamp,
}

/// Engine wired to the deterministic mocks.
pub type MockEngine = Engine<MockCustody, MockBurnToken, MockRewardSink>;

impl MockEngine {
    pub fn with_mocks(params: CoreParams, initial_price: Price) -> Self {
        Engine::new(
            EngineConfig::default(),
            params,
            initial_price,
            MockCustody::new(),
            MockBurnToken::new(),
            MockRewardSink::new(),
        )
    }
}

impl<C: AssetCustody, B: BurnToken, R: RewardSink> Engine<C, B, R> {
    pub fn new(
        cfg: EngineConfig,
        params: CoreParams,
        initial_price: Price,
        custody: C,
        burner: B,
        rewards: R,
    ) -> Self {
        let ledger = TickLedger::new(params.tick_size);
        Self {
            cfg,
            state: CoreState {
                balance_vault: Decimal::ZERO,
                balance_long: Decimal::ZERO,
                pending_vault: Decimal::ZERO,
                total_expo: Decimal::ZERO,
                last_price: initial_price,
                last_update: Timestamp::from_millis(0),
                shares_supply: Decimal::ZERO,
            },
            params,
            ledger,
            queue: PendingQueue::new(),
            custody,
            burner,
            rewards,
            events: Vec::new(),
            next_event_id: 1,
            current_time: Timestamp::from_millis(0),
        }
    }

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    pub fn advance_time(&mut self, millis: i64) {
        self.current_time = Timestamp::from_millis(self.current_time.as_millis() + millis);
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    // inspection surface

    pub fn state(&self) -> &CoreState {
        &self.state
    }

    pub fn params(&self) -> &CoreParams {
        &self.params
    }

    pub fn ledger(&self) -> &TickLedger {
        &self.ledger
    }

    pub fn custody(&self) -> &C {
        &self.custody
    }

    pub fn custody_mut(&mut self) -> &mut C {
        &mut self.custody
    }

    pub fn burner(&self) -> &B {
        &self.burner
    }

    pub fn rewards(&self) -> &R {
        &self.rewards
    }

    pub fn pending_for(&self, validator: Addr) -> Option<(RawIndex, &PendingAction)> {
        self.queue.get_for_validator(validator)
    }

    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    /// Live pending actions in enqueue order.
    pub fn pending_actions(&self) -> impl Iterator<Item = (RawIndex, &PendingAction)> {
        self.queue.iter()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    // 12.2: settlement pipeline. brings balances up to date at `price`, then
    // runs one bounded liquidation pass. everything user-facing calls this
    // before touching guards or the ledger.
    pub(super) fn settle_and_liquidate(&mut self, price: Price, caller: Addr) -> LiquidationReport {
        let elapsed_ms = self.state.last_update.age_millis(self.current_time);
        let settlement = compute_settlement(
            self.state.balance_vault,
            self.state.balance_long,
            self.state.total_expo,
            self.state.last_price,
            price,
            elapsed_ms,
            &self.params,
        );

        self.state.balance_vault = settlement.new_balance_vault;
        self.state.balance_long = settlement.new_balance_long;
        self.ledger.accrue_funding(
            settlement.rate_per_period,
            elapsed_ms,
            self.params.funding_period_ms,
        );
        self.state.last_price = price;
        self.state.last_update = self.current_time;

        if !settlement.funding_amount.is_zero() || !settlement.pnl.is_zero() {
            self.emit_event(EventPayload::FundingSettled(FundingSettledEvent {
                price,
                rate_per_period: settlement.rate_per_period,
                funding_amount: settlement.funding_amount,
                pnl: settlement.pnl,
                elapsed_ms,
            }));
        }

        let report = liquidate_crossed_ticks(
            &mut self.ledger,
            price,
            self.params.max_liquidation_iterations,
            self.params.liquidation_reward_per_tick,
        );
        self.apply_liquidations(&report, caller);
        report
    }

    fn apply_liquidations(&mut self, report: &LiquidationReport, liquidator: Addr) {
        if report.ticks.is_empty() {
            return;
        }

        self.state.total_expo -= report.liquidated_expo;

        // move the liquidated ticks' residual value to the vault, conserving
        // the vault+long sum even when one side is pinned at zero
        let mut new_long = self.state.balance_long - report.remaining_collateral;
        let mut new_vault = self.state.balance_vault + report.remaining_collateral;
        if new_long < Decimal::ZERO {
            new_vault += new_long;
            new_long = Decimal::ZERO;
        }
        if new_vault < Decimal::ZERO {
            new_long += new_vault;
            new_vault = Decimal::ZERO;
        }
        self.state.balance_long = new_long;
        self.state.balance_vault = new_vault;

        // an empty long side backs nothing; residual value goes to the vault
        if self.ledger.live_positions() == 0 {
            self.state.balance_vault += self.state.balance_long;
            self.state.balance_long = Decimal::ZERO;
        }

        for tick in &report.ticks {
            self.emit_event(EventPayload::TickLiquidated(TickLiquidatedEvent {
                tick: tick.tick,
                version: tick.version,
                positions: tick.positions,
                expo: tick.expo,
                remaining_collateral: tick.tick_value,
            }));
        }

        let reward = report.reward.min(self.state.balance_vault);
        if reward > Decimal::ZERO && self.custody.transfer_out(liquidator, reward).is_ok() {
            self.state.balance_vault -= reward;
            self.rewards.pay_reward(liquidator, reward);
            self.emit_event(EventPayload::LiquidationRewardPaid(
                LiquidationRewardPaidEvent {
                    liquidator,
                    amount: reward,
                },
            ));
        }
    }

    /// Standalone liquidation entry point for keepers: settle at `price` and
    /// run one bounded pass. The report says whether more work remains.
    pub fn liquidate(&mut self, caller: Addr, price: Price) -> LiquidationReport {
        self.settle_and_liquidate(price, caller)
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let event = Event::new(EventId(self.next_event_id), self.current_time, payload);
        self.next_event_id += 1;

        if self.cfg.verbose {
            println!("[Event {}] {:?}", event.id.0, event.payload);
        }

        self.events.push(event);

        if self.events.len() > self.cfg.max_events {
            let drain_count = self.events.len() - self.cfg.max_events;
            self.events.drain(0..drain_count);
        }
    }
}
