//! # Trove System
//!
//! The single owner of all engine state: the sorted index, the trove ledger and its reward
//! accumulators, the pool ledgers, the fee model and the configured parameters.
//!
//! Borrower operations, liquidations and redemptions are implemented as further `impl` blocks
//! on [`TroveSystem`] in their own modules. Every state-changing entry point runs inside
//! [`TroveSystem::atomically`]. In memory a failed operation restores the previous state. On
//! ledger the records live in `KeyValueStore`s and the component panics on the error, which
//! reverts the transaction.

use crate::errors::{TroveError, TroveResult};
use crate::events::*;
use crate::fee_model::FeeModel;
use crate::math::{compute_cr, compute_nominal_cr};
use crate::pools::PoolBalances;
use crate::shared_structs::*;
use crate::sorted_troves::SortedTroves;
use crate::trove_ledger::TroveLedger;
use scrypto::prelude::*;

#[derive(ScryptoSbor, Debug, PartialEq)]
pub struct TroveSystem {
    pub parameters: SystemParameters,
    /// Seconds since unix epoch at instantiation. Redemptions open `bootstrap_period` later.
    pub deployment_time: i64,
    pub sorted_troves: SortedTroves,
    pub ledger: TroveLedger,
    pub pools: PoolBalances,
    pub fees: FeeModel,
    events: Vec<TroveEvent>,
}

impl TroveSystem {
    /// `now` is in seconds since unix epoch and starts the fee decay clock.
    pub fn new(parameters: SystemParameters, now: i64) -> Self {
        Self {
            sorted_troves: SortedTroves::new(parameters.max_troves),
            parameters,
            deployment_time: now,
            ledger: TroveLedger::new(),
            pools: PoolBalances::new(),
            fees: FeeModel::new(now),
            events: Vec::new(),
        }
    }

    /// Engine state for a component, with every per-trove record in a `KeyValueStore`.
    pub fn new_on_ledger(parameters: SystemParameters, now: i64) -> Self {
        Self {
            sorted_troves: SortedTroves::new_on_ledger(parameters.max_troves),
            parameters,
            deployment_time: now,
            ledger: TroveLedger::new_on_ledger(),
            pools: PoolBalances::new_on_ledger(),
            fees: FeeModel::new(now),
            events: Vec::new(),
        }
    }

    /// A full copy of the state, or `None` when the records live on ledger.
    pub fn checkpoint(&self) -> Option<Self> {
        Some(Self {
            parameters: self.parameters.clone(),
            deployment_time: self.deployment_time,
            sorted_troves: self.sorted_troves.checkpoint()?,
            ledger: self.ledger.checkpoint()?,
            pools: self.pools.checkpoint()?,
            fees: self.fees.clone(),
            events: self.events.clone(),
        })
    }

    pub fn set_parameters(&mut self, parameters: SystemParameters) -> TroveResult<()> {
        self.sorted_troves.set_max_size(parameters.max_troves)?;
        self.parameters = parameters;
        Ok(())
    }

    /// Runs `operation`, rolling every change back if it fails. Only in-memory state is
    /// copied; on ledger the caller aborts the transaction on `Err`.
    pub fn atomically<T>(
        &mut self,
        operation: impl FnOnce(&mut Self) -> TroveResult<T>,
    ) -> TroveResult<T> {
        let checkpoint = self.checkpoint();
        let result = operation(self);
        if let (Err(_), Some(checkpoint)) = (&result, checkpoint) {
            *self = checkpoint;
        }
        result
    }

    /// Drains the events buffered since the last call.
    pub fn take_events(&mut self) -> Vec<TroveEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[TroveEvent] {
        &self.events
    }

    pub(crate) fn emit(&mut self, event: TroveEvent) {
        self.events.push(event);
    }

    // System getters

    pub fn get_entire_system_coll(&self) -> Decimal {
        self.pools.entire_system_coll()
    }

    pub fn get_entire_system_debt(&self) -> Decimal {
        self.pools.entire_system_debt()
    }

    /// An empty system has no debt and is never in recovery mode.
    pub fn get_tcr(&self, price: Decimal) -> Decimal {
        let debt = self.get_entire_system_debt();
        if debt.is_zero() {
            return Decimal::MAX;
        }
        compute_cr(self.get_entire_system_coll(), debt, price)
    }

    pub fn check_recovery_mode(&self, price: Decimal) -> bool {
        self.get_tcr(price) < self.parameters.ccr
    }

    pub fn get_system_info(&self) -> SystemInfo {
        SystemInfo {
            active_coll: self.pools.active_coll,
            active_debt: self.pools.active_debt,
            default_coll: self.pools.default_coll,
            default_debt: self.pools.default_debt,
            gas_pool_debt: self.pools.gas_pool_debt,
            total_coll_surplus: self.pools.total_coll_surplus,
            total_stakes: self.ledger.total_stakes,
            total_stakes_snapshot: self.ledger.total_stakes_snapshot,
            total_collateral_snapshot: self.ledger.total_collateral_snapshot,
            l_coll: self.ledger.l_coll,
            l_debt: self.ledger.l_debt,
            base_rate: self.fees.base_rate,
            last_fee_operation_time: self.fees.last_fee_operation_time,
            trove_count: self.sorted_troves.get_size(),
        }
    }

    // Trove getters

    pub fn get_trove_status(&self, id: TroveId) -> TroveStatus {
        self.ledger.status(id)
    }

    pub fn get_entire_debt_and_coll(&self, id: TroveId) -> EntireDebtAndColl {
        self.ledger.entire_debt_and_coll(id)
    }

    pub fn get_pending_coll_reward(&self, id: TroveId) -> Decimal {
        self.ledger.pending_coll_reward(id)
    }

    pub fn get_pending_debt_reward(&self, id: TroveId) -> Decimal {
        self.ledger.pending_debt_reward(id)
    }

    /// NICR including pending rewards.
    pub fn get_nominal_icr(&self, id: TroveId) -> Decimal {
        self.ledger.nominal_icr(id)
    }

    /// ICR at `price`, including pending rewards.
    pub fn get_current_icr(&self, id: TroveId, price: Decimal) -> Decimal {
        let entire = self.ledger.entire_debt_and_coll(id);
        compute_cr(entire.coll, entire.debt, price)
    }

    pub fn get_trove_info(&self, id: TroveId) -> TroveInfo {
        let trove = self.ledger.trove(id).unwrap_or_default();
        TroveInfo {
            trove_id: id,
            status: trove.status,
            debt: trove.debt,
            coll: trove.coll,
            stake: trove.stake,
            pending_debt_reward: self.ledger.pending_debt_reward(id),
            pending_coll_reward: self.ledger.pending_coll_reward(id),
            nicr: self
                .sorted_troves
                .contains(id)
                .then(|| self.ledger.nominal_icr(id)),
        }
    }

    /// Up to `limit` troves from the head of the index with their current NICR.
    pub fn get_sorted_troves(&self, limit: usize) -> Vec<(TroveId, Decimal)> {
        self.sorted_troves
            .iter()
            .take(limit)
            .map(|id| (id, self.ledger.nominal_icr(id)))
            .collect()
    }

    /// Position in the index for a trove with NICR `nicr`, starting from the hints.
    pub fn find_insert_position(
        &self,
        nicr: Decimal,
        prev_id: Option<TroveId>,
        next_id: Option<TroveId>,
    ) -> (Option<TroveId>, Option<TroveId>) {
        let ledger = &self.ledger;
        self.sorted_troves
            .find_insert_position(nicr, prev_id, next_id, &|id| ledger.nominal_icr(id))
    }

    pub fn get_claimable_collateral(&self, id: TroveId) -> Decimal {
        self.pools.surplus_of(id)
    }

    pub fn get_net_debt(&self, debt: Decimal) -> Decimal {
        debt - self.parameters.gas_compensation
    }

    pub fn get_composite_debt(&self, debt: Decimal) -> Decimal {
        debt + self.parameters.gas_compensation
    }

    /// Collateral paid to a liquidator: `coll / percent_divisor`, raised to the USD floor when
    /// that share is worth less, but never more than `coll`.
    pub fn get_coll_gas_compensation(&self, entire_coll: Decimal, price: Decimal) -> Decimal {
        let base_compensation = entire_coll / self.parameters.percent_divisor;
        let floor = self.parameters.coll_gas_compensation_floor;

        if base_compensation * price >= floor {
            base_compensation
        } else if price.is_zero() {
            entire_coll
        } else {
            entire_coll.min(floor / price)
        }
    }

    // Shared mutations

    /// Applies pending rewards to `id` and moves it to its new place in the index.
    pub(crate) fn apply_pending_rewards(&mut self, id: TroveId) -> TroveResult<()> {
        if let Some((pending_debt, pending_coll)) = self.ledger.apply_pending_rewards(id)? {
            self.pools
                .move_pending_trove_rewards_to_active_pool(pending_debt, pending_coll);

            let trove = self.ledger.trove(id).unwrap_or_default();
            let new_nicr = compute_nominal_cr(trove.coll, trove.debt);
            let prev = self.sorted_troves.get_prev(id);
            let next = self.sorted_troves.get_next(id);
            self.re_insert_into_index(id, new_nicr, prev, next)?;

            self.emit(TroveEvent::TroveUpdated(EventTroveUpdated {
                trove_id: id,
                debt: trove.debt,
                coll: trove.coll,
                stake: trove.stake,
                operation: TroveOperation::ApplyPendingRewards,
            }));
        }
        Ok(())
    }

    pub(crate) fn insert_into_index(
        &mut self,
        id: TroveId,
        nicr: Decimal,
        prev_id: Option<TroveId>,
        next_id: Option<TroveId>,
    ) -> TroveResult<()> {
        let ledger = &self.ledger;
        self.sorted_troves
            .insert(id, nicr, prev_id, next_id, &|id| ledger.nominal_icr(id))
    }

    pub(crate) fn re_insert_into_index(
        &mut self,
        id: TroveId,
        nicr: Decimal,
        prev_id: Option<TroveId>,
        next_id: Option<TroveId>,
    ) -> TroveResult<()> {
        let ledger = &self.ledger;
        self.sorted_troves
            .re_insert(id, nicr, prev_id, next_id, &|id| ledger.nominal_icr(id))
    }

    pub(crate) fn update_stake_and_total_stakes(&mut self, id: TroveId) -> TroveResult<Decimal> {
        let stake = self.ledger.update_stake_and_total_stakes(id)?;
        self.emit(TroveEvent::TotalStakesUpdated(EventTotalStakesUpdated {
            new_total_stakes: self.ledger.total_stakes,
        }));
        Ok(stake)
    }

    pub(crate) fn remove_stake(&mut self, id: TroveId) {
        self.ledger.remove_stake(id);
    }

    /// Closes `id` with `status`, removing it from the index and the owner array.
    /// The last trove of the system cannot be closed.
    pub(crate) fn close_trove_with_status(&mut self, id: TroveId, status: TroveStatus) -> TroveResult<()> {
        if self.ledger.trove_owners_count() <= 1 || self.sorted_troves.get_size() <= 1 {
            return Err(TroveError::OnlyOneTroveInSystem);
        }

        if let Some((moved, new_index)) = self.ledger.close_trove(id, status)? {
            self.emit(TroveEvent::TroveIndexUpdated(EventTroveIndexUpdated {
                trove_id: moved,
                new_index,
            }));
        }
        self.sorted_troves.remove(id)
    }

    pub(crate) fn redistribute_debt_and_coll(&mut self, debt: Decimal, coll: Decimal) -> TroveResult<()> {
        if debt.is_zero() {
            return Ok(());
        }
        self.ledger.redistribute_debt_and_coll(debt, coll)?;
        self.pools.move_to_default_pool(debt, coll);

        self.emit(TroveEvent::LTermsUpdated(EventLTermsUpdated {
            l_coll: self.ledger.l_coll,
            l_debt: self.ledger.l_debt,
        }));
        Ok(())
    }

    pub(crate) fn update_system_snapshots_exclude_coll_remainder(&mut self, coll_remainder: Decimal) {
        self.ledger.update_system_snapshots_exclude_coll_remainder(
            self.pools.active_coll,
            self.pools.default_coll,
            coll_remainder,
        );
        self.emit(TroveEvent::SystemSnapshotsUpdated(EventSystemSnapshotsUpdated {
            total_stakes_snapshot: self.ledger.total_stakes_snapshot,
            total_collateral_snapshot: self.ledger.total_collateral_snapshot,
        }));
    }

    pub(crate) fn emit_base_rate_updates(&mut self, previous_last_fee_op_time: i64) {
        self.emit(TroveEvent::BaseRateUpdated(EventBaseRateUpdated {
            base_rate: self.fees.base_rate,
        }));
        if self.fees.last_fee_operation_time != previous_last_fee_op_time {
            self.emit(TroveEvent::LastFeeOpTimeUpdated(EventLastFeeOpTimeUpdated {
                last_fee_op_time: self.fees.last_fee_operation_time,
            }));
        }
    }
}
