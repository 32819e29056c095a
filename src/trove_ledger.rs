//! # Trove Ledger
//!
//! Per-trove records together with the reward accumulators that spread liquidated debt and
//! collateral over every active trove in O(1).
//!
//! A redistribution raises `l_coll` and `l_debt` by the redistributed amount per unit of stake.
//! A trove's share is `stake * (l - snapshot)`. It stays pending until the trove is touched
//! again, at which point it is added to the trove and the snapshot catches up.
//!
//! New stakes are scaled by `total_stakes_snapshot / total_collateral_snapshot`, the ratio
//! captured after the last liquidation. A trove opened after redistributions therefore gets
//! a stake comparable to the already diluted stakes of older troves.

use crate::errors::{TroveError, TroveResult};
use crate::math::{compute_nominal_cr, mul_div};
use crate::shared_structs::*;
use crate::storage::TroveMap;
use scrypto::prelude::*;

#[derive(ScryptoSbor, Debug, PartialEq)]
pub struct TroveLedger {
    troves: TroveMap<Trove>,
    reward_snapshots: TroveMap<RewardSnapshot>,
    /// Active troves by array index, in no particular order.
    trove_owners: TroveMap<TroveId>,
    trove_owners_count: u64,
    pub total_stakes: Decimal,
    pub total_stakes_snapshot: Decimal,
    pub total_collateral_snapshot: Decimal,
    /// Collateral reward per unit staked, accumulated over all redistributions.
    pub l_coll: Decimal,
    /// Debt reward per unit staked, accumulated over all redistributions.
    pub l_debt: Decimal,
    /// Truncation remainders of the last redistribution, in attos of `amount * 1e18`.
    last_coll_error_redistribution: Decimal,
    last_debt_error_redistribution: Decimal,
}

impl TroveLedger {
    pub fn new() -> Self {
        Self::with_stores(TroveMap::memory(), TroveMap::memory(), TroveMap::memory())
    }

    /// Ledger whose records live in `KeyValueStore`s.
    pub fn new_on_ledger() -> Self {
        Self::with_stores(TroveMap::ledger(), TroveMap::ledger(), TroveMap::ledger())
    }

    fn with_stores(
        troves: TroveMap<Trove>,
        reward_snapshots: TroveMap<RewardSnapshot>,
        trove_owners: TroveMap<TroveId>,
    ) -> Self {
        Self {
            troves,
            reward_snapshots,
            trove_owners,
            trove_owners_count: 0,
            total_stakes: Decimal::ZERO,
            total_stakes_snapshot: Decimal::ZERO,
            total_collateral_snapshot: Decimal::ZERO,
            l_coll: Decimal::ZERO,
            l_debt: Decimal::ZERO,
            last_coll_error_redistribution: Decimal::ZERO,
            last_debt_error_redistribution: Decimal::ZERO,
        }
    }

    pub fn checkpoint(&self) -> Option<Self> {
        Some(Self {
            troves: self.troves.checkpoint()?,
            reward_snapshots: self.reward_snapshots.checkpoint()?,
            trove_owners: self.trove_owners.checkpoint()?,
            ..*self
        })
    }

    pub fn trove(&self, id: TroveId) -> Option<Trove> {
        self.troves.get(id)
    }

    pub fn status(&self, id: TroveId) -> TroveStatus {
        self.troves
            .get(id)
            .map(|trove| trove.status)
            .unwrap_or_default()
    }

    pub fn is_active(&self, id: TroveId) -> bool {
        self.status(id) == TroveStatus::Active
    }

    pub fn reward_snapshot(&self, id: TroveId) -> RewardSnapshot {
        self.reward_snapshots.get(id).unwrap_or_default()
    }

    /// Active troves in array order.
    pub fn trove_owners(&self) -> Vec<TroveId> {
        (0..self.trove_owners_count)
            .filter_map(|index| self.trove_owners.get(index))
            .collect()
    }

    pub fn trove_owners_count(&self) -> u64 {
        self.trove_owners_count
    }

    pub fn trove_from_owners_array(&self, index: u64) -> Option<TroveId> {
        self.trove_owners.get(index)
    }

    pub fn pending_coll_reward(&self, id: TroveId) -> Decimal {
        match self.troves.get(id) {
            Some(trove) if trove.status == TroveStatus::Active => {
                let snapshot = self.reward_snapshot(id);
                trove.stake * (self.l_coll - snapshot.l_coll)
            }
            _ => Decimal::ZERO,
        }
    }

    pub fn pending_debt_reward(&self, id: TroveId) -> Decimal {
        match self.troves.get(id) {
            Some(trove) if trove.status == TroveStatus::Active => {
                let snapshot = self.reward_snapshot(id);
                trove.stake * (self.l_debt - snapshot.l_debt)
            }
            _ => Decimal::ZERO,
        }
    }

    /// A trove has pending rewards iff a redistribution happened since its snapshot.
    pub fn has_pending_rewards(&self, id: TroveId) -> bool {
        let snapshot = self.reward_snapshot(id);
        self.is_active(id) && (snapshot.l_coll < self.l_coll || snapshot.l_debt < self.l_debt)
    }

    pub fn entire_debt_and_coll(&self, id: TroveId) -> EntireDebtAndColl {
        let (debt, coll) = self
            .troves
            .get(id)
            .map(|trove| (trove.debt, trove.coll))
            .unwrap_or((Decimal::ZERO, Decimal::ZERO));
        let pending_debt_reward = self.pending_debt_reward(id);
        let pending_coll_reward = self.pending_coll_reward(id);

        EntireDebtAndColl {
            debt: debt + pending_debt_reward,
            coll: coll + pending_coll_reward,
            pending_debt_reward,
            pending_coll_reward,
        }
    }

    /// NICR including pending rewards. This is the key the sorted index compares against.
    pub fn nominal_icr(&self, id: TroveId) -> Decimal {
        let entire = self.entire_debt_and_coll(id);
        compute_nominal_cr(entire.coll, entire.debt)
    }

    /// Creates an active trove record. Stake, snapshots and array slot are set by the caller.
    pub fn open_trove(&mut self, id: TroveId, coll: Decimal, debt: Decimal) -> TroveResult<()> {
        if self.is_active(id) {
            return Err(TroveError::TroveAlreadyActive);
        }
        self.troves.insert(
            id,
            Trove {
                debt,
                coll,
                stake: Decimal::ZERO,
                status: TroveStatus::Active,
                array_index: 0,
            },
        );
        Ok(())
    }

    pub fn set_coll_and_debt(&mut self, id: TroveId, coll: Decimal, debt: Decimal) -> TroveResult<()> {
        self.update_active_trove(id, |trove| {
            trove.coll = coll;
            trove.debt = debt;
        })
    }

    /// Adds the pending rewards of `id` to the trove and moves its snapshot up.
    /// Returns `(pending_debt, pending_coll)` when there was anything to apply.
    pub fn apply_pending_rewards(&mut self, id: TroveId) -> TroveResult<Option<(Decimal, Decimal)>> {
        if !self.has_pending_rewards(id) {
            return Ok(None);
        }

        let pending_coll = self.pending_coll_reward(id);
        let pending_debt = self.pending_debt_reward(id);

        self.update_active_trove(id, |trove| {
            trove.coll += pending_coll;
            trove.debt += pending_debt;
        })?;

        self.update_reward_snapshots(id);

        Ok(Some((pending_debt, pending_coll)))
    }

    pub fn update_reward_snapshots(&mut self, id: TroveId) -> RewardSnapshot {
        let snapshot = RewardSnapshot {
            l_coll: self.l_coll,
            l_debt: self.l_debt,
        };
        self.reward_snapshots.insert(id, snapshot);
        snapshot
    }

    pub fn compute_new_stake(&self, coll: Decimal) -> Decimal {
        if self.total_collateral_snapshot.is_zero() {
            coll
        } else {
            mul_div(coll, self.total_stakes_snapshot, self.total_collateral_snapshot)
        }
    }

    /// Recomputes the stake of `id` from its collateral, returning the new stake.
    pub fn update_stake_and_total_stakes(&mut self, id: TroveId) -> TroveResult<Decimal> {
        let mut trove = self.active_trove(id)?;
        let new_stake = self.compute_new_stake(trove.coll);
        let old_stake = trove.stake;

        trove.stake = new_stake;
        self.troves.insert(id, trove);

        self.total_stakes = self.total_stakes - old_stake + new_stake;

        Ok(new_stake)
    }

    pub fn remove_stake(&mut self, id: TroveId) {
        if let Some(mut trove) = self.troves.get(id) {
            self.total_stakes -= trove.stake;
            trove.stake = Decimal::ZERO;
            self.troves.insert(id, trove);
        }
    }

    /// Spreads `debt` and `coll` over all stakes by raising the accumulators.
    ///
    /// The truncation remainder of each division is carried into the next redistribution so
    /// that no dust is lost over time.
    pub fn redistribute_debt_and_coll(&mut self, debt: Decimal, coll: Decimal) -> TroveResult<()> {
        if debt.is_zero() {
            return Ok(());
        }
        if self.total_stakes <= Decimal::ZERO {
            return Err(TroveError::ZeroTotalStakes);
        }

        let (coll_per_stake, coll_error) =
            Self::per_unit_staked(coll, self.last_coll_error_redistribution, self.total_stakes);
        let (debt_per_stake, debt_error) =
            Self::per_unit_staked(debt, self.last_debt_error_redistribution, self.total_stakes);

        self.last_coll_error_redistribution = coll_error;
        self.last_debt_error_redistribution = debt_error;

        self.l_coll += coll_per_stake;
        self.l_debt += debt_per_stake;

        Ok(())
    }

    fn per_unit_staked(amount: Decimal, last_error: Decimal, total_stakes: Decimal) -> (Decimal, Decimal) {
        let precision = Decimal::ONE.attos();
        let numerator = amount.attos() * precision + last_error.attos();
        let per_stake = numerator / total_stakes.attos();
        let error = numerator - per_stake * total_stakes.attos();
        (Decimal::from_attos(per_stake), Decimal::from_attos(error))
    }

    /// Captures the stake to collateral ratio after a liquidation. `coll_remainder` is
    /// collateral still counted in the active pool that is about to leave the system.
    pub fn update_system_snapshots_exclude_coll_remainder(
        &mut self,
        active_coll: Decimal,
        default_coll: Decimal,
        coll_remainder: Decimal,
    ) {
        self.total_stakes_snapshot = self.total_stakes;
        self.total_collateral_snapshot = active_coll - coll_remainder + default_coll;
    }

    pub fn add_trove_owner_to_array(&mut self, id: TroveId) -> TroveResult<u64> {
        let index = self.trove_owners_count;
        self.update_active_trove(id, |trove| trove.array_index = index)?;
        self.trove_owners.insert(index, id);
        self.trove_owners_count += 1;
        Ok(index)
    }

    /// Marks `id` closed with `status`, clearing its balances and snapshot and removing it from
    /// the owner array. Returns the trove moved into the freed slot and its new index.
    pub fn close_trove(&mut self, id: TroveId, status: TroveStatus) -> TroveResult<Option<(TroveId, u64)>> {
        let mut trove = self.active_trove(id)?;
        let index = trove.array_index;
        trove.status = status;
        trove.coll = Decimal::ZERO;
        trove.debt = Decimal::ZERO;
        self.troves.insert(id, trove);

        self.reward_snapshots.insert(id, RewardSnapshot::default());

        Ok(self.remove_trove_owner(index))
    }

    /// Moves the last owner into the freed slot.
    fn remove_trove_owner(&mut self, index: u64) -> Option<(TroveId, u64)> {
        if index >= self.trove_owners_count {
            return None;
        }

        let last_index = self.trove_owners_count - 1;
        let last = self.trove_owners.remove(last_index);
        self.trove_owners_count = last_index;

        if index == last_index {
            return None;
        }

        let moved = last?;
        self.trove_owners.insert(index, moved);
        self.troves.update(moved, |trove| trove.array_index = index);
        Some((moved, index))
    }

    fn active_trove(&self, id: TroveId) -> TroveResult<Trove> {
        self.troves
            .get(id)
            .filter(|trove| trove.status == TroveStatus::Active)
            .ok_or(TroveError::TroveNotActive)
    }

    fn update_active_trove(&mut self, id: TroveId, update: impl FnOnce(&mut Trove)) -> TroveResult<()> {
        let mut trove = self.active_trove(id)?;
        update(&mut trove);
        self.troves.insert(id, trove);
        Ok(())
    }
}
