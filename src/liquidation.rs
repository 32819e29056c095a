//! # Liquidations
//!
//! Closes troves whose collateral ratio fell too low and disposes of their debt and collateral.
//!
//! ## Modes
//! - **Normal Mode** (TCR >= CCR): a trove is liquidated iff its ICR < MCR. Its debt is
//!   cancelled against the Stability Pool as far as deposits reach, together with a
//!   proportional share of the collateral. The rest is redistributed over all active troves.
//! - **Recovery Mode** (TCR < CCR): troves with ICR <= 100% are fully redistributed, troves
//!   below MCR are handled as in Normal Mode, and troves with MCR <= ICR < TCR are closed
//!   against the Stability Pool if it can absorb the whole debt. Those only give up collateral
//!   worth `debt * MCR`; the rest is kept claimable for the owner.
//!
//! ## Payouts
//! The caller receives the collateral gas compensation taken from the liquidated troves and the
//! stablecoin reserve the gas pool held for them.
//!
//! All liquidations of a call are accumulated first. One Stability Pool offset and one
//! redistribution are then applied for the whole batch.

use crate::errors::{TroveError, TroveResult};
use crate::events::*;
use crate::math::{compute_cr, mul_div};
use crate::pools::StabilityPool;
use crate::shared_structs::*;
use crate::trove_system::TroveSystem;
use scrypto::prelude::*;

/// Outcome of liquidating a single trove.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct LiquidationValues {
    entire_trove_debt: Decimal,
    entire_trove_coll: Decimal,
    coll_gas_compensation: Decimal,
    debt_gas_compensation: Decimal,
    debt_to_offset: Decimal,
    coll_to_send_to_sp: Decimal,
    debt_to_redistribute: Decimal,
    coll_to_redistribute: Decimal,
    coll_surplus: Decimal,
}

/// Running state of a liquidation sequence.
struct LiquidationTracker {
    remaining_sp_deposits: Decimal,
    entire_system_coll: Decimal,
    entire_system_debt: Decimal,
    back_to_normal_mode: bool,
}

impl LiquidationTotals {
    fn add(&mut self, trove_id: TroveId, values: &LiquidationValues) {
        self.total_coll_gas_compensation += values.coll_gas_compensation;
        self.total_debt_gas_compensation += values.debt_gas_compensation;
        self.total_debt_in_sequence += values.entire_trove_debt;
        self.total_coll_in_sequence += values.entire_trove_coll;
        self.total_debt_to_offset += values.debt_to_offset;
        self.total_coll_to_send_to_sp += values.coll_to_send_to_sp;
        self.total_debt_to_redistribute += values.debt_to_redistribute;
        self.total_coll_to_redistribute += values.coll_to_redistribute;
        self.total_coll_surplus += values.coll_surplus;
        self.liquidated.push(trove_id);
    }
}

impl TroveSystem {
    /// Liquidates a single trove.
    ///
    /// Fails with `TroveNotActive` if the trove is not open and with `NothingToLiquidate` if it
    /// does not qualify for liquidation at `price`.
    pub fn liquidate(
        &mut self,
        trove_id: TroveId,
        price: Decimal,
        stability_pool: &mut impl StabilityPool,
    ) -> TroveResult<LiquidationTotals> {
        if !self.ledger.is_active(trove_id) {
            return Err(TroveError::TroveNotActive);
        }
        self.batch_liquidate_troves(&[trove_id], price, stability_pool)
    }

    /// Liquidates up to `n` troves, starting from the one with the lowest collateral ratio.
    pub fn liquidate_troves(
        &mut self,
        n: u64,
        price: Decimal,
        stability_pool: &mut impl StabilityPool,
    ) -> TroveResult<LiquidationTotals> {
        self.atomically(|system| {
            let sp_deposits = stability_pool.get_total_deposits();

            let totals = if system.check_recovery_mode(price) {
                system.totals_from_liquidate_troves_sequence_recovery_mode(price, sp_deposits, n)?
            } else {
                system.totals_from_liquidate_troves_sequence_normal_mode(price, sp_deposits, n)?
            };

            system.finalize_liquidation(totals, stability_pool)
        })
    }

    /// Liquidates every trove of `trove_ids` that qualifies, skipping the others.
    pub fn batch_liquidate_troves(
        &mut self,
        trove_ids: &[TroveId],
        price: Decimal,
        stability_pool: &mut impl StabilityPool,
    ) -> TroveResult<LiquidationTotals> {
        if trove_ids.is_empty() {
            return Err(TroveError::EmptyTroveArray);
        }

        self.atomically(|system| {
            let sp_deposits = stability_pool.get_total_deposits();

            let totals = if system.check_recovery_mode(price) {
                system.totals_from_batch_liquidate_recovery_mode(price, sp_deposits, trove_ids)?
            } else {
                system.totals_from_batch_liquidate_normal_mode(price, sp_deposits, trove_ids)?
            };

            system.finalize_liquidation(totals, stability_pool)
        })
    }

    /// Moves the accumulated totals between pools, pays the gas compensation out of the
    /// ledgers and emits the aggregate event. The Stability Pool is offset last.
    fn finalize_liquidation(
        &mut self,
        totals: LiquidationTotals,
        stability_pool: &mut impl StabilityPool,
    ) -> TroveResult<LiquidationTotals> {
        if totals.total_debt_in_sequence.is_zero() {
            return Err(TroveError::NothingToLiquidate);
        }

        self.pools.active_debt -= totals.total_debt_to_offset;
        self.pools.active_coll -= totals.total_coll_to_send_to_sp;

        self.redistribute_debt_and_coll(
            totals.total_debt_to_redistribute,
            totals.total_coll_to_redistribute,
        )?;

        self.update_system_snapshots_exclude_coll_remainder(totals.total_coll_gas_compensation);

        self.pools.active_coll -= totals.total_coll_gas_compensation;
        self.pools.gas_pool_debt -= totals.total_debt_gas_compensation;

        self.emit(TroveEvent::Liquidation(EventLiquidation {
            liquidated_debt: totals.total_debt_in_sequence,
            liquidated_coll: totals.total_coll_in_sequence
                - totals.total_coll_gas_compensation
                - totals.total_coll_surplus,
            coll_gas_compensation: totals.total_coll_gas_compensation,
            debt_gas_compensation: totals.total_debt_gas_compensation,
            coll_surplus: totals.total_coll_surplus,
        }));

        if totals.total_debt_to_offset > Decimal::ZERO {
            stability_pool.offset(totals.total_debt_to_offset, totals.total_coll_to_send_to_sp);
        }

        Ok(totals)
    }

    fn totals_from_liquidate_troves_sequence_normal_mode(
        &mut self,
        price: Decimal,
        sp_deposits: Decimal,
        n: u64,
    ) -> TroveResult<LiquidationTotals> {
        let mut totals = LiquidationTotals::default();
        let mut remaining_sp_deposits = sp_deposits;

        for _ in 0..n {
            if self.ledger.trove_owners_count() <= 1 {
                break;
            }
            let Some(trove_id) = self.sorted_troves.get_last() else {
                break;
            };

            let icr = self.get_current_icr(trove_id, price);
            if icr >= self.parameters.mcr {
                break;
            }

            let values = self.liquidate_normal_mode(trove_id, price, remaining_sp_deposits)?;
            remaining_sp_deposits -= values.debt_to_offset;
            totals.add(trove_id, &values);
        }

        Ok(totals)
    }

    fn totals_from_liquidate_troves_sequence_recovery_mode(
        &mut self,
        price: Decimal,
        sp_deposits: Decimal,
        n: u64,
    ) -> TroveResult<LiquidationTotals> {
        let mut totals = LiquidationTotals::default();
        let mut tracker = LiquidationTracker {
            remaining_sp_deposits: sp_deposits,
            entire_system_coll: self.get_entire_system_coll(),
            entire_system_debt: self.get_entire_system_debt(),
            back_to_normal_mode: false,
        };

        let first = self.sorted_troves.get_first();
        let mut current = self.sorted_troves.get_last();

        for _ in 0..n {
            let Some(trove_id) = current else {
                break;
            };
            if Some(trove_id) == first {
                break;
            }

            // The current trove is likely to be removed, step to its neighbour first.
            let next_trove = self.sorted_troves.get_prev(trove_id);
            let icr = self.get_current_icr(trove_id, price);

            if !tracker.back_to_normal_mode {
                if icr >= self.parameters.mcr && tracker.remaining_sp_deposits.is_zero() {
                    break;
                }
                if let Some(values) = self.liquidate_with_tracker(trove_id, icr, price, &mut tracker)? {
                    totals.add(trove_id, &values);
                }
            } else if icr < self.parameters.mcr {
                if self.ledger.trove_owners_count() <= 1 {
                    break;
                }
                let values = self.liquidate_normal_mode(trove_id, price, tracker.remaining_sp_deposits)?;
                tracker.remaining_sp_deposits -= values.debt_to_offset;
                totals.add(trove_id, &values);
            } else {
                break;
            }

            current = next_trove;
        }

        Ok(totals)
    }

    fn totals_from_batch_liquidate_normal_mode(
        &mut self,
        price: Decimal,
        sp_deposits: Decimal,
        trove_ids: &[TroveId],
    ) -> TroveResult<LiquidationTotals> {
        let mut totals = LiquidationTotals::default();
        let mut remaining_sp_deposits = sp_deposits;

        for &trove_id in trove_ids {
            if !self.ledger.is_active(trove_id) || self.ledger.trove_owners_count() <= 1 {
                continue;
            }

            let icr = self.get_current_icr(trove_id, price);
            if icr < self.parameters.mcr {
                let values = self.liquidate_normal_mode(trove_id, price, remaining_sp_deposits)?;
                remaining_sp_deposits -= values.debt_to_offset;
                totals.add(trove_id, &values);
            }
        }

        Ok(totals)
    }

    fn totals_from_batch_liquidate_recovery_mode(
        &mut self,
        price: Decimal,
        sp_deposits: Decimal,
        trove_ids: &[TroveId],
    ) -> TroveResult<LiquidationTotals> {
        let mut totals = LiquidationTotals::default();
        let mut tracker = LiquidationTracker {
            remaining_sp_deposits: sp_deposits,
            entire_system_coll: self.get_entire_system_coll(),
            entire_system_debt: self.get_entire_system_debt(),
            back_to_normal_mode: false,
        };

        for &trove_id in trove_ids {
            if !self.ledger.is_active(trove_id) {
                continue;
            }

            let icr = self.get_current_icr(trove_id, price);

            if !tracker.back_to_normal_mode {
                if icr >= self.parameters.mcr && tracker.remaining_sp_deposits.is_zero() {
                    continue;
                }
                if let Some(values) = self.liquidate_with_tracker(trove_id, icr, price, &mut tracker)? {
                    totals.add(trove_id, &values);
                }
            } else if icr < self.parameters.mcr && self.ledger.trove_owners_count() > 1 {
                let values = self.liquidate_normal_mode(trove_id, price, tracker.remaining_sp_deposits)?;
                tracker.remaining_sp_deposits -= values.debt_to_offset;
                totals.add(trove_id, &values);
            }
        }

        Ok(totals)
    }

    /// Recovery Mode step that keeps the running system totals up to date, so the sequence can
    /// switch back to Normal Mode rules once the system is healthy again.
    fn liquidate_with_tracker(
        &mut self,
        trove_id: TroveId,
        icr: Decimal,
        price: Decimal,
        tracker: &mut LiquidationTracker,
    ) -> TroveResult<Option<LiquidationValues>> {
        let tcr = compute_cr(tracker.entire_system_coll, tracker.entire_system_debt, price);

        let values = self.liquidate_recovery_mode(
            trove_id,
            icr,
            tracker.remaining_sp_deposits,
            tcr,
            price,
        )?;

        if let Some(values) = values.as_ref() {
            tracker.remaining_sp_deposits -= values.debt_to_offset;
            tracker.entire_system_debt -= values.debt_to_offset;
            tracker.entire_system_coll = tracker.entire_system_coll
                - values.coll_to_send_to_sp
                - values.coll_gas_compensation
                - values.coll_surplus;

            tracker.back_to_normal_mode = compute_cr(
                tracker.entire_system_coll,
                tracker.entire_system_debt,
                price,
            ) >= self.parameters.ccr;
        }

        Ok(values)
    }

    fn liquidate_normal_mode(
        &mut self,
        trove_id: TroveId,
        price: Decimal,
        sp_deposits: Decimal,
    ) -> TroveResult<LiquidationValues> {
        let entire = self.ledger.entire_debt_and_coll(trove_id);

        self.pools
            .move_pending_trove_rewards_to_active_pool(entire.pending_debt_reward, entire.pending_coll_reward);
        self.remove_stake(trove_id);

        let coll_gas_compensation = self.get_coll_gas_compensation(entire.coll, price);
        let coll_to_liquidate = entire.coll - coll_gas_compensation;

        let mut values = Self::offset_and_redistribution_vals(entire.debt, coll_to_liquidate, sp_deposits);
        values.entire_trove_debt = entire.debt;
        values.entire_trove_coll = entire.coll;
        values.coll_gas_compensation = coll_gas_compensation;
        values.debt_gas_compensation = self.parameters.gas_compensation;

        self.close_liquidated_trove(trove_id, &entire, TroveOperation::LiquidateInNormalMode)?;

        Ok(values)
    }

    /// Returns `None` when the trove is left untouched.
    fn liquidate_recovery_mode(
        &mut self,
        trove_id: TroveId,
        icr: Decimal,
        sp_deposits: Decimal,
        tcr: Decimal,
        price: Decimal,
    ) -> TroveResult<Option<LiquidationValues>> {
        if self.ledger.trove_owners_count() <= 1 {
            return Ok(None);
        }

        let entire = self.ledger.entire_debt_and_coll(trove_id);
        let mcr = self.parameters.mcr;

        let mut values = if icr <= Decimal::ONE {
            let coll_gas_compensation = self.get_coll_gas_compensation(entire.coll, price);
            LiquidationValues {
                coll_gas_compensation,
                debt_to_redistribute: entire.debt,
                coll_to_redistribute: entire.coll - coll_gas_compensation,
                ..Default::default()
            }
        } else if icr < mcr {
            let coll_gas_compensation = self.get_coll_gas_compensation(entire.coll, price);
            let mut values = Self::offset_and_redistribution_vals(
                entire.debt,
                entire.coll - coll_gas_compensation,
                sp_deposits,
            );
            values.coll_gas_compensation = coll_gas_compensation;
            values
        } else if icr < tcr && entire.debt <= sp_deposits {
            self.capped_offset_vals(entire.debt, entire.coll, price)
        } else {
            return Ok(None);
        };

        values.entire_trove_debt = entire.debt;
        values.entire_trove_coll = entire.coll;
        values.debt_gas_compensation = self.parameters.gas_compensation;

        self.pools
            .move_pending_trove_rewards_to_active_pool(entire.pending_debt_reward, entire.pending_coll_reward);
        self.remove_stake(trove_id);
        self.close_liquidated_trove(trove_id, &entire, TroveOperation::LiquidateInRecoveryMode)?;

        if values.coll_surplus > Decimal::ZERO {
            self.pools.account_surplus(trove_id, values.coll_surplus);
        }

        Ok(Some(values))
    }

    fn close_liquidated_trove(
        &mut self,
        trove_id: TroveId,
        entire: &EntireDebtAndColl,
        operation: TroveOperation,
    ) -> TroveResult<()> {
        self.close_trove_with_status(trove_id, TroveStatus::ClosedByLiquidation)?;

        self.emit(TroveEvent::TroveLiquidated(EventTroveLiquidated {
            trove_id,
            debt: entire.debt,
            coll: entire.coll,
            operation,
        }));
        self.emit(TroveEvent::TroveUpdated(EventTroveUpdated {
            trove_id,
            debt: Decimal::ZERO,
            coll: Decimal::ZERO,
            stake: Decimal::ZERO,
            operation,
        }));
        Ok(())
    }

    /// Splits a trove's debt and collateral between the Stability Pool and redistribution.
    fn offset_and_redistribution_vals(
        debt: Decimal,
        coll: Decimal,
        sp_deposits: Decimal,
    ) -> LiquidationValues {
        if sp_deposits > Decimal::ZERO && debt > Decimal::ZERO {
            let debt_to_offset = debt.min(sp_deposits);
            let coll_to_send_to_sp = mul_div(coll, debt_to_offset, debt);
            LiquidationValues {
                debt_to_offset,
                coll_to_send_to_sp,
                debt_to_redistribute: debt - debt_to_offset,
                coll_to_redistribute: coll - coll_to_send_to_sp,
                ..Default::default()
            }
        } else {
            LiquidationValues {
                debt_to_redistribute: debt,
                coll_to_redistribute: coll,
                ..Default::default()
            }
        }
    }

    /// The Stability Pool takes the whole debt and collateral worth `debt * MCR`.
    fn capped_offset_vals(&self, entire_debt: Decimal, entire_coll: Decimal, price: Decimal) -> LiquidationValues {
        let coll_to_offset = mul_div(entire_debt, self.parameters.mcr, price);
        let coll_gas_compensation = self.get_coll_gas_compensation(coll_to_offset, price);

        LiquidationValues {
            coll_gas_compensation,
            debt_to_offset: entire_debt,
            coll_to_send_to_sp: coll_to_offset - coll_gas_compensation,
            coll_surplus: entire_coll - coll_to_offset,
            ..Default::default()
        }
    }
}
