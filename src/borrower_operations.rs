//! # Borrower Operations
//!
//! Opening, adjusting and closing troves, and claiming collateral left over after a trove was
//! closed by a liquidation or a redemption.
//!
//! A trove's composite debt is the requested stablecoin plus the borrowing fee plus the gas
//! compensation reserve. The borrowing fee is waived in Recovery Mode. In Recovery Mode a trove
//! may only be opened at or above CCR, and adjustments may not withdraw collateral or lower
//! the ICR of a trove that borrows more.

use crate::errors::{TroveError, TroveResult};
use crate::events::*;
use crate::fee_model::require_user_accepts_fee;
use crate::math::{compute_cr, compute_nominal_cr};
use crate::shared_structs::*;
use crate::trove_system::TroveSystem;
use scrypto::prelude::*;

impl TroveSystem {
    /// Opens trove `trove_id` with `coll` collateral, lending out `debt_amount` of stablecoin.
    pub fn open_trove(
        &mut self,
        trove_id: TroveId,
        coll: Decimal,
        debt_amount: Decimal,
        max_fee_percentage: Decimal,
        upper_hint: Option<TroveId>,
        lower_hint: Option<TroveId>,
        price: Decimal,
        now: i64,
    ) -> TroveResult<OpenTroveOutcome> {
        self.atomically(|system| {
            let is_recovery_mode = system.check_recovery_mode(price);
            system.require_valid_max_fee_percentage(max_fee_percentage, is_recovery_mode)?;
            if system.ledger.is_active(trove_id) {
                return Err(TroveError::TroveAlreadyActive);
            }

            let mut net_debt = debt_amount;
            let mut borrowing_fee = Decimal::ZERO;
            if !is_recovery_mode {
                borrowing_fee = system.trigger_borrowing_fee(trove_id, debt_amount, max_fee_percentage, now)?;
                net_debt += borrowing_fee;
            }
            if net_debt < system.parameters.min_net_debt {
                return Err(TroveError::BelowMinNetDebt);
            }

            let composite_debt = system.get_composite_debt(net_debt);
            let icr = compute_cr(coll, composite_debt, price);
            let nicr = compute_nominal_cr(coll, composite_debt);

            if is_recovery_mode {
                if icr < system.parameters.ccr {
                    return Err(TroveError::IcrBelowCcr);
                }
            } else {
                if icr < system.parameters.mcr {
                    return Err(TroveError::IcrBelowMcr);
                }
                let new_tcr = system.new_tcr_from_trove_change(coll, true, composite_debt, true, price);
                if new_tcr < system.parameters.ccr {
                    return Err(TroveError::TcrBelowCcr);
                }
            }

            system.ledger.open_trove(trove_id, coll, composite_debt)?;
            system.ledger.update_reward_snapshots(trove_id);
            let stake = system.update_stake_and_total_stakes(trove_id)?;

            system.insert_into_index(trove_id, nicr, upper_hint, lower_hint)?;
            let array_index = system.ledger.add_trove_owner_to_array(trove_id)?;
            system.emit(TroveEvent::TroveIndexUpdated(EventTroveIndexUpdated {
                trove_id,
                new_index: array_index,
            }));

            system.pools.active_coll += coll;
            system.pools.active_debt += composite_debt;
            system.pools.gas_pool_debt += system.parameters.gas_compensation;

            system.emit(TroveEvent::TroveUpdated(EventTroveUpdated {
                trove_id,
                debt: composite_debt,
                coll,
                stake,
                operation: TroveOperation::OpenTrove,
            }));

            Ok(OpenTroveOutcome {
                borrowing_fee,
                composite_debt,
                stake,
            })
        })
    }

    /// Adds or withdraws collateral and draws or repays debt in one step.
    ///
    /// `debt_change` is the stablecoin lent out or repaid, the borrowing fee on a debt increase
    /// comes on top of it.
    pub fn adjust_trove(
        &mut self,
        trove_id: TroveId,
        coll_deposit: Decimal,
        coll_withdrawal: Decimal,
        debt_change: Decimal,
        is_debt_increase: bool,
        max_fee_percentage: Decimal,
        upper_hint: Option<TroveId>,
        lower_hint: Option<TroveId>,
        price: Decimal,
        now: i64,
    ) -> TroveResult<AdjustTroveOutcome> {
        let is_recovery_mode = self.check_recovery_mode(price);

        if is_debt_increase {
            self.require_valid_max_fee_percentage(max_fee_percentage, is_recovery_mode)?;
            if debt_change.is_zero() {
                return Err(TroveError::ZeroDebtChange);
            }
        }
        if coll_deposit > Decimal::ZERO && coll_withdrawal > Decimal::ZERO {
            return Err(TroveError::SingularCollChange);
        }
        if coll_deposit.is_zero() && coll_withdrawal.is_zero() && debt_change.is_zero() {
            return Err(TroveError::NoAdjustment);
        }
        if !self.ledger.is_active(trove_id) {
            return Err(TroveError::TroveNotActive);
        }

        self.atomically(|system| {
            system.apply_pending_rewards(trove_id)?;

            let (coll_change, is_coll_increase) = if coll_deposit > Decimal::ZERO {
                (coll_deposit, true)
            } else {
                (coll_withdrawal, false)
            };

            let mut net_debt_change = debt_change;
            let mut borrowing_fee = Decimal::ZERO;
            if is_debt_increase && !is_recovery_mode {
                borrowing_fee = system.trigger_borrowing_fee(trove_id, debt_change, max_fee_percentage, now)?;
                net_debt_change += borrowing_fee;
            }

            let trove = system
                .ledger
                .trove(trove_id)
                .ok_or(TroveError::TroveNotActive)?;

            if coll_withdrawal > trove.coll {
                return Err(TroveError::InsufficientCollateral);
            }

            let new_coll = if is_coll_increase {
                trove.coll + coll_change
            } else {
                trove.coll - coll_change
            };

            if !is_debt_increase && debt_change > Decimal::ZERO {
                if net_debt_change > system.get_net_debt(trove.debt) {
                    return Err(TroveError::RepaymentExceedsDebt);
                }
                if system.get_net_debt(trove.debt) - net_debt_change < system.parameters.min_net_debt {
                    return Err(TroveError::BelowMinNetDebt);
                }
            }

            let new_debt = if is_debt_increase {
                trove.debt + net_debt_change
            } else {
                trove.debt - net_debt_change
            };

            let old_icr = compute_cr(trove.coll, trove.debt, price);
            let new_icr = compute_cr(new_coll, new_debt, price);

            if is_recovery_mode {
                if coll_withdrawal > Decimal::ZERO {
                    return Err(TroveError::CollWithdrawalInRecoveryMode);
                }
                if is_debt_increase {
                    if new_icr < system.parameters.ccr {
                        return Err(TroveError::IcrBelowCcr);
                    }
                    if new_icr < old_icr {
                        return Err(TroveError::IcrDecreaseInRecoveryMode);
                    }
                }
            } else {
                if new_icr < system.parameters.mcr {
                    return Err(TroveError::IcrBelowMcr);
                }
                let new_tcr = system.new_tcr_from_trove_change(
                    coll_change,
                    is_coll_increase,
                    net_debt_change,
                    is_debt_increase,
                    price,
                );
                if new_tcr < system.parameters.ccr {
                    return Err(TroveError::TcrBelowCcr);
                }
            }

            system.ledger.set_coll_and_debt(trove_id, new_coll, new_debt)?;
            let stake = system.update_stake_and_total_stakes(trove_id)?;

            let new_nicr = compute_nominal_cr(new_coll, new_debt);
            system.re_insert_into_index(trove_id, new_nicr, upper_hint, lower_hint)?;

            if is_coll_increase {
                system.pools.active_coll += coll_change;
            } else {
                system.pools.active_coll -= coll_change;
            }
            if is_debt_increase {
                system.pools.active_debt += net_debt_change;
            } else {
                system.pools.active_debt -= net_debt_change;
            }

            system.emit(TroveEvent::TroveUpdated(EventTroveUpdated {
                trove_id,
                debt: new_debt,
                coll: new_coll,
                stake,
                operation: TroveOperation::AdjustTrove,
            }));

            Ok(AdjustTroveOutcome {
                borrowing_fee,
                new_coll,
                new_debt,
                stake,
            })
        })
    }

    /// Closes a trove on behalf of its owner, who repays the debt minus the gas reserve.
    pub fn close_trove(&mut self, trove_id: TroveId, price: Decimal) -> TroveResult<CloseTroveOutcome> {
        if !self.ledger.is_active(trove_id) {
            return Err(TroveError::TroveNotActive);
        }
        if self.check_recovery_mode(price) {
            return Err(TroveError::InRecoveryMode);
        }
        if self.ledger.trove_owners_count() <= 1 {
            return Err(TroveError::OnlyOneTroveInSystem);
        }

        self.atomically(|system| {
            system.apply_pending_rewards(trove_id)?;

            let trove = system
                .ledger
                .trove(trove_id)
                .ok_or(TroveError::TroveNotActive)?;

            let new_tcr = system.new_tcr_from_trove_change(trove.coll, false, trove.debt, false, price);
            if new_tcr < system.parameters.ccr {
                return Err(TroveError::TcrBelowCcr);
            }

            system.remove_stake(trove_id);
            system.close_trove_with_status(trove_id, TroveStatus::ClosedByOwner)?;

            let gas_compensation = system.parameters.gas_compensation;
            system.pools.active_coll -= trove.coll;
            system.pools.active_debt -= trove.debt;
            system.pools.gas_pool_debt -= gas_compensation;

            system.emit(TroveEvent::TroveUpdated(EventTroveUpdated {
                trove_id,
                debt: Decimal::ZERO,
                coll: Decimal::ZERO,
                stake: Decimal::ZERO,
                operation: TroveOperation::CloseTrove,
            }));

            Ok(CloseTroveOutcome {
                coll: trove.coll,
                debt_to_repay: system.get_net_debt(trove.debt),
                gas_compensation,
            })
        })
    }

    /// Pays out the collateral left to the owner of a trove closed by liquidation or redemption.
    pub fn claim_collateral(&mut self, trove_id: TroveId) -> TroveResult<Decimal> {
        self.pools.claim_coll(trove_id)
    }

    fn require_valid_max_fee_percentage(&self, max_fee_percentage: Decimal, is_recovery_mode: bool) -> TroveResult<()> {
        let in_bounds = if is_recovery_mode {
            max_fee_percentage <= Decimal::ONE
        } else {
            max_fee_percentage >= self.parameters.borrowing_fee_floor && max_fee_percentage <= Decimal::ONE
        };
        if in_bounds {
            Ok(())
        } else {
            Err(TroveError::InvalidMaxFeePercentage)
        }
    }

    fn trigger_borrowing_fee(
        &mut self,
        trove_id: TroveId,
        debt_amount: Decimal,
        max_fee_percentage: Decimal,
        now: i64,
    ) -> TroveResult<Decimal> {
        let previous_last_fee_op_time = self.fees.last_fee_operation_time;
        self.fees.decay_base_rate_from_borrowing(&self.parameters, now);
        self.emit_base_rate_updates(previous_last_fee_op_time);

        let fee = self.fees.borrowing_fee(&self.parameters, debt_amount);
        require_user_accepts_fee(fee, debt_amount, max_fee_percentage)?;

        self.emit(TroveEvent::BorrowingFeePaid(EventBorrowingFeePaid { trove_id, fee }));
        Ok(fee)
    }

    /// TCR after applying a trove change to the system totals.
    pub fn new_tcr_from_trove_change(
        &self,
        coll_change: Decimal,
        is_coll_increase: bool,
        debt_change: Decimal,
        is_debt_increase: bool,
        price: Decimal,
    ) -> Decimal {
        let mut total_coll = self.get_entire_system_coll();
        let mut total_debt = self.get_entire_system_debt();

        if is_coll_increase {
            total_coll += coll_change;
        } else {
            total_coll -= coll_change;
        }
        if is_debt_increase {
            total_debt += debt_change;
        } else {
            total_debt -= debt_change;
        }

        compute_cr(total_coll, total_debt, price)
    }
}
