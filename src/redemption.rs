//! # Redemptions
//!
//! Exchanges stablecoin for collateral at face value, taking debt from the troves with the
//! lowest collateral ratio that are still at or above MCR.
//!
//! The walk starts at the first redemption hint when it is still valid, otherwise at the tail
//! of the sorted index, and moves toward the head. Each trove gives up at most its debt minus
//! the gas compensation reserve:
//! - a trove left with only the reserve is closed, its remaining collateral becomes claimable by
//!   the owner and the reserve is burned from the gas pool;
//! - a trove left with more is re-inserted with the caller's hints, unless its new NICR no longer
//!   matches the caller's expectation or its net debt would fall below the minimum. The walk then
//!   stops without touching that trove.
//!
//! A fee, taken from the drawn collateral, is charged at the redemption rate after the base rate
//! has been raised for this redemption.

use crate::errors::{TroveError, TroveResult};
use crate::events::*;
use crate::fee_model::require_user_accepts_fee;
use crate::math::{abs_diff, compute_nominal_cr};
use crate::shared_structs::*;
use crate::trove_system::TroveSystem;
use scrypto::prelude::*;

/// Outcome of redeeming from a single trove.
#[derive(Clone, Copy, Debug, Default)]
struct SingleRedemptionValues {
    debt_lot: Decimal,
    coll_lot: Decimal,
    closed: bool,
    coll_surplus: Decimal,
}

impl TroveSystem {
    pub fn redeem_collateral(
        &mut self,
        request: &RedemptionRequest,
        price: Decimal,
        now: i64,
    ) -> TroveResult<RedemptionTotals> {
        if request.max_fee_percentage < self.parameters.redemption_fee_floor
            || request.max_fee_percentage > Decimal::ONE
        {
            return Err(TroveError::InvalidMaxFeePercentage);
        }
        if now < self.deployment_time + self.parameters.bootstrap_period {
            return Err(TroveError::RedemptionsNotAllowedYet);
        }
        if self.get_tcr(price) < self.parameters.mcr {
            return Err(TroveError::TcrBelowMcr);
        }
        if request.amount <= Decimal::ZERO {
            return Err(TroveError::ZeroAmount);
        }

        self.atomically(|system| system.redeem_collateral_internal(request, price, now))
    }

    fn redeem_collateral_internal(
        &mut self,
        request: &RedemptionRequest,
        price: Decimal,
        now: i64,
    ) -> TroveResult<RedemptionTotals> {
        let mcr = self.parameters.mcr;
        let total_debt_supply_at_start = self.get_entire_system_debt();

        let mut totals = RedemptionTotals {
            attempted_amount: request.amount,
            ..Default::default()
        };
        let mut remaining = request.amount;

        let mut current = if self.is_valid_first_redemption_hint(request.first_redemption_hint, price) {
            request.first_redemption_hint
        } else {
            self.last_trove_above_mcr(price)
        };

        let mut iterations_left = if request.max_iterations == 0 {
            u64::MAX
        } else {
            request.max_iterations
        };

        while let Some(trove_id) = current {
            if remaining.is_zero() || iterations_left == 0 {
                break;
            }
            iterations_left -= 1;

            // Save the neighbour before the trove is re-sorted or removed.
            let next_trove = self.sorted_troves.get_prev(trove_id);

            self.apply_pending_rewards(trove_id)?;

            if self.get_current_icr(trove_id, price) < mcr {
                current = next_trove;
                continue;
            }

            let Some(values) = self.redeem_collateral_from_trove(trove_id, remaining, price, request)? else {
                break;
            };

            totals.total_debt_redeemed += values.debt_lot;
            totals.total_coll_drawn += values.coll_lot;
            totals.total_coll_surplus += values.coll_surplus;
            if values.closed {
                totals.total_gas_compensation_burned += self.parameters.gas_compensation;
            }
            totals.redeemed.push((trove_id, values.closed));

            remaining -= values.debt_lot;
            current = next_trove;
        }

        // Nothing was redeemable with these hints, leave the fee state alone.
        if totals.total_coll_drawn.is_zero() {
            return Ok(totals);
        }

        let previous_last_fee_op_time = self.fees.last_fee_operation_time;
        self.fees.update_base_rate_from_redemption(
            &self.parameters,
            totals.total_coll_drawn,
            price,
            total_debt_supply_at_start,
            now,
        )?;
        self.emit_base_rate_updates(previous_last_fee_op_time);

        let coll_fee = self.fees.redemption_fee(&self.parameters, totals.total_coll_drawn)?;
        require_user_accepts_fee(coll_fee, totals.total_coll_drawn, request.max_fee_percentage)?;

        totals.coll_fee = coll_fee;
        totals.coll_to_send_to_redeemer = totals.total_coll_drawn - coll_fee;

        self.pools.active_debt -= totals.total_debt_redeemed;
        self.pools.active_coll -= totals.total_coll_drawn;

        self.emit(TroveEvent::Redemption(EventRedemption {
            attempted_amount: totals.attempted_amount,
            actual_amount: totals.total_debt_redeemed,
            coll_sent: totals.total_coll_drawn,
            coll_fee,
        }));

        Ok(totals)
    }

    /// Returns `None` when a partial redemption was cancelled.
    fn redeem_collateral_from_trove(
        &mut self,
        trove_id: TroveId,
        max_debt: Decimal,
        price: Decimal,
        request: &RedemptionRequest,
    ) -> TroveResult<Option<SingleRedemptionValues>> {
        let trove = self
            .ledger
            .trove(trove_id)
            .ok_or(TroveError::TroveNotActive)?;
        let gas_compensation = self.parameters.gas_compensation;

        let debt_lot = max_debt.min(trove.debt - gas_compensation);
        let coll_lot = debt_lot / price;

        let new_debt = trove.debt - debt_lot;
        let new_coll = trove.coll - coll_lot;

        if new_debt == gas_compensation {
            self.remove_stake(trove_id);
            self.close_trove_with_status(trove_id, TroveStatus::ClosedByRedemption)?;

            self.pools.gas_pool_debt -= gas_compensation;
            self.pools.active_debt -= gas_compensation;
            if new_coll > Decimal::ZERO {
                self.pools.account_surplus(trove_id, new_coll);
            }

            self.emit(TroveEvent::TroveUpdated(EventTroveUpdated {
                trove_id,
                debt: Decimal::ZERO,
                coll: Decimal::ZERO,
                stake: Decimal::ZERO,
                operation: TroveOperation::RedeemCollateral,
            }));

            return Ok(Some(SingleRedemptionValues {
                debt_lot,
                coll_lot,
                closed: true,
                coll_surplus: new_coll,
            }));
        }

        let new_nicr = compute_nominal_cr(new_coll, new_debt);

        // The caller's hint was computed against a state that has since moved, or the
        // remainder would be too small to stay open.
        if abs_diff(new_nicr, request.partial_redemption_hint_nicr) > self.parameters.nicr_hint_tolerance
            || self.get_net_debt(new_debt) < self.parameters.min_net_debt
        {
            return Ok(None);
        }

        self.ledger.set_coll_and_debt(trove_id, new_coll, new_debt)?;
        self.re_insert_into_index(
            trove_id,
            new_nicr,
            request.upper_partial_redemption_hint,
            request.lower_partial_redemption_hint,
        )?;
        let stake = self.update_stake_and_total_stakes(trove_id)?;

        self.emit(TroveEvent::TroveUpdated(EventTroveUpdated {
            trove_id,
            debt: new_debt,
            coll: new_coll,
            stake,
            operation: TroveOperation::RedeemCollateral,
        }));

        Ok(Some(SingleRedemptionValues {
            debt_lot,
            coll_lot,
            closed: false,
            coll_surplus: Decimal::ZERO,
        }))
    }

    /// A valid hint is an active trove with ICR >= MCR whose lower neighbour is below MCR or absent.
    fn is_valid_first_redemption_hint(&self, hint: Option<TroveId>, price: Decimal) -> bool {
        let Some(hint) = hint else {
            return false;
        };
        if !self.sorted_troves.contains(hint) || self.get_current_icr(hint, price) < self.parameters.mcr {
            return false;
        }

        match self.sorted_troves.get_next(hint) {
            Some(next) => self.get_current_icr(next, price) < self.parameters.mcr,
            None => true,
        }
    }

    fn last_trove_above_mcr(&self, price: Decimal) -> Option<TroveId> {
        let mut current = self.sorted_troves.get_last();
        while let Some(trove_id) = current {
            if self.get_current_icr(trove_id, price) >= self.parameters.mcr {
                break;
            }
            current = self.sorted_troves.get_prev(trove_id);
        }
        current
    }

    /// Simulates a redemption of `amount` without changing state and returns the hints a
    /// redeemer should pass along. `max_iterations` of `0` means no limit.
    pub fn get_redemption_hints(&self, amount: Decimal, price: Decimal, max_iterations: u64) -> RedemptionHints {
        let mut remaining = amount;
        let mut current = self.last_trove_above_mcr(price);
        let first_redemption_hint = current;
        let mut partial_redemption_hint_nicr = Decimal::ZERO;

        let mut iterations_left = if max_iterations == 0 { u64::MAX } else { max_iterations };

        while let Some(trove_id) = current {
            if remaining <= Decimal::ZERO || iterations_left == 0 {
                break;
            }
            iterations_left -= 1;

            let entire = self.ledger.entire_debt_and_coll(trove_id);
            let net_debt = self.get_net_debt(entire.debt);

            if net_debt > remaining {
                if net_debt > self.parameters.min_net_debt {
                    let max_redeemable = remaining.min(net_debt - self.parameters.min_net_debt);

                    let new_coll = entire.coll - max_redeemable / price;
                    let new_debt = self.get_composite_debt(net_debt - max_redeemable);

                    partial_redemption_hint_nicr = compute_nominal_cr(new_coll, new_debt);
                    remaining -= max_redeemable;
                }
                break;
            }

            remaining -= net_debt;
            current = self.sorted_troves.get_prev(trove_id);
        }

        RedemptionHints {
            first_redemption_hint,
            partial_redemption_hint_nicr,
            truncated_amount: amount - remaining,
        }
    }

    /// Samples `num_trials` troves from the owner array and returns the one whose NICR is closest
    /// to `cr`, with the distance and the last seed. A good starting hint for `find_insert_position`.
    pub fn get_approx_hint(&self, cr: Decimal, num_trials: u64, input_random_seed: u64) -> (Option<TroveId>, Decimal, u64) {
        let array_length = self.ledger.trove_owners_count();
        if array_length == 0 {
            return (None, Decimal::ZERO, input_random_seed);
        }

        let mut hint = self.sorted_troves.get_last();
        let mut diff = hint
            .map(|id| abs_diff(self.get_nominal_icr(id), cr))
            .unwrap_or(Decimal::MAX);
        let mut seed = input_random_seed;

        for _ in 1..num_trials {
            seed = next_random_seed(seed);
            let index = seed % array_length;

            if let Some(candidate) = self.ledger.trove_from_owners_array(index) {
                let candidate_diff = abs_diff(self.get_nominal_icr(candidate), cr);
                if candidate_diff < diff {
                    diff = candidate_diff;
                    hint = Some(candidate);
                }
            }
        }

        (hint, diff, seed)
    }
}

/// Hashes the seed and reads the first eight bytes of the digest as the next seed.
fn next_random_seed(seed: u64) -> u64 {
    let digest = hash(seed.to_le_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest.0[..8]);
    u64::from_le_bytes(bytes)
}
