//! # Fee Model
//!
//! A base rate that decays by `minute_decay_factor` every minute (a 12 hour half-life) and is
//! pushed up by redemptions in proportion to the share of the supply they redeem. Both the
//! redemption and the borrowing rate are the base rate plus a floor.
//!
//! Decay is evaluated lazily against the time of the last fee operation. That time only moves
//! forward once a full minute has passed, so rapid fee operations cannot keep resetting the
//! decay clock.

use crate::errors::{TroveError, TroveResult};
use crate::math::{dec_pow, mul_div, SECONDS_IN_ONE_MINUTE};
use crate::shared_structs::SystemParameters;
use scrypto::prelude::*;

#[derive(ScryptoSbor, Clone, Debug, Default, PartialEq)]
pub struct FeeModel {
    pub base_rate: Decimal,
    /// Seconds since unix epoch.
    pub last_fee_operation_time: i64,
}

impl FeeModel {
    pub fn new(now: i64) -> Self {
        Self {
            base_rate: Decimal::ZERO,
            last_fee_operation_time: now,
        }
    }

    pub fn minutes_passed_since_last_fee_op(&self, now: i64) -> i64 {
        ((now - self.last_fee_operation_time) / SECONDS_IN_ONE_MINUTE).max(0)
    }

    pub fn calc_decayed_base_rate(&self, parameters: &SystemParameters, now: i64) -> Decimal {
        let minutes_passed = self.minutes_passed_since_last_fee_op(now);
        let decay_factor = dec_pow(parameters.minute_decay_factor, minutes_passed);
        self.base_rate * decay_factor
    }

    /// Decays the base rate to `now` and adds `coll_drawn * price / total_debt / beta`, capped at 100%.
    pub fn update_base_rate_from_redemption(
        &mut self,
        parameters: &SystemParameters,
        coll_drawn: Decimal,
        price: Decimal,
        total_debt_supply: Decimal,
        now: i64,
    ) -> TroveResult<Decimal> {
        let decayed_base_rate = self.calc_decayed_base_rate(parameters, now);

        let redeemed_fraction = if total_debt_supply.is_zero() {
            Decimal::ONE
        } else {
            mul_div(coll_drawn, price, total_debt_supply)
        };

        let new_base_rate = (decayed_base_rate + redeemed_fraction / parameters.beta).min(Decimal::ONE);
        if new_base_rate <= Decimal::ZERO {
            return Err(TroveError::ZeroBaseRate);
        }

        self.base_rate = new_base_rate;
        self.update_last_fee_op_time(now);

        Ok(new_base_rate)
    }

    /// Borrowing only decays the base rate, it never raises it.
    pub fn decay_base_rate_from_borrowing(&mut self, parameters: &SystemParameters, now: i64) -> Decimal {
        let decayed_base_rate = self.calc_decayed_base_rate(parameters, now).min(Decimal::ONE);
        self.base_rate = decayed_base_rate;
        self.update_last_fee_op_time(now);
        decayed_base_rate
    }

    /// Returns true if the stored time moved.
    pub fn update_last_fee_op_time(&mut self, now: i64) -> bool {
        if now - self.last_fee_operation_time >= SECONDS_IN_ONE_MINUTE {
            self.last_fee_operation_time = now;
            true
        } else {
            false
        }
    }

    pub fn redemption_rate(&self, parameters: &SystemParameters) -> Decimal {
        Self::calc_redemption_rate(parameters, self.base_rate)
    }

    pub fn redemption_rate_with_decay(&self, parameters: &SystemParameters, now: i64) -> Decimal {
        Self::calc_redemption_rate(parameters, self.calc_decayed_base_rate(parameters, now))
    }

    /// Fee on `coll_drawn` at the current rate. Fails if it would take all of the collateral.
    pub fn redemption_fee(&self, parameters: &SystemParameters, coll_drawn: Decimal) -> TroveResult<Decimal> {
        let fee = self.redemption_rate(parameters) * coll_drawn;
        if fee >= coll_drawn {
            return Err(TroveError::FeeEatsAllCollateral);
        }
        Ok(fee)
    }

    pub fn redemption_fee_with_decay(&self, parameters: &SystemParameters, coll_drawn: Decimal, now: i64) -> Decimal {
        self.redemption_rate_with_decay(parameters, now) * coll_drawn
    }

    pub fn borrowing_rate(&self, parameters: &SystemParameters) -> Decimal {
        Self::calc_borrowing_rate(parameters, self.base_rate)
    }

    pub fn borrowing_rate_with_decay(&self, parameters: &SystemParameters, now: i64) -> Decimal {
        Self::calc_borrowing_rate(parameters, self.calc_decayed_base_rate(parameters, now))
    }

    pub fn borrowing_fee(&self, parameters: &SystemParameters, debt: Decimal) -> Decimal {
        self.borrowing_rate(parameters) * debt
    }

    pub fn borrowing_fee_with_decay(&self, parameters: &SystemParameters, debt: Decimal, now: i64) -> Decimal {
        self.borrowing_rate_with_decay(parameters, now) * debt
    }

    fn calc_redemption_rate(parameters: &SystemParameters, base_rate: Decimal) -> Decimal {
        (parameters.redemption_fee_floor + base_rate).min(Decimal::ONE)
    }

    fn calc_borrowing_rate(parameters: &SystemParameters, base_rate: Decimal) -> Decimal {
        (parameters.borrowing_fee_floor + base_rate).min(parameters.max_borrowing_fee)
    }
}

/// Fails unless `fee / amount <= max_fee_percentage`.
pub fn require_user_accepts_fee(fee: Decimal, amount: Decimal, max_fee_percentage: Decimal) -> TroveResult<()> {
    if amount.is_zero() {
        return Ok(());
    }
    let fee_percentage = mul_div(fee, Decimal::ONE, amount);
    if fee_percentage > max_fee_percentage {
        return Err(TroveError::FeeExceedsMaximum);
    }
    Ok(())
}
