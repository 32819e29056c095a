//! Balance ledgers the engine moves value between, and the Stability Pool seam.
//!
//! The ledgers only relabel value: collateral and debt move between the active pool, the
//! default pool (redistributed but not yet applied to troves) and the surplus pool. The
//! on-ledger component keeps the matching tokens in vaults.

use crate::errors::{TroveError, TroveResult};
use crate::shared_structs::TroveId;
use crate::storage::TroveMap;
use scrypto::prelude::*;

/// What the liquidation engine needs from a Stability Pool.
pub trait StabilityPool {
    /// Stablecoin available to cancel debt.
    fn get_total_deposits(&self) -> Decimal;

    /// Cancels `debt_to_offset` of pool deposits against liquidated debt and hands the pool
    /// `coll_to_add` of collateral in return.
    fn offset(&mut self, debt_to_offset: Decimal, coll_to_add: Decimal);
}

/// Plain deposit and gain totals of a Stability Pool, without per-depositor accounting.
#[derive(ScryptoSbor, Clone, Copy, Debug, Default, PartialEq)]
pub struct StabilityPoolDeposits {
    pub total_deposits: Decimal,
    pub collateral_gains: Decimal,
}

impl StabilityPoolDeposits {
    pub fn new(total_deposits: Decimal) -> Self {
        Self {
            total_deposits,
            collateral_gains: Decimal::ZERO,
        }
    }
}

impl StabilityPool for StabilityPoolDeposits {
    fn get_total_deposits(&self) -> Decimal {
        self.total_deposits
    }

    fn offset(&mut self, debt_to_offset: Decimal, coll_to_add: Decimal) {
        self.total_deposits -= debt_to_offset;
        self.collateral_gains += coll_to_add;
    }
}

#[derive(ScryptoSbor, Debug, PartialEq)]
pub struct PoolBalances {
    /// Collateral and debt of troves, excluding pending rewards.
    pub active_coll: Decimal,
    pub active_debt: Decimal,
    /// Redistributed collateral and debt not yet applied to troves.
    pub default_coll: Decimal,
    pub default_debt: Decimal,
    /// Stablecoin reserved for liquidators.
    pub gas_pool_debt: Decimal,
    pub total_coll_surplus: Decimal,
    coll_surplus: TroveMap<Decimal>,
}

impl PoolBalances {
    pub fn new() -> Self {
        Self::with_surplus(TroveMap::memory())
    }

    /// Balances whose per-trove surplus lives in a `KeyValueStore`.
    pub fn new_on_ledger() -> Self {
        Self::with_surplus(TroveMap::ledger())
    }

    fn with_surplus(coll_surplus: TroveMap<Decimal>) -> Self {
        Self {
            active_coll: Decimal::ZERO,
            active_debt: Decimal::ZERO,
            default_coll: Decimal::ZERO,
            default_debt: Decimal::ZERO,
            gas_pool_debt: Decimal::ZERO,
            total_coll_surplus: Decimal::ZERO,
            coll_surplus,
        }
    }

    pub fn checkpoint(&self) -> Option<Self> {
        Some(Self {
            coll_surplus: self.coll_surplus.checkpoint()?,
            ..*self
        })
    }

    pub fn entire_system_coll(&self) -> Decimal {
        self.active_coll + self.default_coll
    }

    pub fn entire_system_debt(&self) -> Decimal {
        self.active_debt + self.default_debt
    }

    /// Pending rewards of a trove leave the default pool when they are applied to it.
    pub fn move_pending_trove_rewards_to_active_pool(&mut self, debt: Decimal, coll: Decimal) {
        self.default_debt -= debt;
        self.active_debt += debt;
        self.default_coll -= coll;
        self.active_coll += coll;
    }

    /// Redistributed leftovers of a liquidation leave the active pool.
    pub fn move_to_default_pool(&mut self, debt: Decimal, coll: Decimal) {
        self.active_debt -= debt;
        self.default_debt += debt;
        self.active_coll -= coll;
        self.default_coll += coll;
    }

    pub fn account_surplus(&mut self, id: TroveId, amount: Decimal) {
        self.active_coll -= amount;
        self.total_coll_surplus += amount;
        let balance = self.surplus_of(id);
        self.coll_surplus.insert(id, balance + amount);
    }

    pub fn surplus_of(&self, id: TroveId) -> Decimal {
        self.coll_surplus.get(id).unwrap_or(Decimal::ZERO)
    }

    /// Empties the surplus balance of a trove, returning the amount.
    pub fn claim_coll(&mut self, id: TroveId) -> TroveResult<Decimal> {
        let amount = self.surplus_of(id);
        if amount <= Decimal::ZERO {
            return Err(TroveError::NoCollateralToClaim);
        }
        self.coll_surplus.remove(id);
        self.total_coll_surplus -= amount;
        Ok(amount)
    }
}
