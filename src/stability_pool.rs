#![allow(deprecated)]

//! # Stability Pool Blueprint
//!
//! This blueprint defines the `StabilityPool` component, which holds the stablecoin deposits that
//! absorb the debt of liquidated troves.
//!
//! ## Functionality
//! - **Pooling:** Users contribute stablecoin (and collateral, once the pool holds some) and receive
//!   pool units representing their share of both.
//! - **Offsets:** When troves are liquidated, the `TroveManager` calls `offset`. The offset debt is
//!   withdrawn as stablecoin and handed back for burning, and the liquidated collateral is deposited
//!   in its place, so contributors gain collateral pro rata.
//! - **Withdrawals:** Redeeming pool units returns the contributor's share of stablecoin and collateral.
//!
//! The liquidity itself is kept in a native `TwoResourcePool`, so share accounting follows the pool
//! units instead of per-depositor snapshots.

use crate::events::*;
use scrypto::prelude::*;

#[blueprint]
#[events(
    StabilityPoolContributionEvent,
    StabilityPoolWithdrawalEvent,
    StabilityPoolOffsetEvent,
)]
mod stability_pool {
    enable_method_auth! {
        methods {
            contribute_to_pool => PUBLIC;
            withdraw_from_pool => PUBLIC;
            get_total_deposits => PUBLIC;
            get_pool_amounts => PUBLIC;
            get_pool_unit_address => PUBLIC;
            offset => restrict_to: [OWNER];
        }
    }

    struct StabilityPool {
        /// The native pool holding (collateral, stablecoin).
        pool: Global<TwoResourcePool>,
        collateral_address: ResourceAddress,
        stable_address: ResourceAddress,
        pool_unit_address: ResourceAddress,
    }

    impl StabilityPool {
        /// Instantiates the `StabilityPool` component for one collateral.
        ///
        /// The component is owned by holders of 0.75 controller badges, which is what the
        /// `TroveManager` uses to call `offset`.
        ///
        /// # Arguments
        /// * `controller_badge_address`: The `ResourceAddress` of the controller badge.
        /// * `collateral_address`: The `ResourceAddress` of the collateral.
        /// * `stable_address`: The `ResourceAddress` of the stablecoin.
        pub fn instantiate(
            controller_badge_address: ResourceAddress,
            collateral_address: ResourceAddress,
            stable_address: ResourceAddress,
        ) -> Global<StabilityPool> {
            let (address_reservation, component_address) =
                Runtime::allocate_component_address(StabilityPool::blueprint_id());

            let owner_role = OwnerRole::Fixed(rule!(require_amount(
                dec!("0.75"),
                controller_badge_address
            )));

            let pool = Blueprint::<TwoResourcePool>::instantiate(
                owner_role.clone(),
                rule!(require(global_caller(component_address))
                    || require_amount(dec!("0.75"), controller_badge_address)),
                (collateral_address, stable_address),
                None,
            );

            let pool_unit_global_address: GlobalAddress = match pool.get_metadata("pool_unit") {
                Ok(Some(address)) => address,
                _ => panic!("Pool unit address missing."),
            };
            let pool_unit_address = match ResourceAddress::try_from(pool_unit_global_address) {
                Ok(address) => address,
                Err(_) => panic!("Pool unit is not a resource."),
            };

            Self {
                pool,
                collateral_address,
                stable_address,
                pool_unit_address,
            }
            .instantiate()
            .prepare_to_globalize(owner_role)
            .with_address(address_reservation)
            .metadata(metadata! {
                init {
                    "name" => "Trove Protocol Stability Pool".to_string(), updatable;
                    "description" => "Stablecoin deposits absorbing liquidated trove debt".to_string(), updatable;
                }
            })
            .globalize()
        }

        /// Contributes stablecoin, and collateral in proportion to the pool's holdings, to the pool.
        ///
        /// # Returns
        /// * `(Bucket, Option<Bucket>)`: The pool units, and whatever part of the contribution the
        ///   pool could not take at its current ratio.
        ///
        /// # Panics
        /// * If the buckets are not stablecoin and collateral.
        pub fn contribute_to_pool(&mut self, stable: Bucket, collateral: Bucket) -> (Bucket, Option<Bucket>) {
            assert!(
                stable.resource_address() == self.stable_address,
                "Invalid stablecoin input."
            );
            assert!(
                collateral.resource_address() == self.collateral_address,
                "Invalid collateral input."
            );

            let stable_amount = stable.amount();
            let collateral_amount = collateral.amount();

            let (pool_units, leftover) = self
                .pool
                .contribute((collateral.as_fungible(), stable.as_fungible()));

            Runtime::emit_event(StabilityPoolContributionEvent {
                stable_amount,
                collateral_amount,
                pool_tokens_received: pool_units.amount(),
            });

            (pool_units.into(), leftover.map(|bucket| bucket.into()))
        }

        /// Redeems pool units for the matching share of collateral and stablecoin.
        ///
        /// # Returns
        /// * `(Bucket, Bucket)`: The collateral and stablecoin buckets.
        pub fn withdraw_from_pool(&mut self, pool_units: Bucket) -> (Bucket, Bucket) {
            assert!(
                pool_units.resource_address() == self.pool_unit_address,
                "Invalid pool units."
            );
            let pool_tokens_burned = pool_units.amount();

            let (collateral, stable) = self.pool.redeem(pool_units.as_fungible());

            Runtime::emit_event(StabilityPoolWithdrawalEvent {
                pool_tokens_burned,
                stable_received: stable.amount(),
                collateral_received: collateral.amount(),
            });

            (collateral.into(), stable.into())
        }

        /// Cancels `debt_to_offset` against the deposits and takes in the liquidated collateral.
        ///
        /// Requires OWNER authorization (controller badge).
        ///
        /// # Returns
        /// * `Bucket`: The withdrawn stablecoin, to be burned by the caller.
        ///
        /// # Panics
        /// * If the pool holds less stablecoin than `debt_to_offset`.
        pub fn offset(&mut self, debt_to_offset: Decimal, collateral: Bucket) -> Bucket {
            assert!(
                debt_to_offset <= self.get_total_deposits(),
                "Not enough deposits to offset."
            );
            let collateral_added = collateral.amount();

            let stable = self.pool.protected_withdraw(
                self.stable_address,
                debt_to_offset,
                WithdrawStrategy::Rounded(RoundingMode::ToNegativeInfinity),
            );
            if !collateral.is_empty() {
                self.pool.protected_deposit(collateral.as_fungible());
            } else {
                collateral.drop_empty();
            }

            Runtime::emit_event(StabilityPoolOffsetEvent {
                debt_offset: stable.amount(),
                collateral_added,
            });

            stable.into()
        }

        pub fn get_total_deposits(&self) -> Decimal {
            *self
                .pool
                .get_vault_amounts()
                .get(&self.stable_address)
                .unwrap_or(&Decimal::ZERO)
        }

        /// Returns the `(collateral, stablecoin)` amounts held by the pool.
        pub fn get_pool_amounts(&self) -> (Decimal, Decimal) {
            let amounts = self.pool.get_vault_amounts();
            (
                *amounts.get(&self.collateral_address).unwrap_or(&Decimal::ZERO),
                *amounts.get(&self.stable_address).unwrap_or(&Decimal::ZERO),
            )
        }

        pub fn get_pool_unit_address(&self) -> ResourceAddress {
            self.pool_unit_address
        }
    }
}
