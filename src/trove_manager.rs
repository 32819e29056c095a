#![allow(deprecated)]

//! # Trove Manager Blueprint
//!
//! This blueprint defines the `TroveManager` component, the on-ledger home of the trove engine.
//! It holds every vault and resource of the protocol and translates between buckets and the
//! engine's bookkeeping.
//!
//! ## Overview
//! - **Troves:** Users open a trove by depositing collateral and borrowing stablecoin, receiving a
//!   trove receipt NFT. The receipt is required to adjust or close the trove, and to claim collateral
//!   left over after a liquidation or redemption closed it.
//! - **Liquidations:** Anyone can liquidate troves below the minimum collateral ratio and is paid
//!   the gas compensation in collateral and stablecoin. Debt is offset against the `StabilityPool`
//!   first and redistributed over the remaining troves otherwise.
//! - **Redemptions:** Anyone can exchange stablecoin for collateral at the oracle price, minus the
//!   redemption fee.
//!
//! ## Vaults
//! - `collateral_vault`: collateral of all open troves, including redistributed collateral not yet
//!   applied to a trove.
//! - `surplus_vault`: collateral claimable by owners of closed troves.
//! - `gas_pool_vault`: stablecoin reserved as liquidation gas compensation.
//! - `borrowing_fee_vault` and `redemption_fee_vault`: collected fees, withdrawable by the owner.
//!
//! ## State
//! Trove records, reward snapshots, index nodes, the owner array and per-trove surplus are kept in
//! `KeyValueStore`s inside the engine state, so a call only loads the troves it touches.
//!
//! ## Interaction with Other Components
//! - **`StabilityPool`:** Instantiated alongside this component. Called with the controller badge to
//!   offset liquidated debt.
//! - **Oracle:** Provides the collateral price through `call_raw`.

use crate::errors::TroveError;
use crate::events::*;
use crate::pools::StabilityPool as OffsetTarget;
use crate::shared_structs::*;
use crate::sorted_troves::Node;
use crate::stability_pool::stability_pool::StabilityPool;
use crate::trove_system::TroveSystem;
use scrypto::prelude::*;

/// Records the offset the engine asks for, so the component can move the matching buckets after
/// the engine call returned.
struct PendingOffset {
    total_deposits: Decimal,
    debt_to_offset: Decimal,
    coll_to_add: Decimal,
}

impl OffsetTarget for PendingOffset {
    fn get_total_deposits(&self) -> Decimal {
        self.total_deposits
    }

    fn offset(&mut self, debt_to_offset: Decimal, coll_to_add: Decimal) {
        self.debt_to_offset += debt_to_offset;
        self.coll_to_add += coll_to_add;
        self.total_deposits -= debt_to_offset;
    }
}

fn unwrap_trove<T>(result: Result<T, TroveError>) -> T {
    result.unwrap_or_else(|e| panic!("{}", e))
}

#[blueprint]
#[types(TroveReceipt, TroveStatus, Trove, RewardSnapshot, Node, Decimal)]
#[events(
    EventTroveUpdated,
    EventTroveLiquidated,
    EventLiquidation,
    EventRedemption,
    EventBaseRateUpdated,
    EventLastFeeOpTimeUpdated,
    EventLTermsUpdated,
    EventSystemSnapshotsUpdated,
    EventTotalStakesUpdated,
    EventTroveIndexUpdated,
    EventBorrowingFeePaid,
    EventCollateralClaimed,
)]
mod trove_manager {
    enable_method_auth! {
        methods {
            open_trove => PUBLIC;
            adjust_trove => PUBLIC;
            close_trove => PUBLIC;
            claim_collateral => PUBLIC;
            liquidate => PUBLIC;
            liquidate_troves => PUBLIC;
            batch_liquidate_troves => PUBLIC;
            redeem_collateral => PUBLIC;
            get_price => PUBLIC;
            get_entire_debt_and_coll => PUBLIC;
            get_pending_coll_reward => PUBLIC;
            get_pending_debt_reward => PUBLIC;
            get_nominal_icr => PUBLIC;
            get_current_icr => PUBLIC;
            get_tcr => PUBLIC;
            check_recovery_mode => PUBLIC;
            get_trove_infos => PUBLIC;
            get_system_info => PUBLIC;
            get_sorted_troves => PUBLIC;
            find_insert_position => PUBLIC;
            get_redemption_hints => PUBLIC;
            get_approx_hint => PUBLIC;
            get_claimable_collateral => PUBLIC;
            get_parameters => PUBLIC;
            get_stable_address => PUBLIC;
            get_trove_receipt_address => PUBLIC;
            set_parameters => restrict_to: [OWNER];
            set_oracle => restrict_to: [OWNER];
            withdraw_fees => restrict_to: [OWNER];
        }
    }

    struct TroveManager {
        /// The trove engine: sorted index, trove records, reward accumulators, pool ledgers and fees.
        system: TroveSystem,
        /// Collateral of the active and default pools.
        collateral_vault: Vault,
        /// Collateral claimable by owners of troves closed by a liquidation or redemption.
        surplus_vault: Vault,
        /// Stablecoin reserved for liquidation gas compensation.
        gas_pool_vault: Vault,
        /// Borrowing fees, paid in stablecoin.
        borrowing_fee_vault: Vault,
        /// Redemption fees, paid in collateral.
        redemption_fee_vault: Vault,
        /// Controller badges used to call the stability pool.
        badge_vault: FungibleVault,
        stable_manager: ResourceManager,
        trove_receipt_manager: ResourceManager,
        stability_pool: Global<StabilityPool>,
        oracle: Global<AnyComponent>,
        oracle_method_name: String,
        collateral_address: ResourceAddress,
        /// Last issued trove id. Ids start at 1.
        trove_counter: u64,
    }

    impl TroveManager {
        /// Instantiates the `TroveManager` together with its stablecoin, trove receipt and
        /// `StabilityPool`.
        ///
        /// # Arguments
        /// * `collateral_address`: The `ResourceAddress` of the collateral accepted by the troves.
        /// * `oracle_address`: The `ComponentAddress` of the price oracle.
        /// * `oracle_method_name`: The oracle method returning the collateral price.
        /// * `parameters`: The initial `SystemParameters`.
        ///
        /// # Returns
        /// * `Global<TroveManager>`: The new component.
        /// * `Global<StabilityPool>`: The stability pool the component liquidates against.
        /// * `Bucket`: An admin badge, worth one controller badge.
        pub fn instantiate(
            collateral_address: ResourceAddress,
            oracle_address: ComponentAddress,
            oracle_method_name: String,
            parameters: SystemParameters,
        ) -> (Global<TroveManager>, Global<StabilityPool>, Bucket) {
            let (address_reservation, component_address) =
                Runtime::allocate_component_address(TroveManager::blueprint_id());

            let mut controller_badge: Bucket = ResourceBuilder::new_fungible(OwnerRole::Fixed(rule!(
                require(global_caller(component_address))
            )))
            .divisibility(DIVISIBILITY_MAXIMUM)
            .metadata(metadata!(
                init {
                    "name" => "Trove Protocol controller badge", locked;
                    "symbol" => "troveCTRL", locked;
                }
            ))
            .mint_roles(mint_roles!(
                minter => rule!(require(global_caller(component_address)));
                minter_updater => rule!(deny_all);
            ))
            .mint_initial_supply(2)
            .into();

            let badge_address = controller_badge.resource_address();
            let admin_badge = controller_badge.take(Decimal::ONE);

            let stable_manager: ResourceManager = ResourceBuilder::new_fungible(OwnerRole::Fixed(
                rule!(require_amount(dec!("0.75"), badge_address)),
            ))
            .divisibility(DIVISIBILITY_MAXIMUM)
            .metadata(metadata!(
                init {
                    "name" => "Trove Protocol USD", updatable;
                    "symbol" => "tUSD", updatable;
                    "tags" => vec!["stablecoin", "defi", "usd"], updatable;
                }
            ))
            .mint_roles(mint_roles!(
                minter => rule!(require(global_caller(component_address))
                    || require_amount(dec!("0.75"), badge_address));
                minter_updater => rule!(require_amount(dec!("0.75"), badge_address));
            ))
            .burn_roles(burn_roles!(
                burner => rule!(require(global_caller(component_address))
                    || require_amount(dec!("0.75"), badge_address));
                burner_updater => rule!(require_amount(dec!("0.75"), badge_address));
            ))
            .create_with_no_initial_supply()
            .into();

            let trove_receipt_manager: ResourceManager =
                ResourceBuilder::new_integer_non_fungible_with_registered_type::<TroveReceipt>(OwnerRole::Fixed(rule!(
                    require_amount(dec!("0.75"), badge_address)
                )))
                .metadata(metadata!(
                    init {
                        "name" => "Trove Receipt", locked;
                        "symbol" => "troveREC", locked;
                        "description" => "A receipt for your trove.", locked;
                    }
                ))
                .non_fungible_data_update_roles(non_fungible_data_update_roles!(
                    non_fungible_data_updater => rule!(require(global_caller(component_address))
                        || require_amount(dec!("0.75"), badge_address));
                    non_fungible_data_updater_updater => rule!(require_amount(dec!("0.75"), badge_address));
                ))
                .mint_roles(mint_roles!(
                    minter => rule!(require(global_caller(component_address))
                        || require_amount(dec!("0.75"), badge_address));
                    minter_updater => rule!(require_amount(dec!("0.75"), badge_address));
                ))
                .create_with_no_initial_supply()
                .into();

            let stability_pool = StabilityPool::instantiate(
                badge_address,
                collateral_address,
                stable_manager.address(),
            );

            let now = Clock::current_time_rounded_to_seconds().seconds_since_unix_epoch;

            let trove_manager = Self {
                system: TroveSystem::new_on_ledger(parameters, now),
                collateral_vault: Vault::new(collateral_address),
                surplus_vault: Vault::new(collateral_address),
                gas_pool_vault: Vault::new(stable_manager.address()),
                borrowing_fee_vault: Vault::new(stable_manager.address()),
                redemption_fee_vault: Vault::new(collateral_address),
                badge_vault: FungibleVault::with_bucket(controller_badge.as_fungible()),
                stable_manager,
                trove_receipt_manager,
                stability_pool,
                oracle: Global::from(oracle_address),
                oracle_method_name,
                collateral_address,
                trove_counter: 0,
            }
            .instantiate()
            .prepare_to_globalize(OwnerRole::Fixed(rule!(require_amount(
                dec!("0.75"),
                badge_address
            ))))
            .with_address(address_reservation)
            .metadata(metadata! {
                init {
                    "name" => "Trove Protocol Trove Manager".to_string(), updatable;
                    "description" => "Troves, liquidations and redemptions for the Trove Protocol".to_string(), updatable;
                }
            })
            .globalize();

            (trove_manager, stability_pool, admin_badge)
        }

        /// Opens a trove, borrowing `debt_amount` of stablecoin against `collateral`.
        ///
        /// The borrowing fee and the gas compensation are added to the trove's debt. The fee is
        /// kept in the borrowing fee vault and the gas compensation in the gas pool.
        ///
        /// # Arguments
        /// * `collateral`: A `Bucket` of collateral to lock.
        /// * `debt_amount`: The stablecoin to borrow.
        /// * `max_fee_percentage`: The highest borrowing rate the caller accepts.
        /// * `upper_hint`, `lower_hint`: Neighbours of the new trove in the sorted index.
        ///
        /// # Returns
        /// * `(Bucket, Bucket)`: The trove receipt NFT and the borrowed stablecoin.
        pub fn open_trove(
            &mut self,
            collateral: Bucket,
            debt_amount: Decimal,
            max_fee_percentage: Decimal,
            upper_hint: Option<TroveId>,
            lower_hint: Option<TroveId>,
        ) -> (Bucket, Bucket) {
            assert!(
                collateral.resource_address() == self.collateral_address,
                "Invalid collateral."
            );
            let price = self.fetch_price();
            let now = Self::now();

            self.trove_counter += 1;
            let trove_id = self.trove_counter;

            let outcome = unwrap_trove(self.system.open_trove(
                trove_id,
                collateral.amount(),
                debt_amount,
                max_fee_percentage,
                upper_hint,
                lower_hint,
                price,
                now,
            ));

            self.collateral_vault.put(collateral);

            let gas_compensation = self.system.parameters.gas_compensation;
            if gas_compensation > Decimal::ZERO {
                self.gas_pool_vault.put(self.stable_manager.mint(gas_compensation));
            }
            if outcome.borrowing_fee > Decimal::ZERO {
                self.borrowing_fee_vault
                    .put(self.stable_manager.mint(outcome.borrowing_fee));
            }
            let borrowed = self.stable_manager.mint(debt_amount);

            let receipt = self.trove_receipt_manager.mint_non_fungible(
                &NonFungibleLocalId::integer(trove_id),
                TroveReceipt {
                    key_image_url: Url::of(RECEIPT_IMAGE_URL),
                    collateral_address: self.collateral_address,
                    status: TroveStatus::Active,
                },
            );

            self.emit_events();
            (receipt, borrowed)
        }

        /// Adjusts a trove: deposits or withdraws collateral, and borrows more or repays debt.
        ///
        /// # Arguments
        /// * `receipt_proof`: A `NonFungibleProof` of the trove receipt.
        /// * `collateral_deposit`: Optional collateral to add.
        /// * `collateral_withdrawal`: Collateral to withdraw.
        /// * `repayment`: Optional stablecoin to repay debt with.
        /// * `debt_increase`: Stablecoin to borrow additionally.
        /// * `max_fee_percentage`: The highest borrowing rate accepted for `debt_increase`.
        /// * `upper_hint`, `lower_hint`: Neighbours of the trove at its new position.
        ///
        /// # Returns
        /// * `(Bucket, Bucket)`: Withdrawn collateral and borrowed stablecoin. Either may be empty.
        ///
        /// # Panics
        /// * If both a repayment and a debt increase are given.
        pub fn adjust_trove(
            &mut self,
            receipt_proof: NonFungibleProof,
            collateral_deposit: Option<Bucket>,
            collateral_withdrawal: Decimal,
            repayment: Option<Bucket>,
            debt_increase: Decimal,
            max_fee_percentage: Decimal,
            upper_hint: Option<TroveId>,
            lower_hint: Option<TroveId>,
        ) -> (Bucket, Bucket) {
            let trove_id = self.trove_id_from_proof(receipt_proof);
            let price = self.fetch_price();
            let now = Self::now();

            let coll_deposit = match &collateral_deposit {
                Some(bucket) => {
                    assert!(
                        bucket.resource_address() == self.collateral_address,
                        "Invalid collateral."
                    );
                    bucket.amount()
                }
                None => Decimal::ZERO,
            };
            let repayment_amount = match &repayment {
                Some(bucket) => {
                    assert!(
                        bucket.resource_address() == self.stable_manager.address(),
                        "Invalid repayment."
                    );
                    bucket.amount()
                }
                None => Decimal::ZERO,
            };
            assert!(
                repayment_amount.is_zero() || debt_increase.is_zero(),
                "Cannot repay and borrow in one adjustment."
            );

            let is_debt_increase = debt_increase > Decimal::ZERO;
            let debt_change = if is_debt_increase { debt_increase } else { repayment_amount };

            let outcome = unwrap_trove(self.system.adjust_trove(
                trove_id,
                coll_deposit,
                collateral_withdrawal,
                debt_change,
                is_debt_increase,
                max_fee_percentage,
                upper_hint,
                lower_hint,
                price,
                now,
            ));

            if let Some(bucket) = collateral_deposit {
                self.collateral_vault.put(bucket);
            }
            let withdrawn = self.collateral_vault.take(collateral_withdrawal);

            let stable_out = if is_debt_increase {
                if outcome.borrowing_fee > Decimal::ZERO {
                    self.borrowing_fee_vault
                        .put(self.stable_manager.mint(outcome.borrowing_fee));
                }
                self.stable_manager.mint(debt_increase)
            } else {
                if let Some(bucket) = repayment {
                    bucket.burn();
                }
                Bucket::new(self.stable_manager.address())
            };

            self.emit_events();
            (withdrawn, stable_out)
        }

        /// Closes a trove. The owner repays its debt except for the gas compensation, which is burned
        /// from the gas pool.
        ///
        /// # Returns
        /// * `(Bucket, Bucket)`: The trove's collateral and the unused part of `payment`.
        pub fn close_trove(&mut self, receipt_proof: NonFungibleProof, mut payment: Bucket) -> (Bucket, Bucket) {
            let trove_id = self.trove_id_from_proof(receipt_proof);
            assert!(
                payment.resource_address() == self.stable_manager.address(),
                "Invalid payment."
            );
            let price = self.fetch_price();

            let outcome = unwrap_trove(self.system.close_trove(trove_id, price));

            assert!(
                payment.amount() >= outcome.debt_to_repay,
                "Payment does not cover the trove's debt."
            );
            payment.take(outcome.debt_to_repay).burn();
            if outcome.gas_compensation > Decimal::ZERO {
                self.gas_pool_vault.take(outcome.gas_compensation).burn();
            }

            self.set_receipt_status(trove_id, TroveStatus::ClosedByOwner);

            self.emit_events();
            (self.collateral_vault.take(outcome.coll), payment)
        }

        /// Claims the collateral left over after the trove was closed by a liquidation or redemption.
        pub fn claim_collateral(&mut self, receipt_proof: NonFungibleProof) -> Bucket {
            let trove_id = self.trove_id_from_proof(receipt_proof);

            let amount = unwrap_trove(self.system.claim_collateral(trove_id));

            Runtime::emit_event(EventCollateralClaimed { trove_id, amount });
            self.surplus_vault.take(amount)
        }

        /// Liquidates a single trove.
        ///
        /// # Returns
        /// * `(Bucket, Bucket)`: The gas compensation in collateral and in stablecoin.
        pub fn liquidate(&mut self, trove_id: TroveId) -> (Bucket, Bucket) {
            let price = self.fetch_price();
            let mut pending_offset = self.pending_offset();

            let totals = unwrap_trove(self.system.liquidate(trove_id, price, &mut pending_offset));
            self.settle_liquidation(totals, pending_offset)
        }

        /// Liquidates up to `n` troves, starting from the lowest collateral ratio.
        pub fn liquidate_troves(&mut self, n: u64) -> (Bucket, Bucket) {
            let price = self.fetch_price();
            let mut pending_offset = self.pending_offset();

            let totals = unwrap_trove(self.system.liquidate_troves(n, price, &mut pending_offset));
            self.settle_liquidation(totals, pending_offset)
        }

        /// Liquidates every listed trove that qualifies.
        pub fn batch_liquidate_troves(&mut self, trove_ids: Vec<TroveId>) -> (Bucket, Bucket) {
            let price = self.fetch_price();
            let mut pending_offset = self.pending_offset();

            let totals = unwrap_trove(
                self.system
                    .batch_liquidate_troves(&trove_ids, price, &mut pending_offset),
            );
            self.settle_liquidation(totals, pending_offset)
        }

        /// Redeems stablecoin for collateral.
        ///
        /// Hints come from `get_redemption_hints` and `find_insert_position`. At most the amount in
        /// `payment` is redeemed.
        ///
        /// # Returns
        /// * `(Bucket, Bucket)`: The collateral after the redemption fee, and the unused stablecoin.
        pub fn redeem_collateral(
            &mut self,
            mut payment: Bucket,
            first_redemption_hint: Option<TroveId>,
            upper_partial_redemption_hint: Option<TroveId>,
            lower_partial_redemption_hint: Option<TroveId>,
            partial_redemption_hint_nicr: Decimal,
            max_iterations: u64,
            max_fee_percentage: Decimal,
        ) -> (Bucket, Bucket) {
            assert!(
                payment.resource_address() == self.stable_manager.address(),
                "Invalid payment."
            );
            let price = self.fetch_price();
            let now = Self::now();

            let request = RedemptionRequest {
                amount: payment.amount(),
                first_redemption_hint,
                upper_partial_redemption_hint,
                lower_partial_redemption_hint,
                partial_redemption_hint_nicr,
                max_iterations,
                max_fee_percentage,
            };

            let totals = unwrap_trove(self.system.redeem_collateral(&request, price, now));

            if totals.total_debt_redeemed > Decimal::ZERO {
                payment.take(totals.total_debt_redeemed).burn();
            }
            if totals.total_gas_compensation_burned > Decimal::ZERO {
                self.gas_pool_vault
                    .take(totals.total_gas_compensation_burned)
                    .burn();
            }
            if totals.total_coll_surplus > Decimal::ZERO {
                self.surplus_vault
                    .put(self.collateral_vault.take(totals.total_coll_surplus));
            }

            let mut collateral = self.collateral_vault.take(totals.total_coll_drawn);
            if totals.coll_fee > Decimal::ZERO {
                self.redemption_fee_vault.put(collateral.take(totals.coll_fee));
            }

            for (trove_id, closed) in &totals.redeemed {
                if *closed {
                    self.set_receipt_status(*trove_id, TroveStatus::ClosedByRedemption);
                }
            }

            info!(
                "Redeemed {} of {} stablecoin for {} collateral, fee {}",
                totals.total_debt_redeemed,
                totals.attempted_amount,
                totals.coll_to_send_to_redeemer,
                totals.coll_fee
            );

            self.emit_events();
            (collateral, payment)
        }

        // Getters

        pub fn get_price(&self) -> Decimal {
            self.fetch_price()
        }

        pub fn get_entire_debt_and_coll(&self, trove_id: TroveId) -> EntireDebtAndColl {
            self.system.get_entire_debt_and_coll(trove_id)
        }

        pub fn get_pending_coll_reward(&self, trove_id: TroveId) -> Decimal {
            self.system.get_pending_coll_reward(trove_id)
        }

        pub fn get_pending_debt_reward(&self, trove_id: TroveId) -> Decimal {
            self.system.get_pending_debt_reward(trove_id)
        }

        pub fn get_nominal_icr(&self, trove_id: TroveId) -> Decimal {
            self.system.get_nominal_icr(trove_id)
        }

        pub fn get_current_icr(&self, trove_id: TroveId) -> Decimal {
            self.system.get_current_icr(trove_id, self.fetch_price())
        }

        pub fn get_tcr(&self) -> Decimal {
            self.system.get_tcr(self.fetch_price())
        }

        pub fn check_recovery_mode(&self) -> bool {
            self.system.check_recovery_mode(self.fetch_price())
        }

        pub fn get_trove_infos(&self, trove_ids: Vec<TroveId>) -> Vec<TroveInfo> {
            trove_ids
                .into_iter()
                .map(|trove_id| self.system.get_trove_info(trove_id))
                .collect()
        }

        pub fn get_system_info(&self) -> SystemInfo {
            self.system.get_system_info()
        }

        /// Returns up to `limit` troves from the highest NICR down.
        pub fn get_sorted_troves(&self, limit: u64) -> Vec<(TroveId, Decimal)> {
            self.system.get_sorted_troves(limit as usize)
        }

        pub fn find_insert_position(
            &self,
            nicr: Decimal,
            prev_id: Option<TroveId>,
            next_id: Option<TroveId>,
        ) -> (Option<TroveId>, Option<TroveId>) {
            self.system.find_insert_position(nicr, prev_id, next_id)
        }

        pub fn get_redemption_hints(&self, amount: Decimal, max_iterations: u64) -> RedemptionHints {
            self.system
                .get_redemption_hints(amount, self.fetch_price(), max_iterations)
        }

        pub fn get_approx_hint(
            &self,
            nicr: Decimal,
            num_trials: u64,
            random_seed: u64,
        ) -> (Option<TroveId>, Decimal, u64) {
            self.system.get_approx_hint(nicr, num_trials, random_seed)
        }

        pub fn get_claimable_collateral(&self, trove_id: TroveId) -> Decimal {
            self.system.get_claimable_collateral(trove_id)
        }

        pub fn get_parameters(&self) -> SystemParameters {
            self.system.parameters.clone()
        }

        pub fn get_stable_address(&self) -> ResourceAddress {
            self.stable_manager.address()
        }

        pub fn get_trove_receipt_address(&self) -> ResourceAddress {
            self.trove_receipt_manager.address()
        }

        // Owner methods

        /// Replaces the system parameters.
        ///
        /// # Panics
        /// * If `max_troves` is below the current number of troves.
        pub fn set_parameters(&mut self, parameters: SystemParameters) {
            unwrap_trove(self.system.set_parameters(parameters));
            info!("System parameters updated: {:?}", self.system.parameters);
        }

        pub fn set_oracle(&mut self, oracle_address: ComponentAddress, method_name: String) {
            self.oracle = Global::from(oracle_address);
            self.oracle_method_name = method_name;
        }

        /// Withdraws the collected fees.
        ///
        /// # Returns
        /// * `(Bucket, Bucket)`: Borrowing fees in stablecoin and redemption fees in collateral.
        pub fn withdraw_fees(&mut self) -> (Bucket, Bucket) {
            (
                self.borrowing_fee_vault.take_all(),
                self.redemption_fee_vault.take_all(),
            )
        }

        // Helpers

        fn fetch_price(&self) -> Decimal {
            self.oracle.call_raw(
                &self.oracle_method_name,
                scrypto_args!(self.collateral_address),
            )
        }

        fn now() -> i64 {
            Clock::current_time_rounded_to_seconds().seconds_since_unix_epoch
        }

        fn trove_id_from_proof(&self, receipt_proof: NonFungibleProof) -> TroveId {
            let receipt_proof = receipt_proof.check_with_message(
                self.trove_receipt_manager.address(),
                "Incorrect proof! Are you sure this trove is yours?",
            );
            let receipt = receipt_proof.non_fungible::<TroveReceipt>();
            match receipt.local_id() {
                NonFungibleLocalId::Integer(id) => id.value(),
                _ => panic!("Trove receipts have integer ids."),
            }
        }

        fn set_receipt_status(&self, trove_id: TroveId, status: TroveStatus) {
            self.trove_receipt_manager.update_non_fungible_data(
                &NonFungibleLocalId::integer(trove_id),
                "status",
                status,
            );
        }

        fn pending_offset(&self) -> PendingOffset {
            PendingOffset {
                total_deposits: self.stability_pool.get_total_deposits(),
                debt_to_offset: Decimal::ZERO,
                coll_to_add: Decimal::ZERO,
            }
        }

        /// Moves the buckets matching a finished liquidation and pays the caller.
        fn settle_liquidation(&mut self, totals: LiquidationTotals, pending_offset: PendingOffset) -> (Bucket, Bucket) {
            if totals.total_coll_surplus > Decimal::ZERO {
                self.surplus_vault
                    .put(self.collateral_vault.take(totals.total_coll_surplus));
            }

            if pending_offset.debt_to_offset > Decimal::ZERO {
                let collateral = self.collateral_vault.take(pending_offset.coll_to_add);
                let stable = self.badge_vault.authorize_with_amount(dec!("0.75"), || {
                    self.stability_pool
                        .offset(pending_offset.debt_to_offset, collateral)
                });
                stable.burn();
            }

            for trove_id in &totals.liquidated {
                self.set_receipt_status(*trove_id, TroveStatus::ClosedByLiquidation);
            }

            info!(
                "Liquidated {} troves: debt {}, collateral {}, offset {}, redistributed {}",
                totals.liquidated.len(),
                totals.total_debt_in_sequence,
                totals.total_coll_in_sequence,
                totals.total_debt_to_offset,
                totals.total_debt_to_redistribute
            );

            let coll_gas_compensation = self
                .collateral_vault
                .take(totals.total_coll_gas_compensation);
            let stable_gas_compensation = self
                .gas_pool_vault
                .take(totals.total_debt_gas_compensation);

            self.emit_events();
            (coll_gas_compensation, stable_gas_compensation)
        }

        /// Emits every event the engine buffered during this call.
        fn emit_events(&mut self) {
            for event in self.system.take_events() {
                match event {
                    TroveEvent::TroveUpdated(event) => Runtime::emit_event(event),
                    TroveEvent::TroveLiquidated(event) => Runtime::emit_event(event),
                    TroveEvent::Liquidation(event) => Runtime::emit_event(event),
                    TroveEvent::Redemption(event) => Runtime::emit_event(event),
                    TroveEvent::BaseRateUpdated(event) => Runtime::emit_event(event),
                    TroveEvent::LastFeeOpTimeUpdated(event) => Runtime::emit_event(event),
                    TroveEvent::LTermsUpdated(event) => Runtime::emit_event(event),
                    TroveEvent::SystemSnapshotsUpdated(event) => Runtime::emit_event(event),
                    TroveEvent::TotalStakesUpdated(event) => Runtime::emit_event(event),
                    TroveEvent::TroveIndexUpdated(event) => Runtime::emit_event(event),
                    TroveEvent::BorrowingFeePaid(event) => Runtime::emit_event(event),
                }
            }
        }
    }
}

const RECEIPT_IMAGE_URL: &str = "https://assets.radixdlt.com/icons/icon-liquidity_pool_unit.png";
