#![allow(dead_code)]

use dummy_oracle_component::oracle_test::*;
use scrypto_test::prelude::*;
use trove_protocol::shared_structs::*;
use trove_protocol::shared_structs::SystemParameters;
use trove_protocol::stability_pool::stability_pool_test::*;
use trove_protocol::trove_manager::trove_manager_test::*;

pub struct Helper {
    pub env: TestEnvironment<InMemorySubstateDatabase>,
    pub package_address: PackageAddress,
    pub collateral: Bucket,
    pub admin_badge: Bucket,
    pub collateral_address: ResourceAddress,
    pub stable_address: ResourceAddress,
    pub receipt_address: ResourceAddress,
    pub trove_manager: TroveManager,
    pub stability_pool: StabilityPool,
    pub dummy_oracle: Oracle,
}

impl Helper {
    pub fn new() -> Result<Self, RuntimeError> {
        Self::new_with_parameters(SystemParameters::default())
    }

    pub fn new_with_parameters(parameters: SystemParameters) -> Result<Self, RuntimeError> {
        let mut env = TestEnvironmentBuilder::new()
            .build();

        let collateral = ResourceBuilder::new_fungible(OwnerRole::None)
            .divisibility(18)
            .mint_initial_supply(1000000, &mut env)?;
        let collateral_address = collateral.resource_address(&mut env)?;

        let dummy_oracle_package_address = PackageFactory::compile_and_publish(
            "./dummy_oracle_component",
            &mut env,
            CompileProfile::Standard,
        )?;

        let dummy_oracle = Oracle::instantiate_oracle(
            collateral_address,
            dec!(200),
            dummy_oracle_package_address,
            &mut env
        )?;

        let package_address = PackageFactory::compile_and_publish(
            this_package!(),
            &mut env,
            CompileProfile::Standard,
        )?;

        let (
            mut trove_manager,
            stability_pool,
            admin_badge,
        ) = TroveManager::instantiate(
            collateral_address,
            ComponentAddress::try_from(dummy_oracle.0.clone()).unwrap(),
            "get_price".to_string(),
            parameters,
            package_address,
            &mut env,
        )?;

        let stable_address = trove_manager.get_stable_address(&mut env)?;
        let receipt_address = trove_manager.get_trove_receipt_address(&mut env)?;

        Ok(Self {
            env,
            package_address,
            collateral: collateral.into(),
            admin_badge,
            collateral_address,
            stable_address,
            receipt_address,
            trove_manager,
            stability_pool: StabilityPool(stability_pool.0),
            dummy_oracle: Oracle(dummy_oracle.0),
        })
    }

    /////////////////////////////////////////////////
    ///////////////// TROVE MANAGER /////////////////
    /////////////////////////////////////////////////

    /// Opens a trove accepting any borrowing fee, returning the receipt and the borrowed stablecoin.
    pub fn open_trove(
        &mut self,
        collateral_amount: Decimal,
        debt_amount: Decimal,
    ) -> Result<(Bucket, Bucket), RuntimeError> {
        let collateral = self.collateral.take(collateral_amount, &mut self.env)?;

        let (receipt, borrowed) = self.trove_manager.open_trove(
            collateral,
            debt_amount,
            Decimal::ONE,
            None,
            None,
            &mut self.env
        )?;

        Ok((receipt, borrowed))
    }

    pub fn receipt_proof(&mut self, receipt: &Bucket) -> Result<NonFungibleProof, RuntimeError> {
        Ok(NonFungibleProof(receipt.create_proof_of_all(&mut self.env)?))
    }

    /// Deposits stablecoin into the stability pool while it holds no collateral.
    pub fn contribute_stable(&mut self, stable: Bucket) -> Result<Bucket, RuntimeError> {
        let no_collateral = self.collateral.take(Decimal::ZERO, &mut self.env)?;
        let (pool_units, _leftover) = self.stability_pool.contribute_to_pool(
            stable,
            no_collateral,
            &mut self.env
        )?;

        Ok(pool_units)
    }

    /////////////////////////////////////////////////
    ///////////////// ERSATZ GETTERS ////////////////
    /////////////////////////////////////////////////

    pub fn get_trove_info(&mut self, trove_id: TroveId) -> Result<TroveInfo, RuntimeError> {
        let trove_infos = self.trove_manager.get_trove_infos(vec![trove_id], &mut self.env)?;

        Ok(trove_infos.first().unwrap().clone())
    }

    pub fn get_system_info(&mut self) -> Result<SystemInfo, RuntimeError> {
        Ok(self.trove_manager.get_system_info(&mut self.env)?)
    }

    /////////////////////////////////////////////////
    //////////////////// TEST HELPERS ///////////////
    /////////////////////////////////////////////////

    pub fn change_collateral_price(&mut self, price: Decimal) -> Result<(), RuntimeError> {
        self.env.disable_auth_module();
        self.dummy_oracle.set_price(self.collateral_address, price, &mut self.env)?;
        self.env.enable_auth_module();

        Ok(())
    }

    pub fn assert_bucket_eq(
        &mut self,
        bucket: &Bucket,
        address: ResourceAddress,
        amount: Decimal,
    ) -> Result<(), RuntimeError> {
        assert_eq!(bucket.resource_address(&mut self.env)?, address);
        assert_eq!(bucket.amount(&mut self.env)?, amount);

        Ok(())
    }
}
