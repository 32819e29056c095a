mod helper;
use helper::Helper;
use trove_protocol::shared_structs::*;
use trove_protocol::shared_structs::SystemParameters;

use scrypto_test::prelude::*;

#[test]
fn test_open_trove() -> Result<(), RuntimeError> {
    let mut helper = Helper::new().unwrap();

    let (receipt, borrowed) = helper.open_trove(dec!(100), dec!(10000))?;

    let receipt_address = helper.receipt_address;
    let stable_address = helper.stable_address;
    helper.assert_bucket_eq(&receipt, receipt_address, dec!(1))?;
    helper.assert_bucket_eq(&borrowed, stable_address, dec!(10000))?;

    // 0.5% borrowing fee and the 200 gas reserve are added to the debt.
    let trove = helper.get_trove_info(1)?;
    assert_eq!(trove.status, TroveStatus::Active);
    assert_eq!(trove.coll, dec!(100));
    assert_eq!(trove.debt, dec!(10250));
    let nicr = helper.trove_manager.get_nominal_icr(1, &mut helper.env)?;
    assert_eq!(trove.nicr, Some(nicr));
    assert!(nicr > dec!("0.975") && nicr < dec!("0.976"));

    let system = helper.get_system_info()?;
    assert_eq!(system.active_coll, dec!(100));
    assert_eq!(system.active_debt, dec!(10250));
    assert_eq!(system.gas_pool_debt, dec!(200));
    assert_eq!(system.trove_count, 1);

    Ok(())
}

#[test]
fn test_open_trove_below_mcr_fails() -> Result<(), RuntimeError> {
    let mut helper = Helper::new().unwrap();

    // 10 collateral at 200 against 2210 debt is below the 110% minimum.
    let result = helper.open_trove(dec!(10), dec!(2000));
    assert!(result.is_err());

    Ok(())
}

#[test]
fn test_adjust_trove_repays_debt() -> Result<(), RuntimeError> {
    let mut helper = Helper::new().unwrap();
    let (receipt, mut borrowed) = helper.open_trove(dec!(100), dec!(10000))?;

    let repayment = borrowed.take(dec!(1000), &mut helper.env)?;
    let proof = helper.receipt_proof(&receipt)?;
    let (withdrawn, stable_out) = helper.trove_manager.adjust_trove(
        proof,
        None,
        Decimal::ZERO,
        Some(repayment),
        Decimal::ZERO,
        Decimal::ONE,
        None,
        None,
        &mut helper.env
    )?;

    assert_eq!(withdrawn.amount(&mut helper.env)?, Decimal::ZERO);
    assert_eq!(stable_out.amount(&mut helper.env)?, Decimal::ZERO);

    let trove = helper.get_trove_info(1)?;
    assert_eq!(trove.debt, dec!(9250));
    assert_eq!(trove.coll, dec!(100));

    Ok(())
}

#[test]
fn test_close_trove() -> Result<(), RuntimeError> {
    let mut helper = Helper::new().unwrap();
    let (_receipt_a, mut borrowed_a) = helper.open_trove(dec!(100), dec!(10000))?;
    let (receipt_b, _borrowed_b) = helper.open_trove(dec!(200), dec!(2000))?;

    // B owes 2010: the borrowed amount and its fee. The gas reserve is burned from the pool.
    let payment = borrowed_a.take(dec!(2100), &mut helper.env)?;
    let proof = helper.receipt_proof(&receipt_b)?;
    let (collateral, leftover) = helper.trove_manager.close_trove(proof, payment, &mut helper.env)?;

    let collateral_address = helper.collateral_address;
    let stable_address = helper.stable_address;
    helper.assert_bucket_eq(&collateral, collateral_address, dec!(200))?;
    helper.assert_bucket_eq(&leftover, stable_address, dec!(90))?;

    let trove = helper.get_trove_info(2)?;
    assert_eq!(trove.status, TroveStatus::ClosedByOwner);
    assert_eq!(trove.nicr, None);

    let system = helper.get_system_info()?;
    assert_eq!(system.gas_pool_debt, dec!(200));
    assert_eq!(system.active_coll, dec!(100));
    assert_eq!(system.trove_count, 1);

    Ok(())
}

#[test]
fn test_liquidation_offsets_against_stability_pool() -> Result<(), RuntimeError> {
    let mut helper = Helper::new().unwrap();
    let (_receipt_a, mut borrowed_a) = helper.open_trove(dec!(200), dec!(10000))?;
    let (_receipt_b, _borrowed_b) = helper.open_trove(dec!(15), dec!(2000))?;

    let deposit = borrowed_a.take(dec!(5000), &mut helper.env)?;
    let pool_units = helper.contribute_stable(deposit)?;
    assert!(pool_units.amount(&mut helper.env)? > Decimal::ZERO);

    // A healthy trove can not be liquidated.
    assert!(helper.trove_manager.liquidate(2, &mut helper.env).is_err());

    helper.change_collateral_price(dec!(150))?;

    let (collateral_gas, stable_gas) = helper.trove_manager.liquidate(2, &mut helper.env)?;

    let collateral_address = helper.collateral_address;
    let stable_address = helper.stable_address;
    helper.assert_bucket_eq(&collateral_gas, collateral_address, dec!("0.075"))?;
    helper.assert_bucket_eq(&stable_gas, stable_address, dec!(200))?;

    // The whole 2210 debt is offset and the pool takes the remaining collateral.
    let (pool_collateral, pool_stable) = helper.stability_pool.get_pool_amounts(&mut helper.env)?;
    assert_eq!(pool_collateral, dec!("14.925"));
    assert_eq!(pool_stable, dec!(2790));

    let trove = helper.get_trove_info(2)?;
    assert_eq!(trove.status, TroveStatus::ClosedByLiquidation);

    let system = helper.get_system_info()?;
    assert_eq!(system.default_debt, Decimal::ZERO);
    assert_eq!(system.active_coll, dec!(200));
    assert_eq!(system.gas_pool_debt, dec!(200));

    // Contributors leave with their share of both resources.
    let (collateral_out, stable_out) = helper.stability_pool.withdraw_from_pool(pool_units, &mut helper.env)?;
    assert_eq!(collateral_out.amount(&mut helper.env)?, dec!("14.925"));
    assert_eq!(stable_out.amount(&mut helper.env)?, dec!(2790));

    Ok(())
}

#[test]
fn test_liquidation_without_deposits_redistributes() -> Result<(), RuntimeError> {
    let mut helper = Helper::new().unwrap();
    let (_receipt_a, _borrowed_a) = helper.open_trove(dec!(200), dec!(10000))?;
    let (_receipt_b, _borrowed_b) = helper.open_trove(dec!(15), dec!(2000))?;

    helper.change_collateral_price(dec!(150))?;
    let (collateral_gas, _stable_gas) = helper.trove_manager.liquidate_troves(10, &mut helper.env)?;
    assert_eq!(collateral_gas.amount(&mut helper.env)?, dec!("0.075"));

    let pending_coll = helper.trove_manager.get_pending_coll_reward(1, &mut helper.env)?;
    let pending_debt = helper.trove_manager.get_pending_debt_reward(1, &mut helper.env)?;
    assert_eq!(pending_coll, dec!("14.925"));
    assert_eq!(pending_debt, dec!(2210));

    let system = helper.get_system_info()?;
    assert_eq!(system.default_coll, dec!("14.925"));
    assert_eq!(system.default_debt, dec!(2210));

    Ok(())
}

#[test]
fn test_redemption_during_bootstrap_period_fails() -> Result<(), RuntimeError> {
    let mut helper = Helper::new().unwrap();
    let (_receipt_a, mut borrowed_a) = helper.open_trove(dec!(100), dec!(10000))?;
    helper.open_trove(dec!(20), dec!(2000))?;

    let payment = borrowed_a.take(dec!(5000), &mut helper.env)?;
    let result = helper.trove_manager.redeem_collateral(
        payment,
        Some(2),
        None,
        None,
        Decimal::ZERO,
        0,
        Decimal::ONE,
        &mut helper.env
    );
    assert!(result.is_err());

    Ok(())
}

#[test]
fn test_redeem_and_claim_collateral() -> Result<(), RuntimeError> {
    let mut helper = Helper::new_with_parameters(SystemParameters {
        bootstrap_period: 0,
        ..Default::default()
    }).unwrap();
    let (_receipt_a, mut borrowed_a) = helper.open_trove(dec!(100), dec!(10000))?;
    let (receipt_b, _borrowed_b) = helper.open_trove(dec!(20), dec!(2000))?;

    let hints = helper.trove_manager.get_redemption_hints(dec!(5000), 0, &mut helper.env)?;
    assert_eq!(hints.first_redemption_hint, Some(2));
    assert_eq!(hints.truncated_amount, dec!(5000));

    let (upper_hint, lower_hint) = helper.trove_manager.find_insert_position(
        hints.partial_redemption_hint_nicr,
        None,
        None,
        &mut helper.env
    )?;

    let payment = borrowed_a.take(dec!(5000), &mut helper.env)?;
    let (collateral, leftover) = helper.trove_manager.redeem_collateral(
        payment,
        hints.first_redemption_hint,
        upper_hint,
        lower_hint,
        hints.partial_redemption_hint_nicr,
        0,
        Decimal::ONE,
        &mut helper.env
    )?;

    assert_eq!(leftover.amount(&mut helper.env)?, Decimal::ZERO);

    // 5000 at 200 draws 25 collateral, split between the redeemer and the fee vault.
    helper.env.disable_auth_module();
    let (_borrowing_fees, redemption_fees) = helper.trove_manager.withdraw_fees(&mut helper.env)?;
    helper.env.enable_auth_module();
    let redeemed = collateral.amount(&mut helper.env)?;
    let fee = redemption_fees.amount(&mut helper.env)?;
    assert!(fee > Decimal::ZERO);
    assert_eq!(redeemed + fee, dec!(25));

    let trove = helper.get_trove_info(1)?;
    assert_eq!(trove.debt, dec!(7260));
    assert_eq!(trove.coll, dec!("85.05"));
    assert_eq!(helper.get_trove_info(2)?.status, TroveStatus::ClosedByRedemption);

    // B keeps what its 2010 net debt did not consume.
    let proof = helper.receipt_proof(&receipt_b)?;
    let claimed = helper.trove_manager.claim_collateral(proof, &mut helper.env)?;
    let collateral_address = helper.collateral_address;
    helper.assert_bucket_eq(&claimed, collateral_address, dec!("9.95"))?;

    let proof = helper.receipt_proof(&receipt_b)?;
    assert!(helper.trove_manager.claim_collateral(proof, &mut helper.env).is_err());

    Ok(())
}

#[test]
fn test_withdraw_fees() -> Result<(), RuntimeError> {
    let mut helper = Helper::new().unwrap();
    helper.open_trove(dec!(100), dec!(10000))?;
    helper.open_trove(dec!(200), dec!(2000))?;

    assert!(helper.trove_manager.withdraw_fees(&mut helper.env).is_err());

    helper.env.disable_auth_module();
    let (borrowing_fees, redemption_fees) = helper.trove_manager.withdraw_fees(&mut helper.env)?;
    helper.env.enable_auth_module();

    let stable_address = helper.stable_address;
    helper.assert_bucket_eq(&borrowing_fees, stable_address, dec!(60))?;
    assert_eq!(redemption_fees.amount(&mut helper.env)?, Decimal::ZERO);

    Ok(())
}

#[test]
fn test_owner_methods_require_auth() -> Result<(), RuntimeError> {
    let mut helper = Helper::new().unwrap();

    let mut parameters = SystemParameters::default();
    parameters.mcr = dec!("1.2");
    assert!(helper.trove_manager.set_parameters(parameters.clone(), &mut helper.env).is_err());

    let no_collateral = helper.collateral.take(Decimal::ZERO, &mut helper.env)?;
    assert!(helper.stability_pool.offset(Decimal::ZERO, no_collateral, &mut helper.env).is_err());

    helper.env.disable_auth_module();
    helper.trove_manager.set_parameters(parameters, &mut helper.env)?;
    helper.env.enable_auth_module();

    let stored = helper.trove_manager.get_parameters(&mut helper.env)?;
    assert_eq!(stored.mcr, dec!("1.2"));

    let oracle_address = ComponentAddress::try_from(helper.dummy_oracle.0.clone()).unwrap();
    assert!(helper.trove_manager.set_oracle(oracle_address, "get_price".to_string(), &mut helper.env).is_err());

    helper.env.disable_auth_module();
    helper.trove_manager.set_oracle(oracle_address, "get_price".to_string(), &mut helper.env)?;
    helper.env.enable_auth_module();

    helper.change_collateral_price(dec!(180))?;
    assert_eq!(helper.trove_manager.get_price(&mut helper.env)?, dec!(180));

    Ok(())
}
