use engine_helper::*;

use scrypto::prelude::*;
use trove_protocol::errors::TroveError;
use trove_protocol::events::TroveEvent;
use trove_protocol::shared_structs::*;

struct Ladder {
    helper: EngineHelper,
    e: TroveId,
    a: TroveId,
    b: TroveId,
    c: TroveId,
    d: TroveId,
}

/// Troves of 100 debt each, opened at 200 and seen at 100:
/// E (ICR 100), A (3.0), B (2.0), C (1.5) and D (1.09, below MCR).
fn ladder() -> Ladder {
    let mut helper = EngineHelper::bare(dec!(200));
    let e = helper.open(dec!(100), dec!(100)).unwrap();
    let a = helper.open(dec!(3), dec!(100)).unwrap();
    let b = helper.open(dec!(2), dec!(100)).unwrap();
    let c = helper.open(dec!("1.5"), dec!(100)).unwrap();
    let d = helper.open(dec!("1.09"), dec!(100)).unwrap();
    helper.set_price(dec!(100));
    Ladder { helper, e, a, b, c, d }
}

fn request(amount: Decimal, first_redemption_hint: Option<TroveId>) -> RedemptionRequest {
    RedemptionRequest {
        amount,
        first_redemption_hint,
        upper_partial_redemption_hint: None,
        lower_partial_redemption_hint: None,
        partial_redemption_hint_nicr: Decimal::ZERO,
        max_iterations: 0,
        max_fee_percentage: Decimal::ONE,
    }
}

#[test]
fn test_redemption_closes_troves_and_skips_undercollateralized() {
    let Ladder { mut helper, e, a, b, c, d } = ladder();
    assert_eq!(helper.order(), vec![e, a, b, c, d]);

    let totals = helper
        .system
        .redeem_collateral(&request(dec!(300), Some(c)), helper.price, helper.now)
        .unwrap();

    assert_eq!(totals.redeemed, vec![(c, true), (b, true), (a, true)]);
    assert_eq!(totals.total_debt_redeemed, dec!(300));
    assert_eq!(totals.total_coll_drawn, dec!(3));
    assert_eq!(totals.coll_fee, dec!("0.9"));
    assert_eq!(totals.coll_to_send_to_redeemer, dec!("2.1"));
    assert_eq!(totals.total_coll_surplus, dec!("3.5"));

    for id in [a, b, c] {
        assert_eq!(helper.system.get_trove_status(id), TroveStatus::ClosedByRedemption);
    }
    assert_eq!(helper.system.get_claimable_collateral(a), dec!(2));
    assert_eq!(helper.system.get_claimable_collateral(b), dec!(1));
    assert_eq!(helper.system.get_claimable_collateral(c), dec!("0.5"));

    assert_eq!(helper.trove(d).coll, dec!("1.09"));
    assert_eq!(helper.trove(d).debt, dec!(100));
    assert_eq!(helper.order(), vec![e, d]);

    let info = helper.system.get_system_info();
    assert_eq!(info.active_coll, dec!("101.09"));
    assert_eq!(info.active_debt, dec!(200));
    assert_eq!(info.base_rate, dec!("0.3"));
    assert!(helper
        .system
        .events()
        .iter()
        .any(|event| matches!(event, TroveEvent::Redemption(_))));
}

#[test]
fn test_invalid_first_hint_falls_back_to_tail() {
    let Ladder { mut helper, a, b, c, d, .. } = ladder();

    // D is below MCR and A is not the riskiest eligible trove.
    for hint in [None, Some(d), Some(a), Some(99)] {
        let mut system = helper.system.checkpoint().unwrap();
        let totals = system
            .redeem_collateral(&request(dec!(100), hint), helper.price, helper.now)
            .unwrap();
        assert_eq!(totals.redeemed, vec![(c, true)]);
    }

    let totals = helper
        .system
        .redeem_collateral(&request(dec!(200), None), helper.price, helper.now)
        .unwrap();
    assert_eq!(totals.redeemed, vec![(c, true), (b, true)]);
}

#[test]
fn test_max_iterations_limits_the_walk() {
    let Ladder { mut helper, a, b, c, .. } = ladder();
    let mut redemption = request(dec!(300), Some(c));
    redemption.max_iterations = 2;

    let totals = helper
        .system
        .redeem_collateral(&redemption, helper.price, helper.now)
        .unwrap();

    assert_eq!(totals.redeemed, vec![(c, true), (b, true)]);
    assert_eq!(totals.total_debt_redeemed, dec!(200));
    assert_eq!(helper.system.get_trove_status(a), TroveStatus::Active);
}

#[test]
fn test_gas_reserve_is_not_redeemable() {
    let mut helper = EngineHelper::new(default_parameters(), dec!(200));
    let e = helper.open(dec!(100), dec!(10000)).unwrap();
    let a = helper.open(dec!(20), dec!(2000)).unwrap();
    assert_eq!(helper.trove(a).debt, dec!(2210));
    assert_eq!(helper.order(), vec![e, a]);

    let redemption = helper.redemption(dec!(5000));
    assert_eq!(redemption.first_redemption_hint, Some(a));

    let totals = helper
        .system
        .redeem_collateral(&redemption, helper.price, helper.now)
        .unwrap();

    // A gives up its 2010 net debt, the 200 reserve leaves with the closure.
    assert_eq!(totals.redeemed, vec![(a, true), (e, false)]);
    assert_eq!(totals.total_debt_redeemed, dec!(5000));
    assert_eq!(totals.total_gas_compensation_burned, dec!(200));
    assert_eq!(helper.system.get_claimable_collateral(a), dec!("9.95"));

    let trove = helper.trove(e);
    assert_eq!(trove.debt, dec!(7260));
    assert_eq!(trove.coll, dec!("85.05"));
    assert_eq!(helper.system.get_nominal_icr(e), redemption.partial_redemption_hint_nicr);
    assert_eq!(helper.system.get_trove_info(e).nicr, Some(redemption.partial_redemption_hint_nicr));

    let info = helper.system.get_system_info();
    assert_eq!(info.gas_pool_debt, dec!(200));
    assert_eq!(info.active_debt, dec!(7260));
}

#[test]
fn test_stale_partial_hint_cancels_last_step() {
    let Ladder { mut helper, e, a, b, c, .. } = ladder();
    let before = helper.trove(e);

    // Everything above MCR except E closes, E would be partially redeemed.
    let totals = helper
        .system
        .redeem_collateral(&request(dec!(350), Some(c)), helper.price, helper.now)
        .unwrap();

    assert_eq!(totals.redeemed, vec![(c, true), (b, true), (a, true)]);
    assert_eq!(totals.total_debt_redeemed, dec!(300));
    assert_eq!(helper.trove(e), before);
}

#[test]
fn test_zero_draw_leaves_fees_alone() {
    let mut helper = EngineHelper::bare(dec!(200));
    let e = helper.open(dec!(100), dec!(100)).unwrap();
    let a = helper.open(dec!(3), dec!(100)).unwrap();
    helper.set_price(dec!(100));

    let stale = request(dec!(50), Some(a));
    let totals = helper
        .system
        .redeem_collateral(&stale, helper.price, helper.now)
        .unwrap();

    assert_eq!(totals.total_debt_redeemed, Decimal::ZERO);
    assert!(totals.redeemed.is_empty());
    assert_eq!(helper.system.fees.base_rate, Decimal::ZERO);
    assert_eq!(helper.trove(a).debt, dec!(100));

    // Fresh hints redeem the same amount.
    let fresh = helper.redemption(dec!(50));
    let totals = helper
        .system
        .redeem_collateral(&fresh, helper.price, helper.now)
        .unwrap();

    assert_eq!(totals.redeemed, vec![(a, false)]);
    assert_eq!(helper.trove(a).debt, dec!(50));
    assert_eq!(helper.trove(a).coll, dec!("2.5"));
    assert_eq!(helper.order(), vec![e, a]);
    assert!(helper.system.fees.base_rate > Decimal::ZERO);
}

#[test]
fn test_redemption_preconditions() {
    let mut helper = EngineHelper::new(default_parameters(), dec!(200));
    helper.open(dec!(100), dec!(10000)).unwrap();
    helper.open(dec!(20), dec!(2000)).unwrap();

    let mut redemption = helper.redemption(dec!(5000));

    redemption.max_fee_percentage = dec!("0.001");
    assert_eq!(
        helper.system.redeem_collateral(&redemption, helper.price, helper.now),
        Err(TroveError::InvalidMaxFeePercentage)
    );
    redemption.max_fee_percentage = dec!("1.01");
    assert_eq!(
        helper.system.redeem_collateral(&redemption, helper.price, helper.now),
        Err(TroveError::InvalidMaxFeePercentage)
    );

    redemption.max_fee_percentage = Decimal::ONE;
    redemption.amount = Decimal::ZERO;
    assert_eq!(
        helper.system.redeem_collateral(&redemption, helper.price, helper.now),
        Err(TroveError::ZeroAmount)
    );

    redemption.amount = dec!(5000);
    assert_eq!(
        helper.system.redeem_collateral(&redemption, dec!(100), helper.now),
        Err(TroveError::TcrBelowMcr)
    );
}

#[test]
fn test_redemptions_wait_for_bootstrap_period() {
    let mut helper = EngineHelper::new(SystemParameters::default(), dec!(200));
    helper.open(dec!(100), dec!(10000)).unwrap();
    helper.open(dec!(20), dec!(2000)).unwrap();
    let redemption = helper.redemption(dec!(5000));
    let opens_at = START_TIME + 14 * 24 * 60 * 60;

    assert_eq!(
        helper.system.redeem_collateral(&redemption, helper.price, helper.now),
        Err(TroveError::RedemptionsNotAllowedYet)
    );
    assert_eq!(
        helper.system.redeem_collateral(&redemption, helper.price, opens_at - 1),
        Err(TroveError::RedemptionsNotAllowedYet)
    );
    assert_eq!(helper.system.get_system_info().active_debt, dec!(12460));

    let totals = helper
        .system
        .redeem_collateral(&redemption, helper.price, opens_at)
        .unwrap();
    assert_eq!(totals.total_debt_redeemed, dec!(5000));
}

#[test]
fn test_fee_above_maximum_reverts() {
    let mut helper = EngineHelper::new(default_parameters(), dec!(200));
    helper.open(dec!(100), dec!(10000)).unwrap();
    helper.open(dec!(20), dec!(2000)).unwrap();
    let before = helper.system.checkpoint().unwrap();

    // The redemption itself raises the base rate above zero.
    let mut redemption = helper.redemption(dec!(5000));
    redemption.max_fee_percentage = dec!("0.005");

    assert_eq!(
        helper.system.redeem_collateral(&redemption, helper.price, helper.now),
        Err(TroveError::FeeExceedsMaximum)
    );
    assert_eq!(helper.system, before);
}

#[test]
fn test_redemption_hints() {
    let Ladder { helper, c, .. } = ladder();

    let hints = helper.system.get_redemption_hints(dec!(300), helper.price, 0);
    assert_eq!(hints.first_redemption_hint, Some(c));
    assert_eq!(hints.partial_redemption_hint_nicr, Decimal::ZERO);
    assert_eq!(hints.truncated_amount, dec!(300));

    let hints = helper.system.get_redemption_hints(dec!(300), helper.price, 1);
    assert_eq!(hints.truncated_amount, dec!(100));
}

#[test]
fn test_redemption_hints_respect_min_net_debt() {
    let mut helper = EngineHelper::new(default_parameters(), dec!(200));
    helper.open(dec!(100), dec!(10000)).unwrap();
    helper.open(dec!(20), dec!(2000)).unwrap();

    // A gives 2010, E can only go down to the 1800 minimum net debt.
    let hints = helper.system.get_redemption_hints(dec!(11000), helper.price, 0);
    assert_eq!(hints.truncated_amount, dec!(10260));
}

#[test]
fn test_approx_hint() {
    let Ladder { helper, d, .. } = ladder();

    let tail_nicr = helper.system.get_nominal_icr(d);
    assert_eq!(
        helper.system.get_approx_hint(tail_nicr, 1, 42),
        (Some(d), Decimal::ZERO, 42)
    );

    let (hint, diff, seed) = helper.system.get_approx_hint(dec!(150), 30, 7);
    assert!(hint.is_some());
    assert!(diff <= dec!(150) - tail_nicr);

    // The seed chain only depends on the input seed and the number of trials.
    let (_, _, same_seed) = helper.system.get_approx_hint(tail_nicr, 30, 7);
    assert_eq!(seed, same_seed);
    assert_ne!(seed, 7);

    let empty = EngineHelper::bare(dec!(100));
    assert_eq!(
        empty.system.get_approx_hint(dec!(150), 30, 7),
        (None, Decimal::ZERO, 7)
    );
}
