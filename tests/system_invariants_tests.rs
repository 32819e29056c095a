use engine_helper::*;

use proptest::prelude::*;
use scrypto::prelude::*;
use trove_protocol::pools::StabilityPoolDeposits;
use trove_protocol::shared_structs::*;

#[derive(Clone, Debug)]
enum Action {
    Open { coll: u64, debt: u64 },
    SetPrice(u64),
    Liquidate(u64),
    Redeem(u64),
    Close(usize),
    Claim(usize),
}

fn action() -> impl Strategy<Value = Action> {
    prop_oneof![
        4 => (1u64..200, 2_000u64..30_000).prop_map(|(coll, debt)| Action::Open { coll, debt }),
        2 => (60u64..300).prop_map(Action::SetPrice),
        2 => (1u64..5).prop_map(Action::Liquidate),
        2 => (100u64..20_000).prop_map(Action::Redeem),
        1 => any::<usize>().prop_map(Action::Close),
        1 => any::<usize>().prop_map(Action::Claim),
    ]
}

/// Adjacent troves may only be out of order by rounding in the reward accumulators.
fn index_is_sorted_within_rounding(helper: &EngineHelper) -> bool {
    let nicrs: Vec<Decimal> = helper
        .order()
        .into_iter()
        .map(|id| helper.system.get_nominal_icr(id))
        .collect();
    nicrs
        .windows(2)
        .all(|pair| pair[0] >= pair[1] - pair[1] / dec!(1000000000))
}

proptest! {
    #[test]
    fn prop_collateral_is_conserved_and_index_stays_sorted(
        deposits in 0u64..50_000,
        actions in prop::collection::vec(action(), 1..40),
    ) {
        let mut helper = EngineHelper::new(default_parameters(), dec!(200));
        let mut stability_pool = StabilityPoolDeposits::new(Decimal::from(deposits));
        let mut ids: Vec<TroveId> = Vec::new();
        let mut coll_in = Decimal::ZERO;
        let mut coll_out = Decimal::ZERO;

        for action in actions {
            match action {
                Action::Open { coll, debt } => {
                    let coll = Decimal::from(coll);
                    if let Ok(id) = helper.open(coll, Decimal::from(debt)) {
                        coll_in += coll;
                        ids.push(id);
                    }
                }
                Action::SetPrice(price) => helper.set_price(Decimal::from(price)),
                Action::Liquidate(n) => {
                    if let Ok(totals) = helper.system.liquidate_troves(n, helper.price, &mut stability_pool) {
                        coll_out += totals.total_coll_gas_compensation;
                    }
                }
                Action::Redeem(amount) => {
                    let request = helper.redemption(Decimal::from(amount));
                    if let Ok(totals) = helper.system.redeem_collateral(&request, helper.price, helper.now) {
                        coll_out += totals.total_coll_drawn;
                    }
                }
                Action::Close(index) if !ids.is_empty() => {
                    let id = ids[index % ids.len()];
                    if let Ok(outcome) = helper.system.close_trove(id, helper.price) {
                        coll_out += outcome.coll;
                    }
                }
                Action::Claim(index) if !ids.is_empty() => {
                    let id = ids[index % ids.len()];
                    if let Ok(amount) = helper.system.claim_collateral(id) {
                        coll_out += amount;
                    }
                }
                _ => {}
            }
            helper.advance_minutes(1);

            // Collateral only changes hands: troves, the default pool, owners' surplus, the
            // Stability Pool, or out of the system to liquidators, redeemers and closing owners.
            let info = helper.system.get_system_info();
            prop_assert_eq!(
                coll_in,
                info.active_coll
                    + info.default_coll
                    + info.total_coll_surplus
                    + stability_pool.collateral_gains
                    + coll_out
            );

            prop_assert!(index_is_sorted_within_rounding(&helper));
            prop_assert_eq!(
                helper.system.sorted_troves.get_size(),
                helper.system.ledger.trove_owners_count()
            );
        }
    }
}
