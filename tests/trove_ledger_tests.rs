use proptest::prelude::*;
use scrypto::prelude::*;
use trove_protocol::errors::TroveError;
use trove_protocol::shared_structs::*;
use trove_protocol::trove_ledger::TroveLedger;

fn open(ledger: &mut TroveLedger, id: TroveId, coll: Decimal, debt: Decimal) {
    ledger.open_trove(id, coll, debt).unwrap();
    ledger.update_reward_snapshots(id);
    ledger.update_stake_and_total_stakes(id).unwrap();
    ledger.add_trove_owner_to_array(id).unwrap();
}

#[test]
fn test_first_stakes_equal_collateral() {
    let mut ledger = TroveLedger::new();
    open(&mut ledger, 1, dec!(50), dec!(100));
    open(&mut ledger, 2, dec!(1), dec!(180));

    assert_eq!(ledger.trove(1).unwrap().stake, dec!(50));
    assert_eq!(ledger.trove(2).unwrap().stake, dec!(1));
    assert_eq!(ledger.total_stakes, dec!(51));
}

#[test]
fn test_stakes_scale_with_snapshots() {
    let mut ledger = TroveLedger::new();
    open(&mut ledger, 1, dec!(100), dec!(1000));

    // 50 collateral was redistributed onto the single 100 stake.
    ledger.update_system_snapshots_exclude_coll_remainder(dec!(100), dec!(50), Decimal::ZERO);
    assert_eq!(ledger.total_stakes_snapshot, dec!(100));
    assert_eq!(ledger.total_collateral_snapshot, dec!(150));

    open(&mut ledger, 2, dec!(30), dec!(100));
    assert_eq!(ledger.trove(2).unwrap().stake, dec!(20));
    assert_eq!(ledger.total_stakes, dec!(120));
}

#[test]
fn test_open_twice_fails() {
    let mut ledger = TroveLedger::new();
    open(&mut ledger, 1, dec!(10), dec!(100));

    assert_eq!(
        ledger.open_trove(1, dec!(10), dec!(100)),
        Err(TroveError::TroveAlreadyActive)
    );
}

#[test]
fn test_redistribution_without_stakes_fails() {
    let mut ledger = TroveLedger::new();

    assert_eq!(
        ledger.redistribute_debt_and_coll(dec!(100), dec!(1)),
        Err(TroveError::ZeroTotalStakes)
    );
    // Nothing to spread is not an error.
    assert_eq!(ledger.redistribute_debt_and_coll(Decimal::ZERO, Decimal::ZERO), Ok(()));
}

#[test]
fn test_pending_rewards_follow_stake() {
    let mut ledger = TroveLedger::new();
    open(&mut ledger, 1, dec!(30), dec!(100));
    open(&mut ledger, 2, dec!(10), dec!(100));

    ledger.redistribute_debt_and_coll(dec!(400), dec!(4)).unwrap();

    assert_eq!(ledger.l_coll, dec!("0.1"));
    assert_eq!(ledger.l_debt, dec!(10));
    assert!(ledger.has_pending_rewards(1));
    assert_eq!(ledger.pending_coll_reward(1), dec!(3));
    assert_eq!(ledger.pending_debt_reward(1), dec!(300));
    assert_eq!(ledger.pending_coll_reward(2), dec!(1));
    assert_eq!(ledger.pending_debt_reward(2), dec!(100));

    let entire = ledger.entire_debt_and_coll(1);
    assert_eq!(entire.coll, dec!(33));
    assert_eq!(entire.debt, dec!(400));

    assert_eq!(
        ledger.apply_pending_rewards(1).unwrap(),
        Some((dec!(300), dec!(3)))
    );
    assert!(!ledger.has_pending_rewards(1));
    assert_eq!(ledger.trove(1).unwrap().coll, dec!(33));
    assert_eq!(ledger.apply_pending_rewards(1).unwrap(), None);
}

#[test]
fn test_nominal_icr_includes_pending_rewards() {
    let mut ledger = TroveLedger::new();
    open(&mut ledger, 1, dec!(30), dec!(100));
    open(&mut ledger, 2, dec!(10), dec!(100));

    assert_eq!(ledger.nominal_icr(1), dec!(30));

    ledger.redistribute_debt_and_coll(dec!(400), dec!(4)).unwrap();

    // 33 collateral against 400 debt, scaled by 100.
    assert_eq!(ledger.nominal_icr(1), dec!("8.25"));
    ledger.apply_pending_rewards(1).unwrap();
    assert_eq!(ledger.nominal_icr(1), dec!("8.25"));
}

#[test]
fn test_checkpoint_restores_records() {
    let mut ledger = TroveLedger::new();
    open(&mut ledger, 1, dec!(30), dec!(100));
    open(&mut ledger, 2, dec!(10), dec!(100));
    let checkpoint = ledger.checkpoint().unwrap();

    ledger.redistribute_debt_and_coll(dec!(400), dec!(4)).unwrap();
    ledger.remove_stake(2);
    ledger.close_trove(2, TroveStatus::ClosedByOwner).unwrap();
    assert_ne!(ledger, checkpoint);

    ledger = checkpoint;
    assert_eq!(ledger.status(2), TroveStatus::Active);
    assert_eq!(ledger.trove_owners(), vec![1, 2]);
    assert_eq!(ledger.total_stakes, dec!(40));
    assert_eq!(ledger.l_debt, Decimal::ZERO);
}

#[test]
fn test_redistribution_error_is_carried() {
    let mut ledger = TroveLedger::new();
    for id in 1..=3 {
        open(&mut ledger, id, dec!(1), dec!(1));
    }

    ledger.redistribute_debt_and_coll(dec!(1), dec!(1)).unwrap();
    assert_eq!(ledger.l_debt, dec!("0.333333333333333333"));

    ledger.redistribute_debt_and_coll(dec!(1), dec!(1)).unwrap();
    ledger.redistribute_debt_and_coll(dec!(1), dec!(1)).unwrap();

    // The remainders of the first two rounds add up to the missing atto.
    assert_eq!(ledger.l_debt, dec!(1));
    assert_eq!(ledger.l_coll, dec!(1));
}

#[test]
fn test_close_swaps_last_owner_into_slot() {
    let mut ledger = TroveLedger::new();
    for id in 1..=3 {
        open(&mut ledger, id, dec!(1), dec!(1));
    }

    ledger.remove_stake(1);
    assert_eq!(ledger.total_stakes, dec!(2));

    assert_eq!(
        ledger.close_trove(1, TroveStatus::ClosedByOwner).unwrap(),
        Some((3, 0))
    );
    assert_eq!(ledger.trove_owners(), vec![3, 2]);
    assert_eq!(ledger.trove_from_owners_array(1), Some(2));
    assert_eq!(ledger.trove_owners_count(), 2);
    assert_eq!(ledger.trove(3).unwrap().array_index, 0);
    assert_eq!(ledger.status(1), TroveStatus::ClosedByOwner);
    assert_eq!(ledger.trove(1).unwrap().coll, Decimal::ZERO);

    // Removing the last slot moves nothing.
    assert_eq!(ledger.close_trove(2, TroveStatus::ClosedByLiquidation).unwrap(), None);
    assert_eq!(ledger.trove_owners(), vec![3]);
    assert_eq!(ledger.trove_from_owners_array(1), None);

    assert_eq!(
        ledger.close_trove(2, TroveStatus::ClosedByOwner),
        Err(TroveError::TroveNotActive)
    );
}

#[test]
fn test_closed_troves_have_no_pending_rewards() {
    let mut ledger = TroveLedger::new();
    open(&mut ledger, 1, dec!(1), dec!(1));
    open(&mut ledger, 2, dec!(1), dec!(1));

    ledger.redistribute_debt_and_coll(dec!(10), dec!(1)).unwrap();
    ledger.remove_stake(2);
    ledger.close_trove(2, TroveStatus::ClosedByLiquidation).unwrap();

    assert_eq!(ledger.pending_debt_reward(2), Decimal::ZERO);
    assert!(!ledger.has_pending_rewards(2));
    assert_eq!(ledger.status(9), TroveStatus::NonExistent);
}

proptest! {
    #[test]
    fn prop_redistribution_is_proportional_to_stake(
        colls in prop::collection::vec(1u64..1_000, 1..20),
        debt in 1u64..100_000,
    ) {
        let mut ledger = TroveLedger::new();
        for (index, coll) in colls.iter().enumerate() {
            open(&mut ledger, index as u64 + 1, Decimal::from(*coll), dec!(1));
        }

        let debt = Decimal::from(debt);
        ledger.redistribute_debt_and_coll(debt, Decimal::ONE).unwrap();

        let mut distributed = Decimal::ZERO;
        for (index, coll) in colls.iter().enumerate() {
            let id = index as u64 + 1;
            let reward = ledger.pending_debt_reward(id);
            prop_assert_eq!(reward, Decimal::from(*coll) * ledger.l_debt);
            distributed += reward;
        }

        // Truncation only ever keeps back less than one atto per unit of stake.
        let atto = Decimal::from_attos(I192::from(1));
        prop_assert!(distributed <= debt);
        prop_assert!(debt - distributed < ledger.total_stakes * atto);
    }
}
