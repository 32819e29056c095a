//! Defines events emitted by the Trove Protocol components.
//!
//! The engine collects [`TroveEvent`]s while it runs. The `TroveManager` drains them after each
//! call and emits every inner event on ledger, in order.

use scrypto::prelude::*;
use crate::shared_structs::*;

/// Event emitted whenever a trove's debt, collateral or stake changes outside of a liquidation.
#[derive(ScryptoSbor, ScryptoEvent, Clone, Debug, PartialEq)]
pub struct EventTroveUpdated {
    pub trove_id: TroveId,
    pub debt: Decimal,
    pub coll: Decimal,
    pub stake: Decimal,
    /// The operation that caused the update.
    pub operation: TroveOperation,
}

/// Event emitted for every trove closed by a liquidation.
#[derive(ScryptoSbor, ScryptoEvent, Clone, Debug, PartialEq)]
pub struct EventTroveLiquidated {
    pub trove_id: TroveId,
    /// Entire debt of the trove, pending rewards included.
    pub debt: Decimal,
    /// Entire collateral of the trove, pending rewards included.
    pub coll: Decimal,
    pub operation: TroveOperation,
}

/// Aggregate event emitted once per liquidation call.
#[derive(ScryptoSbor, ScryptoEvent, Clone, Debug, PartialEq)]
pub struct EventLiquidation {
    pub liquidated_debt: Decimal,
    /// Collateral offset or redistributed, gas compensation and surplus excluded.
    pub liquidated_coll: Decimal,
    pub coll_gas_compensation: Decimal,
    pub debt_gas_compensation: Decimal,
    pub coll_surplus: Decimal,
}

/// Aggregate event emitted once per redemption call.
#[derive(ScryptoSbor, ScryptoEvent, Clone, Debug, PartialEq)]
pub struct EventRedemption {
    pub attempted_amount: Decimal,
    pub actual_amount: Decimal,
    pub coll_sent: Decimal,
    pub coll_fee: Decimal,
}

#[derive(ScryptoSbor, ScryptoEvent, Clone, Debug, PartialEq)]
pub struct EventBaseRateUpdated {
    pub base_rate: Decimal,
}

#[derive(ScryptoSbor, ScryptoEvent, Clone, Debug, PartialEq)]
pub struct EventLastFeeOpTimeUpdated {
    /// Seconds since unix epoch.
    pub last_fee_op_time: i64,
}

/// Event emitted when a redistribution raises the reward accumulators.
#[derive(ScryptoSbor, ScryptoEvent, Clone, Debug, PartialEq)]
pub struct EventLTermsUpdated {
    pub l_coll: Decimal,
    pub l_debt: Decimal,
}

#[derive(ScryptoSbor, ScryptoEvent, Clone, Debug, PartialEq)]
pub struct EventSystemSnapshotsUpdated {
    pub total_stakes_snapshot: Decimal,
    pub total_collateral_snapshot: Decimal,
}

#[derive(ScryptoSbor, ScryptoEvent, Clone, Debug, PartialEq)]
pub struct EventTotalStakesUpdated {
    pub new_total_stakes: Decimal,
}

/// Event emitted when a trove is moved within the owner array.
#[derive(ScryptoSbor, ScryptoEvent, Clone, Debug, PartialEq)]
pub struct EventTroveIndexUpdated {
    pub trove_id: TroveId,
    pub new_index: u64,
}

#[derive(ScryptoSbor, ScryptoEvent, Clone, Debug, PartialEq)]
pub struct EventBorrowingFeePaid {
    pub trove_id: TroveId,
    pub fee: Decimal,
}

/// Event emitted when an owner claims collateral left over by a liquidation or redemption.
#[derive(ScryptoSbor, ScryptoEvent, Clone, Debug, PartialEq)]
pub struct EventCollateralClaimed {
    pub trove_id: TroveId,
    pub amount: Decimal,
}

/// Event emitted when a user contributes to the stability pool
#[derive(ScryptoSbor, ScryptoEvent, Clone, Debug, PartialEq)]
pub struct StabilityPoolContributionEvent {
    /// The amount of stablecoin contributed
    pub stable_amount: Decimal,
    /// The amount of collateral contributed alongside
    pub collateral_amount: Decimal,
    /// The amount of pool tokens received
    pub pool_tokens_received: Decimal,
}

/// Event emitted when a user withdraws from the stability pool
#[derive(ScryptoSbor, ScryptoEvent, Clone, Debug, PartialEq)]
pub struct StabilityPoolWithdrawalEvent {
    /// The amount of pool tokens burned
    pub pool_tokens_burned: Decimal,
    /// The amount of stablecoin received
    pub stable_received: Decimal,
    /// The amount of collateral received
    pub collateral_received: Decimal,
}

/// Event emitted when liquidated debt is cancelled against pool deposits
#[derive(ScryptoSbor, ScryptoEvent, Clone, Debug, PartialEq)]
pub struct StabilityPoolOffsetEvent {
    pub debt_offset: Decimal,
    pub collateral_added: Decimal,
}

/// Engine events, buffered until the enclosing component emits them.
#[derive(ScryptoSbor, Clone, Debug, PartialEq)]
pub enum TroveEvent {
    TroveUpdated(EventTroveUpdated),
    TroveLiquidated(EventTroveLiquidated),
    Liquidation(EventLiquidation),
    Redemption(EventRedemption),
    BaseRateUpdated(EventBaseRateUpdated),
    LastFeeOpTimeUpdated(EventLastFeeOpTimeUpdated),
    LTermsUpdated(EventLTermsUpdated),
    SystemSnapshotsUpdated(EventSystemSnapshotsUpdated),
    TotalStakesUpdated(EventTotalStakesUpdated),
    TroveIndexUpdated(EventTroveIndexUpdated),
    BorrowingFeePaid(EventBorrowingFeePaid),
}
