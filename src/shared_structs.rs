//! # Trove Protocol shared structs
//! Structs used by the trove engine and by the on-ledger components wrapping it.

use scrypto::prelude::*;

/// Identifier of a trove. Equals the integer local id of the trove receipt NFT; `0` is never issued.
pub type TroveId = u64;

/// Data struct of a trove receipt, gained when opening a trove.
/// The authoritative position data lives in the `TroveManager` state, the receipt proves ownership.
#[derive(ScryptoSbor, NonFungibleData, Clone, Debug)]
pub struct TroveReceipt {
    /// Image of the NFT
    #[mutable]
    pub key_image_url: Url,
    /// The resource address of the collateral locked in this trove.
    pub collateral_address: ResourceAddress,
    /// Last known status of the trove.
    #[mutable]
    pub status: TroveStatus,
}

/// Lifecycle state of a trove.
#[derive(ScryptoSbor, PartialEq, Eq, Clone, Copy, Debug)]
pub enum TroveStatus {
    NonExistent,
    /// Open, present in the sorted index.
    Active,
    /// Fully repaid and closed by its owner.
    ClosedByOwner,
    /// Closed by a liquidation.
    ClosedByLiquidation,
    /// Closed because a redemption took its entire net debt.
    ClosedByRedemption,
}

impl Default for TroveStatus {
    fn default() -> Self {
        TroveStatus::NonExistent
    }
}

/// A borrower position.
#[derive(ScryptoSbor, Clone, Debug, Default, PartialEq)]
pub struct Trove {
    /// Composite debt, including the gas compensation reserve.
    pub debt: Decimal,
    pub coll: Decimal,
    /// Share of redistributed rewards, derived from collateral at the last stake update.
    pub stake: Decimal,
    pub status: TroveStatus,
    /// Position in the owner array, used for O(1) removal.
    pub array_index: u64,
}

/// Accumulator values seen by a trove when its rewards were last applied.
#[derive(ScryptoSbor, Clone, Copy, Debug, Default, PartialEq)]
pub struct RewardSnapshot {
    pub l_coll: Decimal,
    pub l_debt: Decimal,
}

/// Kind of operation that changed a trove, carried by trove events.
#[derive(ScryptoSbor, PartialEq, Eq, Clone, Copy, Debug)]
pub enum TroveOperation {
    OpenTrove,
    AdjustTrove,
    CloseTrove,
    ApplyPendingRewards,
    LiquidateInNormalMode,
    LiquidateInRecoveryMode,
    RedeemCollateral,
}

/// Configurable parameters of the trove engine.
#[derive(ScryptoSbor, Clone, Debug, PartialEq)]
pub struct SystemParameters {
    /// Minimum collateral ratio for individual troves.
    pub mcr: Decimal,
    /// Critical system collateral ratio. Below it the system is in Recovery Mode.
    pub ccr: Decimal,
    /// Stablecoin reserved in the gas pool for every trove, included in its composite debt.
    pub gas_compensation: Decimal,
    /// Minimum net debt (composite debt minus gas compensation) of an open trove.
    pub min_net_debt: Decimal,
    /// Divisor applied to a liquidated trove's collateral for the liquidator's share (200 = 0.5%).
    pub percent_divisor: Decimal,
    /// Minimum USD value of the collateral gas compensation.
    pub coll_gas_compensation_floor: Decimal,
    pub redemption_fee_floor: Decimal,
    pub borrowing_fee_floor: Decimal,
    pub max_borrowing_fee: Decimal,
    /// Divisor of the redeemed supply fraction added to the base rate.
    pub beta: Decimal,
    /// Per-minute decay of the base rate, giving a 12 hour half-life.
    pub minute_decay_factor: Decimal,
    /// Accepted distance between a partially redeemed trove's new NICR and the caller's hint.
    pub nicr_hint_tolerance: Decimal,
    /// Capacity of the sorted trove index.
    pub max_troves: u64,
    /// Seconds after instantiation before redemptions are allowed.
    pub bootstrap_period: i64,
}

impl Default for SystemParameters {
    fn default() -> Self {
        Self {
            mcr: dec!("1.1"),
            ccr: dec!("1.5"),
            gas_compensation: dec!(200),
            min_net_debt: dec!(1800),
            percent_divisor: dec!(200),
            coll_gas_compensation_floor: dec!(10),
            redemption_fee_floor: dec!("0.005"),
            borrowing_fee_floor: dec!("0.005"),
            max_borrowing_fee: dec!("0.05"),
            beta: dec!(2),
            minute_decay_factor: dec!("0.999037758833783"),
            nicr_hint_tolerance: Decimal::ZERO,
            max_troves: 5000,
            bootstrap_period: 14 * 24 * 60 * 60,
        }
    }
}

/// A trove's debt and collateral including pending redistribution rewards.
#[derive(ScryptoSbor, Clone, Copy, Debug, Default, PartialEq)]
pub struct EntireDebtAndColl {
    pub debt: Decimal,
    pub coll: Decimal,
    pub pending_debt_reward: Decimal,
    pub pending_coll_reward: Decimal,
}

/// Aggregated result of one liquidation call.
#[derive(ScryptoSbor, Clone, Debug, Default, PartialEq)]
pub struct LiquidationTotals {
    pub total_coll_in_sequence: Decimal,
    pub total_debt_in_sequence: Decimal,
    /// Collateral paid to the caller.
    pub total_coll_gas_compensation: Decimal,
    /// Stablecoin released from the gas pool to the caller.
    pub total_debt_gas_compensation: Decimal,
    pub total_debt_to_offset: Decimal,
    /// Collateral moved to the Stability Pool.
    pub total_coll_to_send_to_sp: Decimal,
    pub total_debt_to_redistribute: Decimal,
    pub total_coll_to_redistribute: Decimal,
    /// Collateral left to owners of troves closed by a capped recovery mode liquidation.
    pub total_coll_surplus: Decimal,
    /// Troves closed by this call, in liquidation order.
    pub liquidated: Vec<TroveId>,
}

/// Result of one redemption call.
#[derive(ScryptoSbor, Clone, Debug, Default, PartialEq)]
pub struct RedemptionTotals {
    pub attempted_amount: Decimal,
    /// Stablecoin actually cancelled against trove debt.
    pub total_debt_redeemed: Decimal,
    pub total_coll_drawn: Decimal,
    pub coll_fee: Decimal,
    /// Collateral paid to the redeemer, `total_coll_drawn - coll_fee`.
    pub coll_to_send_to_redeemer: Decimal,
    /// Gas compensation burned from the gas pool for troves closed by this redemption.
    pub total_gas_compensation_burned: Decimal,
    /// Collateral credited to owners of troves closed by this redemption.
    pub total_coll_surplus: Decimal,
    /// Troves touched, with `true` for those fully redeemed and closed.
    pub redeemed: Vec<(TroveId, bool)>,
}

/// Arguments of a redemption call.
#[derive(ScryptoSbor, Clone, Copy, Debug, PartialEq)]
pub struct RedemptionRequest {
    /// Stablecoin to redeem.
    pub amount: Decimal,
    /// Expected to be the riskiest trove with ICR >= MCR. Ignored when it is not.
    pub first_redemption_hint: Option<TroveId>,
    /// Neighbour hints for re-inserting the partially redeemed trove.
    pub upper_partial_redemption_hint: Option<TroveId>,
    pub lower_partial_redemption_hint: Option<TroveId>,
    /// Expected NICR of the partially redeemed trove after redemption.
    pub partial_redemption_hint_nicr: Decimal,
    /// Maximum number of troves to visit, `0` for no limit.
    pub max_iterations: u64,
    pub max_fee_percentage: Decimal,
}

/// Hints returned by `get_redemption_hints` for a redemption of a given amount.
#[derive(ScryptoSbor, Clone, Copy, Debug, PartialEq)]
pub struct RedemptionHints {
    pub first_redemption_hint: Option<TroveId>,
    pub partial_redemption_hint_nicr: Decimal,
    /// Largest amount that can be redeemed without leaving a trove below the minimum net debt.
    pub truncated_amount: Decimal,
}

/// Result of opening a trove.
#[derive(ScryptoSbor, Clone, Copy, Debug, PartialEq)]
pub struct OpenTroveOutcome {
    pub borrowing_fee: Decimal,
    pub composite_debt: Decimal,
    pub stake: Decimal,
}

/// Result of adjusting a trove.
#[derive(ScryptoSbor, Clone, Copy, Debug, PartialEq)]
pub struct AdjustTroveOutcome {
    pub borrowing_fee: Decimal,
    pub new_coll: Decimal,
    pub new_debt: Decimal,
    pub stake: Decimal,
}

/// Result of closing a trove by its owner.
#[derive(ScryptoSbor, Clone, Copy, Debug, PartialEq)]
pub struct CloseTroveOutcome {
    pub coll: Decimal,
    /// Stablecoin the owner has to burn, the debt without the gas compensation reserve.
    pub debt_to_repay: Decimal,
    /// Reserve burned from the gas pool.
    pub gas_compensation: Decimal,
}

/// Getter view of a single trove.
#[derive(ScryptoSbor, Clone, Debug, PartialEq)]
pub struct TroveInfo {
    pub trove_id: TroveId,
    pub status: TroveStatus,
    pub debt: Decimal,
    pub coll: Decimal,
    pub stake: Decimal,
    pub pending_debt_reward: Decimal,
    pub pending_coll_reward: Decimal,
    /// Current NICR including pending rewards, `None` for troves not in the sorted index.
    pub nicr: Option<Decimal>,
}

/// Getter view of the system-wide state.
#[derive(ScryptoSbor, Clone, Debug, PartialEq)]
pub struct SystemInfo {
    pub active_coll: Decimal,
    pub active_debt: Decimal,
    pub default_coll: Decimal,
    pub default_debt: Decimal,
    pub gas_pool_debt: Decimal,
    pub total_coll_surplus: Decimal,
    pub total_stakes: Decimal,
    pub total_stakes_snapshot: Decimal,
    pub total_collateral_snapshot: Decimal,
    pub l_coll: Decimal,
    pub l_debt: Decimal,
    pub base_rate: Decimal,
    pub last_fee_operation_time: i64,
    pub trove_count: u64,
}
