//! Error types shared by the trove engine.
//!
//! Every fallible core operation returns [`TroveResult`]. The on-ledger components turn an error
//! into a panic carrying the error message, which aborts the whole transaction.

use thiserror::Error;

pub type TroveResult<T> = Result<T, TroveError>;

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum TroveError {
    // Sorted index guards
    #[error("Trove id cannot be zero")]
    ZeroId,

    #[error("NICR must be positive")]
    ZeroKey,

    #[error("Trove is already in the sorted list")]
    AlreadyInList,

    #[error("Sorted list is full")]
    ListFull,

    #[error("Trove is not in the sorted list")]
    NotInList,

    // Ledger guards
    #[error("Only one trove in the system")]
    OnlyOneTroveInSystem,

    #[error("Total stakes are zero, cannot redistribute")]
    ZeroTotalStakes,

    #[error("Trove does not exist or is closed")]
    TroveNotActive,

    #[error("Trove is already active")]
    TroveAlreadyActive,

    // Liquidation
    #[error("Nothing to liquidate")]
    NothingToLiquidate,

    #[error("Calldata address array must not be empty")]
    EmptyTroveArray,

    // Redemption and fees
    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Max fee percentage is out of bounds")]
    InvalidMaxFeePercentage,

    #[error("Redemptions are not allowed during the bootstrap period")]
    RedemptionsNotAllowedYet,

    #[error("Cannot redeem when TCR < MCR")]
    TcrBelowMcr,

    #[error("Fee exceeded provided maximum")]
    FeeExceedsMaximum,

    #[error("Fee would eat up all returned collateral")]
    FeeEatsAllCollateral,

    #[error("Base rate cannot be zero after a redemption")]
    ZeroBaseRate,

    // Borrower operations
    #[error("Net debt must be at least the minimum")]
    BelowMinNetDebt,

    #[error("An operation that would result in ICR < MCR is not permitted")]
    IcrBelowMcr,

    #[error("Operation must leave trove with ICR >= CCR")]
    IcrBelowCcr,

    #[error("An operation that would result in TCR < CCR is not permitted")]
    TcrBelowCcr,

    #[error("Collateral withdrawal not permitted in Recovery Mode")]
    CollWithdrawalInRecoveryMode,

    #[error("Cannot decrease your trove's ICR in Recovery Mode")]
    IcrDecreaseInRecoveryMode,

    #[error("Amount repaid must not be larger than the trove's debt")]
    RepaymentExceedsDebt,

    #[error("Cannot withdraw more collateral than the trove holds")]
    InsufficientCollateral,

    #[error("There must be either a collateral change or a debt change")]
    NoAdjustment,

    #[error("Cannot withdraw and add collateral at the same time")]
    SingularCollChange,

    #[error("Debt increase requires non-zero debt change")]
    ZeroDebtChange,

    #[error("Operation not permitted during Recovery Mode")]
    InRecoveryMode,

    #[error("No collateral available to claim")]
    NoCollateralToClaim,
}
