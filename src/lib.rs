//! # Trove Protocol Crate
//!
//! This crate contains the trove engine and the Scrypto blueprints of a single-collateral borrowing
//! protocol. Users lock collateral in troves and borrow a stablecoin against it. Troves that fall
//! below the minimum collateral ratio are liquidated against a stability pool, or redistributed over
//! the remaining troves when the pool is empty. Stablecoin holders can redeem their tokens for
//! collateral at face value, taken from the riskiest troves first.
//!
//! ## Modules
//!
//! The crate is organized into the following modules:
//!
//! - `trove_system`: The `TroveSystem`, owner of all engine state. Borrower operations, liquidations
//!   and redemptions extend it from their own modules.
//! - `sorted_troves`: The doubly linked list of troves ordered by nominal collateral ratio, with
//!   hint-based insertion.
//! - `trove_ledger`: Trove records, stakes, reward snapshots and the redistribution accumulators.
//! - `storage`: `TroveMap`, the per-trove record store backed by a `KeyValueStore` on ledger.
//! - `pools`: Balance ledgers for the active, default, gas and surplus pools, and the
//!   `StabilityPool` trait the liquidation engine offsets debt against.
//! - `fee_model`: The decaying base rate and the redemption and borrowing fees derived from it.
//! - `borrower_operations`: Opening, adjusting and closing troves.
//! - `liquidation`: Single, sequential and batch liquidations in normal and recovery mode.
//! - `redemption`: Redemptions and the hint helpers that prepare them.
//! - `math`: Fixed-point helpers shared by the engine.
//! - `errors`: The `TroveError` type returned by every fallible engine operation.
//! - `events`: Events emitted by the engine and the components.
//! - `shared_structs`: Data structures shared across modules and components.
//! - `trove_manager`: The `TroveManager` component holding the vaults and resources and driving the engine.
//! - `stability_pool`: The `StabilityPool` component holding stablecoin deposits that absorb liquidated debt.

pub mod borrower_operations;
pub mod errors;
pub mod events;
pub mod fee_model;
pub mod liquidation;
pub mod math;
pub mod pools;
pub mod redemption;
pub mod shared_structs;
pub mod sorted_troves;
pub mod stability_pool;
pub mod storage;
pub mod trove_ledger;
pub mod trove_manager;
pub mod trove_system;
