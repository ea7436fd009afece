//! Error types for the Rig engine.
use thiserror::Error;

use crate::types::{Account, Amount, Asset};

/// Rejected input. The operation is aborted with no effect.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("epoch mismatch: expected {expected}, live {live}")] EpochMismatch { expected: u64, live: u64 },
    #[error("deadline {deadline} passed at {now}")] DeadlinePassed { deadline: u64, now: u64 },
    #[error("price {price} exceeds maximum {max_price}")] PriceAboveMax { price: Amount, max_price: Amount },
    #[error("invalid account")] InvalidAccount,
    #[error("slot index {index} out of range (capacity {capacity})")] SlotOutOfRange { index: u32, capacity: u32 },
    #[error("randomness fee supplied while randomness is disabled")] UnexpectedEntropyFee,
    #[error("incorrect randomness fee: got {got}, required {required}")] IncorrectEntropyFee { got: Amount, required: Amount },
    #[error("contribution {amount} below minimum {min}")] ContributionTooSmall { amount: Amount, min: Amount },
    #[error("caller is not the owner")] Unauthorized,
    #[error("capacity {requested} exceeds maximum {max}")] CapacityTooLarge { requested: u32, max: u32 },
}

/// Recoverable state condition. The caller may retry later or with other input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("nothing to claim")] NothingToClaim,
    #[error("capacity must increase: current {current}, requested {requested}")] CapacityNotIncreased { current: u32, requested: u32 },
    #[error("day {day} has not ended (current day {current})")] DayNotEnded { day: u64, current: u64 },
    #[error("day {day} already claimed")] AlreadyClaimed { day: u64 },
}

/// Invalid configuration, detected before an engine is constructed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("treasury account must be set")] TreasuryUnset,
    #[error("owner account must be set")] OwnerUnset,
    #[error("fee shares sum to {total} bps (max 10000)")] FeeSharesTooLarge { total: u128 },
    #[error("epoch period {0}s out of range")] EpochPeriodOutOfRange(u64),
    #[error("price multiplier {0} out of range")] PriceMultiplierOutOfRange(u128),
    #[error("min init price {0} out of range")] MinInitPriceOutOfRange(Amount),
    #[error("halving parameter must be non-zero")] ZeroHalving,
    #[error("tail rate {tail} exceeds initial rate {initial}")] TailAboveInitial { tail: Amount, initial: Amount },
    #[error("empty randomness table")] EmptyTable,
    #[error("table entry {index} out of range: {value}")] TableEntryOutOfRange { index: usize, value: u128 },
    #[error("initial capacity must be at least 1")] ZeroCapacity,
    #[error("load: {0}")] Load(String),
}

/// Settlement failure reported by a [`TokenBank`](crate::traits::TokenBank).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("insufficient {asset:?} balance for {account}: have {have}, need {need}")] InsufficientBalance { asset: Asset, account: Account, have: Amount, need: Amount },
    #[error("recipient {0} rejected the transfer")] Rejected(Account),
    #[error("transfer to the zero account")] ZeroRecipient,
    #[error("balance overflow")] Overflow,
}

/// Failure raised by a randomness provider while issuing a request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RandomnessError {
    #[error("provider unavailable: {0}")] Unavailable(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RigError {
    #[error(transparent)] Validation(#[from] ValidationError),
    #[error(transparent)] State(#[from] StateError),
    #[error(transparent)] Config(#[from] ConfigError),
    #[error(transparent)] Transfer(#[from] TransferError),
    #[error(transparent)] Randomness(#[from] RandomnessError),
    #[error("arithmetic overflow")] Overflow,
}

impl RigError {
    /// Whether the error rejected the caller's input rather than hitting engine state.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
