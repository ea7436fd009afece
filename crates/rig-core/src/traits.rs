//! Trait interfaces between the rigs and their external collaborators.
//!
//! - [`TokenBank`] — moves payment and unit tokens (an in-memory version lives in [`crate::bank`])
//! - [`RandomnessProvider`] — issues randomness requests whose results arrive later

use serde::{Deserialize, Serialize};

use crate::error::{RandomnessError, TransferError};
use crate::types::{Account, Amount, Asset, Movement};

/// Token custody and settlement.
///
/// A rig computes every balance change of an operation up front and hands
/// them to [`settle`](Self::settle) as one batch. Implementations must apply
/// the batch completely or not at all.
pub trait TokenBank: Send {
    /// Account holding tokens on behalf of the rig (payments in, prize pool).
    fn custody(&self) -> Account;

    /// Balance of `account` in `asset`.
    fn balance(&self, asset: Asset, account: &Account) -> Amount;

    /// Apply `batch` atomically.
    ///
    /// # Errors
    ///
    /// - [`TransferError::InsufficientBalance`] if a debit exceeds a balance
    /// - [`TransferError::Rejected`] if a recipient refuses a transfer
    /// - [`TransferError::ZeroRecipient`] if a movement targets the zero account
    fn settle(&mut self, batch: &[Movement]) -> Result<(), TransferError>;
}

/// What a randomness request is for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestTag {
    /// Resource the result applies to (slot index or pool entry number).
    pub resource: u64,
    /// Resource epoch at request time.
    pub epoch: u64,
}

/// External source of verifiable randomness.
///
/// `request` returns a provider-assigned sequence number; the result is
/// delivered later, out of band, as `(sequence, entropy)`.
pub trait RandomnessProvider: Send {
    /// Account the request fee is forwarded to.
    fn account(&self) -> Account;

    /// Exact fee the caller must supply per request.
    fn fee(&self) -> Amount;

    /// Issue a request and return its sequence number.
    fn request(&mut self, tag: RequestTag) -> Result<u64, RandomnessError>;
}

/// Provider for rigs that run without randomness.
///
/// Charges nothing and refuses every request.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoRandomness;

impl RandomnessProvider for NoRandomness {
    fn account(&self) -> Account {
        Account::ZERO
    }

    fn fee(&self) -> Amount {
        0
    }

    fn request(&mut self, _tag: RequestTag) -> Result<u64, RandomnessError> {
        Err(RandomnessError::Unavailable("randomness not configured".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_randomness_is_free_and_unavailable() {
        let mut p = NoRandomness;
        assert_eq!(p.fee(), 0);
        assert!(p.account().is_zero());
        assert!(p.request(RequestTag { resource: 0, epoch: 0 }).is_err());
    }

    #[test]
    fn request_tag_roundtrips_through_json() {
        let tag = RequestTag { resource: 3, epoch: 9 };
        let json = serde_json::to_string(&tag).unwrap();
        assert_eq!(serde_json::from_str::<RequestTag>(&json).unwrap(), tag);
    }
}
