//! Core value types: accounts, amounts, assets, entropy and settlement movements.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Token amount in base units.
pub type Amount = u128;

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// A 20-byte participant identity.
///
/// The all-zero account means "unset" and is never a valid recipient.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Account(pub [u8; 20]);

impl Account {
    /// The unset account.
    pub const ZERO: Self = Self([0u8; 20]);

    /// Derive a deterministic account from a human-readable label.
    ///
    /// Uses the first 20 bytes of `BLAKE3(label)`. Intended for tooling and tests.
    pub fn from_label(label: &str) -> Self {
        let digest = blake3::hash(label.as_bytes());
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest.as_bytes()[..20]);
        Self(bytes)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// `Some(self)` unless this is the zero account.
    pub fn non_zero(self) -> Option<Self> {
        if self.is_zero() { None } else { Some(self) }
    }

    /// Reject the zero account.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_zero() {
            return Err(ValidationError::InvalidAccount);
        }
        Ok(())
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Account {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let raw = hex::decode(digits).map_err(|_| ValidationError::InvalidAccount)?;
        let bytes: [u8; 20] = raw.try_into().map_err(|_| ValidationError::InvalidAccount)?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Account {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Account> for String {
    fn from(account: Account) -> Self {
        account.to_string()
    }
}

/// The two assets a rig moves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Asset {
    /// The payment asset participants spend.
    Quote,
    /// The token the rigs issue.
    Unit,
}

/// One balance change requested from a [`TokenBank`](crate::traits::TokenBank).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Movement {
    /// Pull quote tokens from a payer into engine custody.
    Collect { from: Account, amount: Amount },
    /// Send an asset out of engine custody.
    Transfer { asset: Asset, to: Account, amount: Amount },
    /// Issue new unit supply.
    Mint { to: Account, amount: Amount },
}

impl Movement {
    pub fn amount(&self) -> Amount {
        match self {
            Self::Collect { amount, .. }
            | Self::Transfer { amount, .. }
            | Self::Mint { amount, .. } => *amount,
        }
    }
}

/// A 32-byte random value delivered by a randomness provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Entropy(pub [u8; 32]);

impl Entropy {
    /// Reduce the value, read as a big-endian 256-bit integer, modulo `len`.
    ///
    /// Returns 0 when `len` is 0.
    pub fn index(&self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        let m = len as u128;
        let mut acc: u128 = 0;
        for byte in self.0 {
            acc = (acc * 256 + byte as u128) % m;
        }
        acc as usize
    }

    /// Entropy whose integer value is `n`.
    pub fn from_u64(n: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&n.to_be_bytes());
        Self(bytes)
    }
}

impl fmt::Display for Entropy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_account_is_invalid() {
        assert!(Account::ZERO.is_zero());
        assert_eq!(Account::ZERO.validate(), Err(ValidationError::InvalidAccount));
        assert_eq!(Account::ZERO.non_zero(), None);
    }

    #[test]
    fn labels_are_deterministic_and_distinct() {
        assert_eq!(Account::from_label("alice"), Account::from_label("alice"));
        assert_ne!(Account::from_label("alice"), Account::from_label("bob"));
        assert!(!Account::from_label("alice").is_zero());
    }

    #[test]
    fn account_display_parses_back() {
        let a = Account::from_label("carol");
        let s = a.to_string();
        assert!(s.starts_with("0x"));
        assert_eq!(s.len(), 42);
        assert_eq!(s.parse::<Account>().unwrap(), a);
    }

    #[test]
    fn account_parse_rejects_wrong_length() {
        assert!("0x1234".parse::<Account>().is_err());
        assert!("not-hex".parse::<Account>().is_err());
    }

    #[test]
    fn account_serde_uses_hex_string() {
        let a = Account([0xab; 20]);
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "ab".repeat(20)));
        let back: Account = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn entropy_index_small_values() {
        assert_eq!(Entropy::from_u64(7).index(5), 2);
        assert_eq!(Entropy::from_u64(10).index(5), 0);
        assert_eq!(Entropy::from_u64(3).index(0), 0);
    }

    #[test]
    fn entropy_index_high_bytes() {
        // 2^248 mod 3: 2 ≡ -1 (mod 3), even exponent, so 1.
        let mut bytes = [0u8; 32];
        bytes[0] = 1;
        assert_eq!(Entropy(bytes).index(3), 1);
    }

    #[test]
    fn entropy_index_always_in_range() {
        let e = Entropy([0xff; 32]);
        for len in 1..20 {
            assert!(e.index(len) < len);
        }
    }

    #[test]
    fn movement_amount() {
        let a = Account::from_label("x");
        assert_eq!(Movement::Mint { to: a, amount: 9 }.amount(), 9);
        assert_eq!(Movement::Collect { from: a, amount: 3 }.amount(), 3);
    }
}
