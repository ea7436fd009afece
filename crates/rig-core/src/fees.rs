//! Exact basis-point fee splitting.
//!
//! A payment is divided between up to three share-holding recipients
//! (displaced party, team, protocol) and the treasury, which takes the
//! remainder. Shares floor independently; whatever is left, including the
//! share of any unset recipient, lands in the treasury, so the shares always
//! sum to the payment.

use serde::{Deserialize, Serialize};

use crate::constants::{
    BPS_PRECISION, DEFAULT_DISPLACED_BPS, DEFAULT_PROTOCOL_BPS, DEFAULT_TEAM_BPS,
};
use crate::error::{ConfigError, RigError};
use crate::math::bps_of;
use crate::types::{Account, Amount};

/// Who a fee share belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeRole {
    Displaced,
    Team,
    Protocol,
    Treasury,
}

/// Basis-point shares for the non-remainder recipients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub displaced_bps: u128,
    pub team_bps: u128,
    pub protocol_bps: u128,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            displaced_bps: DEFAULT_DISPLACED_BPS,
            team_bps: DEFAULT_TEAM_BPS,
            protocol_bps: DEFAULT_PROTOCOL_BPS,
        }
    }
}

impl FeeSchedule {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let total = self.total_bps();
        if total > BPS_PRECISION {
            return Err(ConfigError::FeeSharesTooLarge { total });
        }
        Ok(())
    }

    fn total_bps(&self) -> u128 {
        self.displaced_bps
            .saturating_add(self.team_bps)
            .saturating_add(self.protocol_bps)
    }

    /// Implied treasury share when every recipient is set.
    pub fn treasury_bps(&self) -> u128 {
        BPS_PRECISION.saturating_sub(self.total_bps())
    }
}

/// Recipients for one split. `None` means unset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeeRecipients {
    pub displaced: Option<Account>,
    pub team: Option<Account>,
    pub protocol: Option<Account>,
    pub treasury: Account,
}

/// One recipient's portion of a payment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct FeeShare {
    pub role: FeeRole,
    pub recipient: Account,
    pub amount: Amount,
}

/// Result of splitting a payment. Zero-amount shares are not listed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FeeSplit {
    pub shares: Vec<FeeShare>,
}

impl FeeSplit {
    /// Amount assigned to `role` (0 if absent).
    pub fn amount_for(&self, role: FeeRole) -> Amount {
        self.shares
            .iter()
            .filter(|s| s.role == role)
            .map(|s| s.amount)
            .sum()
    }

    pub fn total(&self) -> Amount {
        self.shares.iter().map(|s| s.amount).sum()
    }

    /// Shares for every role except `role`.
    pub fn without(&self, role: FeeRole) -> impl Iterator<Item = &FeeShare> {
        self.shares.iter().filter(move |s| s.role != role)
    }
}

/// Split `payment` according to `schedule`.
///
/// The treasury must be a valid account; configuration guarantees this, and a
/// zero treasury here is reported as [`ConfigError::TreasuryUnset`].
pub fn split_payment(
    payment: Amount,
    schedule: &FeeSchedule,
    recipients: &FeeRecipients,
) -> Result<FeeSplit, RigError> {
    if recipients.treasury.is_zero() {
        return Err(ConfigError::TreasuryUnset.into());
    }
    schedule.validate()?;

    let mut shares = Vec::with_capacity(4);
    let mut assigned: Amount = 0;
    let parts = [
        (FeeRole::Displaced, recipients.displaced, schedule.displaced_bps),
        (FeeRole::Team, recipients.team, schedule.team_bps),
        (FeeRole::Protocol, recipients.protocol, schedule.protocol_bps),
    ];
    for (role, recipient, bps) in parts {
        let Some(recipient) = recipient.and_then(Account::non_zero) else {
            continue;
        };
        let amount = bps_of(payment, bps)?;
        if amount == 0 {
            continue;
        }
        assigned += amount;
        shares.push(FeeShare { role, recipient, amount });
    }

    // Σ bps <= 10_000, so assigned <= payment.
    let remainder = payment - assigned;
    if remainder > 0 {
        shares.push(FeeShare {
            role: FeeRole::Treasury,
            recipient: recipients.treasury,
            amount: remainder,
        });
    }
    Ok(FeeSplit { shares })
}
