//! Ownership and fee-recipient roles shared by every rig.

use serde::{Deserialize, Serialize};
use tracing::info;

use rig_core::error::{ConfigError, RigError, ValidationError};
use rig_core::events::AdminChange;
use rig_core::fees::FeeRecipients;
use rig_core::types::Account;

/// Accounts with a role in a rig.
///
/// `owner` and `treasury` must be set. `team` and `protocol` may be left
/// unset, in which case their fee share is absorbed by the treasury.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Roles {
    pub owner: Account,
    pub treasury: Account,
    pub team: Option<Account>,
    pub protocol: Option<Account>,
}

impl Roles {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.treasury.is_zero() {
            return Err(ConfigError::TreasuryUnset);
        }
        if self.owner.is_zero() {
            return Err(ConfigError::OwnerUnset);
        }
        Ok(())
    }

    /// Reject callers other than the owner.
    pub fn authorize(&self, caller: &Account) -> Result<(), ValidationError> {
        if caller.is_zero() || *caller != self.owner {
            return Err(ValidationError::Unauthorized);
        }
        Ok(())
    }

    /// Fee recipients for one payment, with `displaced` as the displaced party.
    pub fn recipients(&self, displaced: Option<Account>) -> FeeRecipients {
        FeeRecipients {
            displaced,
            team: self.team,
            protocol: self.protocol,
            treasury: self.treasury,
        }
    }

    pub fn set_owner(&mut self, owner: Account) -> Result<AdminChange, RigError> {
        owner.validate()?;
        self.owner = owner;
        Ok(AdminChange::Owner(owner))
    }

    pub fn set_treasury(&mut self, treasury: Account) -> Result<AdminChange, RigError> {
        treasury.validate()?;
        self.treasury = treasury;
        Ok(AdminChange::Treasury(treasury))
    }

    /// Set or clear the team recipient. The zero account clears it.
    pub fn set_team(&mut self, team: Option<Account>) -> AdminChange {
        self.team = team.and_then(Account::non_zero);
        AdminChange::Team(self.team)
    }

    /// Set or clear the protocol recipient. The zero account clears it.
    pub fn set_protocol(&mut self, protocol: Option<Account>) -> AdminChange {
        self.protocol = protocol.and_then(Account::non_zero);
        AdminChange::Protocol(self.protocol)
    }
}

/// Owner-gated role changes, provided for any rig that exposes its roles.
///
/// Changes apply to future payments only; balances already accrued in a
/// claim ledger stay with the account they were accrued to.
pub trait Administered {
    fn roles(&self) -> &Roles;

    fn roles_mut(&mut self) -> &mut Roles;

    /// Record an applied change in the rig's outbox.
    fn record_admin(&mut self, change: AdminChange);

    fn owner(&self) -> Account {
        self.roles().owner
    }

    fn set_owner(&mut self, caller: Account, owner: Account) -> Result<(), RigError> {
        self.roles().authorize(&caller)?;
        let change = self.roles_mut().set_owner(owner)?;
        self.record_admin(change);
        Ok(())
    }

    fn set_treasury(&mut self, caller: Account, treasury: Account) -> Result<(), RigError> {
        self.roles().authorize(&caller)?;
        let change = self.roles_mut().set_treasury(treasury)?;
        self.record_admin(change);
        Ok(())
    }

    fn set_team(&mut self, caller: Account, team: Option<Account>) -> Result<(), RigError> {
        self.roles().authorize(&caller)?;
        let change = self.roles_mut().set_team(team);
        self.record_admin(change);
        Ok(())
    }

    fn set_protocol(&mut self, caller: Account, protocol: Option<Account>) -> Result<(), RigError> {
        self.roles().authorize(&caller)?;
        let change = self.roles_mut().set_protocol(protocol);
        self.record_admin(change);
        Ok(())
    }
}

/// Log an admin change the way every rig does.
pub(crate) fn log_admin(rig: &'static str, change: &AdminChange) {
    info!(rig, ?change, "admin: setting changed");
}
