//! Pull-payment claim ledger.
//!
//! Amounts owed to an account are recorded with [`ClaimLedger::accrue`] and
//! paid out only when someone calls [`ClaimLedger::withdraw`] for that
//! account. Operations that change resource occupancy never call out to the
//! party they displace; they only add to its balance here.
//!
//! `withdraw` zeroes the balance before the transfer is attempted. If the
//! transfer fails the whole withdrawal is rolled back, so the balance can be
//! neither lost nor paid twice.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{RigError, StateError};
use crate::traits::TokenBank;
use crate::types::{Account, Amount, Asset, Movement};

#[derive(Clone, Debug)]
pub struct ClaimLedger {
    asset: Asset,
    balances: HashMap<Account, Amount>,
    total_owed: Amount,
}

impl ClaimLedger {
    /// An empty ledger paying out in `asset`.
    pub fn new(asset: Asset) -> Self {
        Self {
            asset,
            balances: HashMap::new(),
            total_owed: 0,
        }
    }

    pub fn asset(&self) -> Asset {
        self.asset
    }

    /// Pending balance of `account`.
    pub fn claimable(&self, account: &Account) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Sum of every pending balance.
    pub fn total_owed(&self) -> Amount {
        self.total_owed
    }

    /// Number of accounts with a non-zero balance.
    pub fn len(&self) -> usize {
        self.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }

    /// Check that [`accrue`](Self::accrue) would succeed, without changing anything.
    pub fn check_accrue(&self, account: &Account, amount: Amount) -> Result<(), RigError> {
        account.validate()?;
        self.claimable(account)
            .checked_add(amount)
            .ok_or(RigError::Overflow)?;
        self.total_owed.checked_add(amount).ok_or(RigError::Overflow)?;
        Ok(())
    }

    /// Record `amount` as owed to `account`. Never transfers.
    pub fn accrue(&mut self, account: Account, amount: Amount) -> Result<(), RigError> {
        self.check_accrue(&account, amount)?;
        if amount == 0 {
            return Ok(());
        }
        *self.balances.entry(account).or_insert(0) += amount;
        self.total_owed += amount;
        debug!(%account, amount, "ledger: accrued");
        Ok(())
    }

    /// Pay `account` its whole pending balance through `bank`.
    ///
    /// Anyone may trigger a withdrawal; funds only ever go to `account`.
    ///
    /// # Errors
    ///
    /// - [`StateError::NothingToClaim`] if the balance is zero
    /// - [`ValidationError::InvalidAccount`](crate::error::ValidationError::InvalidAccount) for the zero account
    /// - [`RigError::Transfer`] if the bank rejects the payout; the balance is restored
    pub fn withdraw<B: TokenBank + ?Sized>(
        &mut self,
        account: Account,
        bank: &mut B,
    ) -> Result<Amount, RigError> {
        let owed = self.claimable(&account);
        if owed == 0 {
            return Err(StateError::NothingToClaim.into());
        }
        account.validate()?;

        self.balances.remove(&account);
        self.total_owed -= owed;

        let payout = Movement::Transfer {
            asset: self.asset,
            to: account,
            amount: owed,
        };
        if let Err(e) = bank.settle(&[payout]) {
            self.balances.insert(account, owed);
            self.total_owed += owed;
            return Err(e.into());
        }
        debug!(%account, amount = owed, "ledger: withdrawn");
        Ok(owed)
    }
}
