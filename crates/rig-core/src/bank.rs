//! In-memory token bank for tests and tooling.
//!
//! [`MemoryBank`] keeps every balance in a `HashMap` with no persistence.
//! Batches are applied to a staged copy and committed only if every movement
//! succeeds. Accounts can be marked as refusing incoming transfers to model
//! recipients that revert on receipt.

use std::collections::{HashMap, HashSet};

use crate::error::TransferError;
use crate::traits::TokenBank;
use crate::types::{Account, Amount, Asset, Movement};

#[derive(Clone, Debug)]
pub struct MemoryBank {
    custody: Account,
    balances: HashMap<(Asset, Account), Amount>,
    refusing: HashSet<Account>,
    total_minted: Amount,
    batches: u64,
}

impl MemoryBank {
    /// Create an empty bank whose custody account is `custody`.
    pub fn new(custody: Account) -> Self {
        Self {
            custody,
            balances: HashMap::new(),
            refusing: HashSet::new(),
            total_minted: 0,
            batches: 0,
        }
    }

    /// Credit `amount` of `asset` to `account` outside any batch.
    pub fn fund(&mut self, asset: Asset, account: Account, amount: Amount) {
        let entry = self.balances.entry((asset, account)).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Make `account` reject (or accept again) incoming transfers.
    ///
    /// Minting is never refused.
    pub fn set_refusing(&mut self, account: Account, refusing: bool) {
        if refusing {
            self.refusing.insert(account);
        } else {
            self.refusing.remove(&account);
        }
    }

    /// Total unit supply minted through this bank.
    pub fn total_minted(&self) -> Amount {
        self.total_minted
    }

    /// Number of batches committed.
    pub fn batches(&self) -> u64 {
        self.batches
    }

    /// Sum of all balances of `asset`, custody included.
    pub fn supply(&self, asset: Asset) -> Amount {
        self.balances
            .iter()
            .filter(|((a, _), _)| *a == asset)
            .map(|(_, v)| *v)
            .sum()
    }

    fn debit(
        staged: &mut HashMap<(Asset, Account), Amount>,
        asset: Asset,
        account: Account,
        amount: Amount,
    ) -> Result<(), TransferError> {
        let have = staged.get(&(asset, account)).copied().unwrap_or(0);
        let left = have.checked_sub(amount).ok_or(TransferError::InsufficientBalance {
            asset,
            account,
            have,
            need: amount,
        })?;
        staged.insert((asset, account), left);
        Ok(())
    }

    fn credit(
        staged: &mut HashMap<(Asset, Account), Amount>,
        asset: Asset,
        account: Account,
        amount: Amount,
    ) -> Result<(), TransferError> {
        let entry = staged.entry((asset, account)).or_insert(0);
        *entry = entry.checked_add(amount).ok_or(TransferError::Overflow)?;
        Ok(())
    }
}

impl TokenBank for MemoryBank {
    fn custody(&self) -> Account {
        self.custody
    }

    fn balance(&self, asset: Asset, account: &Account) -> Amount {
        self.balances.get(&(asset, *account)).copied().unwrap_or(0)
    }

    fn settle(&mut self, batch: &[Movement]) -> Result<(), TransferError> {
        let mut staged = self.balances.clone();
        let mut minted: Amount = 0;

        for movement in batch.iter().filter(|m| m.amount() > 0) {
            match *movement {
                Movement::Collect { from, amount } => {
                    Self::debit(&mut staged, Asset::Quote, from, amount)?;
                    Self::credit(&mut staged, Asset::Quote, self.custody, amount)?;
                }
                Movement::Transfer { asset, to, amount } => {
                    if to.is_zero() {
                        return Err(TransferError::ZeroRecipient);
                    }
                    if self.refusing.contains(&to) {
                        return Err(TransferError::Rejected(to));
                    }
                    Self::debit(&mut staged, asset, self.custody, amount)?;
                    Self::credit(&mut staged, asset, to, amount)?;
                }
                Movement::Mint { to, amount } => {
                    if to.is_zero() {
                        return Err(TransferError::ZeroRecipient);
                    }
                    Self::credit(&mut staged, Asset::Unit, to, amount)?;
                    minted = minted.checked_add(amount).ok_or(TransferError::Overflow)?;
                }
            }
        }

        self.balances = staged;
        self.total_minted = self.total_minted.saturating_add(minted);
        self.batches += 1;
        Ok(())
    }
}
