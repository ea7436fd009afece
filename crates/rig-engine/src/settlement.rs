//! Batch builder shared by the rigs.
//!
//! An operation collects every movement and notification it will cause into
//! a [`Settlement`], then commits it in one bank call. Nothing reaches the
//! event log unless the bank accepted the whole batch.

use tracing::debug;

use rig_core::error::RigError;
use rig_core::events::{EventLog, RigEvent};
use rig_core::fees::{FeeRole, FeeSplit};
use rig_core::traits::TokenBank;
use rig_core::types::{Account, Amount, Asset, Movement};

#[derive(Debug, Default)]
pub(crate) struct Settlement {
    movements: Vec<Movement>,
    events: Vec<RigEvent>,
}

impl Settlement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pull `amount` of the payment asset from `from` into custody.
    pub fn collect(&mut self, from: Account, amount: Amount) {
        self.movements.push(Movement::Collect { from, amount });
    }

    /// Transfer every share except the displaced party's, which the caller
    /// accrues to its claim ledger instead.
    pub fn pay_fees(&mut self, split: &FeeSplit) {
        for share in split.without(FeeRole::Displaced) {
            self.movements.push(Movement::Transfer {
                asset: Asset::Quote,
                to: share.recipient,
                amount: share.amount,
            });
            self.events.push(RigEvent::FeeTransferred {
                role: share.role,
                recipient: share.recipient,
                amount: share.amount,
            });
        }
    }

    pub fn transfer(&mut self, asset: Asset, to: Account, amount: Amount) {
        self.movements.push(Movement::Transfer { asset, to, amount });
    }

    /// Issue `amount` of new unit supply to `to`. Zero mints are dropped.
    pub fn mint(&mut self, to: Account, amount: Amount) {
        if amount == 0 {
            return;
        }
        self.movements.push(Movement::Mint { to, amount });
        self.events.push(RigEvent::EmissionMinted { to, amount });
    }

    pub fn event(&mut self, event: RigEvent) {
        self.events.push(event);
    }

    /// Settle the batch, then publish its events.
    pub fn commit<B: TokenBank + ?Sized>(
        self,
        bank: &mut B,
        log: &mut EventLog,
    ) -> Result<(), RigError> {
        bank.settle(&self.movements)?;
        debug!(movements = self.movements.len(), events = self.events.len(), "settlement: committed");
        log.extend(self.events);
        Ok(())
    }
}
