//! Pool rig: paid entries against a growing prize pool.
//!
//! The prize pool is the unit balance held in bank custody, topped up on
//! every entry with the emission accrued since the previous one under a
//! time-triggered halving curve. Each entry wins a percentage of the pool
//! drawn from the payout table. Without randomness the first table entry is
//! paid out in the same operation; with randomness the draw happens when the
//! entry's request is resolved.
//!
//! Each entry is its own randomness resource, so a later entry never makes
//! an earlier one stale. A payout the participant refuses to receive is
//! parked in a unit-denominated claim ledger instead of failing the
//! resolution.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info, warn};

use rig_core::auction::{AuctionClock, AuctionParams, Bid};
use rig_core::emission::{EmissionState, HalvingPolicy, TimeHalving};
use rig_core::error::RigError;
use rig_core::events::{AdminChange, EventLog, IgnoreReason, RigEvent};
use rig_core::fees::{FeeSchedule, split_payment};
use rig_core::ledger::ClaimLedger;
use rig_core::math::{bps_of, checked_add};
use rig_core::randomness::{RandomnessGate, Resolution};
use rig_core::traits::{RandomnessProvider, RequestTag, TokenBank};
use rig_core::types::{Account, Amount, Asset, Entropy, Movement, Timestamp};

use crate::config::PoolRigConfig;
use crate::resolve::{ResolveEntropy, ResolveOutcome};
use crate::roles::{Administered, Roles, log_admin};
use crate::settlement::Settlement;

/// Arguments to [`PoolRig::enter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnterRequest {
    pub participant: Account,
    pub bid: Bid,
    pub entropy_fee: Amount,
}

/// An entry waiting for its randomness result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PendingEntry {
    pub participant: Account,
    /// Auction epoch the entry opened.
    pub epoch: u64,
    pub entered_at: Timestamp,
}

pub struct PoolRig<B, P> {
    params: AuctionParams,
    fees: FeeSchedule,
    roles: Roles,
    curve: TimeHalving,
    emission: EmissionState,
    clock: AuctionClock,
    next_entry: u64,
    gate: RandomnessGate<u64>,
    entries: HashMap<u64, PendingEntry>,
    payouts: ClaimLedger,
    bank: B,
    provider: P,
    events: EventLog,
}

impl<B: TokenBank, P: RandomnessProvider> PoolRig<B, P> {
    /// Build a rig whose emission curve starts at `now`.
    pub fn new(
        config: &PoolRigConfig,
        roles: Roles,
        bank: B,
        provider: P,
        now: Timestamp,
    ) -> Result<Self, RigError> {
        config.validate()?;
        roles.validate()?;
        let curve = config.emission.curve();
        let gate = RandomnessGate::new(
            config.randomness.table.clone(),
            config.randomness.duration,
            config.randomness.enabled,
        )?;
        info!(randomness = gate.is_enabled(), "pool rig: initialised");
        Ok(Self {
            params: config.auction.params(),
            fees: config.fees.schedule(),
            roles,
            curve,
            emission: EmissionState::new(HalvingPolicy::Time(curve), now),
            clock: AuctionClock::new(config.auction.initial_price, now),
            next_entry: 0,
            gate,
            entries: HashMap::new(),
            payouts: ClaimLedger::new(Asset::Unit),
            bank,
            provider,
            events: EventLog::new(),
        })
    }

    /// Buy an entry at the live price and return the price paid.
    ///
    /// The whole payment is split as fees. With randomness disabled the
    /// fallback payout is transferred before this returns; a participant who
    /// refuses it fails its own entry.
    pub fn enter(&mut self, request: EnterRequest, now: Timestamp) -> Result<Amount, RigError> {
        request.participant.validate()?;
        let price = self.clock.check_bid(&request.bid, now, &self.params)?;
        self.gate.check_fee(request.entropy_fee, self.provider.fee())?;

        let top_up = self.pending_emission(now)?;
        let split = split_payment(price, &self.fees, &self.roles.recipients(None))?;
        let entry = self.next_entry;
        let epoch = self.clock.epoch_id + 1;

        let mut batch = Settlement::new();
        batch.collect(request.participant, checked_add(price, request.entropy_fee)?);
        batch.pay_fees(&split);
        batch.mint(self.bank.custody(), top_up);
        batch.event(RigEvent::PoolEntered {
            entry,
            epoch,
            participant: request.participant,
            price,
        });

        let sequence = if self.gate.is_enabled() {
            if request.entropy_fee > 0 {
                batch.transfer(Asset::Quote, self.provider.account(), request.entropy_fee);
            }
            let tag = RequestTag { resource: entry, epoch };
            let sequence = self.provider.request(tag)?;
            batch.event(RigEvent::RandomnessRequested { resource: entry, epoch, sequence });
            Some(sequence)
        } else {
            let bps = self.gate.fallback();
            let pool = checked_add(self.pool_balance(), top_up)?;
            let amount = bps_of(pool, bps)?;
            batch.transfer(Asset::Unit, request.participant, amount);
            batch.event(RigEvent::PayoutSent {
                entry,
                participant: request.participant,
                bps,
                amount,
            });
            None
        };

        batch.commit(&mut self.bank, &mut self.events)?;

        self.clock.on_consume(price, now, &self.params);
        self.emission.record(top_up, now);
        self.next_entry += 1;
        if let Some(sequence) = sequence {
            self.entries.insert(entry, PendingEntry {
                participant: request.participant,
                epoch,
                entered_at: now,
            });
            self.gate.track(entry, epoch, sequence, now);
            debug!(entry, sequence, "pool rig: randomness requested");
        }
        info!(entry, epoch, participant = %request.participant, price, top_up, "pool rig: entered");
        Ok(price)
    }

    /// Apply a randomness delivery and pay the entry it belongs to. Never fails.
    ///
    /// Entries never change epoch after entering, so a delivery either finds
    /// its entry or is unknown; the gate's stale outcome cannot arise here.
    pub fn resolve(&mut self, sequence: u64, entropy: Entropy) -> ResolveOutcome {
        let entries = &self.entries;
        let resolution = self
            .gate
            .resolve(sequence, &entropy, |entry| entries.get(entry).map(|e| e.epoch));
        match resolution {
            Resolution::Accepted { request, value } => {
                let Some(pending) = self.entries.remove(&request.resource) else {
                    return self.ignore(sequence, IgnoreReason::Unknown);
                };
                self.pay_out(request.resource, pending.participant, value);
                self.events.emit(RigEvent::RandomnessAssigned {
                    resource: request.resource,
                    epoch: request.epoch,
                    sequence,
                    value,
                });
                ResolveOutcome::Assigned { resource: request.resource, value }
            }
            Resolution::Stale { .. } | Resolution::Unknown { .. } => {
                warn!(sequence, "pool rig: unknown randomness ignored");
                self.ignore(sequence, IgnoreReason::Unknown)
            }
        }
    }

    fn pay_out(&mut self, entry: u64, participant: Account, bps: u128) {
        let amount = bps_of(self.pool_balance(), bps).unwrap_or(0);
        let payout = Movement::Transfer { asset: Asset::Unit, to: participant, amount };
        match self.bank.settle(&[payout]) {
            Ok(()) => {
                self.events.emit(RigEvent::PayoutSent { entry, participant, bps, amount });
                info!(entry, %participant, bps, amount, "pool rig: payout sent");
            }
            Err(e) => {
                // Parked funds stay in custody and leave the pool.
                if let Err(accrue) = self.payouts.accrue(participant, amount) {
                    warn!(entry, %participant, error = %accrue, "pool rig: payout dropped");
                    return;
                }
                self.events.emit(RigEvent::PayoutDeferred { entry, participant, amount });
                warn!(entry, %participant, amount, error = %e, "pool rig: payout deferred to ledger");
            }
        }
    }

    fn ignore(&mut self, sequence: u64, reason: IgnoreReason) -> ResolveOutcome {
        self.events.emit(RigEvent::RandomnessIgnored { sequence, reason });
        ResolveOutcome::Ignored(reason)
    }

    /// Pay `account` any payout parked after a refused transfer.
    pub fn withdraw_payout(&mut self, account: Account) -> Result<Amount, RigError> {
        let amount = self.payouts.withdraw(account, &mut self.bank)?;
        self.events.emit(RigEvent::ClaimExecuted {
            account,
            asset: Asset::Unit,
            amount,
            day: None,
        });
        info!(%account, amount, "pool rig: parked payout withdrawn");
        Ok(amount)
    }

    pub fn set_randomness_enabled(&mut self, caller: Account, enabled: bool) -> Result<(), RigError> {
        self.roles.authorize(&caller)?;
        self.gate.set_enabled(enabled);
        self.record_admin(AdminChange::RandomnessEnabled(enabled));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    /// Units available to win, excluding parked payouts.
    pub fn pool_balance(&self) -> Amount {
        let custody = self.bank.custody();
        self.bank
            .balance(Asset::Unit, &custody)
            .saturating_sub(self.payouts.total_owed())
    }

    /// Emission accrued since the last entry, added to the pool by the next one.
    pub fn pending_emission(&self, now: Timestamp) -> Result<Amount, RigError> {
        self.curve
            .emitted_between(self.emission.start, self.emission.last_emission, now)
            .ok_or(RigError::Overflow)
    }

    pub fn price(&self, now: Timestamp) -> Amount {
        self.clock.price(now, &self.params)
    }

    pub fn epoch(&self) -> u64 {
        self.clock.epoch_id
    }

    pub fn clock(&self) -> &AuctionClock {
        &self.clock
    }

    /// Current per-second emission rate.
    pub fn rate(&self, now: Timestamp) -> Amount {
        self.emission.rate(now)
    }

    pub fn payout_table(&self) -> &[u128] {
        self.gate.table()
    }

    pub fn entries(&self) -> u64 {
        self.next_entry
    }

    pub fn pending_entry(&self, entry: u64) -> Option<&PendingEntry> {
        self.entries.get(&entry)
    }

    pub fn pending_requests(&self) -> usize {
        self.gate.pending_count()
    }

    pub fn claimable_payout(&self, account: &Account) -> Amount {
        self.payouts.claimable(account)
    }

    pub fn total_minted(&self) -> Amount {
        self.emission.total_minted
    }

    pub fn bank(&self) -> &B {
        &self.bank
    }

    pub fn bank_mut(&mut self) -> &mut B {
        &mut self.bank
    }

    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    pub fn events(&self) -> &[RigEvent] {
        self.events.peek()
    }

    pub fn drain_events(&mut self) -> Vec<RigEvent> {
        self.events.drain()
    }
}

impl<B, P> Administered for PoolRig<B, P> {
    fn roles(&self) -> &Roles {
        &self.roles
    }

    fn roles_mut(&mut self) -> &mut Roles {
        &mut self.roles
    }

    fn record_admin(&mut self, change: AdminChange) {
        log_admin("pool", &change);
        self.events.emit(RigEvent::AdminChanged { change });
    }
}

impl<B: TokenBank, P: RandomnessProvider> ResolveEntropy for PoolRig<B, P> {
    fn resolve_entropy(&mut self, sequence: u64, entropy: Entropy, _now: Timestamp) -> ResolveOutcome {
        self.resolve(sequence, entropy)
    }
}
