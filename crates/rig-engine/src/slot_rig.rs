//! Slot rig: competitive occupancy of emission slots.
//!
//! Each slot runs its own Dutch auction. Taking a slot pays the live price,
//! credits most of it to the displaced occupant's claim ledger entry and
//! mints the displaced occupant the emission it earned while holding the
//! slot. The global rate follows a supply-triggered halving curve and is
//! shared evenly across the slots.
//!
//! # Operation order
//!
//! `occupy` validates the caller, the slot and the bid, then prices the
//! displaced occupant's emission, splits the payment and builds one
//! settlement batch. The rig's own state changes only after the bank has
//! accepted that batch, so a failing operation leaves no trace.

use serde::Serialize;
use tracing::{debug, info, warn};

use rig_core::auction::{AuctionClock, AuctionParams, Bid};
use rig_core::constants::{MAX_CAPACITY, PRECISION};
use rig_core::emission::{EmissionState, HalvingPolicy};
use rig_core::error::{RigError, StateError, ValidationError};
use rig_core::events::{AdminChange, EventLog, IgnoreReason, RigEvent};
use rig_core::fees::{FeeRole, FeeSchedule, split_payment};
use rig_core::ledger::ClaimLedger;
use rig_core::math::{checked_add, mul_div};
use rig_core::randomness::{MultiplierState, RandomnessGate, Resolution};
use rig_core::traits::{RandomnessProvider, RequestTag, TokenBank};
use rig_core::types::{Account, Amount, Asset, Entropy, Timestamp};

use crate::config::SlotRigConfig;
use crate::resolve::{ResolveEntropy, ResolveOutcome};
use crate::roles::{Administered, Roles, log_admin};
use crate::settlement::Settlement;

/// One emission slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub index: u32,
    pub clock: AuctionClock,
    /// Per-second emission assigned when the current occupant took the slot.
    pub rate: Amount,
    pub multiplier: MultiplierState,
    pub occupant: Option<Account>,
    pub note: String,
}

impl Slot {
    fn vacant(index: u32, init_price: Amount, now: Timestamp) -> Self {
        Self {
            index,
            clock: AuctionClock::new(init_price, now),
            rate: 0,
            multiplier: MultiplierState::default(),
            occupant: None,
            note: String::new(),
        }
    }

    /// Emission the occupant has earned since taking the slot.
    fn earned(&self, now: Timestamp) -> Result<Amount, RigError> {
        if self.occupant.is_none() {
            return Ok(0);
        }
        let elapsed = Amount::from(now.saturating_sub(self.clock.start_time));
        let base = elapsed.checked_mul(self.rate).ok_or(RigError::Overflow)?;
        mul_div(base, self.multiplier.value, PRECISION).ok_or(RigError::Overflow)
    }
}

/// Arguments to [`SlotRig::occupy`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OccupyRequest {
    pub occupant: Account,
    pub slot: u32,
    pub bid: Bid,
    pub note: String,
    /// Randomness fee supplied with the call; must match the provider's fee
    /// while randomness is enabled and be zero otherwise.
    pub entropy_fee: Amount,
}

pub struct SlotRig<B, P> {
    params: AuctionParams,
    fees: FeeSchedule,
    roles: Roles,
    emission: EmissionState,
    slots: Vec<Slot>,
    gate: RandomnessGate<u32>,
    ledger: ClaimLedger,
    uri: String,
    bank: B,
    provider: P,
    events: EventLog,
}

impl<B: TokenBank, P: RandomnessProvider> SlotRig<B, P> {
    /// Build a rig with a single vacant slot priced at the configured initial price.
    pub fn new(
        config: &SlotRigConfig,
        roles: Roles,
        bank: B,
        provider: P,
        now: Timestamp,
    ) -> Result<Self, RigError> {
        config.validate()?;
        roles.validate()?;
        let gate = RandomnessGate::new(
            config.randomness.table.clone(),
            config.randomness.duration,
            config.randomness.enabled,
        )?;
        let mut rig = Self {
            params: config.auction.params(),
            fees: config.fees.schedule(),
            roles,
            emission: EmissionState::new(HalvingPolicy::Supply(config.emission.curve()), now),
            slots: vec![Slot::vacant(0, config.auction.initial_price, now)],
            gate,
            ledger: ClaimLedger::new(Asset::Quote),
            uri: config.uri.clone(),
            bank,
            provider,
            events: EventLog::new(),
        };
        rig.slots[0].rate = rig.global_rate();
        info!(capacity = 1, randomness = rig.gate.is_enabled(), "slot rig: initialised");
        Ok(rig)
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Take over a slot at its live price and return the price paid.
    ///
    /// # Errors
    ///
    /// - [`ValidationError`] for a zero occupant, an unknown slot, a stale
    ///   bid or a wrong randomness fee; nothing changes
    /// - [`RigError::Transfer`] if the payment cannot be collected or a fee
    ///   recipient refuses; nothing changes
    pub fn occupy(&mut self, request: OccupyRequest, now: Timestamp) -> Result<Amount, RigError> {
        request.occupant.validate()?;
        let capacity = self.capacity();
        let slot = self
            .slots
            .get(request.slot as usize)
            .ok_or(ValidationError::SlotOutOfRange { index: request.slot, capacity })?;
        let price = slot.clock.check_bid(&request.bid, now, &self.params)?;
        let entropy_fee = self.provider.fee();
        self.gate.check_fee(request.entropy_fee, entropy_fee)?;

        let displaced = slot.occupant;
        let owed = slot.earned(now)?;
        let split = split_payment(price, &self.fees, &self.roles.recipients(displaced))?;
        let displaced_share = split.amount_for(FeeRole::Displaced);
        if let Some(previous) = displaced {
            self.ledger.check_accrue(&previous, displaced_share)?;
        }

        let mut batch = Settlement::new();
        batch.collect(request.occupant, checked_add(price, request.entropy_fee)?);
        batch.pay_fees(&split);
        if let Some(previous) = displaced {
            batch.mint(previous, owed);
        }

        let next_epoch = slot.clock.epoch_id + 1;
        let sequence = if self.gate.is_enabled() {
            if request.entropy_fee > 0 {
                batch.transfer(Asset::Quote, self.provider.account(), request.entropy_fee);
            }
            let tag = RequestTag { resource: u64::from(request.slot), epoch: next_epoch };
            let sequence = self.provider.request(tag)?;
            batch.event(RigEvent::RandomnessRequested {
                resource: tag.resource,
                epoch: tag.epoch,
                sequence,
            });
            Some(sequence)
        } else {
            None
        };
        batch.event(RigEvent::OccupancyChanged {
            slot: request.slot,
            epoch: next_epoch,
            previous: displaced,
            occupant: request.occupant,
            price,
            note: request.note.clone(),
        });

        batch.commit(&mut self.bank, &mut self.events)?;

        if let Some(previous) = displaced.filter(|_| displaced_share > 0) {
            self.ledger.accrue(previous, displaced_share)?;
            self.events.emit(RigEvent::FeeAccrued { recipient: previous, amount: displaced_share });
        }
        self.emission.record(owed, now);
        let slot_rate = self.global_rate() / Amount::from(capacity);

        let slot = &mut self.slots[request.slot as usize];
        slot.clock.on_consume(price, now, &self.params);
        self.gate.expire(&mut slot.multiplier, now);
        slot.multiplier.pending = sequence;
        if let Some(sequence) = sequence {
            self.gate.track(request.slot, slot.clock.epoch_id, sequence, now);
            debug!(slot = request.slot, epoch = slot.clock.epoch_id, sequence, "slot rig: randomness requested");
        }
        slot.rate = slot_rate;
        slot.occupant = Some(request.occupant);
        slot.note = request.note;

        info!(
            slot = request.slot,
            epoch = slot.clock.epoch_id,
            occupant = %request.occupant,
            price,
            minted = owed,
            "slot rig: occupancy changed"
        );

        let slots = &self.slots;
        let pruned = self
            .gate
            .prune(|index| slots.get(*index as usize).map(|s| s.clock.epoch_id));
        if pruned > 0 {
            debug!(pruned, "slot rig: superseded randomness requests dropped");
        }
        Ok(price)
    }

    /// Apply a randomness delivery. Never fails.
    ///
    /// The assignment lands only if the slot is still in the epoch the
    /// request was issued for; anything else is logged and ignored.
    pub fn resolve(&mut self, sequence: u64, entropy: Entropy, now: Timestamp) -> ResolveOutcome {
        let slots = &self.slots;
        let resolution = self.gate.resolve(sequence, &entropy, |index| {
            slots.get(*index as usize).map(|s| s.clock.epoch_id)
        });
        match resolution {
            Resolution::Accepted { request, value } => {
                let slot = &mut self.slots[request.resource as usize];
                slot.multiplier = MultiplierState {
                    value,
                    assigned_at: Some(now),
                    pending: None,
                };
                self.events.emit(RigEvent::RandomnessAssigned {
                    resource: u64::from(request.resource),
                    epoch: request.epoch,
                    sequence,
                    value,
                });
                info!(slot = request.resource, sequence, multiplier = value, "slot rig: multiplier assigned");
                ResolveOutcome::Assigned { resource: u64::from(request.resource), value }
            }
            Resolution::Stale { request, live_epoch } => {
                let reason = IgnoreReason::Stale { recorded_epoch: request.epoch, live_epoch };
                warn!(slot = request.resource, sequence, recorded = request.epoch, ?live_epoch, "slot rig: stale randomness ignored");
                self.ignore(sequence, reason)
            }
            Resolution::Unknown { sequence } => {
                warn!(sequence, "slot rig: unknown randomness ignored");
                self.ignore(sequence, IgnoreReason::Unknown)
            }
        }
    }

    fn ignore(&mut self, sequence: u64, reason: IgnoreReason) -> ResolveOutcome {
        self.events.emit(RigEvent::RandomnessIgnored { sequence, reason });
        ResolveOutcome::Ignored(reason)
    }

    /// Pay `account` its accrued displacement fees. Anyone may call this;
    /// funds go to `account` only.
    pub fn withdraw(&mut self, account: Account) -> Result<Amount, RigError> {
        let amount = self.ledger.withdraw(account, &mut self.bank)?;
        self.events.emit(RigEvent::ClaimExecuted {
            account,
            asset: Asset::Quote,
            amount,
            day: None,
        });
        info!(%account, amount, "slot rig: claim withdrawn");
        Ok(amount)
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    /// Grow the rig to `capacity` slots. New slots start vacant at epoch 0,
    /// priced at the minimum init price.
    pub fn increase_capacity(
        &mut self,
        caller: Account,
        capacity: u32,
        now: Timestamp,
    ) -> Result<(), RigError> {
        self.roles.authorize(&caller)?;
        let current = self.capacity();
        if capacity <= current {
            return Err(StateError::CapacityNotIncreased { current, requested: capacity }.into());
        }
        if capacity > MAX_CAPACITY {
            return Err(ValidationError::CapacityTooLarge { requested: capacity, max: MAX_CAPACITY }.into());
        }
        let init = self.params.min_init_price;
        self.slots.extend((current..capacity).map(|index| Slot::vacant(index, init, now)));
        self.record_admin(AdminChange::Capacity { from: current, to: capacity });
        Ok(())
    }

    pub fn set_randomness_enabled(&mut self, caller: Account, enabled: bool) -> Result<(), RigError> {
        self.roles.authorize(&caller)?;
        self.gate.set_enabled(enabled);
        self.record_admin(AdminChange::RandomnessEnabled(enabled));
        Ok(())
    }

    /// Change how long assigned multipliers last. Applies to existing
    /// assignments at their next occupancy change.
    pub fn set_multiplier_duration(&mut self, caller: Account, duration: u64) -> Result<(), RigError> {
        self.roles.authorize(&caller)?;
        self.gate.set_duration(duration);
        self.record_admin(AdminChange::MultiplierDuration(duration));
        Ok(())
    }

    pub fn set_uri(&mut self, caller: Account, uri: impl Into<String>) -> Result<(), RigError> {
        self.roles.authorize(&caller)?;
        self.uri = uri.into();
        self.record_admin(AdminChange::Uri(self.uri.clone()));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    pub fn slot(&self, index: u32) -> Option<&Slot> {
        self.slots.get(index as usize)
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn capacity(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Live auction price of a slot.
    pub fn price(&self, index: u32, now: Timestamp) -> Option<Amount> {
        self.slot(index).map(|s| s.clock.price(now, &self.params))
    }

    /// Current emission rate shared by all slots, per second.
    pub fn global_rate(&self) -> Amount {
        self.emission.rate(self.emission.last_emission)
    }

    /// What the slot's occupant would be minted if displaced at `now`.
    pub fn pending_emission(&self, index: u32, now: Timestamp) -> Result<Amount, RigError> {
        let capacity = self.capacity();
        self.slot(index)
            .ok_or(ValidationError::SlotOutOfRange { index, capacity })?
            .earned(now)
    }

    pub fn claimable(&self, account: &Account) -> Amount {
        self.ledger.claimable(account)
    }

    pub fn total_claimable(&self) -> Amount {
        self.ledger.total_owed()
    }

    pub fn multiplier_table(&self) -> &[u128] {
        self.gate.table()
    }

    pub fn randomness_enabled(&self) -> bool {
        self.gate.is_enabled()
    }

    pub fn pending_requests(&self) -> usize {
        self.gate.pending_count()
    }

    pub fn total_minted(&self) -> Amount {
        self.emission.total_minted
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn params(&self) -> &AuctionParams {
        &self.params
    }

    pub fn bank(&self) -> &B {
        &self.bank
    }

    pub fn bank_mut(&mut self) -> &mut B {
        &mut self.bank
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    pub fn events(&self) -> &[RigEvent] {
        self.events.peek()
    }

    /// Notifications emitted since the last drain, oldest first.
    pub fn drain_events(&mut self) -> Vec<RigEvent> {
        self.events.drain()
    }
}

impl<B, P> Administered for SlotRig<B, P> {
    fn roles(&self) -> &Roles {
        &self.roles
    }

    fn roles_mut(&mut self) -> &mut Roles {
        &mut self.roles
    }

    fn record_admin(&mut self, change: AdminChange) {
        log_admin("slot", &change);
        self.events.emit(RigEvent::AdminChanged { change });
    }
}

impl<B: TokenBank, P: RandomnessProvider> ResolveEntropy for SlotRig<B, P> {
    fn resolve_entropy(&mut self, sequence: u64, entropy: Entropy, now: Timestamp) -> ResolveOutcome {
        self.resolve(sequence, entropy, now)
    }
}
