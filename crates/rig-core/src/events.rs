//! Notifications emitted for indexers and user interfaces.
//!
//! Rigs append a [`RigEvent`] for every observable change to their
//! [`EventLog`]. Nothing in the engine reads the log back; the embedder is
//! expected to drain it. An undrained log keeps only the newest
//! [`MAX_BUFFERED_EVENTS`] entries.

use serde::Serialize;
use tracing::warn;

use crate::constants::MAX_BUFFERED_EVENTS;
use crate::fees::FeeRole;
use crate::types::{Account, Amount, Asset};

/// Why a randomness delivery was dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum IgnoreReason {
    /// No pending request carries this sequence number.
    Unknown,
    /// The resource moved on since the request was issued.
    Stale { recorded_epoch: u64, live_epoch: Option<u64> },
}

/// A configuration change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "setting", content = "value", rename_all = "snake_case")]
pub enum AdminChange {
    Capacity { from: u32, to: u32 },
    Owner(Account),
    Treasury(Account),
    Team(Option<Account>),
    Protocol(Option<Account>),
    RandomnessEnabled(bool),
    MultiplierDuration(u64),
    MinContribution(Amount),
    Uri(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RigEvent {
    OccupancyChanged {
        slot: u32,
        epoch: u64,
        previous: Option<Account>,
        occupant: Account,
        price: Amount,
        note: String,
    },
    PoolEntered {
        entry: u64,
        epoch: u64,
        participant: Account,
        price: Amount,
    },
    Contributed {
        day: u64,
        participant: Account,
        amount: Amount,
    },
    EmissionMinted {
        to: Account,
        amount: Amount,
    },
    FeeTransferred {
        role: FeeRole,
        recipient: Account,
        amount: Amount,
    },
    FeeAccrued {
        recipient: Account,
        amount: Amount,
    },
    ClaimExecuted {
        account: Account,
        asset: Asset,
        amount: Amount,
        day: Option<u64>,
    },
    PayoutSent {
        entry: u64,
        participant: Account,
        bps: u128,
        amount: Amount,
    },
    PayoutDeferred {
        entry: u64,
        participant: Account,
        amount: Amount,
    },
    RandomnessRequested {
        resource: u64,
        epoch: u64,
        sequence: u64,
    },
    RandomnessAssigned {
        resource: u64,
        epoch: u64,
        sequence: u64,
        value: u128,
    },
    RandomnessIgnored {
        sequence: u64,
        #[serde(flatten)]
        reason: IgnoreReason,
    },
    AdminChanged {
        change: AdminChange,
    },
}

/// Bounded buffer of events, drained by the embedding application.
#[derive(Clone, Debug)]
pub struct EventLog {
    events: Vec<RigEvent>,
    limit: usize,
    dropped: u64,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::with_limit(MAX_BUFFERED_EVENTS)
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A log holding at most `limit` undrained events (at least one).
    pub fn with_limit(limit: usize) -> Self {
        Self {
            events: Vec::new(),
            limit: limit.max(1),
            dropped: 0,
        }
    }

    pub fn emit(&mut self, event: RigEvent) {
        self.events.push(event);
        self.enforce_limit();
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = RigEvent>) {
        self.events.extend(events);
        self.enforce_limit();
    }

    // Drops the oldest half at once so a full log is not shifted per event.
    fn enforce_limit(&mut self) {
        if self.events.len() <= self.limit {
            return;
        }
        let excess = self.events.len() - self.limit;
        let discard = excess.max(self.limit / 2).min(self.events.len());
        self.events.drain(..discard);
        self.dropped += discard as u64;
        warn!(discarded = discard, total_dropped = self.dropped, "event log full, oldest events discarded");
    }

    /// Events emitted since the last drain, oldest first.
    pub fn drain(&mut self) -> Vec<RigEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn peek(&self) -> &[RigEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events discarded because the log was not drained in time.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
