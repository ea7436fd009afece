//! Randomness-driven multiplier lifecycle.
//!
//! A resource's multiplier moves through
//! `Default → Requested → Assigned → Expired → Default`. Requests are issued
//! synchronously inside an occupancy-changing operation and resolved later
//! by sequence number. A resolution is applied only if the resource is still
//! in the epoch recorded at request time; anything else is discarded without
//! touching state. Resolution never fails.

use std::collections::HashMap;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_MULTIPLIER;
use crate::error::{ConfigError, ValidationError};
use crate::types::{Amount, Entropy, Timestamp};

/// Where a resource is in the multiplier lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatePhase {
    Default,
    Requested,
    Assigned,
    Expired,
}

/// Multiplier carried by one resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiplierState {
    /// Active multiplier, fixed-point (`PRECISION` = 1×).
    pub value: u128,
    /// When `value` was assigned by a resolution. `None` while at default.
    pub assigned_at: Option<Timestamp>,
    /// Sequence number of the outstanding request, if any.
    pub pending: Option<u64>,
}

impl Default for MultiplierState {
    fn default() -> Self {
        Self {
            value: DEFAULT_MULTIPLIER,
            assigned_at: None,
            pending: None,
        }
    }
}

impl MultiplierState {
    pub fn phase(&self, now: Timestamp, duration: u64) -> GatePhase {
        if self.pending.is_some() {
            return GatePhase::Requested;
        }
        match self.assigned_at {
            Some(at) if now.saturating_sub(at) > duration => GatePhase::Expired,
            Some(_) => GatePhase::Assigned,
            None => GatePhase::Default,
        }
    }
}

/// A request waiting for its result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PendingRequest<K> {
    pub resource: K,
    /// Resource epoch when the request was issued.
    pub epoch: u64,
    pub sequence: u64,
    pub requested_at: Timestamp,
}

/// Outcome of feeding a result into the gate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution<K> {
    /// The request is current; apply `value`.
    Accepted { request: PendingRequest<K>, value: u128 },
    /// The resource moved to another epoch; the result was discarded.
    Stale { request: PendingRequest<K>, live_epoch: Option<u64> },
    /// No request with this sequence is pending.
    Unknown { sequence: u64 },
}

/// Per-rig randomness bookkeeping over resources keyed by `K`.
#[derive(Clone, Debug)]
pub struct RandomnessGate<K> {
    enabled: bool,
    table: Vec<u128>,
    duration: u64,
    pending: HashMap<u64, PendingRequest<K>>,
}

impl<K: Copy + Eq + Hash> RandomnessGate<K> {
    /// Build a gate over a non-empty `table`, expiring assignments after `duration` seconds.
    pub fn new(table: Vec<u128>, duration: u64, enabled: bool) -> Result<Self, ConfigError> {
        if table.is_empty() {
            return Err(ConfigError::EmptyTable);
        }
        Ok(Self {
            enabled,
            table,
            duration,
            pending: HashMap::new(),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn table(&self) -> &[u128] {
        &self.table
    }

    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn set_duration(&mut self, duration: u64) {
        self.duration = duration;
    }

    /// Value used when no randomness result is available.
    pub fn fallback(&self) -> u128 {
        self.table[0]
    }

    /// Table entry selected by `entropy`.
    pub fn select(&self, entropy: &Entropy) -> u128 {
        self.table[entropy.index(self.table.len())]
    }

    /// Validate the randomness fee the caller supplied.
    ///
    /// With the feature enabled the fee must equal `required` exactly; with
    /// it disabled any non-zero fee is rejected.
    pub fn check_fee(&self, supplied: Amount, required: Amount) -> Result<(), ValidationError> {
        if !self.enabled {
            if supplied != 0 {
                return Err(ValidationError::UnexpectedEntropyFee);
            }
            return Ok(());
        }
        if supplied != required {
            return Err(ValidationError::IncorrectEntropyFee {
                got: supplied,
                required,
            });
        }
        Ok(())
    }

    /// Reset an assignment older than the configured duration to default.
    ///
    /// Returns `true` if the state was reset.
    pub fn expire(&self, state: &mut MultiplierState, now: Timestamp) -> bool {
        match state.assigned_at {
            Some(at) if now.saturating_sub(at) > self.duration => {
                state.value = DEFAULT_MULTIPLIER;
                state.assigned_at = None;
                true
            }
            _ => false,
        }
    }

    /// Record an issued request as pending.
    pub fn track(&mut self, resource: K, epoch: u64, sequence: u64, now: Timestamp) {
        self.pending.insert(
            sequence,
            PendingRequest {
                resource,
                epoch,
                sequence,
                requested_at: now,
            },
        );
    }

    pub fn pending(&self, sequence: u64) -> Option<&PendingRequest<K>> {
        self.pending.get(&sequence)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drop requests more than one epoch behind their resource, or whose
    /// resource no longer exists. Returns how many were dropped.
    ///
    /// The request superseded by the latest consumption is kept, so its
    /// late delivery still reports as [`Resolution::Stale`]; older ones
    /// resolve as [`Resolution::Unknown`].
    pub fn prune<F>(&mut self, live_epoch: F) -> usize
    where
        F: Fn(&K) -> Option<u64>,
    {
        let before = self.pending.len();
        self.pending.retain(|_, request| {
            live_epoch(&request.resource).is_some_and(|live| request.epoch.saturating_add(1) >= live)
        });
        before - self.pending.len()
    }

    /// Consume the pending request for `sequence` and judge it against the
    /// resource's live epoch.
    ///
    /// `live_epoch` returns `None` if the resource no longer exists. The
    /// request is removed in every case, so a second delivery of the same
    /// sequence is reported as [`Resolution::Unknown`].
    pub fn resolve<F>(&mut self, sequence: u64, entropy: &Entropy, live_epoch: F) -> Resolution<K>
    where
        F: FnOnce(&K) -> Option<u64>,
    {
        let Some(request) = self.pending.remove(&sequence) else {
            return Resolution::Unknown { sequence };
        };
        let live = live_epoch(&request.resource);
        if live != Some(request.epoch) {
            return Resolution::Stale {
                request,
                live_epoch: live,
            };
        }
        Resolution::Accepted {
            request,
            value: self.select(entropy),
        }
    }
}
