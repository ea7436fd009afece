//! Result of feeding a randomness delivery into a rig.

use serde::Serialize;

use rig_core::events::IgnoreReason;
use rig_core::types::{Entropy, Timestamp};

/// What a delivery did. Resolution never fails; a delivery that cannot be
/// applied is reported as [`ResolveOutcome::Ignored`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResolveOutcome {
    /// The value was applied to `resource` (slot index or pool entry).
    Assigned { resource: u64, value: u128 },
    Ignored(IgnoreReason),
}

impl ResolveOutcome {
    pub fn is_assigned(&self) -> bool {
        matches!(self, Self::Assigned { .. })
    }
}

/// A rig that accepts randomness deliveries.
pub trait ResolveEntropy {
    fn resolve_entropy(&mut self, sequence: u64, entropy: Entropy, now: Timestamp) -> ResolveOutcome;
}
