//! Channel-based randomness provider and delivery relay.
//!
//! [`ChannelEntropy`] pushes every request onto an outbound channel for an
//! external fulfiller. Results come back as [`Fulfillment`]s on an inbound
//! channel, and [`run_relay`] applies them to a shared rig one at a time.
//! Unknown, duplicate and stale deliveries are counted and dropped.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

use rig_core::error::RandomnessError;
use rig_core::traits::{RandomnessProvider, RequestTag};
use rig_core::types::{Account, Amount, Entropy};

use crate::clock::Clock;
use crate::handle::RigHandle;
use crate::resolve::{ResolveEntropy, ResolveOutcome};

/// A request handed to the external fulfiller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntropyRequest {
    pub sequence: u64,
    pub tag: RequestTag,
}

/// A result coming back from the fulfiller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fulfillment {
    pub sequence: u64,
    pub entropy: Entropy,
}

pub struct ChannelEntropy {
    account: Account,
    fee: Amount,
    next_sequence: u64,
    requests: mpsc::UnboundedSender<EntropyRequest>,
}

impl ChannelEntropy {
    /// Create a provider and the receiver its requests arrive on.
    pub fn new(account: Account, fee: Amount) -> (Self, mpsc::UnboundedReceiver<EntropyRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let provider = Self {
            account,
            fee,
            next_sequence: 1,
            requests: tx,
        };
        (provider, rx)
    }
}

impl RandomnessProvider for ChannelEntropy {
    fn account(&self) -> Account {
        self.account
    }

    fn fee(&self) -> Amount {
        self.fee
    }

    fn request(&mut self, tag: RequestTag) -> Result<u64, RandomnessError> {
        let sequence = self.next_sequence;
        self.requests
            .send(EntropyRequest { sequence, tag })
            .map_err(|_| RandomnessError::Unavailable("request channel closed".into()))?;
        self.next_sequence += 1;
        Ok(sequence)
    }
}

/// Counters reported when the relay stops.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RelayStats {
    pub assigned: u64,
    pub ignored: u64,
}

/// Apply deliveries from `fulfillments` until the channel closes.
pub async fn run_relay<R, C>(
    handle: RigHandle<R>,
    mut fulfillments: mpsc::Receiver<Fulfillment>,
    clock: C,
) -> RelayStats
where
    R: ResolveEntropy,
    C: Clock,
{
    let mut stats = RelayStats::default();
    while let Some(Fulfillment { sequence, entropy }) = fulfillments.recv().await {
        match handle.resolve(sequence, entropy, clock.now()) {
            ResolveOutcome::Assigned { resource, value } => {
                stats.assigned += 1;
                debug!(sequence, resource, value, "relay: delivery applied");
            }
            ResolveOutcome::Ignored(reason) => {
                stats.ignored += 1;
                debug!(sequence, ?reason, "relay: delivery ignored");
            }
        }
    }
    info!(assigned = stats.assigned, ignored = stats.ignored, "relay: inbound channel closed");
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_flow_to_receiver() {
        let (mut provider, mut rx) = ChannelEntropy::new(Account::from_label("vrf"), 9);
        let tag = RequestTag { resource: 4, epoch: 2 };
        assert_eq!(provider.request(tag).unwrap(), 1);
        assert_eq!(provider.request(tag).unwrap(), 2);
        assert_eq!(rx.try_recv().unwrap(), EntropyRequest { sequence: 1, tag });
        assert_eq!(rx.try_recv().unwrap().sequence, 2);
        assert_eq!(provider.fee(), 9);
    }

    #[test]
    fn closed_channel_is_unavailable() {
        let (mut provider, rx) = ChannelEntropy::new(Account::from_label("vrf"), 0);
        drop(rx);
        assert!(matches!(
            provider.request(RequestTag { resource: 0, epoch: 0 }),
            Err(RandomnessError::Unavailable(_))
        ));
        // A failed send does not consume a sequence number.
        assert_eq!(provider.next_sequence, 1);
    }
}
