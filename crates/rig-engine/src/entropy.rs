//! Deterministic local randomness provider.
//!
//! [`LocalEntropy`] hands out sequential sequence numbers and derives each
//! result as `BLAKE3(seed || sequence)`. Requests queue up until the caller
//! fulfils them, which lets tests and the CLI deliver results late, out of
//! order, twice, or not at all. The outstanding queue only shrinks when the
//! caller fulfils or discards requests.

use std::collections::VecDeque;

use tracing::debug;

use rig_core::error::RandomnessError;
use rig_core::traits::{RandomnessProvider, RequestTag};
use rig_core::types::{Account, Amount, Entropy};

#[derive(Clone, Debug)]
pub struct LocalEntropy {
    seed: [u8; 32],
    account: Account,
    fee: Amount,
    next_sequence: u64,
    outstanding: VecDeque<(u64, RequestTag)>,
}

impl LocalEntropy {
    /// A provider charging `fee` per request, forwarded to `account`.
    pub fn new(seed: &[u8], account: Account, fee: Amount) -> Self {
        Self {
            seed: *blake3::hash(seed).as_bytes(),
            account,
            fee,
            next_sequence: 1,
            outstanding: VecDeque::new(),
        }
    }

    /// The value this provider delivers for `sequence`.
    pub fn entropy_for(&self, sequence: u64) -> Entropy {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.seed);
        hasher.update(&sequence.to_be_bytes());
        Entropy(*hasher.finalize().as_bytes())
    }

    /// Requests issued and not yet fulfilled, oldest first.
    pub fn outstanding(&self) -> impl Iterator<Item = &(u64, RequestTag)> {
        self.outstanding.iter()
    }

    pub fn outstanding_count(&self) -> usize {
        self.outstanding.len()
    }

    /// Pop the oldest outstanding request and produce its delivery.
    pub fn fulfil_next(&mut self) -> Option<(u64, Entropy)> {
        let (sequence, _) = self.outstanding.pop_front()?;
        Some((sequence, self.entropy_for(sequence)))
    }

    /// Forget every outstanding request without delivering it. Returns how
    /// many were dropped.
    pub fn discard_all(&mut self) -> usize {
        let dropped = self.outstanding.len();
        self.outstanding.clear();
        if dropped > 0 {
            debug!(dropped, "entropy: outstanding requests discarded");
        }
        dropped
    }

    /// Produce deliveries for every outstanding request.
    pub fn fulfil_all(&mut self) -> Vec<(u64, Entropy)> {
        let pending: Vec<u64> = self.outstanding.drain(..).map(|(seq, _)| seq).collect();
        pending
            .into_iter()
            .map(|seq| (seq, self.entropy_for(seq)))
            .collect()
    }
}

impl RandomnessProvider for LocalEntropy {
    fn account(&self) -> Account {
        self.account
    }

    fn fee(&self) -> Amount {
        self.fee
    }

    fn request(&mut self, tag: RequestTag) -> Result<u64, RandomnessError> {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.outstanding.push_back((sequence, tag));
        debug!(sequence, resource = tag.resource, epoch = tag.epoch, "entropy: request queued");
        Ok(sequence)
    }
}
