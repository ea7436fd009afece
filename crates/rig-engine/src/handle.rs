//! Shared access to a rig.
//!
//! [`RigHandle`] wraps a rig in `Arc<RwLock<_>>`. Mutating operations hold
//! the write lock for their whole duration, so they never interleave; reads
//! share the lock and see the last completed operation. Concurrent callers
//! racing for the same slot or entry are still arbitrated by the bid's
//! expected epoch, not by lock order.

use std::sync::Arc;

use parking_lot::RwLock;

use rig_core::types::{Entropy, Timestamp};

use crate::resolve::{ResolveEntropy, ResolveOutcome};

pub struct RigHandle<R> {
    inner: Arc<RwLock<R>>,
}

impl<R> RigHandle<R> {
    pub fn new(rig: R) -> Self {
        Self {
            inner: Arc::new(RwLock::new(rig)),
        }
    }

    /// Run `f` against a consistent snapshot of the rig.
    pub fn read<T>(&self, f: impl FnOnce(&R) -> T) -> T {
        f(&self.inner.read())
    }

    /// Run one indivisible operation.
    pub fn write<T>(&self, f: impl FnOnce(&mut R) -> T) -> T {
        f(&mut self.inner.write())
    }
}

impl<R> Clone for RigHandle<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: ResolveEntropy> RigHandle<R> {
    /// Deliver a randomness result under the write lock.
    pub fn resolve(&self, sequence: u64, entropy: Entropy, now: Timestamp) -> ResolveOutcome {
        self.write(|rig| rig.resolve_entropy(sequence, entropy, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    use rig_core::auction::Bid;
    use rig_core::bank::MemoryBank;
    use rig_core::constants::PRECISION;
    use rig_core::error::{RigError, ValidationError};
    use rig_core::traits::NoRandomness;
    use rig_core::types::{Account, Amount, Asset};

    use crate::config::SlotRigConfig;
    use crate::roles::Roles;
    use crate::slot_rig::{OccupyRequest, SlotRig};

    fn shared_rig() -> RigHandle<SlotRig<MemoryBank, NoRandomness>> {
        let mut bank = MemoryBank::new(Account::from_label("custody"));
        for i in 0..8 {
            bank.fund(Asset::Quote, Account::from_label(&format!("p{i}")), PRECISION);
        }
        let roles = Roles {
            owner: Account::from_label("owner"),
            treasury: Account::from_label("treasury"),
            team: None,
            protocol: None,
        };
        let rig = SlotRig::new(&SlotRigConfig::default(), roles, bank, NoRandomness, 0).unwrap();
        RigHandle::new(rig)
    }

    #[test]
    fn clones_share_state() {
        let a = shared_rig();
        let b = a.clone();
        a.write(|rig| rig.increase_capacity(Account::from_label("owner"), 2, 0)).unwrap();
        assert_eq!(b.read(|rig| rig.capacity()), 2);
    }

    #[test]
    fn racing_occupants_exactly_one_wins() {
        let handle = shared_rig();
        let threads: Vec<_> = (0..8)
            .map(|i| {
                let h = handle.clone();
                thread::spawn(move || {
                    h.write(|rig| {
                        rig.occupy(
                            OccupyRequest {
                                occupant: Account::from_label(&format!("p{i}")),
                                slot: 0,
                                bid: Bid { expected_epoch: 0, deadline: 100, max_price: Amount::MAX },
                                note: String::new(),
                                entropy_fee: 0,
                            },
                            10,
                        )
                    })
                })
            })
            .collect();
        let results: Vec<_> = threads.into_iter().map(|t| t.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().filter(|r| r.is_err()).all(|r| matches!(
            r,
            Err(RigError::Validation(ValidationError::EpochMismatch { expected: 0, live: 1 }))
        )));
        assert_eq!(handle.read(|rig| rig.slot(0).unwrap().clock.epoch_id), 1);
    }
}
