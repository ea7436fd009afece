//! Adversarial and end-to-end test suite for the Rig engine.
//!
//! The integration tests in `tests/` drive the rigs the way untrusted
//! participants would: racing on stale epochs, refusing transfers, replaying
//! randomness deliveries. Every economic invariant is checked against the
//! in-memory bank.

pub mod helpers;
