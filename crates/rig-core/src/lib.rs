//! # rig-core
//! Shared engine for the Rig distribution mechanisms.
//!
//! - [`emission`] — supply- and time-triggered halving curves
//! - [`auction`] — Dutch-auction price clock with epoch-checked bids
//! - [`fees`] — exact basis-point payment splitting
//! - [`ledger`] — pull-payment claim ledger
//! - [`randomness`] — randomness request/resolve lifecycle
//!
//! All arithmetic is integer-only.

pub mod auction;
pub mod bank;
pub mod constants;
pub mod emission;
pub mod error;
pub mod events;
pub mod fees;
pub mod ledger;
pub mod math;
pub mod randomness;
pub mod traits;
pub mod types;

pub use error::RigError;
pub use types::{Account, Amount, Asset, Entropy, Movement, Timestamp};
