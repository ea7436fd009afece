//! # rig-engine
//! The three distribution rigs built on `rig-core`.
//!
//! - [`slot_rig`] — competitive occupancy of emission slots
//! - [`pool_rig`] — paid entries against a growing prize pool
//! - [`day_pool_rig`] — daily contributions claimed pro rata
//!
//! Supporting modules: [`config`] (TOML + environment loading), [`roles`]
//! (ownership and fee recipients), [`handle`] (shared access), [`entropy`]
//! and [`relay`] (randomness providers), [`clock`] (time sources).

pub mod clock;
pub mod config;
pub mod day_pool_rig;
pub mod entropy;
pub mod handle;
pub mod pool_rig;
pub mod relay;
pub mod resolve;
pub mod roles;
mod settlement;
pub mod slot_rig;

pub use config::RigConfig;
pub use day_pool_rig::DayPoolRig;
pub use handle::RigHandle;
pub use pool_rig::{EnterRequest, PoolRig};
pub use resolve::{ResolveEntropy, ResolveOutcome};
pub use roles::{Administered, Roles};
pub use slot_rig::{OccupyRequest, SlotRig};
