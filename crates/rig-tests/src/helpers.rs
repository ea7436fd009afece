//! Shared builders for the integration tests.

use rig_core::auction::Bid;
use rig_core::bank::MemoryBank;
use rig_core::constants::PRECISION;
use rig_core::traits::RandomnessProvider;
use rig_core::types::{Account, Amount, Asset};
use rig_engine::config::{
    AuctionConfig, DayPoolConfig, FeeConfig, PoolRigConfig, SlotRigConfig, SupplyCurveConfig,
    TimeCurveConfig,
};
use rig_engine::{DayPoolRig, EnterRequest, OccupyRequest, PoolRig, Roles, SlotRig};

/// Quote balance every named participant starts with.
pub const STARTING_FUNDS: Amount = 1_000_000_000_000;

/// Quote balance per participant at 18-decimal scale, for rigs on their
/// default configuration.
pub const SCALED_FUNDS: Amount = 1_000_000 * PRECISION;

/// Participants funded by [`funded_bank`].
pub const PARTICIPANTS: [&str; 6] = ["alice", "bob", "carol", "dave", "erin", "mallory"];

pub fn acct(label: &str) -> Account {
    Account::from_label(label)
}

pub fn roles() -> Roles {
    Roles {
        owner: acct("owner"),
        treasury: acct("treasury"),
        team: Some(acct("team")),
        protocol: Some(acct("protocol")),
    }
}

/// A bank whose custody is `custody` and where every participant holds
/// [`STARTING_FUNDS`] of the quote asset.
pub fn funded_bank() -> MemoryBank {
    let mut bank = MemoryBank::new(acct("custody"));
    for who in PARTICIPANTS {
        bank.fund(Asset::Quote, acct(who), STARTING_FUNDS);
    }
    bank
}

/// Like [`funded_bank`] with [`SCALED_FUNDS`] each.
pub fn scaled_bank() -> MemoryBank {
    let mut bank = MemoryBank::new(acct("custody"));
    for who in PARTICIPANTS {
        bank.fund(Asset::Quote, acct(who), SCALED_FUNDS);
    }
    bank
}

pub fn auction(initial_price: Amount) -> AuctionConfig {
    AuctionConfig {
        epoch_period: 3_600,
        price_multiplier: 2 * PRECISION,
        min_init_price: 1,
        initial_price,
    }
}

pub fn slot_config() -> SlotRigConfig {
    SlotRigConfig {
        auction: auction(10_000),
        emission: SupplyCurveConfig {
            initial_rate: 100,
            tail_rate: 1,
            halving_amount: 1_000_000,
        },
        ..SlotRigConfig::default()
    }
}

pub fn pool_config() -> PoolRigConfig {
    PoolRigConfig {
        auction: auction(1_000),
        emission: TimeCurveConfig {
            initial_rate: 10,
            tail_rate: 1,
            halving_period: 86_400,
        },
        ..PoolRigConfig::default()
    }
}

pub fn day_pool_config() -> DayPoolConfig {
    DayPoolConfig {
        emission: TimeCurveConfig {
            initial_rate: 5_000,
            tail_rate: 100,
            halving_period: 30 * 86_400,
        },
        fees: FeeConfig::without_displaced(),
        min_contribution: 1,
    }
}

pub fn slot_rig<P: RandomnessProvider>(provider: P, enabled: bool) -> SlotRig<MemoryBank, P> {
    let mut cfg = slot_config();
    cfg.randomness.enabled = enabled;
    SlotRig::new(&cfg, roles(), funded_bank(), provider, 0).expect("valid slot rig")
}

pub fn pool_rig<P: RandomnessProvider>(provider: P, enabled: bool) -> PoolRig<MemoryBank, P> {
    let mut cfg = pool_config();
    cfg.randomness.enabled = enabled;
    PoolRig::new(&cfg, roles(), funded_bank(), provider, 0).expect("valid pool rig")
}

pub fn day_pool_rig() -> DayPoolRig<MemoryBank> {
    DayPoolRig::new(&day_pool_config(), roles(), funded_bank(), 0).expect("valid day pool")
}

/// A slot rig on the shipped default configuration.
pub fn default_slot_rig<P: RandomnessProvider>(provider: P, enabled: bool) -> SlotRig<MemoryBank, P> {
    let mut cfg = SlotRigConfig::default();
    cfg.randomness.enabled = enabled;
    SlotRig::new(&cfg, roles(), scaled_bank(), provider, 0).expect("valid slot rig")
}

/// A day pool on the shipped default configuration.
pub fn default_day_pool_rig() -> DayPoolRig<MemoryBank> {
    DayPoolRig::new(&DayPoolConfig::default(), roles(), scaled_bank(), 0).expect("valid day pool")
}

/// A bid that accepts any price until the end of time.
pub fn open_bid(epoch: u64) -> Bid {
    Bid {
        expected_epoch: epoch,
        deadline: u64::MAX,
        max_price: Amount::MAX,
    }
}

pub fn occupy_request(who: &str, slot: u32, epoch: u64, entropy_fee: Amount) -> OccupyRequest {
    OccupyRequest {
        occupant: acct(who),
        slot,
        bid: open_bid(epoch),
        note: String::new(),
        entropy_fee,
    }
}

pub fn enter_request(who: &str, epoch: u64, entropy_fee: Amount) -> EnterRequest {
    EnterRequest {
        participant: acct(who),
        bid: open_bid(epoch),
        entropy_fee,
    }
}
