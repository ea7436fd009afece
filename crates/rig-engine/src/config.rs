//! Rig configuration.
//!
//! [`RigConfig`] describes the roles shared by every rig and one section per
//! rig variant. It is loaded from a TOML file layered with `RIG_*`
//! environment overrides (`RIG_SLOT__URI=...`) and validated before any rig
//! is built. Amount fields accept integers or decimal strings, since base-unit
//! amounts routinely exceed the TOML integer range.

use std::path::Path;

use serde::{Deserialize, Serialize};

use rig_core::auction::AuctionParams;
use rig_core::constants::{
    BPS_PRECISION, DEFAULT_MULTIPLIER_DURATION, DEFAULT_MULTIPLIER_TABLE, DEFAULT_PAYOUT_TABLE_BPS,
    DEFAULT_PROTOCOL_BPS, DEFAULT_TEAM_BPS, PRECISION, SECONDS_PER_DAY,
};
use rig_core::emission::{SupplyHalving, TimeHalving};
use rig_core::error::ConfigError;
use rig_core::fees::FeeSchedule;
use rig_core::types::Amount;

use crate::roles::Roles;

/// Serde adapter for `u128` amounts: integer or decimal string in, string out.
pub mod amount {
    use std::fmt;

    use serde::de::{self, DeserializeSeed, Deserializer, SeqAccess, Visitor};
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &u128, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u128, D::Error> {
        d.deserialize_any(AmountVisitor)
    }

    struct AmountVisitor;

    impl<'de> Visitor<'de> for AmountVisitor {
        type Value = u128;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a non-negative integer or decimal string")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<u128, E> {
            Ok(v as u128)
        }

        fn visit_u128<E: de::Error>(self, v: u128) -> Result<u128, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<u128, E> {
            u128::try_from(v).map_err(|_| E::custom(format!("negative amount: {v}")))
        }

        fn visit_i128<E: de::Error>(self, v: i128) -> Result<u128, E> {
            u128::try_from(v).map_err(|_| E::custom(format!("negative amount: {v}")))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<u128, E> {
            let digits: String = v.trim().chars().filter(|c| *c != '_').collect();
            digits
                .parse::<u128>()
                .map_err(|_| E::custom(format!("invalid amount: {v:?}")))
        }
    }

    struct AmountSeed;

    impl<'de> DeserializeSeed<'de> for AmountSeed {
        type Value = u128;

        fn deserialize<D: Deserializer<'de>>(self, d: D) -> Result<u128, D::Error> {
            d.deserialize_any(AmountVisitor)
        }
    }

    /// The same adapter for lists of amounts.
    pub mod list {
        use super::*;

        pub fn serialize<S: Serializer>(values: &[u128], s: S) -> Result<S::Ok, S::Error> {
            s.collect_seq(values.iter().map(|v| v.to_string()))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u128>, D::Error> {
            d.deserialize_seq(ListVisitor)
        }

        struct ListVisitor;

        impl<'de> Visitor<'de> for ListVisitor {
            type Value = Vec<u128>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a list of amounts")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Vec<u128>, A::Error> {
                let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(v) = seq.next_element_seed(AmountSeed)? {
                    out.push(v);
                }
                Ok(out)
            }
        }
    }
}

/// Dutch-auction settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuctionConfig {
    /// Seconds for a price to decay to zero.
    pub epoch_period: u64,
    /// Fixed-point multiplier (1e18 = 1×) applied to the last paid price.
    #[serde(with = "amount")]
    pub price_multiplier: u128,
    #[serde(with = "amount")]
    pub min_init_price: Amount,
    /// Init price of the first epoch.
    #[serde(with = "amount")]
    pub initial_price: Amount,
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            epoch_period: 60 * 60,
            price_multiplier: 2 * PRECISION,
            min_init_price: PRECISION / 10_000,
            initial_price: PRECISION / 10_000,
        }
    }
}

impl AuctionConfig {
    pub fn params(&self) -> AuctionParams {
        AuctionParams {
            epoch_period: self.epoch_period,
            price_multiplier: self.price_multiplier,
            min_init_price: self.min_init_price,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.params().validate()
    }
}

/// Basis-point fee shares. The treasury takes the remainder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeConfig {
    #[serde(with = "amount")]
    pub displaced_bps: u128,
    #[serde(with = "amount")]
    pub team_bps: u128,
    #[serde(with = "amount")]
    pub protocol_bps: u128,
}

impl Default for FeeConfig {
    fn default() -> Self {
        let schedule = FeeSchedule::default();
        Self {
            displaced_bps: schedule.displaced_bps,
            team_bps: schedule.team_bps,
            protocol_bps: schedule.protocol_bps,
        }
    }
}

impl FeeConfig {
    /// Shares for rigs without a displaced party.
    pub fn without_displaced() -> Self {
        Self {
            displaced_bps: 0,
            team_bps: DEFAULT_TEAM_BPS,
            protocol_bps: DEFAULT_PROTOCOL_BPS,
        }
    }

    pub fn schedule(&self) -> FeeSchedule {
        FeeSchedule {
            displaced_bps: self.displaced_bps,
            team_bps: self.team_bps,
            protocol_bps: self.protocol_bps,
        }
    }
}

/// Supply-triggered halving curve.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupplyCurveConfig {
    #[serde(with = "amount")]
    pub initial_rate: Amount,
    #[serde(with = "amount")]
    pub tail_rate: Amount,
    #[serde(with = "amount")]
    pub halving_amount: Amount,
}

impl Default for SupplyCurveConfig {
    fn default() -> Self {
        Self {
            initial_rate: 4 * PRECISION,
            tail_rate: PRECISION / 100,
            halving_amount: 10_000_000 * PRECISION,
        }
    }
}

impl SupplyCurveConfig {
    pub fn curve(&self) -> SupplyHalving {
        SupplyHalving {
            initial_rate: self.initial_rate,
            tail_rate: self.tail_rate,
            halving_amount: self.halving_amount,
        }
    }
}

/// Time-triggered halving curve.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeCurveConfig {
    #[serde(with = "amount")]
    pub initial_rate: Amount,
    #[serde(with = "amount")]
    pub tail_rate: Amount,
    pub halving_period: u64,
}

impl Default for TimeCurveConfig {
    fn default() -> Self {
        Self {
            initial_rate: PRECISION,
            tail_rate: PRECISION / 100,
            halving_period: 30 * SECONDS_PER_DAY,
        }
    }
}

impl TimeCurveConfig {
    pub fn curve(&self) -> TimeHalving {
        TimeHalving {
            initial_rate: self.initial_rate,
            tail_rate: self.tail_rate,
            halving_period: self.halving_period,
        }
    }
}

/// Randomness extension settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomnessConfig {
    pub enabled: bool,
    /// Multipliers (slot rig, fixed-point) or payout percentages in bps (pool rig).
    #[serde(with = "amount::list")]
    pub table: Vec<u128>,
    /// Seconds an assigned multiplier stays active.
    pub duration: u64,
}

impl Default for RandomnessConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            table: DEFAULT_MULTIPLIER_TABLE.to_vec(),
            duration: DEFAULT_MULTIPLIER_DURATION,
        }
    }
}

impl RandomnessConfig {
    fn validate_entries(&self, min: u128, max: u128) -> Result<(), ConfigError> {
        if self.table.is_empty() {
            return Err(ConfigError::EmptyTable);
        }
        for (index, &value) in self.table.iter().enumerate() {
            if value < min || value > max {
                return Err(ConfigError::TableEntryOutOfRange { index, value });
            }
        }
        Ok(())
    }
}

/// Slot rig: competitive occupancy with supply-halving emission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotRigConfig {
    pub auction: AuctionConfig,
    pub emission: SupplyCurveConfig,
    pub fees: FeeConfig,
    pub randomness: RandomnessConfig,
    /// Metadata URI.
    pub uri: String,
}

impl Default for SlotRigConfig {
    fn default() -> Self {
        Self {
            auction: AuctionConfig::default(),
            emission: SupplyCurveConfig::default(),
            fees: FeeConfig::default(),
            randomness: RandomnessConfig::default(),
            uri: String::new(),
        }
    }
}

impl SlotRigConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.auction.validate()?;
        self.emission.curve().validate()?;
        self.fees.schedule().validate()?;
        // Multipliers never drop below 1×.
        self.randomness.validate_entries(PRECISION, u128::MAX / PRECISION)
    }
}

/// Pool rig: lottery entries against a time-emitted prize pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolRigConfig {
    pub auction: AuctionConfig,
    pub emission: TimeCurveConfig,
    pub fees: FeeConfig,
    pub randomness: RandomnessConfig,
}

impl Default for PoolRigConfig {
    fn default() -> Self {
        Self {
            auction: AuctionConfig::default(),
            emission: TimeCurveConfig::default(),
            fees: FeeConfig::without_displaced(),
            randomness: RandomnessConfig {
                table: DEFAULT_PAYOUT_TABLE_BPS.to_vec(),
                ..RandomnessConfig::default()
            },
        }
    }
}

impl PoolRigConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.auction.validate()?;
        self.emission.curve().validate()?;
        self.fees.schedule().validate()?;
        self.randomness.validate_entries(0, BPS_PRECISION)
    }
}

/// Day pool: daily contributions claimed pro rata after the day ends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DayPoolConfig {
    /// Units allotted per day; halves every `halving_period` seconds.
    pub emission: TimeCurveConfig,
    pub fees: FeeConfig,
    #[serde(with = "amount")]
    pub min_contribution: Amount,
}

impl Default for DayPoolConfig {
    fn default() -> Self {
        Self {
            emission: TimeCurveConfig {
                initial_rate: 100_000 * PRECISION,
                tail_rate: 1_000 * PRECISION,
                halving_period: 30 * SECONDS_PER_DAY,
            },
            fees: FeeConfig::without_displaced(),
            min_contribution: 1,
        }
    }
}

impl DayPoolConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.emission.curve().validate()?;
        self.fees.schedule().validate()
    }
}

/// Log output settings consumed by the binaries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter string (e.g. "info", "rig_engine=debug").
    pub level: String,
    /// "text" or "json".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Complete configuration for one deployment of the three rigs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    pub roles: Roles,
    pub slot: SlotRigConfig,
    pub pool: PoolRigConfig,
    pub day_pool: DayPoolConfig,
    pub logging: LoggingConfig,
}

impl RigConfig {
    /// Load and validate a config file (format from its extension), with
    /// `RIG_`-prefixed environment variables layered on top.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix("RIG")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        let cfg: RigConfig = settings
            .try_deserialize()
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.roles.validate()?;
        self.slot.validate()?;
        self.pool.validate()?;
        self.day_pool.validate()
    }
}
