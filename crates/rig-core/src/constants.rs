//! Protocol constants. Amounts are in token base units, times in Unix seconds.

use crate::types::Amount;

/// Fixed-point denominator for multipliers. `PRECISION` means 1×.
pub const PRECISION: u128 = 1_000_000_000_000_000_000;

/// Basis-point denominator used by fee shares and payout percentages.
pub const BPS_PRECISION: u128 = 10_000;

/// Shortest allowed Dutch-auction epoch.
pub const MIN_EPOCH_PERIOD: u64 = 10 * 60;

/// Longest allowed Dutch-auction epoch.
pub const MAX_EPOCH_PERIOD: u64 = 365 * SECONDS_PER_DAY;

/// Smallest price multiplier applied on consumption (1.1×).
pub const MIN_PRICE_MULTIPLIER: u128 = 1_100_000_000_000_000_000;

/// Largest price multiplier applied on consumption (3×).
pub const MAX_PRICE_MULTIPLIER: u128 = 3 * PRECISION;

/// Lowest value a configured minimum init price may take.
pub const ABS_MIN_INIT_PRICE: Amount = 1;

/// Upper clamp for any auction init price.
///
/// `2^96 * MAX_EPOCH_PERIOD` fits in `u128`, so `init_price * elapsed` never
/// overflows. Products with the price multiplier can exceed `u128` and go
/// through the wide `mul_div` path instead.
pub const ABS_MAX_INIT_PRICE: Amount = 1 << 96;

/// Upper bound on halvings counted by either emission policy.
///
/// Past this many halvings any realistic rate is already at its floor.
pub const MAX_HALVINGS: u32 = 64;

/// Largest slot count a slot rig may grow to.
pub const MAX_CAPACITY: u32 = 256;

/// Length of one day-pool bucket.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Multiplier assigned to a slot when no randomness result is active (1×).
pub const DEFAULT_MULTIPLIER: u128 = PRECISION;

/// Default slot multiplier table: 1×, 2×, 3×, 5×, 10×.
pub const DEFAULT_MULTIPLIER_TABLE: [u128; 5] = [
    PRECISION,
    2 * PRECISION,
    3 * PRECISION,
    5 * PRECISION,
    10 * PRECISION,
];

/// Default pool payout table in basis points: 0.1%, 0.5%, 1%, 5%, 10%.
pub const DEFAULT_PAYOUT_TABLE_BPS: [u128; 5] = [10, 50, 100, 500, 1_000];

/// Default lifetime of an assigned slot multiplier.
pub const DEFAULT_MULTIPLIER_DURATION: u64 = 24 * 60 * 60;

/// Default share of an occupancy payment owed to the displaced occupant.
pub const DEFAULT_DISPLACED_BPS: u128 = 8_000;

/// Default team share.
pub const DEFAULT_TEAM_BPS: u128 = 400;

/// Default protocol share.
pub const DEFAULT_PROTOCOL_BPS: u128 = 100;

/// Undrained events a rig buffers before discarding the oldest.
pub const MAX_BUFFERED_EVENTS: usize = 65_536;
