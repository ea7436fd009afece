//! Emission curves and halving logic.
//!
//! Two policies map cumulative consumption to an issuance rate:
//!
//! - [`SupplyHalving`]: the rate halves each time cumulative minted supply
//!   crosses a threshold. Thresholds form the geometric series
//!   `H, H + H/2, H + H/2 + H/4, …` which converges to `2H`.
//! - [`TimeHalving`]: the rate halves every `halving_period` seconds after
//!   `start`.
//!
//! Both policies are pure and floor the rate at `tail_rate`. The cumulative
//! counter lives in [`EmissionState`], owned by the rig that emits.

use serde::{Deserialize, Serialize};

use crate::constants::MAX_HALVINGS;
use crate::error::ConfigError;
use crate::types::{Amount, Timestamp};

/// `initial >> halvings`, floored at `tail`.
///
/// Returns `tail` once the shift would clear every bit.
pub fn halved_rate(initial: Amount, tail: Amount, halvings: u32) -> Amount {
    let shifted = if halvings >= 128 { 0 } else { initial >> halvings };
    shifted.max(tail)
}

/// Supply-triggered halving parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyHalving {
    /// Rate before the first halving.
    pub initial_rate: Amount,
    /// Floor the rate never drops below.
    pub tail_rate: Amount,
    /// First threshold `H`; each later increment is half the previous one.
    pub halving_amount: Amount,
}

impl SupplyHalving {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.halving_amount == 0 {
            return Err(ConfigError::ZeroHalving);
        }
        if self.tail_rate > self.initial_rate {
            return Err(ConfigError::TailAboveInitial {
                tail: self.tail_rate,
                initial: self.initial_rate,
            });
        }
        Ok(())
    }

    /// Number of thresholds `minted` has crossed, capped at [`MAX_HALVINGS`].
    pub fn halvings(&self, minted: Amount) -> u32 {
        let mut threshold = self.halving_amount;
        let mut increment = self.halving_amount;
        let mut n = 0;
        while n < MAX_HALVINGS && minted >= threshold {
            n += 1;
            increment /= 2;
            threshold = threshold.saturating_add(increment);
        }
        n
    }

    /// Issuance rate after `minted` units have been issued.
    pub fn rate(&self, minted: Amount) -> Amount {
        halved_rate(self.initial_rate, self.tail_rate, self.halvings(minted))
    }

    /// The cumulative supply at which the `n`-th halving happens (`n >= 1`).
    ///
    /// Returns `None` for `n == 0` or once the increments have run out.
    pub fn threshold(&self, n: u32) -> Option<Amount> {
        if n == 0 || n > MAX_HALVINGS {
            return None;
        }
        let mut threshold = self.halving_amount;
        let mut increment = self.halving_amount;
        for _ in 1..n {
            increment /= 2;
            if increment == 0 {
                return None;
            }
            threshold = threshold.saturating_add(increment);
        }
        Some(threshold)
    }

    /// The next threshold above `minted`, or `None` if the rate is already at
    /// its floor or no further threshold exists.
    pub fn next_threshold(&self, minted: Amount) -> Option<Amount> {
        let n = self.halvings(minted);
        if self.rate(minted) == self.tail_rate {
            return None;
        }
        self.threshold(n + 1)
    }
}

/// Time-triggered halving parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeHalving {
    /// Rate before the first halving.
    pub initial_rate: Amount,
    /// Floor the rate never drops below.
    pub tail_rate: Amount,
    /// Seconds between halvings.
    pub halving_period: u64,
}

impl TimeHalving {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.halving_period == 0 {
            return Err(ConfigError::ZeroHalving);
        }
        if self.tail_rate > self.initial_rate {
            return Err(ConfigError::TailAboveInitial {
                tail: self.tail_rate,
                initial: self.initial_rate,
            });
        }
        Ok(())
    }

    /// Halvings elapsed at `now` for a curve started at `start`.
    ///
    /// Times before `start` count as zero elapsed.
    pub fn halvings(&self, start: Timestamp, now: Timestamp) -> u32 {
        let periods = now.saturating_sub(start) / self.halving_period;
        periods.min(MAX_HALVINGS as u64) as u32
    }

    /// Issuance rate at `now`.
    pub fn rate(&self, start: Timestamp, now: Timestamp) -> Amount {
        halved_rate(self.initial_rate, self.tail_rate, self.halvings(start, now))
    }

    /// When the next halving after `now` happens, or `None` once at the floor.
    pub fn next_halving_time(&self, start: Timestamp, now: Timestamp) -> Option<Timestamp> {
        if self.rate(start, now) == self.tail_rate {
            return None;
        }
        let next = u64::from(self.halvings(start, now)) + 1;
        next.checked_mul(self.halving_period)
            .and_then(|offset| start.checked_add(offset))
    }

    /// Units issued between `from` and `to` at a per-second rate, summed
    /// piecewise across halving boundaries.
    ///
    /// Returns 0 when `to <= from` and `None` on overflow.
    pub fn emitted_between(&self, start: Timestamp, from: Timestamp, to: Timestamp) -> Option<Amount> {
        let mut total: Amount = 0;
        let mut t = from;
        while t < to {
            let end = match self.next_halving_time(start, t) {
                Some(boundary) if boundary > t => boundary.min(to),
                _ => to,
            };
            let span = Amount::from(end - t);
            total = total.checked_add(self.rate(start, t).checked_mul(span)?)?;
            t = end;
        }
        Some(total)
    }
}

/// Either halving policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum HalvingPolicy {
    Supply(SupplyHalving),
    Time(TimeHalving),
}

impl HalvingPolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Supply(s) => s.validate(),
            Self::Time(t) => t.validate(),
        }
    }

    pub fn tail_rate(&self) -> Amount {
        match self {
            Self::Supply(s) => s.tail_rate,
            Self::Time(t) => t.tail_rate,
        }
    }
}

/// Cumulative emission bookkeeping owned by one rig.
///
/// The rig reads [`rate`](Self::rate) while pricing an operation and calls
/// [`record`](Self::record) once the distribution event has settled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EmissionState {
    pub policy: HalvingPolicy,
    /// Curve origin for time-triggered halving.
    pub start: Timestamp,
    /// Total units issued so far.
    pub total_minted: Amount,
    /// Last time an emission event was recorded.
    pub last_emission: Timestamp,
}

impl EmissionState {
    pub fn new(policy: HalvingPolicy, start: Timestamp) -> Self {
        Self {
            policy,
            start,
            total_minted: 0,
            last_emission: start,
        }
    }

    /// Current issuance rate.
    pub fn rate(&self, now: Timestamp) -> Amount {
        match &self.policy {
            HalvingPolicy::Supply(s) => s.rate(self.total_minted),
            HalvingPolicy::Time(t) => t.rate(self.start, now),
        }
    }

    pub fn floor_rate(&self) -> Amount {
        self.policy.tail_rate()
    }

    /// Add `amount` to the cumulative counter and stamp the event time.
    pub fn record(&mut self, amount: Amount, now: Timestamp) {
        self.total_minted = self.total_minted.saturating_add(amount);
        self.last_emission = self.last_emission.max(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn supply() -> SupplyHalving {
        SupplyHalving {
            initial_rate: 100,
            tail_rate: 1,
            halving_amount: 1_000_000,
        }
    }

    fn time() -> TimeHalving {
        TimeHalving {
            initial_rate: 1_000,
            tail_rate: 10,
            halving_period: 30 * 86_400,
        }
    }

    // ------------------------------------------------------------------
    // SupplyHalving
    // ------------------------------------------------------------------

    #[test]
    fn supply_rate_before_first_threshold() {
        assert_eq!(supply().rate(0), 100);
        assert_eq!(supply().rate(999_999), 100);
    }

    #[test]
    fn supply_rate_at_first_threshold() {
        assert_eq!(supply().rate(1_000_000), 50);
    }

    #[test]
    fn supply_rate_in_third_band() {
        // 1,600,000 lies in [1,500,000, 1,750,000)
        assert_eq!(supply().halvings(1_600_000), 2);
        assert_eq!(supply().rate(1_600_000), 25);
    }

    #[test]
    fn supply_rate_converges_to_tail() {
        assert_eq!(supply().rate(2_000_000), 1);
        assert_eq!(supply().rate(Amount::MAX), 1);
    }

    #[test]
    fn supply_halvings_bounded() {
        assert_eq!(supply().halvings(Amount::MAX), MAX_HALVINGS);
    }

    #[test]
    fn supply_thresholds_form_geometric_series() {
        let s = supply();
        assert_eq!(s.threshold(0), None);
        assert_eq!(s.threshold(1), Some(1_000_000));
        assert_eq!(s.threshold(2), Some(1_500_000));
        assert_eq!(s.threshold(3), Some(1_750_000));
        assert_eq!(s.threshold(4), Some(1_875_000));
    }

    #[test]
    fn supply_next_threshold() {
        let s = supply();
        assert_eq!(s.next_threshold(0), Some(1_000_000));
        assert_eq!(s.next_threshold(1_600_000), Some(1_750_000));
        assert_eq!(s.next_threshold(Amount::MAX), None);
    }

    #[test]
    fn supply_validate_rejects_zero_halving() {
        let s = SupplyHalving {
            halving_amount: 0,
            ..supply()
        };
        assert_eq!(s.validate(), Err(ConfigError::ZeroHalving));
    }

    #[test]
    fn supply_validate_rejects_tail_above_initial() {
        let s = SupplyHalving {
            tail_rate: 101,
            ..supply()
        };
        assert!(matches!(s.validate(), Err(ConfigError::TailAboveInitial { .. })));
    }

    // ------------------------------------------------------------------
    // TimeHalving
    // ------------------------------------------------------------------

    #[test]
    fn time_rate_first_period() {
        let t = time();
        assert_eq!(t.rate(100, 100), 1_000);
        assert_eq!(t.rate(100, 100 + t.halving_period - 1), 1_000);
    }

    #[test]
    fn time_rate_halves_each_period() {
        let t = time();
        assert_eq!(t.rate(0, t.halving_period), 500);
        assert_eq!(t.rate(0, 2 * t.halving_period), 250);
        assert_eq!(t.rate(0, 3 * t.halving_period), 125);
    }

    #[test]
    fn time_rate_floor() {
        let t = time();
        assert_eq!(t.rate(0, 10 * t.halving_period), 10);
        assert_eq!(t.rate(0, u64::MAX), 10);
    }

    #[test]
    fn time_before_start_is_first_period() {
        assert_eq!(time().rate(1_000, 0), 1_000);
    }

    #[test]
    fn time_next_halving() {
        let t = time();
        assert_eq!(t.next_halving_time(50, 50), Some(50 + t.halving_period));
        assert_eq!(t.next_halving_time(0, u64::MAX), None);
    }

    #[test]
    fn time_emitted_within_one_period() {
        let t = time();
        assert_eq!(t.emitted_between(0, 10, 110), Some(100 * 1_000));
        assert_eq!(t.emitted_between(0, 110, 10), Some(0));
    }

    #[test]
    fn time_emitted_across_boundary() {
        let t = time();
        let p = t.halving_period;
        // 10 s before the first halving at 1000/s, 10 s after at 500/s.
        assert_eq!(t.emitted_between(0, p - 10, p + 10), Some(10 * 1_000 + 10 * 500));
    }

    #[test]
    fn time_emitted_at_floor_is_linear() {
        let t = time();
        let late = 20 * t.halving_period;
        assert_eq!(t.emitted_between(0, late, late + 50), Some(50 * 10));
    }

    #[test]
    fn time_emitted_with_zero_tail_terminates() {
        let t = TimeHalving { initial_rate: u128::MAX, tail_rate: 0, halving_period: 1 };
        assert_eq!(t.emitted_between(0, 200, 210), Some(10 * (u128::MAX >> 64)));
    }

    #[test]
    fn halved_rate_large_shift() {
        assert_eq!(halved_rate(u128::MAX, 3, 200), 3);
        assert_eq!(halved_rate(8, 0, 3), 1);
    }

    // ------------------------------------------------------------------
    // EmissionState
    // ------------------------------------------------------------------

    #[test]
    fn state_record_moves_supply_rate() {
        let mut state = EmissionState::new(HalvingPolicy::Supply(supply()), 0);
        assert_eq!(state.rate(0), 100);
        state.record(1_600_000, 10);
        assert_eq!(state.total_minted, 1_600_000);
        assert_eq!(state.last_emission, 10);
        assert_eq!(state.rate(10), 25);
        assert_eq!(state.floor_rate(), 1);
    }

    #[test]
    fn state_time_rate_uses_start() {
        let state = EmissionState::new(HalvingPolicy::Time(time()), 1_000);
        assert_eq!(state.rate(1_000 + time().halving_period), 500);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn supply_rate_non_increasing(a in any::<u64>(), b in any::<u64>(), h in 1u64..u64::MAX) {
            let s = SupplyHalving { initial_rate: 1 << 80, tail_rate: 7, halving_amount: h as u128 };
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(s.rate(lo as u128) >= s.rate(hi as u128));
            prop_assert!(s.rate(hi as u128) >= 7);
        }

        #[test]
        fn time_rate_non_increasing(a in any::<u64>(), b in any::<u64>(), p in 1u64..10_000_000) {
            let t = TimeHalving { initial_rate: 1 << 70, tail_rate: 3, halving_period: p };
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(t.rate(0, lo) >= t.rate(0, hi));
            prop_assert!(t.rate(0, hi) >= 3);
        }

        #[test]
        fn time_emission_is_additive(a in 0u64..1_000_000, b in 0u64..1_000_000, c in 0u64..1_000_000) {
            let t = TimeHalving { initial_rate: 1 << 40, tail_rate: 5, halving_period: 86_400 };
            let mut v = [a, b, c];
            v.sort_unstable();
            let whole = t.emitted_between(0, v[0], v[2]).unwrap();
            let parts = t.emitted_between(0, v[0], v[1]).unwrap() + t.emitted_between(0, v[1], v[2]).unwrap();
            prop_assert_eq!(whole, parts);
        }
    }
}
