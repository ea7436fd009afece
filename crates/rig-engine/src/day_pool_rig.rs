//! Day-pool rig: daily contributions claimed pro rata once the day is over.
//!
//! Contributions are split as fees immediately. Each day has a fixed unit
//! emission, set when the day's bucket is created from a time-halving curve
//! expressed in units per day. After the day ends, each contributor may
//! claim `emission * contribution / total` exactly once.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, info};

use rig_core::constants::SECONDS_PER_DAY;
use rig_core::emission::{EmissionState, HalvingPolicy, TimeHalving};
use rig_core::error::{RigError, StateError, ValidationError};
use rig_core::events::{AdminChange, EventLog, RigEvent};
use rig_core::fees::{FeeSchedule, split_payment};
use rig_core::math::{checked_add, mul_div};
use rig_core::traits::TokenBank;
use rig_core::types::{Account, Amount, Asset, Timestamp};

use crate::config::DayPoolConfig;
use crate::roles::{Administered, Roles, log_admin};
use crate::settlement::Settlement;

/// Contributions and claims for one day.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DayBucket {
    pub day: u64,
    pub total: Amount,
    pub emission: Amount,
    contributions: HashMap<Account, Amount>,
    claimed: HashSet<Account>,
}

impl DayBucket {
    fn new(day: u64, emission: Amount) -> Self {
        Self {
            day,
            emission,
            ..Self::default()
        }
    }

    pub fn contribution(&self, account: &Account) -> Amount {
        self.contributions.get(account).copied().unwrap_or(0)
    }

    pub fn is_claimed(&self, account: &Account) -> bool {
        self.claimed.contains(account)
    }

    pub fn contributors(&self) -> usize {
        self.contributions.len()
    }

    /// Units `account` is entitled to, ignoring whether it already claimed.
    pub fn share_of(&self, account: &Account) -> Result<Amount, RigError> {
        let contribution = self.contribution(account);
        if contribution == 0 {
            return Ok(0);
        }
        mul_div(self.emission, contribution, self.total).ok_or(RigError::Overflow)
    }
}

pub struct DayPoolRig<B> {
    fees: FeeSchedule,
    roles: Roles,
    curve: TimeHalving,
    emission: EmissionState,
    min_contribution: Amount,
    days: BTreeMap<u64, DayBucket>,
    bank: B,
    events: EventLog,
}

impl<B: TokenBank> DayPoolRig<B> {
    /// Build a rig whose day 0 starts at `start`.
    pub fn new(config: &DayPoolConfig, roles: Roles, bank: B, start: Timestamp) -> Result<Self, RigError> {
        config.validate()?;
        roles.validate()?;
        let curve = config.emission.curve();
        info!(start, min_contribution = config.min_contribution, "day pool: initialised");
        Ok(Self {
            fees: config.fees.schedule(),
            roles,
            curve,
            emission: EmissionState::new(HalvingPolicy::Time(curve), start),
            min_contribution: config.min_contribution,
            days: BTreeMap::new(),
            bank,
            events: EventLog::new(),
        })
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Contribute `amount` to the current day and return the day index.
    pub fn contribute(&mut self, participant: Account, amount: Amount, now: Timestamp) -> Result<u64, RigError> {
        participant.validate()?;
        let min = self.min_contribution.max(1);
        if amount < min {
            return Err(ValidationError::ContributionTooSmall { amount, min }.into());
        }
        let day = self.current_day(now);
        let (total, contribution) = match self.days.get(&day) {
            Some(bucket) => (bucket.total, bucket.contribution(&participant)),
            None => (0, 0),
        };
        let total = checked_add(total, amount)?;
        let contribution = checked_add(contribution, amount)?;
        let split = split_payment(amount, &self.fees, &self.roles.recipients(None))?;

        let mut batch = Settlement::new();
        batch.collect(participant, amount);
        batch.pay_fees(&split);
        batch.event(RigEvent::Contributed { day, participant, amount });
        batch.commit(&mut self.bank, &mut self.events)?;

        let emission = self.day_emission(day);
        let bucket = self.days.entry(day).or_insert_with(|| DayBucket::new(day, emission));
        bucket.total = total;
        bucket.contributions.insert(participant, contribution);
        info!(day, %participant, amount, day_total = total, "day pool: contributed");
        Ok(day)
    }

    /// Claim `account`'s share of a finished day.
    ///
    /// # Errors
    ///
    /// - [`StateError::DayNotEnded`] unless `day` is before the current day
    /// - [`StateError::AlreadyClaimed`] on a second claim for the same day
    /// - [`StateError::NothingToClaim`] if `account` did not contribute
    pub fn claim(&mut self, account: Account, day: u64, now: Timestamp) -> Result<Amount, RigError> {
        account.validate()?;
        let current = self.current_day(now);
        if day >= current {
            return Err(StateError::DayNotEnded { day, current }.into());
        }
        let bucket = self.days.get(&day).ok_or(StateError::NothingToClaim)?;
        if bucket.is_claimed(&account) {
            return Err(StateError::AlreadyClaimed { day }.into());
        }
        if bucket.contribution(&account) == 0 {
            return Err(StateError::NothingToClaim.into());
        }
        let amount = bucket.share_of(&account)?;
        self.settle_claims(account, &[(day, amount)], now)?;
        Ok(amount)
    }

    /// Claim every eligible day in `days` and return the total paid.
    ///
    /// Days that have not ended, were already claimed, appear twice, or
    /// hold no contribution from `account` are skipped.
    pub fn claim_batch(&mut self, account: Account, days: &[u64], now: Timestamp) -> Result<Amount, RigError> {
        account.validate()?;
        let current = self.current_day(now);
        let mut seen = HashSet::new();
        let mut claims = Vec::new();
        let mut total: Amount = 0;
        for &day in days {
            if day >= current || !seen.insert(day) {
                continue;
            }
            let Some(bucket) = self.days.get(&day) else { continue };
            if bucket.is_claimed(&account) || bucket.contribution(&account) == 0 {
                continue;
            }
            let amount = bucket.share_of(&account)?;
            total = checked_add(total, amount)?;
            claims.push((day, amount));
        }
        if claims.is_empty() {
            debug!(%account, requested = days.len(), "day pool: nothing eligible in batch");
            return Ok(0);
        }
        self.settle_claims(account, &claims, now)?;
        Ok(total)
    }

    fn settle_claims(&mut self, account: Account, claims: &[(u64, Amount)], now: Timestamp) -> Result<(), RigError> {
        let total = claims
            .iter()
            .try_fold(0, |acc: Amount, (_, amount)| acc.checked_add(*amount))
            .ok_or(RigError::Overflow)?;
        let mut batch = Settlement::new();
        batch.mint(account, total);
        for &(day, amount) in claims {
            batch.event(RigEvent::ClaimExecuted { account, asset: Asset::Unit, amount, day: Some(day) });
        }
        batch.commit(&mut self.bank, &mut self.events)?;

        for &(day, amount) in claims {
            if let Some(bucket) = self.days.get_mut(&day) {
                bucket.claimed.insert(account);
            }
            info!(day, %account, amount, "day pool: claimed");
        }
        self.emission.record(total, now);
        Ok(())
    }

    pub fn set_min_contribution(&mut self, caller: Account, min: Amount) -> Result<(), RigError> {
        self.roles.authorize(&caller)?;
        self.min_contribution = min;
        self.record_admin(AdminChange::MinContribution(min));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    /// Day index at `now`; times before the start count as day 0.
    pub fn current_day(&self, now: Timestamp) -> u64 {
        now.saturating_sub(self.emission.start) / SECONDS_PER_DAY
    }

    pub fn day(&self, day: u64) -> Option<&DayBucket> {
        self.days.get(&day)
    }

    /// Units allotted to `day`: fixed for days with a bucket, projected otherwise.
    pub fn day_emission(&self, day: u64) -> Amount {
        if let Some(bucket) = self.days.get(&day) {
            return bucket.emission;
        }
        let day_start = day
            .checked_mul(SECONDS_PER_DAY)
            .and_then(|offset| self.emission.start.checked_add(offset))
            .unwrap_or(Timestamp::MAX);
        self.curve.rate(self.emission.start, day_start)
    }

    /// What `claim(account, day, now)` would pay, or 0 if it would fail.
    pub fn pending_claim(&self, account: &Account, day: u64, now: Timestamp) -> Amount {
        if day >= self.current_day(now) {
            return 0;
        }
        match self.days.get(&day) {
            Some(bucket) if !bucket.is_claimed(account) => bucket.share_of(account).unwrap_or(0),
            _ => 0,
        }
    }

    pub fn min_contribution(&self) -> Amount {
        self.min_contribution
    }

    pub fn total_minted(&self) -> Amount {
        self.emission.total_minted
    }

    pub fn bank(&self) -> &B {
        &self.bank
    }

    pub fn bank_mut(&mut self) -> &mut B {
        &mut self.bank
    }

    pub fn events(&self) -> &[RigEvent] {
        self.events.peek()
    }

    pub fn drain_events(&mut self) -> Vec<RigEvent> {
        self.events.drain()
    }
}

impl<B> Administered for DayPoolRig<B> {
    fn roles(&self) -> &Roles {
        &self.roles
    }

    fn roles_mut(&mut self) -> &mut Roles {
        &mut self.roles
    }

    fn record_admin(&mut self, change: AdminChange) {
        log_admin("day_pool", &change);
        self.events.emit(RigEvent::AdminChanged { change });
    }
}
