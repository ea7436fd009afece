//! Dutch-auction pricing clock.
//!
//! Each resource carries an [`AuctionClock`]. Its price decays linearly from
//! `init_price` to zero over one epoch period. Consuming the resource starts a
//! new epoch whose init price is the last paid price times the configured
//! multiplier, clamped to `[min_init_price, ABS_MAX_INIT_PRICE]`.
//!
//! Consumers race on the epoch id: every consuming call carries the epoch it
//! observed, a deadline and a price ceiling, checked by
//! [`AuctionClock::check_bid`].

use serde::{Deserialize, Serialize};

use crate::constants::{
    ABS_MAX_INIT_PRICE, ABS_MIN_INIT_PRICE, MAX_EPOCH_PERIOD, MAX_PRICE_MULTIPLIER,
    MIN_EPOCH_PERIOD, MIN_PRICE_MULTIPLIER, PRECISION,
};
use crate::error::{ConfigError, ValidationError};
use crate::math::mul_div;
use crate::types::{Amount, Timestamp};

/// Auction parameters shared by every clock of one rig.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionParams {
    /// Seconds for the price to decay from `init_price` to zero.
    pub epoch_period: u64,
    /// Fixed-point multiplier applied to the last paid price (`PRECISION` = 1×).
    pub price_multiplier: u128,
    /// Floor for a new epoch's init price.
    pub min_init_price: Amount,
}

impl AuctionParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_EPOCH_PERIOD..=MAX_EPOCH_PERIOD).contains(&self.epoch_period) {
            return Err(ConfigError::EpochPeriodOutOfRange(self.epoch_period));
        }
        if !(MIN_PRICE_MULTIPLIER..=MAX_PRICE_MULTIPLIER).contains(&self.price_multiplier) {
            return Err(ConfigError::PriceMultiplierOutOfRange(self.price_multiplier));
        }
        if !(ABS_MIN_INIT_PRICE..=ABS_MAX_INIT_PRICE).contains(&self.min_init_price) {
            return Err(ConfigError::MinInitPriceOutOfRange(self.min_init_price));
        }
        Ok(())
    }
}

/// The caller's view of an auction at the moment it decided to consume.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    /// Epoch id the caller observed.
    pub expected_epoch: u64,
    /// Last second at which the bid is still valid.
    pub deadline: Timestamp,
    /// Highest price the caller accepts.
    pub max_price: Amount,
}

/// Per-resource auction state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionClock {
    /// Increments on every consumption.
    pub epoch_id: u64,
    pub init_price: Amount,
    pub start_time: Timestamp,
}

impl AuctionClock {
    /// A fresh clock at epoch 0, clamping `init_price` into the allowed range.
    pub fn new(init_price: Amount, now: Timestamp) -> Self {
        Self {
            epoch_id: 0,
            init_price: init_price.clamp(ABS_MIN_INIT_PRICE, ABS_MAX_INIT_PRICE),
            start_time: now,
        }
    }

    /// Current price: linear decay to zero over `epoch_period`.
    pub fn price(&self, now: Timestamp, params: &AuctionParams) -> Amount {
        let elapsed = now.saturating_sub(self.start_time);
        if elapsed >= params.epoch_period {
            return 0;
        }
        let decayed = mul_div(self.init_price, elapsed as u128, params.epoch_period as u128)
            .unwrap_or(self.init_price);
        self.init_price.saturating_sub(decayed)
    }

    /// Check a bid against live state and return the price to pay.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::DeadlinePassed`] if `now > bid.deadline`
    /// - [`ValidationError::EpochMismatch`] if the epoch moved on
    /// - [`ValidationError::PriceAboveMax`] if the live price exceeds the ceiling
    pub fn check_bid(
        &self,
        bid: &Bid,
        now: Timestamp,
        params: &AuctionParams,
    ) -> Result<Amount, ValidationError> {
        if now > bid.deadline {
            return Err(ValidationError::DeadlinePassed {
                deadline: bid.deadline,
                now,
            });
        }
        if bid.expected_epoch != self.epoch_id {
            return Err(ValidationError::EpochMismatch {
                expected: bid.expected_epoch,
                live: self.epoch_id,
            });
        }
        let price = self.price(now, params);
        if price > bid.max_price {
            return Err(ValidationError::PriceAboveMax {
                price,
                max_price: bid.max_price,
            });
        }
        Ok(price)
    }

    /// Init price for the epoch following a consumption at `last_price`.
    ///
    /// A zero price means the epoch expired unconsumed; the next epoch starts
    /// at `min_init_price` so the resource never becomes permanently free.
    pub fn next_init_price(last_price: Amount, params: &AuctionParams) -> Amount {
        if last_price == 0 {
            return params.min_init_price;
        }
        mul_div(last_price, params.price_multiplier, PRECISION)
            .unwrap_or(ABS_MAX_INIT_PRICE)
            .clamp(params.min_init_price, ABS_MAX_INIT_PRICE)
    }

    /// Start the next epoch after a consumption at `last_price`.
    pub fn on_consume(&mut self, last_price: Amount, now: Timestamp, params: &AuctionParams) {
        self.init_price = Self::next_init_price(last_price, params);
        self.epoch_id += 1;
        self.start_time = now;
    }
}
