//! Checked integer helpers shared by the curves and the rigs.
//!
//! All arithmetic is integer-only. `mul_div` carries the intermediate
//! product in 256 bits, so it only fails when the quotient itself does not
//! fit in `u128`.

use primitive_types::U256;

use crate::constants::BPS_PRECISION;
use crate::error::RigError;
use crate::types::Amount;

/// `floor(a * b / d)`, or `None` if `d == 0` or the result overflows.
pub fn mul_div(a: u128, b: u128, d: u128) -> Option<u128> {
    if d == 0 {
        return None;
    }
    if let Some(product) = a.checked_mul(b) {
        return Some(product / d);
    }
    // Two u128 operands never overflow 256 bits.
    let quotient = U256::from(a).checked_mul(U256::from(b))? / U256::from(d);
    if quotient.bits() > 128 {
        return None;
    }
    Some(quotient.low_u128())
}

/// `floor(amount * bps / 10_000)`.
pub fn bps_of(amount: Amount, bps: u128) -> Result<Amount, RigError> {
    mul_div(amount, bps, BPS_PRECISION).ok_or(RigError::Overflow)
}

pub fn checked_add(a: Amount, b: Amount) -> Result<Amount, RigError> {
    a.checked_add(b).ok_or(RigError::Overflow)
}

pub fn checked_mul(a: Amount, b: Amount) -> Result<Amount, RigError> {
    a.checked_mul(b).ok_or(RigError::Overflow)
}
