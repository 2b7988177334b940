//! Decoding of the IOP's 32-bit float register
//!
//! Bit [31]    (1 bit)   -> Sign
//! Bit [30:23] (8 bits)  -> Exponent, biased by 127
//! Bit [22:0]  (23 bits) -> Mantissa

use core::fmt::Write;

use heapless::String;

use crate::thermometer::Temperature;

const SIGN_MASK: u32 = 0x8000_0000;
const EXP_MASK: u32 = 0x7F80_0000;
const MAN_MASK: u32 = 0x007F_FFFF;
const EXP_SHIFT: u32 = 23;
const EXP_BIAS: i32 = 127;
const MAN_SCALE: f64 = (1u32 << EXP_SHIFT) as f64;

/// Sign, 39 integer digits for 2^128, the point and one decimal fit with room to spare
const ROUND_BUF: usize = 48;

/// Translates a data register into degrees Celsius, rounded to one decimal.
///
/// The IOP firmware's format is decoded by hand, not reinterpreted as an `f32`. The implicit
/// leading one is dropped when the *debiased* exponent is 0 (a biased field of 127), which is
/// not the IEEE-754 denormal rule. Readings between 1 and 2 degrees therefore decode as
/// `value - 1`. The firmware's host library has always done this, so it is kept.
#[allow(clippy::cast_possible_truncation)]
#[cfg_attr(feature = "sizing", inline(never))]
pub fn reg_to_float(reg: u32) -> Temperature {
    if reg == 0 {
        return 0.0;
    }

    let negative = reg & SIGN_MASK != 0;
    let exp = i32::from(((reg & EXP_MASK) >> EXP_SHIFT) as u8) - EXP_BIAS;
    let frac = f64::from(reg & MAN_MASK) / MAN_SCALE;

    let significand = if exp == 0 { frac } else { 1.0 + frac };
    let value = pow2(exp) * significand;

    round_tenths(if negative { -value } else { value })
}

/// Exact power of two for the whole exponent range of the register
fn pow2(exp: i32) -> f64 {
    let scale: f64 = num_traits::pow(2.0, exp.unsigned_abs() as usize);
    if exp < 0 {
        1.0 / scale
    } else {
        scale
    }
}

/// Rounds to one decimal through its decimal rendering, so ties are decided on the exact binary
/// value rather than on a scaled approximation.
pub fn round_tenths(value: f64) -> f64 {
    let mut buf = String::<ROUND_BUF>::new();
    if write!(buf, "{value:.1}").is_err() {
        return value;
    }
    buf.parse().unwrap_or(value)
}
