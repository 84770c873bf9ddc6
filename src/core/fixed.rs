//! Q16.16 Fixed-Point Arithmetic
//!
//! Deterministic fractional math for the simulation. All gameplay numbers
//! are integer-backed; host floating-point never participates in an outcome.
//!
//! ## Format: Q16.16
//!
//! A `Fixed` is an `i32` with 16 integer bits and 16 fractional bits.
//! Range is roughly -32768.0 to +32767.99998 with 1/65536 precision.
//!
//! ## Rounding rule
//!
//! Multiplication and division widen to `i64`, then truncate toward zero
//! when narrowing back to `i32`. That single, standardized truncation
//! moment is the determinism contract of this module: every client and
//! every server rounds at the same place, the same way.

use std::fmt;
use std::ops::{Add, Sub, Mul, Div, Neg};

/// Q16.16 fixed-point number stored as i32.
pub type Fixed = i32;

/// Number of fractional bits (16)
pub const FIXED_SCALE: i32 = 16;

/// 1.0 in fixed-point (65536)
pub const FIXED_ONE: Fixed = 1 << FIXED_SCALE;

/// 0.5 in fixed-point (32768)
pub const FIXED_HALF: Fixed = FIXED_ONE >> 1;

/// Maximum positive value
pub const FIXED_MAX: Fixed = i32::MAX;

/// Minimum negative value
pub const FIXED_MIN: Fixed = i32::MIN;

// =============================================================================
// FIELD CONSTANTS (integer literals only - no runtime float conversion)
// =============================================================================

/// Half-extent of the battlefield: 40.0 = 40 * 65536.
/// Enemies spawn on this perimeter and walk toward the fortress at origin.
pub const FIELD_HALF_EXTENT: Fixed = 2621440;

/// Contact range at which an enemy starts hitting the fortress: 1.5 * 65536
pub const FORTRESS_CONTACT_RANGE: Fixed = 98304;

/// Convert a compile-time float to fixed-point.
///
/// # Warning
/// Only use at compile time or initialization. NEVER in the tick loop.
#[inline]
pub const fn to_fixed(f: f64) -> Fixed {
    (f * (FIXED_ONE as f64)) as Fixed
}

/// Convert fixed-point to float for display/logging.
///
/// # Warning
/// Only for output. NEVER feed the result back into game logic.
#[inline]
pub fn to_float(f: Fixed) -> f32 {
    f as f32 / FIXED_ONE as f32
}

/// Multiply two fixed-point numbers.
///
/// Widens to i64, multiplies, shifts back by 16 and truncates toward zero.
#[inline]
pub fn fixed_mul(a: Fixed, b: Fixed) -> Fixed {
    let wide = (a as i64) * (b as i64);
    (wide >> FIXED_SCALE) as Fixed
}

/// Divide two fixed-point numbers.
///
/// Pre-shifts the numerator in i64 to keep precision, truncates toward
/// zero. Division by zero saturates to `FIXED_MAX`/`FIXED_MIN` by the sign
/// of the numerator instead of panicking.
#[inline]
pub fn fixed_div(a: Fixed, b: Fixed) -> Fixed {
    if b == 0 {
        return if a >= 0 { FIXED_MAX } else { FIXED_MIN };
    }
    let wide = (a as i64) << FIXED_SCALE;
    (wide / b as i64) as Fixed
}

/// Square root using Newton's method.
///
/// Runs the integer iteration to convergence (`y < x` strictly decreases,
/// so the loop terminates deterministically), then rescales by 2^8 to stay
/// in Q16.16. Non-positive inputs return 0.
#[inline]
pub fn fixed_sqrt(fp: Fixed) -> Fixed {
    if fp <= 0 {
        return 0;
    }

    let fp64 = fp as i64;
    let mut x = fp64;
    let mut y = (x + 1) >> 1;

    while y < x {
        x = y;
        y = (x + fp64 / x) >> 1;
    }

    // sqrt(v * 2^16) = sqrt(v) * 2^8, so shift back up to Q16.16
    (x << 8) as Fixed
}

/// Raise a fixed-point base to an integer power by repeated multiplication.
///
/// Exponentiation-by-squaring would round differently depending on the bit
/// pattern of `exp`; the left-to-right product keeps exactly one truncation
/// per factor, identical everywhere.
pub fn fixed_pow(base: Fixed, exp: u32) -> Fixed {
    let mut acc = FIXED_ONE;
    for _ in 0..exp {
        acc = fixed_mul(acc, base);
    }
    acc
}

/// Raise a fixed-point base to an integer power, accumulating in i64.
///
/// Returns the Q16.16 result widened to i64 so compounding growth factors
/// (boss scaling across many cycles) never overflow the i32 range. Same
/// truncation per factor as [`fixed_pow`].
pub fn fixed_pow_i64(base: Fixed, exp: u32) -> i64 {
    let mut acc: i64 = FIXED_ONE as i64;
    for _ in 0..exp {
        acc = acc.saturating_mul(base as i64) >> FIXED_SCALE;
    }
    acc
}

/// Scale an integer amount by a Q16.16 factor held in i64.
#[inline]
pub fn scale_i64(value: i64, factor_q16: i64) -> i64 {
    value.saturating_mul(factor_q16) >> FIXED_SCALE
}

/// Absolute value of a fixed-point number.
#[inline]
pub fn fixed_abs(x: Fixed) -> Fixed {
    if x < 0 { x.wrapping_neg() } else { x }
}

/// Minimum of two fixed-point numbers.
#[inline]
pub fn fixed_min(a: Fixed, b: Fixed) -> Fixed {
    if a < b { a } else { b }
}

/// Maximum of two fixed-point numbers.
#[inline]
pub fn fixed_max(a: Fixed, b: Fixed) -> Fixed {
    if a > b { a } else { b }
}

/// Clamp a fixed-point number to a range.
#[inline]
pub fn fixed_clamp(value: Fixed, min: Fixed, max: Fixed) -> Fixed {
    fixed_max(min, fixed_min(max, value))
}

// =============================================================================
// FIXEDNUM WRAPPER (ergonomic wrapper with operator overloading)
// =============================================================================

/// Ergonomic wrapper around fixed-point with operator overloading.
///
/// Use for cold paths and config plumbing; hot loops use raw `Fixed`
/// with the `fixed_*` functions.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FixedNum(pub Fixed);

impl FixedNum {
    /// Zero constant
    pub const ZERO: Self = Self(0);

    /// One constant
    pub const ONE: Self = Self(FIXED_ONE);

    /// Create from raw fixed-point value
    #[inline]
    pub const fn from_raw(raw: Fixed) -> Self {
        Self(raw)
    }

    /// Create from integer
    #[inline]
    pub const fn from_int(i: i32) -> Self {
        Self(i << FIXED_SCALE)
    }

    /// Get raw fixed-point value
    #[inline]
    pub const fn raw(self) -> Fixed {
        self.0
    }

    /// Convert to float for display
    #[inline]
    pub fn to_float(self) -> f32 {
        to_float(self.0)
    }

    /// Absolute value
    #[inline]
    pub fn abs(self) -> Self {
        Self(fixed_abs(self.0))
    }
}

impl Add for FixedNum {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self(self.0.wrapping_add(rhs.0))
    }
}

impl Sub for FixedNum {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self(self.0.wrapping_sub(rhs.0))
    }
}

impl Mul for FixedNum {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Self(fixed_mul(self.0, rhs.0))
    }
}

impl Div for FixedNum {
    type Output = Self;
    #[inline]
    fn div(self, rhs: Self) -> Self {
        Self(fixed_div(self.0, rhs.0))
    }
}

impl Neg for FixedNum {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self(self.0.wrapping_neg())
    }
}

impl fmt::Debug for FixedNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fixed({:.4})", self.to_float())
    }
}

impl fmt::Display for FixedNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.to_float())
    }
}

// =============================================================================
// TESTS
// =============================================================================
