//! Fixed-precision beat arithmetic.
//!
//! Beats are scaled to integers with `PRECISION` fractional digits, combined with
//! integer math, then scaled back. Thousands of scheduler ticks summed in plain `f64`
//! drift far enough to move note boundaries, so every beat-domain add, subtract and
//! modulus in the workspace goes through here.

/// Number of fractional decimal digits kept.
pub const PRECISION: u32 = 6;

const SCALE: f64 = 1_000_000.0;

/// Largest magnitude whose scaled form is still an exact integer in an `f64`.
pub const MAX_BEAT_VALUE: f64 = 9_007_199_254.0;

#[inline]
fn to_fixed(value: f64) -> i64 {
    (value * SCALE).round() as i64
}

#[inline]
fn from_fixed(value: i64) -> f64 {
    value as f64 / SCALE
}

/// Quantize a single value to the fixed precision.
#[inline]
pub fn round(value: f64) -> f64 {
    from_fixed(to_fixed(value))
}

#[inline]
pub fn add(a: f64, b: f64) -> f64 {
    from_fixed(to_fixed(a) + to_fixed(b))
}

#[inline]
pub fn subtract(a: f64, b: f64) -> f64 {
    from_fixed(to_fixed(a) - to_fixed(b))
}

/// Euclidean modulus: the result lies in `[0, b)` for `b > 0`.
/// A zero (or sub-precision) divisor leaves `a` unwrapped.
pub fn modulus(a: f64, b: f64) -> f64 {
    let divisor = to_fixed(b);
    if divisor == 0 {
        return round(a);
    }
    from_fixed(to_fixed(a).rem_euclid(divisor.abs()))
}

/// Fixed-precision key for hashing/comparing beat positions.
#[inline]
pub fn key(value: f64) -> i64 {
    to_fixed(value)
}

/// Inverse of [`key`].
#[inline]
pub fn from_key(key: i64) -> f64 {
    from_fixed(key)
}
