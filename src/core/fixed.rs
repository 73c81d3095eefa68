//! Fixed-point arithmetic, Q16.16 in an i32.
//!
//! Every speed, distance and force in the simulation is a `Fixed`:
//! a signed 32-bit integer carrying 16 fractional bits. Integer math
//! gives bit-identical results on every platform, which the replay and
//! desync checks rely on.
//!
//! ```text
//! i32:  [sign][15 integer bits][16 fractional bits]
//!
//! 1.0   = 65536          range    ≈ ±32768.0
//! 0.5   = 32768          smallest ≈ 0.000015
//! ```
//!
//! Floats appear in exactly two places: `to_fixed` for compile-time
//! constants, and display formatting. Neither feeds back into the
//! simulation.

/// The simulation's number type: sign bit, 15 integer bits,
/// 16 fractional bits.
pub type Fixed = i32;

/// Fractional bit count.
pub const FIXED_SCALE: i32 = 16;

/// One (65536).
pub const FIXED_ONE: Fixed = 1 << FIXED_SCALE;

/// One half (32768).
pub const FIXED_HALF: Fixed = FIXED_ONE >> 1;

// =============================================================================
// GAMEPLAY CONSTANTS (integer literals only; the comment gives the float)
// =============================================================================

/// One tick at 60 Hz: round(65536 / 60)
pub const TICK_DURATION: Fixed = 1092;

/// Run speed: 6.0 units/sec
pub const MOVE_SPEED: Fixed = 393216;

/// Dash speed: 18.0 units/sec, three times run speed
pub const DASH_SPEED: Fixed = 1179648;

/// Dash window: 0.15s at 60 Hz
pub const DASH_DURATION_TICKS: u32 = 9;

/// Dash cooldown: 1s at 60 Hz
pub const DASH_COOLDOWN_TICKS: u32 = 60;

/// Speed a dash hit imposes on the target: 10.0
pub const DASH_PUSH_FORCE: Fixed = 655360;

/// Push window from a dash hit: 0.2s at 60 Hz
pub const DASH_PUSH_DURATION_TICKS: u32 = 12;

/// Player collision radius: 0.5
pub const PLAYER_RADIUS: Fixed = 32768;

/// Arena half-width: 9.0
///
/// Leaving the arena rectangle on any side counts as falling off.
pub const ARENA_HALF_WIDTH: Fixed = 589824;

/// Arena half-height: 5.0
pub const ARENA_HALF_HEIGHT: Fixed = 327680;

// =============================================================================
// OPERATIONS
// =============================================================================

/// Fixed-point value of a float constant.
///
/// For constants and test setup only, never inside the tick loop.
///
/// # Example
/// ```
/// use dash_arena::core::fixed::{to_fixed, FIXED_ONE};
/// const QUARTER: i32 = to_fixed(0.25);
/// assert_eq!(QUARTER, FIXED_ONE / 4);
/// ```
#[inline]
pub const fn to_fixed(f: f64) -> Fixed {
    (f * (FIXED_ONE as f64)) as Fixed
}

/// Q16.16 product.
///
/// Widens to i64 so the product cannot overflow, then shifts back.
/// The arithmetic shift rounds toward negative infinity.
#[inline]
pub fn fixed_mul(a: Fixed, b: Fixed) -> Fixed {
    let wide = (a as i64) * (b as i64);
    (wide >> FIXED_SCALE) as Fixed
}

/// Q16.16 quotient.
///
/// The numerator is pre-shifted to keep the fractional bits. Division
/// by zero yields 0 rather than panicking; a panic here would make the
/// tick outcome depend on data.
#[inline]
pub fn fixed_div(a: Fixed, b: Fixed) -> Fixed {
    if b == 0 {
        return 0;
    }
    let wide = (a as i64) << FIXED_SCALE;
    (wide / b as i64) as Fixed
}

/// Square root by Newton's method.
///
/// Always runs exactly 6 iterations so every platform performs the
/// same arithmetic. Non-positive inputs yield 0. Prefer squared
/// distances where a comparison is all that is needed.
#[inline]
pub fn fixed_sqrt(x: Fixed) -> Fixed {
    if x <= 0 {
        return 0;
    }

    let mut guess = (x >> 1).max(1);

    for _ in 0..6 {
        let div = fixed_div(x, guess);
        guess = (guess.wrapping_add(div)) >> 1;

        // The iteration must never divide by zero on the next round
        if guess == 0 {
            guess = 1;
        }
    }

    guess
}

/// Larger of the two.
#[inline]
pub fn fixed_max(a: Fixed, b: Fixed) -> Fixed {
    if a > b { a } else { b }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_constants() {
        assert_eq!(FIXED_SCALE, 16);
        assert_eq!(FIXED_ONE, 1 << 16);
        assert_eq!(FIXED_HALF + FIXED_HALF, FIXED_ONE);
    }

    #[test]
    fn test_to_fixed_exact_on_dyadics() {
        assert_eq!(to_fixed(1.0), FIXED_ONE);
        assert_eq!(to_fixed(0.25), FIXED_ONE / 4);
        assert_eq!(to_fixed(-1.5), -FIXED_ONE - FIXED_HALF);
        assert_eq!(to_fixed(0.0), 0);
    }

    #[test]
    fn test_fixed_mul() {
        assert_eq!(fixed_mul(to_fixed(1.5), to_fixed(4.0)), to_fixed(6.0));
        assert_eq!(fixed_mul(to_fixed(0.25), to_fixed(0.5)), to_fixed(0.125));
        assert_eq!(fixed_mul(to_fixed(-3.0), to_fixed(1.5)), to_fixed(-4.5));
        assert_eq!(fixed_mul(to_fixed(7.0), 0), 0);
    }

    #[test]
    fn test_fixed_div() {
        assert_eq!(fixed_div(to_fixed(7.5), to_fixed(2.5)), to_fixed(3.0));
        assert_eq!(fixed_div(FIXED_ONE, to_fixed(8.0)), to_fixed(0.125));
        assert_eq!(fixed_div(to_fixed(-6.0), to_fixed(2.0)), to_fixed(-3.0));
        // No panic on zero denominator
        assert_eq!(fixed_div(FIXED_ONE, 0), 0);
    }

    #[test]
    fn test_mul_div_round_trip() {
        // Exact when the factors are powers of two
        let a = to_fixed(5.0);
        let b = to_fixed(4.0);
        assert_eq!(fixed_div(fixed_mul(a, b), b), a);
    }

    #[test]
    fn test_fixed_sqrt() {
        let tolerance = 100; // ~0.0015 units

        assert!((fixed_sqrt(to_fixed(9.0)) - to_fixed(3.0)).abs() < tolerance);
        assert!((fixed_sqrt(to_fixed(2.25)) - to_fixed(1.5)).abs() < tolerance);
        assert!((fixed_sqrt(FIXED_ONE) - FIXED_ONE).abs() < tolerance);

        assert_eq!(fixed_sqrt(0), 0);
        assert_eq!(fixed_sqrt(-FIXED_ONE), 0);
        assert!(fixed_sqrt(1) >= 0);
    }

    #[test]
    fn test_fixed_max() {
        assert_eq!(fixed_max(to_fixed(2.0), to_fixed(-5.0)), to_fixed(2.0));
        assert_eq!(fixed_max(-3, -3), -3);
    }

    #[test]
    fn test_movement_constants() {
        assert_eq!(TICK_DURATION, 1092);
        assert_eq!(MOVE_SPEED, 6 * FIXED_ONE);
        assert_eq!(DASH_SPEED, 18 * FIXED_ONE);
        assert_eq!(DASH_SPEED, MOVE_SPEED * 3);
        assert_eq!(DASH_PUSH_FORCE, 10 * FIXED_ONE);
        assert_eq!(PLAYER_RADIUS, FIXED_HALF);
        assert_eq!(ARENA_HALF_WIDTH, 9 * FIXED_ONE);
        assert_eq!(ARENA_HALF_HEIGHT, 5 * FIXED_ONE);
    }

    #[test]
    fn test_dash_outruns_push() {
        // A dashing player moves faster than one being shoved away
        assert!(DASH_SPEED > DASH_PUSH_FORCE);
        // One full dash covers 18.0 * 0.15 = 2.7 units, well inside the arena
        let dash_distance = fixed_mul(DASH_SPEED, TICK_DURATION) * DASH_DURATION_TICKS as Fixed;
        assert!(dash_distance < ARENA_HALF_WIDTH);
    }
}
