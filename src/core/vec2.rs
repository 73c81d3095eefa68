//! 2D vectors over Q16.16.
//!
//! Positions, velocities and push directions are `FixedVec2`. All
//! arithmetic stays in Q16.16 with wrapping semantics; callers use the
//! named methods rather than operator overloads so every arithmetic
//! step is visible at the call site.

use std::fmt;
use serde::{Serialize, Deserialize};

use super::fixed::{
    Fixed, FIXED_ONE,
    fixed_mul, fixed_div, fixed_sqrt,
    ARENA_HALF_WIDTH, ARENA_HALF_HEIGHT,
};

/// Pair of Q16.16 components.
#[derive(Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FixedVec2 {
    /// Horizontal component
    pub x: Fixed,
    /// Vertical component
    pub y: Fixed,
}

impl FixedVec2 {
    /// The origin.
    pub const ZERO: Self = Self { x: 0, y: 0 };

    /// Unit +X.
    pub const RIGHT: Self = Self { x: FIXED_ONE, y: 0 };

    /// Unit +Y.
    pub const UP: Self = Self { x: 0, y: FIXED_ONE };

    /// Unit -X.
    pub const LEFT: Self = Self { x: -FIXED_ONE, y: 0 };

    /// Unit -Y.
    pub const DOWN: Self = Self { x: 0, y: -FIXED_ONE };

    /// Build from raw Q16.16 parts.
    #[inline]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Component-wise sum.
    #[inline]
    pub fn add(self, other: Self) -> Self {
        Self {
            x: self.x.wrapping_add(other.x),
            y: self.y.wrapping_add(other.y),
        }
    }

    /// Component-wise difference.
    #[inline]
    pub fn sub(self, other: Self) -> Self {
        Self {
            x: self.x.wrapping_sub(other.x),
            y: self.y.wrapping_sub(other.y),
        }
    }

    /// Scale both components by a fixed-point scalar.
    #[inline]
    pub fn scale(self, scalar: Fixed) -> Self {
        Self {
            x: fixed_mul(self.x, scalar),
            y: fixed_mul(self.y, scalar),
        }
    }

    /// Squared length. No sqrt, so prefer this for comparisons.
    #[inline]
    pub fn length_squared(self) -> Fixed {
        fixed_mul(self.x, self.x)
            .wrapping_add(fixed_mul(self.y, self.y))
    }

    /// Length. Costs a fixed-point sqrt.
    #[inline]
    pub fn length(self) -> Fixed {
        fixed_sqrt(self.length_squared())
    }

    /// Squared distance to `other`.
    #[inline]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let dx = self.x.wrapping_sub(other.x);
        let dy = self.y.wrapping_sub(other.y);
        fixed_mul(dx, dx).wrapping_add(fixed_mul(dy, dy))
    }

    /// Scale to unit length. The zero vector stays zero.
    #[inline]
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len == 0 {
            return Self::ZERO;
        }
        Self {
            x: fixed_div(self.x, len),
            y: fixed_div(self.y, len),
        }
    }

    /// Check if position is on the arena platform.
    ///
    /// There is no clamping: a player outside this rectangle has fallen off.
    #[inline]
    pub fn is_in_arena(self) -> bool {
        self.x >= -ARENA_HALF_WIDTH
            && self.x <= ARENA_HALF_WIDTH
            && self.y >= -ARENA_HALF_HEIGHT
            && self.y <= ARENA_HALF_HEIGHT
    }

    /// Convert to a float pair for logging and display.
    #[inline]
    pub fn to_floats(self) -> (f32, f32) {
        (
            self.x as f32 / FIXED_ONE as f32,
            self.y as f32 / FIXED_ONE as f32,
        )
    }
}

impl fmt::Debug for FixedVec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (fx, fy) = self.to_floats();
        write!(f, "Vec2({:.3}, {:.3})", fx, fy)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::to_fixed;

    fn v(x: f64, y: f64) -> FixedVec2 {
        FixedVec2::new(to_fixed(x), to_fixed(y))
    }

    #[test]
    fn test_vec2_axes() {
        assert_eq!(FixedVec2::ZERO, FixedVec2::new(0, 0));
        assert_eq!(FixedVec2::RIGHT.x, FIXED_ONE);
        assert_eq!(FixedVec2::LEFT.x, -FIXED_ONE);
        assert_eq!(FixedVec2::UP.y, FIXED_ONE);
        assert_eq!(FixedVec2::DOWN.y, -FIXED_ONE);
    }

    #[test]
    fn test_vec2_add_sub() {
        let sum = v(1.5, -2.0).add(v(0.5, 3.0));
        assert_eq!(sum, v(2.0, 1.0));

        // sub is the exact inverse of add under wrapping arithmetic
        let a = FixedVec2::new(12345678, -87654321);
        let b = FixedVec2::new(-11111111, 22222222);
        assert_eq!(a.add(b).sub(b), a);
    }

    #[test]
    fn test_vec2_scale() {
        assert_eq!(v(4.0, -6.0).scale(to_fixed(0.5)), v(2.0, -3.0));
        assert_eq!(v(1.0, 2.0).scale(to_fixed(-2.0)), v(-2.0, -4.0));
        assert_eq!(v(3.0, 7.0).scale(0), FixedVec2::ZERO);
    }

    #[test]
    fn test_vec2_length() {
        // 6-8-10 triangle
        let diag = v(6.0, 8.0);
        assert_eq!(diag.length_squared(), to_fixed(100.0));
        assert!((diag.length() - to_fixed(10.0)).abs() < 200);

        assert_eq!(FixedVec2::ZERO.length(), 0);
    }

    #[test]
    fn test_vec2_distance_squared() {
        let d = v(1.0, 2.0).distance_squared(v(4.0, 6.0));
        assert_eq!(d, to_fixed(25.0));
        assert_eq!(v(-2.5, 0.0).distance_squared(v(-2.5, 0.0)), 0);
    }

    #[test]
    fn test_vec2_normalize() {
        // 5-12-13 triangle
        let n = v(5.0, 12.0).normalize();
        assert!((n.length() - FIXED_ONE).abs() < 200);
        // Direction is preserved: both components positive, y dominates
        assert!(n.x > 0 && n.y > n.x);

        assert_eq!(FixedVec2::ZERO.normalize(), FixedVec2::ZERO);
    }

    #[test]
    fn test_vec2_arena_bounds() {
        assert!(v(0.0, 0.0).is_in_arena());
        assert!(v(-8.5, 4.5).is_in_arena());

        // One component out is enough to fall
        assert!(!v(-9.2, 0.0).is_in_arena());
        assert!(!v(0.0, 5.1).is_in_arena());

        // Exactly on the edge still counts as on the platform
        let edge = FixedVec2::new(ARENA_HALF_WIDTH, -ARENA_HALF_HEIGHT);
        assert!(edge.is_in_arena());
    }

    #[test]
    fn test_vec2_to_floats() {
        // Dyadic fractions convert exactly
        let (fx, fy) = v(1.5, -0.25).to_floats();
        assert_eq!(fx, 1.5);
        assert_eq!(fy, -0.25);
    }
}
