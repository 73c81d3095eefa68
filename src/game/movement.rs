//! Per-Player Movement State Machine
//!
//! Resolves each player's velocity from three mutually exclusive sources:
//! free movement, an active dash, or an externally applied push.
//!
//! Mode rules:
//! - A push interrupts an active dash (the dash is cancelled outright).
//! - A dash never interrupts an active push (the request is dropped).
//! - A second push while pushed is ignored (first push wins until expiry).
//! - While shielded, incoming pushes are rejected entirely.

use serde::{Serialize, Deserialize};

use crate::core::fixed::{
    Fixed, FIXED_ONE, fixed_mul, fixed_max,
    MOVE_SPEED, DASH_SPEED, DASH_DURATION_TICKS, DASH_COOLDOWN_TICKS,
};
use crate::core::hash::StateHasher;
use crate::core::vec2::FixedVec2;

// =============================================================================
// MOVE MODE
// =============================================================================

/// Which velocity source is authoritative this tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MoveMode {
    /// Normal input-driven movement
    #[default]
    Free = 0,
    /// Fixed-duration dash burst
    Dashing = 1,
    /// Externally imposed push
    Pushed = 2,
}

/// Outcome of a push attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// Push took effect (any active dash was cancelled)
    Applied,
    /// Target is shielded, push rejected entirely
    Shielded,
    /// Target is already being pushed, first push wins
    AlreadyPushed,
}

/// Scheduled restore of the dash speed multiplier.
///
/// One entry per speed boost application. The restore value is captured
/// at apply time; when several boosts overlap, whichever restore fires
/// last wins, reproducing the stacking behavior players know.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoostRestore {
    /// Multiplier to restore when this boost expires
    pub restore_to: Fixed,
    /// Remaining ticks until the restore fires
    pub ticks_remaining: u32,
}

// =============================================================================
// MOVEMENT STATE
// =============================================================================

/// Movement state for one player.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MovementState {
    /// Resolved linear velocity, recomputed every tick
    pub velocity: FixedVec2,

    /// Current movement mode
    pub mode: MoveMode,

    /// Desired free-move direction (raw input, may be partial magnitude)
    pub move_input: FixedVec2,

    /// Last nonzero move direction (unit), used as the dash fallback
    pub facing: FixedVec2,

    /// Active dash direction (unit)
    pub dash_direction: FixedVec2,

    /// Ticks left in the current dash window
    pub dash_ticks_remaining: u32,

    /// Ticks until the next dash may start (0 = ready)
    pub dash_cooldown_ticks: u32,

    /// Transient dash speed multiplier (default 1.0)
    pub dash_speed_multiplier: Fixed,

    /// Scheduled multiplier restores, one per active boost
    pub boost_restores: Vec<BoostRestore>,

    /// Active push direction (unit)
    pub push_direction: FixedVec2,

    /// Active push speed (never negative)
    pub push_speed: Fixed,

    /// Ticks left in the current push window
    pub push_ticks_remaining: u32,

    /// Shield window (while > 0, pushes are rejected)
    pub shield_ticks_remaining: u32,
}

impl Default for MovementState {
    fn default() -> Self {
        Self::new()
    }
}

impl MovementState {
    /// Create movement state at rest, facing right.
    pub fn new() -> Self {
        Self {
            velocity: FixedVec2::ZERO,
            mode: MoveMode::Free,
            move_input: FixedVec2::ZERO,
            facing: FixedVec2::RIGHT,
            dash_direction: FixedVec2::ZERO,
            dash_ticks_remaining: 0,
            dash_cooldown_ticks: 0,
            dash_speed_multiplier: FIXED_ONE,
            boost_restores: Vec::new(),
            push_direction: FixedVec2::ZERO,
            push_speed: 0,
            push_ticks_remaining: 0,
            shield_ticks_remaining: 0,
        }
    }

    /// Is the shield window active?
    #[inline]
    pub fn is_shielded(&self) -> bool {
        self.shield_ticks_remaining > 0
    }

    /// Is a dash in progress?
    #[inline]
    pub fn is_dashing(&self) -> bool {
        self.mode == MoveMode::Dashing
    }

    /// Is a push in progress?
    #[inline]
    pub fn is_pushed(&self) -> bool {
        self.mode == MoveMode::Pushed
    }

    /// Is the dash off cooldown?
    #[inline]
    pub fn dash_ready(&self) -> bool {
        self.dash_cooldown_ticks == 0
    }

    /// Set the desired free-move direction.
    ///
    /// Always recorded; only resolved into velocity while mode is Free.
    /// Nonzero input also updates facing.
    pub fn set_move_input(&mut self, input: FixedVec2) {
        self.move_input = input;
        if input.length_squared() > 0 {
            self.facing = input.normalize();
        }
    }

    /// Try to start a dash in the given direction.
    ///
    /// Rejected (not queued) while on cooldown, already dashing, or being
    /// pushed. A zero direction is rejected too. Returns whether the dash
    /// started.
    pub fn request_dash(&mut self, direction: FixedVec2) -> bool {
        if self.mode != MoveMode::Free {
            return false;
        }
        if !self.dash_ready() {
            return false;
        }
        if direction.length_squared() == 0 {
            return false;
        }

        self.mode = MoveMode::Dashing;
        self.dash_direction = direction.normalize();
        self.dash_ticks_remaining = DASH_DURATION_TICKS;
        self.dash_cooldown_ticks = DASH_COOLDOWN_TICKS;
        self.facing = self.dash_direction;
        true
    }

    /// Apply an external push.
    ///
    /// A shield rejects the push entirely; an active push wins over a new
    /// one. Otherwise any active dash is cancelled and the player is
    /// forced into Pushed mode for `duration_ticks`.
    pub fn apply_push(&mut self, direction: FixedVec2, force: Fixed, duration_ticks: u32) -> PushOutcome {
        if self.is_shielded() {
            return PushOutcome::Shielded;
        }
        if self.mode == MoveMode::Pushed {
            return PushOutcome::AlreadyPushed;
        }

        // Cancel any active dash
        self.dash_ticks_remaining = 0;
        self.dash_direction = FixedVec2::ZERO;

        self.mode = MoveMode::Pushed;
        self.push_direction = direction.normalize();
        self.push_speed = fixed_max(force, 0);
        self.push_ticks_remaining = duration_ticks;
        PushOutcome::Applied
    }

    /// Arm (or re-arm) the shield window.
    ///
    /// Re-arming sets the window to the new duration; it does not stack.
    pub fn activate_shield(&mut self, duration_ticks: u32) {
        self.shield_ticks_remaining = duration_ticks;
    }

    /// Apply a dash speed boost.
    ///
    /// The current multiplier is captured for restore at expiry; see
    /// [`BoostRestore`] for the overlap rule.
    pub fn apply_boost(&mut self, multiplier: Fixed, duration_ticks: u32) {
        let restore_to = self.dash_speed_multiplier;
        self.dash_speed_multiplier = fixed_mul(self.dash_speed_multiplier, fixed_max(multiplier, 0));
        self.boost_restores.push(BoostRestore {
            restore_to,
            ticks_remaining: duration_ticks,
        });
    }

    /// Stop all motion and clear dash/push state.
    ///
    /// Used on respawn and teleport. Shield, cooldown and boosts are kept.
    pub fn halt(&mut self) {
        self.velocity = FixedVec2::ZERO;
        self.mode = MoveMode::Free;
        self.move_input = FixedVec2::ZERO;
        self.dash_direction = FixedVec2::ZERO;
        self.dash_ticks_remaining = 0;
        self.push_direction = FixedVec2::ZERO;
        self.push_speed = 0;
        self.push_ticks_remaining = 0;
    }

    /// Advance timers and recompute the resolved velocity.
    ///
    /// Called exactly once per simulation tick. Mode timers expire when
    /// their counter reaches zero, so a dash or push window of N ticks
    /// drives the velocity for exactly N ticks.
    pub fn step(&mut self) {
        // Mode windows
        match self.mode {
            MoveMode::Dashing => {
                if self.dash_ticks_remaining == 0 {
                    self.mode = MoveMode::Free;
                    self.dash_direction = FixedVec2::ZERO;
                } else {
                    self.dash_ticks_remaining -= 1;
                }
            }
            MoveMode::Pushed => {
                if self.push_ticks_remaining == 0 {
                    self.mode = MoveMode::Free;
                    self.push_direction = FixedVec2::ZERO;
                    self.push_speed = 0;
                } else {
                    self.push_ticks_remaining -= 1;
                }
            }
            MoveMode::Free => {}
        }

        // Plain countdown timers
        if self.dash_cooldown_ticks > 0 {
            self.dash_cooldown_ticks -= 1;
        }
        if self.shield_ticks_remaining > 0 {
            self.shield_ticks_remaining -= 1;
        }

        // Boost restores fire in application order, so with overlapping
        // boosts the last restore to fire wins.
        let mut i = 0;
        while i < self.boost_restores.len() {
            self.boost_restores[i].ticks_remaining =
                self.boost_restores[i].ticks_remaining.saturating_sub(1);
            if self.boost_restores[i].ticks_remaining == 0 {
                let restore = self.boost_restores.remove(i);
                self.dash_speed_multiplier = restore.restore_to;
            } else {
                i += 1;
            }
        }

        // Velocity resolution: Dashing > Pushed > Free
        self.velocity = match self.mode {
            MoveMode::Dashing => {
                let speed = fixed_mul(DASH_SPEED, self.dash_speed_multiplier);
                self.dash_direction.scale(speed)
            }
            MoveMode::Pushed => self.push_direction.scale(self.push_speed),
            MoveMode::Free => {
                let len_sq = self.move_input.length_squared();
                if len_sq > FIXED_ONE {
                    // Diagonal - normalize then scale to prevent faster
                    // diagonal movement
                    self.move_input.normalize().scale(MOVE_SPEED)
                } else if len_sq > 0 {
                    // Partial stick deflection scales speed
                    self.move_input.scale(MOVE_SPEED)
                } else {
                    FixedVec2::ZERO
                }
            }
        };
    }

    /// Hash this movement state for verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_vec2(self.velocity);
        hasher.update_u8(self.mode as u8);
        hasher.update_vec2(self.facing);
        hasher.update_vec2(self.dash_direction);
        hasher.update_u32(self.dash_ticks_remaining);
        hasher.update_u32(self.dash_cooldown_ticks);
        hasher.update_fixed(self.dash_speed_multiplier);
        for restore in &self.boost_restores {
            hasher.update_fixed(restore.restore_to);
            hasher.update_u32(restore.ticks_remaining);
        }
        hasher.update_vec2(self.push_direction);
        hasher.update_fixed(self.push_speed);
        hasher.update_u32(self.push_ticks_remaining);
        hasher.update_u32(self.shield_ticks_remaining);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::{to_fixed, DASH_PUSH_FORCE, DASH_PUSH_DURATION_TICKS};

    fn dashing_state() -> MovementState {
        let mut m = MovementState::new();
        assert!(m.request_dash(FixedVec2::RIGHT));
        m
    }

    #[test]
    fn test_free_movement_velocity() {
        let mut m = MovementState::new();
        m.set_move_input(FixedVec2::RIGHT);
        m.step();

        assert_eq!(m.mode, MoveMode::Free);
        assert_eq!(m.velocity.x, MOVE_SPEED);
        assert_eq!(m.velocity.y, 0);
    }

    #[test]
    fn test_partial_stick_scales_speed() {
        let mut m = MovementState::new();
        m.set_move_input(FixedVec2::new(to_fixed(0.5), 0));
        m.step();

        assert_eq!(m.velocity.x, MOVE_SPEED / 2);
    }

    #[test]
    fn test_diagonal_is_normalized() {
        let mut m = MovementState::new();
        m.set_move_input(FixedVec2::new(FIXED_ONE, FIXED_ONE));
        m.step();

        // Length should be ~MOVE_SPEED, not MOVE_SPEED * sqrt(2)
        let speed = m.velocity.length();
        assert!((speed - MOVE_SPEED).abs() < to_fixed(0.05));
    }

    #[test]
    fn test_facing_tracks_last_nonzero_input() {
        let mut m = MovementState::new();
        assert_eq!(m.facing, FixedVec2::RIGHT); // default

        m.set_move_input(FixedVec2::UP);
        assert_eq!(m.facing, FixedVec2::UP);

        // Releasing the stick keeps the old facing
        m.set_move_input(FixedVec2::ZERO);
        assert_eq!(m.facing, FixedVec2::UP);
    }

    #[test]
    fn test_dash_lasts_exact_duration() {
        let mut m = dashing_state();

        for _ in 0..DASH_DURATION_TICKS {
            m.step();
            assert_eq!(m.mode, MoveMode::Dashing);
            assert_eq!(m.velocity.x, DASH_SPEED);
        }

        // One more step reverts to Free
        m.step();
        assert_eq!(m.mode, MoveMode::Free);
        assert_eq!(m.velocity, FixedVec2::ZERO);
    }

    #[test]
    fn test_dash_cooldown_rejects_second_dash() {
        let mut m = dashing_state();

        // Let the dash finish
        for _ in 0..=DASH_DURATION_TICKS {
            m.step();
        }
        assert_eq!(m.mode, MoveMode::Free);

        // Still on cooldown
        assert!(!m.request_dash(FixedVec2::UP));

        // Run out the rest of the cooldown
        while m.dash_cooldown_ticks > 0 {
            m.step();
        }
        assert!(m.request_dash(FixedVec2::UP));
    }

    #[test]
    fn test_dash_rejected_while_pushed() {
        let mut m = MovementState::new();
        assert_eq!(
            m.apply_push(FixedVec2::LEFT, DASH_PUSH_FORCE, DASH_PUSH_DURATION_TICKS),
            PushOutcome::Applied
        );

        // Dash request during a push is dropped, not queued
        assert!(!m.request_dash(FixedVec2::RIGHT));
        assert_eq!(m.mode, MoveMode::Pushed);

        m.step();
        assert_eq!(m.mode, MoveMode::Pushed);
    }

    #[test]
    fn test_push_cancels_dash() {
        let mut m = dashing_state();
        m.step();
        assert_eq!(m.mode, MoveMode::Dashing);

        let outcome = m.apply_push(FixedVec2::LEFT, DASH_PUSH_FORCE, DASH_PUSH_DURATION_TICKS);
        assert_eq!(outcome, PushOutcome::Applied);
        assert_eq!(m.mode, MoveMode::Pushed);
        assert_eq!(m.dash_ticks_remaining, 0);
        assert_eq!(m.dash_direction, FixedVec2::ZERO);
    }

    #[test]
    fn test_push_window_exact_duration_then_free() {
        let mut m = dashing_state();
        m.step(); // mid-dash

        m.apply_push(FixedVec2::LEFT, DASH_PUSH_FORCE, DASH_PUSH_DURATION_TICKS);

        for _ in 0..DASH_PUSH_DURATION_TICKS {
            m.step();
            assert_eq!(m.mode, MoveMode::Pushed);
            assert_eq!(m.velocity.x, -DASH_PUSH_FORCE);
            assert_eq!(m.velocity.y, 0);
        }

        // Window over: back to Free with no residual velocity
        m.step();
        assert_eq!(m.mode, MoveMode::Free);
        assert_eq!(m.velocity, FixedVec2::ZERO);
        assert_eq!(m.push_speed, 0);
    }

    #[test]
    fn test_second_push_ignored_while_pushed() {
        let mut m = MovementState::new();
        m.apply_push(FixedVec2::LEFT, DASH_PUSH_FORCE, DASH_PUSH_DURATION_TICKS);

        let outcome = m.apply_push(FixedVec2::RIGHT, to_fixed(99.0), 100);
        assert_eq!(outcome, PushOutcome::AlreadyPushed);

        // First push still in effect
        assert_eq!(m.push_direction, FixedVec2::LEFT);
        assert_eq!(m.push_speed, DASH_PUSH_FORCE);
    }

    #[test]
    fn test_shield_blocks_push_completely() {
        let mut m = MovementState::new();
        m.set_move_input(FixedVec2::RIGHT);
        m.activate_shield(180);

        let outcome = m.apply_push(FixedVec2::LEFT, DASH_PUSH_FORCE, DASH_PUSH_DURATION_TICKS);
        assert_eq!(outcome, PushOutcome::Shielded);
        assert_eq!(m.mode, MoveMode::Free);

        // Velocity unaffected: still free movement
        m.step();
        assert_eq!(m.velocity.x, MOVE_SPEED);
    }

    #[test]
    fn test_shield_rearms_not_stacks() {
        let mut m = MovementState::new();
        m.activate_shield(180);

        for _ in 0..100 {
            m.step();
        }
        assert_eq!(m.shield_ticks_remaining, 80);

        // Re-arm resets the window to the new duration
        m.activate_shield(180);
        assert_eq!(m.shield_ticks_remaining, 180);
    }

    #[test]
    fn test_shield_expires() {
        let mut m = MovementState::new();
        m.activate_shield(10);

        for _ in 0..10 {
            assert!(m.is_shielded());
            m.step();
        }
        assert!(!m.is_shielded());

        // Pushes land again
        assert_eq!(
            m.apply_push(FixedVec2::LEFT, DASH_PUSH_FORCE, DASH_PUSH_DURATION_TICKS),
            PushOutcome::Applied
        );
    }

    #[test]
    fn test_boost_multiplies_and_restores() {
        let mut m = MovementState::new();
        m.apply_boost(to_fixed(2.0), 5);
        assert_eq!(m.dash_speed_multiplier, to_fixed(2.0));

        for _ in 0..5 {
            m.step();
        }

        // Restored exactly to 1.0, no drift
        assert_eq!(m.dash_speed_multiplier, FIXED_ONE);
        assert!(m.boost_restores.is_empty());
    }

    #[test]
    fn test_boosted_dash_speed() {
        let mut m = MovementState::new();
        m.apply_boost(to_fixed(2.0), 300);
        assert!(m.request_dash(FixedVec2::RIGHT));
        m.step();

        assert_eq!(m.velocity.x, fixed_mul(DASH_SPEED, to_fixed(2.0)));
    }

    #[test]
    fn test_overlapping_boosts_last_restore_wins() {
        let mut m = MovementState::new();

        // First boost captures 1.0, second captures 2.0
        m.apply_boost(to_fixed(2.0), 5);
        m.apply_boost(to_fixed(2.0), 10);
        assert_eq!(m.dash_speed_multiplier, to_fixed(4.0));

        // First restore fires: back to its captured 1.0
        for _ in 0..5 {
            m.step();
        }
        assert_eq!(m.dash_speed_multiplier, FIXED_ONE);

        // Second restore fires last and wins with its captured 2.0
        for _ in 0..5 {
            m.step();
        }
        assert_eq!(m.dash_speed_multiplier, to_fixed(2.0));
    }

    #[test]
    fn test_halt_clears_motion_keeps_shield() {
        let mut m = dashing_state();
        m.activate_shield(100);
        m.step();

        m.halt();
        assert_eq!(m.mode, MoveMode::Free);
        assert_eq!(m.velocity, FixedVec2::ZERO);
        assert_eq!(m.dash_ticks_remaining, 0);
        assert_eq!(m.push_ticks_remaining, 0);
        assert!(m.is_shielded());
        // Cooldown survives so a teleport cannot reset the dash timer
        assert!(m.dash_cooldown_ticks > 0);
    }

    #[test]
    fn test_negative_force_clamped() {
        let mut m = MovementState::new();
        m.apply_push(FixedVec2::LEFT, to_fixed(-5.0), 10);
        assert_eq!(m.push_speed, 0);
        assert!(m.push_speed >= 0);
    }
}
