//! Seeded randomness for the simulation.
//!
//! Xorshift128+ seeded through SplitMix64. Every participant seeds it
//! from shared match data, so pickup schedules and spawn rolls agree
//! across instances without any extra synchronization, and a replay
//! can regenerate the exact same rolls.

use serde::{Serialize, Deserialize};
use sha2::{Sha256, Digest};

use super::fixed::Fixed;
use super::vec2::FixedVec2;

/// Deterministic PRNG.
///
/// The same seed yields the same sequence on every platform. State is
/// two u64 words, cloned along with the match snapshot it lives in.
///
/// # Example
///
/// ```
/// use dash_arena::core::rng::DeterministicRng;
///
/// let mut rng = DeterministicRng::new(777);
/// assert_eq!(rng.next_u64(), 2371014572606862990);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Seed the generator.
    ///
    /// SplitMix64 expands the seed into the initial state, so even
    /// near-identical seeds diverge immediately.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // Xorshift128+ never recovers from an all-zero state
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// Seed from the match identity.
    ///
    /// See [`derive_match_seed`] for the derivation.
    pub fn from_match_params(match_id: &[u8; 16], player_ids: &[[u8; 16]]) -> Self {
        let seed = derive_match_seed(match_id, player_ids);
        Self::new(seed)
    }

    /// Next 64-bit value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

    /// Integer in `[0, max)`.
    ///
    /// Plain modulo; the bias is negligible for the small ranges the
    /// game rolls (spawn weights, intervals).
    #[inline]
    pub fn next_int(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        (self.next_u64() % max as u64) as u32
    }

    /// Integer in `[min, max]`, inclusive on both ends.
    #[inline]
    pub fn next_int_range(&mut self, min: i32, max: i32) -> i32 {
        if min >= max {
            return min;
        }
        let range = (max - min + 1) as u32;
        min + self.next_int(range) as i32
    }

    /// Fixed-point value in `[0, max)`.
    #[inline]
    pub fn next_fixed(&mut self, max: Fixed) -> Fixed {
        if max <= 0 {
            return 0;
        }
        // Upper 32 bits of the draw, scaled: (raw * max) / 2^32
        let raw = (self.next_u64() >> 32) as u32;
        ((raw as i64 * max as i64) >> 32) as Fixed
    }

    /// Fixed-point value in `[min, max)`.
    #[inline]
    pub fn next_fixed_range(&mut self, min: Fixed, max: Fixed) -> Fixed {
        if min >= max {
            return min;
        }
        let range = max.wrapping_sub(min);
        min.wrapping_add(self.next_fixed(range))
    }

    /// Random position inside a rectangle centered on the origin.
    ///
    /// Pickup placement draws from this; x is always drawn before y.
    #[inline]
    pub fn random_position_in_rect(&mut self, half_width: Fixed, half_height: Fixed) -> FixedVec2 {
        let x = self.next_fixed_range(-half_width, half_width);
        let y = self.next_fixed_range(-half_height, half_height);
        FixedVec2::new(x, y)
    }

    /// Current internal state, for checkpointing.
    pub fn state(&self) -> [u64; 2] {
        self.state
    }

    /// Restore a checkpointed state.
    pub fn set_state(&mut self, state: [u64; 2]) {
        self.state = state;
    }
}

/// SplitMix64 step, used only for seeding.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Derive the shared match seed.
///
/// sha256 over a domain tag, the match ID and every player ID. The
/// caller passes the player IDs in sorted order; the roster map
/// iterates sorted, so this falls out naturally. The first 8 bytes of
/// the digest become the seed.
pub fn derive_match_seed(match_id: &[u8; 16], player_ids: &[[u8; 16]]) -> u64 {
    let mut hasher = Sha256::new();

    hasher.update(b"DASH_ARENA_SEED_V1");
    hasher.update(match_id);
    for pid in player_ids {
        hasher.update(pid);
    }

    let hash = hasher.finalize();
    u64::from_le_bytes(hash[0..8].try_into().unwrap())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::to_fixed;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = DeterministicRng::new(0xDA5F);
        let mut b = DeterministicRng::new(0xDA5F);

        for _ in 0..500 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn test_different_seeds_diverge() {
        let mut a = DeterministicRng::new(1);
        let mut b = DeterministicRng::new(2);
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn test_known_values() {
        // Pinned outputs. A change here breaks every recorded replay.
        let mut rng = DeterministicRng::new(1337);
        assert_eq!(rng.next_u64(), 9378695639948371412);
        assert_eq!(rng.next_u64(), 15190913760653495417);
        assert_eq!(rng.next_u64(), 2485947789020950470);
    }

    #[test]
    fn test_next_int_bounds() {
        let mut rng = DeterministicRng::new(31337);

        for _ in 0..500 {
            assert!(rng.next_int(17) < 17);
        }
        assert_eq!(rng.next_int(0), 0);
        assert_eq!(rng.next_int(1), 0);
    }

    #[test]
    fn test_next_int_range_inclusive() {
        let mut rng = DeterministicRng::new(8080);
        let mut hit_min = false;
        let mut hit_max = false;

        for _ in 0..2000 {
            let val = rng.next_int_range(-3, 3);
            assert!((-3..=3).contains(&val));
            hit_min |= val == -3;
            hit_max |= val == 3;
        }
        // Both endpoints are reachable
        assert!(hit_min && hit_max);

        assert_eq!(rng.next_int_range(9, 9), 9);
        assert_eq!(rng.next_int_range(9, 4), 9);
    }

    #[test]
    fn test_next_fixed_bounds() {
        let mut rng = DeterministicRng::new(606);
        let max = to_fixed(12.5);

        for _ in 0..500 {
            let val = rng.next_fixed(max);
            assert!(val >= 0 && val < max);
        }
        assert_eq!(rng.next_fixed(0), 0);
        assert_eq!(rng.next_fixed(-to_fixed(1.0)), 0);
    }

    #[test]
    fn test_random_position_in_rect() {
        let mut rng = DeterministicRng::new(424242);
        let half_w = to_fixed(8.0);
        let half_h = to_fixed(4.0);

        for _ in 0..200 {
            let pos = rng.random_position_in_rect(half_w, half_h);
            assert!(pos.x >= -half_w && pos.x < half_w);
            assert!(pos.y >= -half_h && pos.y < half_h);
        }
    }

    #[test]
    fn test_derive_match_seed() {
        let match_id = [7u8; 16];
        let roster = [[1u8; 16], [9u8; 16]];

        // Stable for the same identity
        assert_eq!(
            derive_match_seed(&match_id, &roster),
            derive_match_seed(&match_id, &roster),
        );

        // Any change to the identity moves the seed
        assert_ne!(
            derive_match_seed(&match_id, &roster),
            derive_match_seed(&[8u8; 16], &roster),
        );
        assert_ne!(
            derive_match_seed(&match_id, &roster),
            derive_match_seed(&match_id, &[[1u8; 16]]),
        );
    }

    #[test]
    fn test_state_checkpoint() {
        let mut rng = DeterministicRng::new(2468);
        for _ in 0..25 {
            rng.next_u64();
        }

        let checkpoint = rng.state();
        let replayed: Vec<u64> = (0..8).map(|_| rng.next_u64()).collect();

        rng.set_state(checkpoint);
        for expected in replayed {
            assert_eq!(rng.next_u64(), expected);
        }
    }
}
