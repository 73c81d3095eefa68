//! Digests over simulation state.
//!
//! sha256 digests over simulation state, taken in a fixed field order.
//! Two instances that disagree on a digest have desynced; a replay
//! that reproduces the recorded digest is bit-faithful. Domain tags
//! keep state digests and input-recording digests from ever colliding.

use sha2::{Sha256, Digest};
use super::fixed::Fixed;
use super::vec2::FixedVec2;

/// A 32-byte sha256 digest.
pub type StateHash = [u8; 32];

/// Incremental hasher with helpers for the simulation's field types.
///
/// Callers feed fields in a fixed order; the order is part of the
/// digest definition.
pub struct StateHasher {
    hasher: Sha256,
}

impl StateHasher {
    /// Open a hasher under a domain tag.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Hasher for match state digests.
    pub fn for_match_state() -> Self {
        Self::new(b"DASH_ARENA_STATE_V1")
    }

    /// Hasher for input recording digests.
    pub fn for_input_buffer() -> Self {
        Self::new(b"DASH_ARENA_INPUTS_V1")
    }

    /// Feed raw bytes.
    #[inline]
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Feed a u8.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Feed a u32, little-endian.
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Feed a u64, little-endian.
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Feed a fixed-point value, little-endian.
    #[inline]
    pub fn update_fixed(&mut self, value: Fixed) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Feed a vector, x before y.
    #[inline]
    pub fn update_vec2(&mut self, value: FixedVec2) {
        self.update_fixed(value.x);
        self.update_fixed(value.y);
    }

    /// Feed a bool as one byte.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Feed a 16-byte identifier.
    #[inline]
    pub fn update_uuid(&mut self, uuid: &[u8; 16]) {
        self.hasher.update(uuid);
    }

    /// Finish and return the digest.
    pub fn finalize(self) -> StateHash {
        self.hasher.finalize().into()
    }
}

/// Compute a match-state digest.
///
/// Tick and seed lead the digest; the closure feeds the rest of the
/// state. `MatchState::compute_hash` drives this.
pub fn compute_state_hash<F>(tick: u32, rng_seed: u64, add_state: F) -> StateHash
where
    F: FnOnce(&mut StateHasher),
{
    let mut hasher = StateHasher::for_match_state();

    hasher.update_u32(tick);
    hasher.update_u64(rng_seed);
    add_state(&mut hasher);

    hasher.finalize()
}

// =============================================================================
// TESTS
// =============================================================================
