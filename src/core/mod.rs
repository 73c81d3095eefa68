//! Primitives the simulation is built on.
//!
//! Fixed-point math, vectors, the rng and the state hasher all behave
//! bit-for-bit the same across platforms; replay and desync detection
//! depend on nothing else.

pub mod fixed;
pub mod vec2;
pub mod rng;
pub mod hash;

pub use fixed::{Fixed, FIXED_ONE, FIXED_HALF, FIXED_SCALE};
pub use vec2::FixedVec2;
pub use rng::DeterministicRng;
pub use hash::compute_state_hash;
