//! # Dash Arena Game Server
//!
//! Deterministic simulation for Dash Arena, a 2-4 player knockout game:
//! dash into your opponents to shove them off a floating platform, and
//! be the last player standing.
//!
//! The crate splits into three layers:
//!
//! ```text
//! core/      deterministic primitives: Q16.16 math, 2D vectors,
//!            Xorshift128+ rng, SHA-256 state hashing
//! game/      the simulation itself: input buffers, movement, dash
//!            pushes, lives and falls, pickups, the tick loop
//! network/   wire protocol and session management; the only layer
//!            allowed to touch clocks and tasks
//! ```
//!
//! ## Determinism
//!
//! Everything under `core/` and `game/` is bit-reproducible: Q16.16
//! arithmetic instead of floats, BTreeMap instead of HashMap, no clock
//! reads, and one seeded Xorshift128+ stream. Two instances fed the
//! same seed and inputs step through identical states on any platform,
//! which is what the state hashes let either side verify.
//!
//! ## Push Authority
//!
//! A match runs in one of two authority modes. Under
//! [`AuthorityMode::Authoritative`](game::state::AuthorityMode) the
//! simulation applies dash pushes to their targets directly. Under
//! `Remote`, each push becomes a request that must be confirmed by the
//! target's owning instance before it lands, with a bounded timeout so
//! an unanswered request cannot stall the match.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// The types most callers need, lifted to the crate root
pub use core::fixed::{Fixed, FIXED_ONE, FIXED_HALF, FIXED_SCALE};
pub use core::vec2::FixedVec2;
pub use core::rng::DeterministicRng;
pub use game::input::{InputFrame, InputDelta, PlayerInputBuffer};
pub use game::state::{MatchState, PlayerState, PlayerId};

/// Version string baked in from the manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulated ticks per second.
pub const TICK_RATE: u32 = 60;
