//! The match simulation.
//!
//! Everything here is deterministic; `tick` drives the rest.
//!
//! - `input`: stick normalization and recorded input buffers
//! - `state`: match and player state, pickups
//! - `movement`: per-player movement resolution (free/dash/push)
//! - `collision`: dash contact detection
//! - `dash`: dash activation and the push request pipeline
//! - `lifecycle`: lives, falls, respawns, eliminations
//! - `powerup`: pickup spawning and power-up effects
//! - `standings`: survivor counting and the win decision
//! - `tick`: the simulation step
//! - `events`: ordered events for fanout and replay

pub mod input;
pub mod state;
pub mod movement;
pub mod collision;
pub mod dash;
pub mod lifecycle;
pub mod powerup;
pub mod standings;
pub mod tick;
pub mod events;

// Shortcuts for the types callers reach for most
pub use input::{InputFrame, InputDelta, PlayerInputBuffer, MOVE_LUT};
pub use state::{MatchState, PlayerState, PlayerId, MatchPhase, AuthorityMode};
pub use movement::{MovementState, MoveMode, PushOutcome};
pub use tick::{TickResult, MatchConfig};
pub use events::GameEvent;
