//! Sessions and the wire protocol.
//!
//! The one layer that may touch clocks, channels and tasks. Game rules
//! never live here; sessions feed inputs into `game/` and fan the
//! results back out.

pub mod protocol;
pub mod session;

pub use protocol::{
    ClientMessage, ServerMessage, JoinRequest, GameInput,
    GameStateUpdate, MatchEvent, MatchEndInfo, PushRequestMsg,
};
pub use session::{MatchSession, SessionConfig, SessionId, SessionState, SessionManager};
