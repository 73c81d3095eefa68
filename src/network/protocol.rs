//! Wire messages between clients and the server.
//!
//! Envelopes ([`ClientMessage`]/[`ServerMessage`]) are tagged JSON so a
//! session can be followed with a text logger; the flat, hot-path
//! structs also serialize through `bincode` where a binary channel is
//! available. Ids travel as hex strings inside JSON envelopes and as
//! raw 16-byte arrays in flat structs.

use serde::{Serialize, Deserialize};

use crate::core::vec2::FixedVec2;
use crate::game::dash::PushRejectReason;
use crate::game::events::{GameEvent, GameEventData};
use crate::game::input::InputFrame;
use crate::game::state::{MatchState, PlayerState};

/// Decode a 16-byte id sent as a hex string.
fn hex_id(s: &str) -> Option<[u8; 16]> {
    hex::decode(s).ok()?.try_into().ok()
}

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Envelope for everything a client sends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Take a seat in the lobby.
    Join(JoinRequest),

    /// Input for the current tick.
    Input(GameInput),

    /// Declare readiness to start.
    Ready,

    /// Ask the server to push another player (remote dash contact).
    RequestApplyPush(PushRequestMsg),

    /// Accept a push the server forwarded for confirmation.
    ConfirmApplyPush { request_id: u32 },

    /// Refuse a push the server forwarded for confirmation.
    RejectApplyPush { request_id: u32 },

    /// Ask for a full state snapshot (reconnect resync).
    SyncRequest,

    /// Latency probe.
    Ping { timestamp: u64 },

    /// Give up the seat.
    Leave,
}

/// Request to take a seat in the lobby.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    /// Player id as lowercase hex (JSON has no byte-array literal).
    pub player_id: String,
    /// Name shown to other players; the server assigns one if empty.
    pub display_name: Option<String>,
    /// Client build, checked for wire compatibility.
    pub client_version: String,
}

impl JoinRequest {
    /// Decode the hex player id.
    pub fn player_id_bytes(&self) -> Option<[u8; 16]> {
        hex_id(&self.player_id)
    }
}

/// One tick of input from a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameInput {
    /// Tick the client sampled this input for.
    pub tick: u32,
    /// Stick X, -127..=127.
    pub move_x: i8,
    /// Stick Y, -127..=127.
    pub move_y: i8,
    /// Trigger bits, same layout as [`InputFrame::flags`].
    pub flags: u8,
    /// Dash swipe hint X, 0 when absent.
    pub dash_x: i8,
    /// Dash swipe hint Y, 0 when absent.
    pub dash_y: i8,
    /// Client clock for RTT estimation.
    pub timestamp: u64,
}

impl GameInput {
    /// Strip the transport fields down to a simulation frame.
    pub fn to_input_frame(&self) -> InputFrame {
        InputFrame {
            move_x: self.move_x,
            move_y: self.move_y,
            flags: self.flags,
            dash_x: self.dash_x,
            dash_y: self.dash_y,
        }
    }
}

/// Push request from a remote instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushRequestMsg {
    /// Client-chosen request identifier, echoed in the reply.
    pub request_id: u32,
    /// Target player as lowercase hex.
    pub target_id: String,
    /// Unit push direction (Fixed as i32).
    pub direction: [i32; 2],
    /// Push speed (Fixed as i32).
    pub force: i32,
    /// Push window in ticks.
    pub duration_ticks: u32,
}

impl PushRequestMsg {
    /// Decode the hex target id.
    pub fn target_id_bytes(&self) -> Option<[u8; 16]> {
        hex_id(&self.target_id)
    }

    /// Direction as a fixed-point vector.
    pub fn direction_vec(&self) -> FixedVec2 {
        FixedVec2::new(self.direction[0], self.direction[1])
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Envelope for everything the server sends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Outcome of a join attempt.
    JoinResult(JoinResult),

    /// Lobby roster changed.
    Lobby(LobbyUpdate),

    /// Match is starting; everything needed to init a client sim.
    MatchStart(MatchStartInfo),

    /// State snapshot.
    State(GameStateUpdate),

    /// Something happened in the simulation.
    Event(MatchEvent),

    /// Match over; final standings inside.
    MatchEnd(MatchEndInfo),

    /// A requested push was applied.
    PushConfirmed { request_id: u32 },

    /// A requested push was refused.
    PushRejected { request_id: u32, reason: PushRejectReason },

    /// Input received; echoes the client tick next to the server's.
    InputAck { tick: u32, server_tick: u32 },

    /// Latency probe reply.
    Pong { timestamp: u64, server_time: u64 },

    /// Request failed.
    Error(ServerError),

    /// Server is going away.
    Shutdown { reason: String },
}

/// Outcome of a join attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinResult {
    /// Whether the seat was taken.
    pub success: bool,
    /// Seat index when joined.
    pub player_index: Option<u32>,
    /// Refusal reason when not.
    pub error: Option<String>,
    /// Server build.
    pub server_version: String,
}

/// Lobby roster update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyUpdate {
    /// Players currently in the lobby.
    pub players: Vec<LobbyPlayer>,
    /// Players needed before the match can start.
    pub min_players: u32,
    /// Lobby capacity.
    pub max_players: u32,
}

/// One lobby entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyPlayer {
    /// Player identifier.
    pub player_id: [u8; 16],
    /// Display name.
    pub display_name: String,
    /// Ready flag.
    pub ready: bool,
}

/// Everything a client needs to initialize its local simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchStartInfo {
    /// Id of the match being started.
    pub match_id: [u8; 16],
    /// Seed the whole match runs on, derived from id and roster.
    pub rng_seed: u64,
    /// Tick counter value when the countdown begins.
    pub start_tick: u32,
    /// Countdown length in ticks.
    pub countdown_ticks: u32,
    /// The seated roster with spawn data.
    pub players: Vec<InitialPlayerInfo>,
}

/// Roster entry in the start message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitialPlayerInfo {
    /// Who holds this seat.
    pub player_id: [u8; 16],
    /// Name to render for them.
    pub display_name: String,
    /// Join index (assigns spawn corner).
    pub player_index: u32,
    /// Spawn position.
    pub position: [i32; 2],
    /// Starting lives.
    pub lives: u32,
}

/// Snapshot of the visible simulation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStateUpdate {
    /// Tick the snapshot was taken at.
    pub tick: u32,
    /// Every seated player's visible state.
    pub players: Vec<PlayerStateUpdate>,
    /// Uncollected pickups, omitted when the arena is empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pickups: Option<Vec<PickupUpdate>>,
    /// Digest of the full simulation state at this tick.
    pub state_hash: [u8; 32],
}

impl GameStateUpdate {
    /// Build a state update from the current match state.
    pub fn from_state(state: &MatchState) -> Self {
        let players = state
            .players
            .values()
            .map(PlayerStateUpdate::from_player)
            .collect();

        let pickups: Vec<PickupUpdate> = state
            .pickups
            .values()
            .filter(|p| !p.collected)
            .map(|p| PickupUpdate {
                id: p.id,
                kind: p.kind as u8,
                position: [p.position.x, p.position.y],
            })
            .collect();

        Self {
            tick: state.tick,
            players,
            pickups: if pickups.is_empty() { None } else { Some(pickups) },
            state_hash: state.compute_hash(),
        }
    }
}

/// Per-player slice of a state update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerStateUpdate {
    /// Subject of this row.
    pub player_id: [u8; 16],
    /// Position, Fixed as i32.
    pub position: [i32; 2],
    /// Velocity, Fixed as i32.
    pub velocity: [i32; 2],
    /// Movement mode (0 free, 1 dashing, 2 pushed).
    pub mode: u8,
    /// Remaining lives.
    pub lives: u32,
    /// Is the player on the arena.
    pub active: bool,
    /// Eliminated for good.
    pub eliminated: bool,
    /// Post-respawn invincibility active.
    pub invulnerable: bool,
    /// Shield window active.
    pub shielded: bool,
    /// Ticks until the next dash is available.
    pub dash_cooldown_ticks: u32,
    /// Current dash speed multiplier (Fixed as i32).
    pub dash_speed_multiplier: i32,
}

impl PlayerStateUpdate {
    /// Build from a player state.
    pub fn from_player(player: &PlayerState) -> Self {
        Self {
            player_id: player.id.0,
            position: [player.position.x, player.position.y],
            velocity: [player.movement.velocity.x, player.movement.velocity.y],
            mode: player.movement.mode as u8,
            lives: player.life.lives,
            active: player.life.active,
            eliminated: player.life.eliminated,
            invulnerable: player.life.is_invulnerable(),
            shielded: player.movement.is_shielded(),
            dash_cooldown_ticks: player.movement.dash_cooldown_ticks,
            dash_speed_multiplier: player.movement.dash_speed_multiplier,
        }
    }
}

/// Pickup on the arena floor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupUpdate {
    /// Pickup identifier.
    pub id: u32,
    /// Kind discriminant, matching `PowerUpKind`.
    pub kind: u8,
    /// Arena position.
    pub position: [i32; 2],
}

/// Game events on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MatchEvent {
    /// Player entered the match.
    PlayerSpawned {
        tick: u32,
        player_id: [u8; 16],
        player_index: u32,
        position: [i32; 2],
    },

    /// Player's life count changed.
    PlayerLifeChanged {
        tick: u32,
        player_id: [u8; 16],
        player_index: u32,
        lives: u32,
    },

    /// Player ran out of lives.
    PlayerEliminated {
        tick: u32,
        player_id: [u8; 16],
        player_index: u32,
        placement: u32,
    },

    /// Player returned to their spawn point.
    PlayerRespawned {
        tick: u32,
        player_id: [u8; 16],
        position: [i32; 2],
    },

    /// Player started a dash.
    DashStarted {
        tick: u32,
        player_id: [u8; 16],
        direction: [i32; 2],
    },

    /// A push landed.
    PushApplied {
        tick: u32,
        source_id: [u8; 16],
        target_id: [u8; 16],
        direction: [i32; 2],
        force: i32,
    },

    /// A push was rejected by a shield.
    PushBlocked {
        tick: u32,
        source_id: [u8; 16],
        target_id: [u8; 16],
    },

    /// A forwarded push request timed out.
    PushRequestExpired {
        tick: u32,
        request_id: u32,
        target_id: [u8; 16],
    },

    /// A pickup appeared.
    PickupSpawned {
        tick: u32,
        pickup_id: u32,
        kind: u8,
        position: [i32; 2],
    },

    /// A player collected a pickup.
    PowerUpCollected {
        tick: u32,
        player_id: [u8; 16],
        pickup_id: u32,
        kind: u8,
    },

    /// Match decided with a winner.
    GameWon {
        tick: u32,
        winner_id: [u8; 16],
        player_index: u32,
    },

    /// Match decided with no survivors.
    GameDraw { tick: u32 },

    /// Whole seconds left before the match goes live.
    Countdown { seconds: u32 },

    /// Countdown finished, simulation is live.
    MatchStarted,
}

impl MatchEvent {
    /// Convert a simulation event for the wire.
    pub fn from_game_event(event: &GameEvent) -> Self {
        let tick = event.tick;
        match &event.data {
            GameEventData::PlayerSpawned { player_id, player_index, position } => {
                MatchEvent::PlayerSpawned {
                    tick,
                    player_id: player_id.0,
                    player_index: *player_index,
                    position: [position.x, position.y],
                }
            }
            GameEventData::PlayerLifeChanged { player_id, player_index, lives } => {
                MatchEvent::PlayerLifeChanged {
                    tick,
                    player_id: player_id.0,
                    player_index: *player_index,
                    lives: *lives,
                }
            }
            GameEventData::PlayerEliminated { player_id, player_index, placement } => {
                MatchEvent::PlayerEliminated {
                    tick,
                    player_id: player_id.0,
                    player_index: *player_index,
                    placement: *placement,
                }
            }
            GameEventData::PlayerRespawned { player_id, position } => {
                MatchEvent::PlayerRespawned {
                    tick,
                    player_id: player_id.0,
                    position: [position.x, position.y],
                }
            }
            GameEventData::DashStarted { player_id, direction } => {
                MatchEvent::DashStarted {
                    tick,
                    player_id: player_id.0,
                    direction: [direction.x, direction.y],
                }
            }
            GameEventData::PushApplied { source_id, target_id, direction, force } => {
                MatchEvent::PushApplied {
                    tick,
                    source_id: source_id.0,
                    target_id: target_id.0,
                    direction: [direction.x, direction.y],
                    force: *force,
                }
            }
            GameEventData::PushBlocked { source_id, target_id } => {
                MatchEvent::PushBlocked {
                    tick,
                    source_id: source_id.0,
                    target_id: target_id.0,
                }
            }
            GameEventData::PushRequestExpired { request_id, target_id } => {
                MatchEvent::PushRequestExpired {
                    tick,
                    request_id: *request_id,
                    target_id: target_id.0,
                }
            }
            GameEventData::PickupSpawned { pickup_id, kind, position } => {
                MatchEvent::PickupSpawned {
                    tick,
                    pickup_id: *pickup_id,
                    kind: *kind as u8,
                    position: [position.x, position.y],
                }
            }
            GameEventData::PowerUpCollected { player_id, pickup_id, kind } => {
                MatchEvent::PowerUpCollected {
                    tick,
                    player_id: player_id.0,
                    pickup_id: *pickup_id,
                    kind: *kind as u8,
                }
            }
            GameEventData::GameWon { winner_id, player_index } => {
                MatchEvent::GameWon {
                    tick,
                    winner_id: winner_id.0,
                    player_index: *player_index,
                }
            }
            GameEventData::GameDraw {} => MatchEvent::GameDraw { tick },
        }
    }
}

/// Final results of a match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchEndInfo {
    /// Id of the finished match.
    pub match_id: [u8; 16],
    /// Tick the decision landed on.
    pub end_tick: u32,
    /// Winner, absent on a draw.
    pub winner_id: Option<[u8; 16]>,
    /// Final placements, winner first.
    pub placements: Vec<PlacementInfo>,
    /// Digest of the final state.
    pub final_state_hash: [u8; 32],
}

/// One row of the final standings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementInfo {
    /// Who placed here.
    pub player_id: [u8; 16],
    /// Name to show in the standings.
    pub display_name: String,
    /// Standing, 1 for the winner.
    pub place: u32,
    /// Lives remaining at the end.
    pub lives: u32,
}

/// Failure report for a client request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerError {
    /// Machine-readable code.
    pub code: ErrorCode,
    /// Text for the player or the log.
    pub message: String,
}

/// Refusal categories carried in [`ServerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// No seat taken yet.
    NotJoined,
    /// Input failed validation.
    InvalidInput,
    /// No such match.
    MatchNotFound,
    /// A seat is already held elsewhere.
    AlreadyInMatch,
    /// The operation needs a seat in a match.
    NotInMatch,
    /// Lobby is full.
    MatchFull,
    /// Match already running.
    MatchInProgress,
    /// Too many requests.
    RateLimited,
    /// Client build incompatible with this server.
    VersionMismatch,
    /// Server-side failure.
    InternalError,
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Encode the envelope as JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse an envelope from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Encode the envelope as JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse an envelope from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::PlayerId;

    #[test]
    fn test_join_request_id_parsing() {
        let id = PlayerId([0xAB; 16]);
        let req = JoinRequest {
            player_id: hex::encode(id.0),
            display_name: Some("Dasher".to_string()),
            client_version: "0.1.0".to_string(),
        };
        assert_eq!(req.player_id_bytes(), Some(id.0));

        // Wrong length and non-hex input both parse to None
        let short = JoinRequest {
            player_id: "abcd".to_string(),
            ..req.clone()
        };
        assert_eq!(short.player_id_bytes(), None);

        let garbage = JoinRequest {
            player_id: "not hex at all".to_string(),
            ..req
        };
        assert_eq!(garbage.player_id_bytes(), None);
    }

    #[test]
    fn test_envelope_json_tagging() {
        let msg = ClientMessage::Input(GameInput {
            tick: 420,
            move_x: -90,
            move_y: 15,
            flags: 0x01,
            dash_x: 0,
            dash_y: 0,
            timestamp: 1_700_000_000,
        });

        let json = msg.to_json().unwrap();
        // Tagged envelope: the discriminant rides in a "type" field
        assert!(json.contains("\"type\":\"input\""));

        match ClientMessage::from_json(&json).unwrap() {
            ClientMessage::Input(input) => {
                assert_eq!(input.tick, 420);
                assert_eq!(input.move_x, -90);
                assert_eq!(input.move_y, 15);
            }
            other => panic!("wrong envelope: {other:?}"),
        }
    }

    #[test]
    fn test_flat_input_bincode() {
        // Tagged enums (#[serde(tag = "type")]) are not supported by
        // bincode; use JSON for the envelopes, binary for flat structs.
        let input = GameInput {
            tick: 77,
            move_x: -128,
            move_y: 127,
            flags: 0x01,
            dash_x: -127,
            dash_y: 64,
            timestamp: 3,
        };

        let bytes = bincode::serialize(&input).unwrap();
        let parsed: GameInput = bincode::deserialize(&bytes).unwrap();
        assert_eq!(parsed.tick, 77);
        assert_eq!(parsed.move_x, -128);
        assert_eq!(parsed.dash_x, -127);
        assert_eq!(parsed.dash_y, 64);
    }

    #[test]
    fn test_game_input_to_frame() {
        let input = GameInput {
            tick: 9,
            move_x: -127,
            move_y: 127,
            flags: InputFrame::FLAG_DASH,
            dash_x: 127,
            dash_y: 0,
            timestamp: 55,
        };

        let frame = input.to_input_frame();
        assert_eq!(frame.move_x, -127);
        assert_eq!(frame.move_y, 127);
        assert!(frame.dash_pressed());
        assert!(frame.dash_hint().is_some());
    }

    #[test]
    fn test_push_request_parsing() {
        let id = PlayerId([7; 16]);
        let msg = PushRequestMsg {
            request_id: 3,
            target_id: hex::encode(id.0),
            direction: [65536, 0],
            force: 655360,
            duration_ticks: 12,
        };

        assert_eq!(msg.target_id_bytes(), Some(id.0));
        assert_eq!(msg.direction_vec(), FixedVec2::new(65536, 0));

        let bad = PushRequestMsg {
            target_id: "zz".to_string(),
            ..msg
        };
        assert_eq!(bad.target_id_bytes(), None);
    }

    #[test]
    fn test_event_conversion() {
        let source = PlayerId([1; 16]);
        let target = PlayerId([2; 16]);
        let event = GameEvent::push_applied(42, source, target, FixedVec2::RIGHT, 655360);

        let wire = MatchEvent::from_game_event(&event);
        match wire {
            MatchEvent::PushApplied { tick, source_id, target_id, force, .. } => {
                assert_eq!(tick, 42);
                assert_eq!(source_id, source.0);
                assert_eq!(target_id, target.0);
                assert_eq!(force, 655360);
            }
            other => panic!("wrong conversion: {other:?}"),
        }
    }

    #[test]
    fn test_error_code_wire_names() {
        let msg = ServerMessage::Error(ServerError {
            code: ErrorCode::VersionMismatch,
            message: "client too old".to_string(),
        });

        let json = msg.to_json().unwrap();
        assert!(json.contains("version_mismatch"));
    }

    #[test]
    fn test_state_update_from_state() {
        use crate::game::lifecycle::DEFAULT_LIVES;
        use crate::game::powerup::PowerUpKind;

        let mut state = MatchState::new([9; 16], 5);
        state.add_player(PlayerId([1; 16]), None, DEFAULT_LIVES);
        state.add_player(PlayerId([2; 16]), None, DEFAULT_LIVES);

        // No pickups: the field is left off the wire entirely
        let empty = GameStateUpdate::from_state(&state);
        assert!(empty.pickups.is_none());
        let json = ServerMessage::State(empty).to_json().unwrap();
        assert!(!json.contains("pickups"));

        state.spawn_pickup(FixedVec2::ZERO, PowerUpKind::Shockwave);
        let update = GameStateUpdate::from_state(&state);
        assert_eq!(update.players.len(), 2);
        assert_eq!(update.pickups.as_ref().unwrap().len(), 1);
        assert_eq!(update.state_hash, state.compute_hash());

        let json = ServerMessage::State(update).to_json().unwrap();
        let parsed = ServerMessage::from_json(&json).unwrap();
        assert!(matches!(parsed, ServerMessage::State(_)));
    }
}
