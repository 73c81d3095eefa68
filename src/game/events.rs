//! Game Event System
//!
//! Events record everything observable that happens during a match:
//! spawns, life changes, eliminations, push resolution, power-ups and the
//! final decision. They are drained once per tick and broadcast to
//! clients, so ordering must be deterministic.

use serde::{Serialize, Deserialize};

use crate::core::fixed::Fixed;
use crate::core::vec2::FixedVec2;
use crate::game::powerup::PowerUpKind;
use crate::game::state::PlayerId;

// =============================================================================
// EVENT PRIORITY
// =============================================================================

/// Priority for ordering events that occur on the same tick.
/// Smaller discriminants sort ahead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventPriority {
    /// Eliminations resolve first
    Elimination = 0,
    /// Life changes and respawns
    Life = 1,
    /// Push resolution
    Push = 2,
    /// Power-up spawns and collection
    PowerUp = 3,
    /// Movement notifications
    Movement = 4,
    /// Match flow (decision, phase changes)
    Match = 5,
    /// Everything without a better home
    Other = 255,
}

// =============================================================================
// EVENT DATA
// =============================================================================

/// Typed payload for each event kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GameEventData {
    /// Player entered the match (or was reset back in)
    PlayerSpawned {
        player_id: PlayerId,
        player_index: u32,
        position: FixedVec2,
    },

    /// Player's life count changed
    PlayerLifeChanged {
        player_id: PlayerId,
        player_index: u32,
        lives: u32,
    },

    /// Player ran out of lives
    PlayerEliminated {
        player_id: PlayerId,
        player_index: u32,
        placement: u32,
    },

    /// Player returned to their spawn point
    PlayerRespawned {
        player_id: PlayerId,
        position: FixedVec2,
    },

    /// Player started a dash
    DashStarted {
        player_id: PlayerId,
        direction: FixedVec2,
    },

    /// A push landed on a target
    PushApplied {
        source_id: PlayerId,
        target_id: PlayerId,
        direction: FixedVec2,
        force: Fixed,
    },

    /// A push was rejected by the target's shield
    PushBlocked {
        source_id: PlayerId,
        target_id: PlayerId,
    },

    /// A forwarded push request went unanswered and was dropped
    PushRequestExpired {
        request_id: u32,
        target_id: PlayerId,
    },

    /// A power-up pickup appeared on the arena
    PickupSpawned {
        pickup_id: u32,
        kind: PowerUpKind,
        position: FixedVec2,
    },

    /// A player collected a pickup
    PowerUpCollected {
        player_id: PlayerId,
        pickup_id: u32,
        kind: PowerUpKind,
    },

    /// Match decided with a single survivor
    GameWon {
        winner_id: PlayerId,
        player_index: u32,
    },

    /// Match decided with no survivors
    GameDraw {},
}

// =============================================================================
// GAME EVENT
// =============================================================================

/// A single event with its tick and ordering metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameEvent {
    /// Tick when the event occurred
    pub tick: u32,
    /// Ordering priority within the tick
    pub priority: EventPriority,
    /// Primary player, if any (used as the final ordering tiebreak)
    pub player_id: Option<PlayerId>,
    /// Event payload
    pub data: GameEventData,
}

impl GameEvent {
    /// Create an event, extracting the primary player from the payload.
    pub fn new(tick: u32, priority: EventPriority, data: GameEventData) -> Self {
        let player_id = match &data {
            GameEventData::PlayerSpawned { player_id, .. } => Some(*player_id),
            GameEventData::PlayerLifeChanged { player_id, .. } => Some(*player_id),
            GameEventData::PlayerEliminated { player_id, .. } => Some(*player_id),
            GameEventData::PlayerRespawned { player_id, .. } => Some(*player_id),
            GameEventData::DashStarted { player_id, .. } => Some(*player_id),
            GameEventData::PushApplied { target_id, .. } => Some(*target_id),
            GameEventData::PushBlocked { target_id, .. } => Some(*target_id),
            GameEventData::PushRequestExpired { target_id, .. } => Some(*target_id),
            GameEventData::PickupSpawned { .. } => None,
            GameEventData::PowerUpCollected { player_id, .. } => Some(*player_id),
            GameEventData::GameWon { winner_id, .. } => Some(*winner_id),
            GameEventData::GameDraw {} => None,
        };

        Self { tick, priority, player_id, data }
    }

    /// Create player spawned event.
    pub fn player_spawned(tick: u32, player_id: PlayerId, player_index: u32, position: FixedVec2) -> Self {
        Self::new(tick, EventPriority::Life, GameEventData::PlayerSpawned {
            player_id,
            player_index,
            position,
        })
    }

    /// Create life changed event.
    pub fn life_changed(tick: u32, player_id: PlayerId, player_index: u32, lives: u32) -> Self {
        Self::new(tick, EventPriority::Life, GameEventData::PlayerLifeChanged {
            player_id,
            player_index,
            lives,
        })
    }

    /// Create player eliminated event.
    pub fn player_eliminated(tick: u32, player_id: PlayerId, player_index: u32, placement: u32) -> Self {
        Self::new(tick, EventPriority::Elimination, GameEventData::PlayerEliminated {
            player_id,
            player_index,
            placement,
        })
    }

    /// Create player respawned event.
    pub fn player_respawned(tick: u32, player_id: PlayerId, position: FixedVec2) -> Self {
        Self::new(tick, EventPriority::Life, GameEventData::PlayerRespawned {
            player_id,
            position,
        })
    }

    /// Create dash started event.
    pub fn dash_started(tick: u32, player_id: PlayerId, direction: FixedVec2) -> Self {
        Self::new(tick, EventPriority::Movement, GameEventData::DashStarted {
            player_id,
            direction,
        })
    }

    /// Create push applied event.
    pub fn push_applied(tick: u32, source_id: PlayerId, target_id: PlayerId, direction: FixedVec2, force: Fixed) -> Self {
        Self::new(tick, EventPriority::Push, GameEventData::PushApplied {
            source_id,
            target_id,
            direction,
            force,
        })
    }

    /// Create push blocked event.
    pub fn push_blocked(tick: u32, source_id: PlayerId, target_id: PlayerId) -> Self {
        Self::new(tick, EventPriority::Push, GameEventData::PushBlocked {
            source_id,
            target_id,
        })
    }

    /// Create push request expired event.
    pub fn push_request_expired(tick: u32, request_id: u32, target_id: PlayerId) -> Self {
        Self::new(tick, EventPriority::Push, GameEventData::PushRequestExpired {
            request_id,
            target_id,
        })
    }

    /// Create pickup spawned event.
    pub fn pickup_spawned(tick: u32, pickup_id: u32, kind: PowerUpKind, position: FixedVec2) -> Self {
        Self::new(tick, EventPriority::PowerUp, GameEventData::PickupSpawned {
            pickup_id,
            kind,
            position,
        })
    }

    /// Create power-up collected event.
    pub fn powerup_collected(tick: u32, player_id: PlayerId, pickup_id: u32, kind: PowerUpKind) -> Self {
        Self::new(tick, EventPriority::PowerUp, GameEventData::PowerUpCollected {
            player_id,
            pickup_id,
            kind,
        })
    }

    /// Create game won event.
    pub fn game_won(tick: u32, winner_id: PlayerId, player_index: u32) -> Self {
        Self::new(tick, EventPriority::Match, GameEventData::GameWon {
            winner_id,
            player_index,
        })
    }

    /// Create game draw event.
    pub fn game_draw(tick: u32) -> Self {
        Self::new(tick, EventPriority::Match, GameEventData::GameDraw {})
    }
}

// Equality and ordering consider tick, priority and player only, so the
// event stream sorts deterministically without comparing payloads.
impl PartialEq for GameEvent {
    fn eq(&self, other: &Self) -> bool {
        self.tick == other.tick
            && self.priority == other.priority
            && self.player_id == other.player_id
    }
}

impl Eq for GameEvent {}

impl PartialOrd for GameEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GameEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.tick
            .cmp(&other.tick)
            .then(self.priority.cmp(&other.priority))
            .then(self.player_id.cmp(&other.player_id))
    }
}

// =============================================================================
// TESTS
// =============================================================================
