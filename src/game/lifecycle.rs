//! Player Lifecycle
//!
//! Lives, fall detection, respawns and elimination. A player who leaves
//! the arena rectangle loses a life and respawns at their spawn point
//! after a short delay, briefly invincible. At zero lives the player is
//! eliminated and their presence removed after a deactivation delay.

use serde::{Serialize, Deserialize};

use crate::core::hash::StateHasher;
use crate::core::vec2::FixedVec2;
use crate::game::events::GameEvent;
use crate::game::movement::MovementState;
use crate::game::standings::Standings;
use crate::game::state::{MatchState, PlayerId};

// =============================================================================
// LIFECYCLE CONSTANTS
// =============================================================================

/// Starting lives when none are configured
pub const DEFAULT_LIVES: u32 = 3;

/// Delay between falling off and respawning (1.0s)
pub const FALL_RESPAWN_DELAY_TICKS: u32 = 60;

/// Invincibility window after a respawn (2.0s)
pub const INVULNERABILITY_TICKS: u32 = 120;

/// Delay between elimination and removing the player's presence (0.1s)
pub const DEACTIVATION_DELAY_TICKS: u32 = 6;

// =============================================================================
// LIFE STATE
// =============================================================================

/// What took the life.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifeLossCause {
    /// Left the arena rectangle
    Fall,
    /// Arena hazard with no respawn delay
    InstantDeath,
}

/// Life and elimination state for one player.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LifeState {
    /// Join index, stable for the whole match
    pub player_index: u32,

    /// Display name shown to other players
    pub display_name: String,

    /// Remaining lives
    pub lives: u32,

    /// Post-respawn invincibility window
    pub invulnerable_ticks: u32,

    /// Out of lives for good
    pub eliminated: bool,

    /// Final placement, assigned at elimination (or 1 for the winner)
    pub placement: Option<u32>,

    /// Physically present on the arena
    pub active: bool,

    /// Assigned spawn point
    pub spawn_position: FixedVec2,

    /// Ticks until respawn, if one is scheduled
    pub respawn_ticks_remaining: Option<u32>,

    /// Ticks until the eliminated player's presence is removed
    pub deactivation_ticks_remaining: Option<u32>,
}

impl LifeState {
    /// Create life state for a freshly joined player.
    pub fn new(player_index: u32, display_name: String, lives: u32, spawn_position: FixedVec2) -> Self {
        Self {
            player_index,
            display_name,
            lives,
            invulnerable_ticks: 0,
            eliminated: false,
            placement: None,
            active: true,
            spawn_position,
            respawn_ticks_remaining: None,
            deactivation_ticks_remaining: None,
        }
    }

    /// Is the post-respawn invincibility window active?
    #[inline]
    pub fn is_invulnerable(&self) -> bool {
        self.invulnerable_ticks > 0
    }

    /// Is a respawn pending?
    #[inline]
    pub fn awaiting_respawn(&self) -> bool {
        self.respawn_ticks_remaining.is_some()
    }

    /// Hash this life state for verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.player_index);
        hasher.update_u32(self.display_name.len() as u32);
        hasher.update_bytes(self.display_name.as_bytes());
        hasher.update_u32(self.lives);
        hasher.update_u32(self.invulnerable_ticks);
        hasher.update_bool(self.eliminated);
        hasher.update_u32(self.placement.unwrap_or(0));
        hasher.update_bool(self.active);
        hasher.update_vec2(self.spawn_position);
        hasher.update_u32(self.respawn_ticks_remaining.unwrap_or(0));
        hasher.update_u32(self.deactivation_ticks_remaining.unwrap_or(0));
    }
}

// =============================================================================
// LIFE LOSS
// =============================================================================

/// Take one life from a player.
///
/// Silently ignored for missing, eliminated, inactive or invulnerable
/// players, and for players already awaiting a respawn. Returns whether
/// a life was actually lost.
pub fn lose_life(state: &mut MatchState, player_id: PlayerId, cause: LifeLossCause) -> bool {
    let tick = state.tick;
    let player_count = state.players.len() as u32;

    let (player_index, lives_after) = {
        let player = match state.get_player_mut(&player_id) {
            Some(p) => p,
            None => return false,
        };
        if player.life.eliminated || !player.life.active {
            return false;
        }
        if player.life.is_invulnerable() {
            return false;
        }
        if player.life.awaiting_respawn() {
            return false;
        }

        player.life.lives = player.life.lives.saturating_sub(1);
        player.movement.halt();
        (player.life.player_index, player.life.lives)
    };

    state.push_event(GameEvent::life_changed(tick, player_id, player_index, lives_after));

    if lives_after == 0 {
        // Out of lives: record elimination order, then place counting
        // backwards so the first player out takes last place.
        state.elimination_order.push(player_id);
        let placement = player_count - state.elimination_order.len() as u32 + 1;

        if let Some(player) = state.get_player_mut(&player_id) {
            player.life.eliminated = true;
            player.life.placement = Some(placement);
            player.life.deactivation_ticks_remaining = Some(DEACTIVATION_DELAY_TICKS);
        }
        state.push_event(GameEvent::player_eliminated(tick, player_id, player_index, placement));
    } else {
        match cause {
            LifeLossCause::Fall => {
                if let Some(player) = state.get_player_mut(&player_id) {
                    player.life.respawn_ticks_remaining = Some(FALL_RESPAWN_DELAY_TICKS);
                    player.life.active = false;
                }
            }
            LifeLossCause::InstantDeath => {
                respawn_player(state, player_id);
            }
        }
    }

    true
}

/// Arena hazard entry point: costs a life with no respawn delay.
pub fn apply_instant_death(state: &mut MatchState, player_id: PlayerId) -> bool {
    lose_life(state, player_id, LifeLossCause::InstantDeath)
}

/// Eliminate a player outright, bypassing lives and invulnerability.
///
/// Used when a player abandons the match or exceeds the reconnect
/// window. Takes effect immediately, with no deactivation delay.
pub fn forfeit_player(state: &mut MatchState, player_id: PlayerId) -> bool {
    let tick = state.tick;
    let player_count = state.players.len() as u32;

    let player_index = match state.get_player(&player_id) {
        Some(p) if !p.life.eliminated => p.life.player_index,
        _ => return false,
    };

    state.elimination_order.push(player_id);
    let placement = player_count - state.elimination_order.len() as u32 + 1;

    if let Some(player) = state.get_player_mut(&player_id) {
        player.life.lives = 0;
        player.life.eliminated = true;
        player.life.placement = Some(placement);
        player.life.active = false;
        player.life.respawn_ticks_remaining = None;
        player.life.deactivation_ticks_remaining = None;
        player.movement.halt();
    }

    state.push_event(GameEvent::player_eliminated(tick, player_id, player_index, placement));
    true
}

/// Return a player to their spawn point with fresh invincibility.
pub fn respawn_player(state: &mut MatchState, player_id: PlayerId) {
    let tick = state.tick;

    let spawn = {
        let player = match state.get_player_mut(&player_id) {
            Some(p) => p,
            None => return,
        };
        if player.life.eliminated {
            return;
        }

        player.position = player.life.spawn_position;
        player.movement.halt();
        player.life.invulnerable_ticks = INVULNERABILITY_TICKS;
        player.life.respawn_ticks_remaining = None;
        player.life.active = true;
        player.life.spawn_position
    };

    state.push_event(GameEvent::player_respawned(tick, player_id, spawn));
}

// =============================================================================
// TICK PROCESSING
// =============================================================================

/// Advance invincibility, respawn and deactivation timers.
pub fn update_life_timers(state: &mut MatchState) {
    let mut due_respawns: Vec<PlayerId> = Vec::new();

    for (id, player) in state.players.iter_mut() {
        let life = &mut player.life;

        if life.invulnerable_ticks > 0 {
            life.invulnerable_ticks -= 1;
        }

        if let Some(ticks) = life.respawn_ticks_remaining {
            if ticks <= 1 {
                due_respawns.push(*id);
            } else {
                life.respawn_ticks_remaining = Some(ticks - 1);
            }
        }

        if let Some(ticks) = life.deactivation_ticks_remaining {
            if ticks <= 1 {
                life.deactivation_ticks_remaining = None;
                life.active = false;
            } else {
                life.deactivation_ticks_remaining = Some(ticks - 1);
            }
        }
    }

    for id in due_respawns {
        respawn_player(state, id);
    }
}

/// Detect players that left the arena rectangle and take a life.
pub fn process_falls(state: &mut MatchState) {
    let fallen: Vec<PlayerId> = state
        .players
        .values()
        .filter(|p| p.is_active() && !p.life.eliminated && !p.life.awaiting_respawn())
        .filter(|p| !p.position.is_in_arena())
        .map(|p| p.id)
        .collect();

    for id in fallen {
        lose_life(state, id, LifeLossCause::Fall);
    }
}

// =============================================================================
// RESET
// =============================================================================

/// Restore one player to a fresh match-start state.
///
/// Idempotent: applying it twice leaves the same state.
pub fn reset_player(state: &mut MatchState, player_id: PlayerId, lives: u32) {
    let tick = state.tick;

    let (index, spawn) = {
        let player = match state.get_player_mut(&player_id) {
            Some(p) => p,
            None => return,
        };

        player.life.lives = lives;
        player.life.eliminated = false;
        player.life.placement = None;
        player.life.invulnerable_ticks = 0;
        player.life.active = true;
        player.life.respawn_ticks_remaining = None;
        player.life.deactivation_ticks_remaining = None;
        player.position = player.life.spawn_position;
        player.movement = MovementState::new();
        (player.life.player_index, player.life.spawn_position)
    };

    state.push_event(GameEvent::player_spawned(tick, player_id, index, spawn));
}

/// Restore every registered player and clear the match bookkeeping.
pub fn reset_all_players(state: &mut MatchState, lives: u32) {
    let ids: Vec<PlayerId> = state.players.keys().copied().collect();
    for id in ids {
        reset_player(state, id, lives);
    }
    state.elimination_order.clear();
    state.standings = Standings::default();
}

// =============================================================================
// TESTS
// =============================================================================
