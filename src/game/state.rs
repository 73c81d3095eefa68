//! Match simulation state.
//!
//! Everything the tick function reads or writes lives here. Collections
//! are BTreeMaps so a clone on one machine iterates in the same order
//! as its twin on another.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::core::vec2::FixedVec2;
use crate::core::rng::DeterministicRng;
use crate::core::hash::{StateHash, StateHasher, compute_state_hash};
use crate::game::dash::{PendingPush, PushRequest};
use crate::game::events::GameEvent;
use crate::game::lifecycle::LifeState;
use crate::game::movement::MovementState;
use crate::game::powerup::{PickupState, PowerUpKind};
use crate::game::standings::Standings;

// =============================================================================
// PLAYER ID
// =============================================================================

/// Player identity, a UUID carried as raw bytes.
///
/// Derives Ord so BTreeMap keys sort the same on every machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Default)]
pub struct PlayerId(pub [u8; 16]);

impl PlayerId {
    /// Wrap raw id bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Canonical hyphenated form, for logs.
    pub fn to_uuid_string(&self) -> String {
        uuid::Uuid::from_bytes(self.0).to_string()
    }
}

// =============================================================================
// AUTHORITY MODE
// =============================================================================

/// Who resolves push effects for players this instance simulates.
///
/// An authoritative instance applies pushes to targets directly. A remote
/// instance queues push requests for the target's owner and applies them
/// only once confirmed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[derive(Default)]
pub enum AuthorityMode {
    /// This instance owns every player and applies pushes immediately
    #[default]
    Authoritative,
    /// Push effects on other players go through request/confirm
    Remote,
}

// =============================================================================
// SPAWN POINTS
// =============================================================================

/// Fixed corner spawn points, assigned round-robin by join order.
pub const SPAWN_POINTS: [FixedVec2; 4] = [
    FixedVec2::new(-393216, 196608),  // (-6.0, 3.0) top-left
    FixedVec2::new(393216, 196608),   // (6.0, 3.0) top-right
    FixedVec2::new(-393216, -196608), // (-6.0, -3.0) bottom-left
    FixedVec2::new(393216, -196608),  // (6.0, -3.0) bottom-right
];

// =============================================================================
// PLAYER STATE
// =============================================================================

/// One player's slice of the simulation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayerState {
    /// Who this is
    pub id: PlayerId,

    /// Position relative to the arena center
    pub position: FixedVec2,

    /// Movement state machine (mode, dash, push, shield, boosts)
    pub movement: MovementState,

    /// Lives, elimination and respawn state
    pub life: LifeState,
}

impl PlayerState {
    /// Place a player at their corner with a full life count.
    pub fn new(id: PlayerId, player_index: u32, display_name: String, spawn_position: FixedVec2, lives: u32) -> Self {
        Self {
            id,
            position: spawn_position,
            movement: MovementState::new(),
            life: LifeState::new(player_index, display_name, lives, spawn_position),
        }
    }

    /// Does this player still hold at least one life?
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.life.lives > 0 && !self.life.eliminated
    }

    /// Is this player physically on the arena right now?
    ///
    /// False while waiting out a respawn delay, and permanently false
    /// once an eliminated player has been deactivated.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.life.active
    }

    /// Feed this player's fields to the match hasher.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_uuid(&self.id.0);
        hasher.update_vec2(self.position);
        self.movement.hash_into(hasher);
        self.life.hash_into(hasher);
    }
}

// =============================================================================
// MATCH PHASE
// =============================================================================

/// Where the match is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[derive(Default)]
pub enum MatchPhase {
    /// Roster still forming
    #[default]
    Waiting,
    /// Frozen pre-game countdown
    Countdown { ticks_remaining: u32 },
    /// Simulation live
    Playing,
    /// Decided, awaiting finalization
    Ended,
}

impl MatchPhase {
    fn discriminant(&self) -> u8 {
        match self {
            MatchPhase::Waiting => 0,
            MatchPhase::Countdown { .. } => 1,
            MatchPhase::Playing => 2,
            MatchPhase::Ended => 3,
        }
    }
}

// =============================================================================
// MATCH STATE
// =============================================================================

/// Full simulation state for one match.
///
/// Cloning it snapshots the match; two equal snapshots stepped with
/// equal inputs stay equal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchState {
    /// Match id, shared with recordings and end reports
    pub match_id: [u8; 16],

    /// Tick counter
    pub tick: u32,

    /// Lifecycle phase
    pub phase: MatchPhase,

    /// Push resolution authority for this instance
    pub authority: AuthorityMode,

    /// Seed the rng started from, kept for recordings
    pub rng_seed: u64,

    /// Pickup placement rng; not serialized, a deserialized state
    /// must rebuild it from `rng_seed`
    #[serde(skip)]
    pub rng: DeterministicRng,

    /// Roster keyed by player id, iterated in id order
    pub players: BTreeMap<PlayerId, PlayerState>,

    /// Power-up pickups on the arena (BTreeMap for deterministic iteration)
    pub pickups: BTreeMap<u32, PickupState>,

    /// Next pickup ID (monotonic counter)
    pub next_pickup_id: u32,

    /// Tick at which the next pickup may spawn
    pub next_pickup_spawn_tick: u32,

    /// Next join index (assigns spawn corners and display names)
    pub next_player_index: u32,

    /// Players in the order they were eliminated
    pub elimination_order: Vec<PlayerId>,

    /// Win/draw decision, made at most once per match
    pub standings: Standings,

    /// Forwarded push requests awaiting confirmation, by request ID
    pub pending_pushes: BTreeMap<u32, PendingPush>,

    /// Next push request ID (monotonic counter)
    pub next_request_id: u32,

    /// Push requests to forward to remote owners (drained each tick)
    #[serde(skip)]
    pub outbox: Vec<PushRequest>,

    /// Events queued during the current tick
    #[serde(skip)]
    pub pending_events: Vec<GameEvent>,
}

impl MatchState {
    /// Empty match in the waiting phase.
    pub fn new(match_id: [u8; 16], rng_seed: u64) -> Self {
        Self {
            match_id,
            tick: 0,
            phase: MatchPhase::Waiting,
            authority: AuthorityMode::Authoritative,
            rng_seed,
            rng: DeterministicRng::new(rng_seed),
            players: BTreeMap::new(),
            pickups: BTreeMap::new(),
            next_pickup_id: 0,
            next_pickup_spawn_tick: 0,
            next_player_index: 0,
            elimination_order: Vec::new(),
            standings: Standings::default(),
            pending_pushes: BTreeMap::new(),
            next_request_id: 0,
            outbox: Vec::new(),
            pending_events: Vec::new(),
        }
    }

    /// Seat a player.
    ///
    /// Assigns the next join index, a corner spawn point and a default
    /// display name when none is given. Joining is allowed at any time;
    /// a decided match simply never re-evaluates the standings.
    pub fn add_player(&mut self, id: PlayerId, display_name: Option<String>, lives: u32) -> u32 {
        let index = self.next_player_index;
        self.next_player_index += 1;

        let spawn = SPAWN_POINTS[index as usize % SPAWN_POINTS.len()];
        let name = display_name.unwrap_or_else(|| format!("P{}", index + 1));
        let player = PlayerState::new(id, index, name, spawn, lives);
        self.players.insert(id, player);

        self.push_event(GameEvent::player_spawned(self.tick, id, index, spawn));
        index
    }

    /// Borrow a player's state.
    pub fn get_player(&self, id: &PlayerId) -> Option<&PlayerState> {
        self.players.get(id)
    }

    /// Borrow a player's state mutably.
    pub fn get_player_mut(&mut self, id: &PlayerId) -> Option<&mut PlayerState> {
        self.players.get_mut(id)
    }

    /// Count players still holding lives.
    ///
    /// Always recomputed from the roster, so eliminations, resets and
    /// late joins can never leave a stale count behind.
    pub fn alive_count(&self) -> u32 {
        self.players.values().filter(|p| p.is_alive()).count() as u32
    }

    /// Iterate over players still holding lives.
    pub fn alive_players(&self) -> impl Iterator<Item = &PlayerState> {
        self.players.values().filter(|p| p.is_alive())
    }

    /// Register a new pickup on the arena.
    pub fn spawn_pickup(&mut self, position: FixedVec2, kind: PowerUpKind) -> u32 {
        let id = self.next_pickup_id;
        self.next_pickup_id += 1;
        self.pickups.insert(id, PickupState::new(id, position, kind));
        id
    }

    /// Allocate the next push request ID.
    pub fn next_push_request_id(&mut self) -> u32 {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }

    /// True once the phase has reached Ended.
    pub fn is_ended(&self) -> bool {
        matches!(self.phase, MatchPhase::Ended)
    }

    /// Hash every simulation-relevant field into one digest.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.tick, self.rng_seed, |hasher| {
            hasher.update_u8(self.phase.discriminant());
            if let MatchPhase::Countdown { ticks_remaining } = self.phase {
                hasher.update_u32(ticks_remaining);
            }

            // Players come out of the map in id order
            for player in self.players.values() {
                player.hash_into(hasher);
            }

            // Hash pickups
            for (pickup_id, pickup) in &self.pickups {
                hasher.update_u32(*pickup_id);
                hasher.update_vec2(pickup.position);
                hasher.update_u8(pickup.kind as u8);
                hasher.update_bool(pickup.collected);
            }

            // Hash elimination order and standings
            for id in &self.elimination_order {
                hasher.update_uuid(&id.0);
            }
            hasher.update_bool(self.standings.decided);
            if let Some(winner) = self.standings.winner {
                hasher.update_uuid(&winner.0);
            }

            // Hash unconfirmed push requests
            for (request_id, pending) in &self.pending_pushes {
                hasher.update_u32(*request_id);
                hasher.update_uuid(&pending.request.target_id.0);
                hasher.update_u32(pending.expires_at_tick);
            }
        })
    }

    /// Drain the events queued since the last call.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Queue an event for this tick's fanout.
    pub fn push_event(&mut self, event: GameEvent) {
        self.pending_events.push(event);
    }

    /// Drain push requests bound for remote owners.
    pub fn take_outbox(&mut self) -> Vec<PushRequest> {
        std::mem::take(&mut self.outbox)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(n: u8) -> PlayerId {
        PlayerId([n; 16])
    }

    #[test]
    fn test_player_id_formats_as_uuid() {
        let id = PlayerId::new([0x42; 16]);
        assert_eq!(id.to_uuid_string(), "42424242-4242-4242-4242-424242424242");
    }

    #[test]
    fn test_add_player_assigns_corners_and_names() {
        let mut state = MatchState::new([1; 16], 42);

        for n in 0..4 {
            let index = state.add_player(pid(n), None, 3);
            assert_eq!(index, n as u32);
        }

        let p1 = state.get_player(&pid(0)).unwrap();
        assert_eq!(p1.position, SPAWN_POINTS[0]);
        assert_eq!(p1.life.display_name, "P1");
        assert_eq!(p1.life.lives, 3);

        let p4 = state.get_player(&pid(3)).unwrap();
        assert_eq!(p4.position, SPAWN_POINTS[3]);
        assert_eq!(p4.life.display_name, "P4");
    }

    #[test]
    fn test_custom_display_name() {
        let mut state = MatchState::new([1; 16], 42);
        state.add_player(pid(9), Some("Striker".to_string()), 3);
        assert_eq!(state.get_player(&pid(9)).unwrap().life.display_name, "Striker");
    }

    #[test]
    fn test_alive_count_is_recomputed() {
        let mut state = MatchState::new([1; 16], 42);
        state.add_player(pid(1), None, 3);
        state.add_player(pid(2), None, 3);
        state.add_player(pid(3), None, 3);
        assert_eq!(state.alive_count(), 3);

        state.get_player_mut(&pid(2)).unwrap().life.lives = 0;
        state.get_player_mut(&pid(2)).unwrap().life.eliminated = true;
        assert_eq!(state.alive_count(), 2);

        // A late join is reflected immediately
        state.add_player(pid(4), None, 3);
        assert_eq!(state.alive_count(), 3);
    }

    #[test]
    fn test_state_hash_changes_with_position() {
        let mut a = MatchState::new([1; 16], 42);
        a.add_player(pid(1), None, 3);
        let mut b = a.clone();

        assert_eq!(a.compute_hash(), b.compute_hash());

        b.get_player_mut(&pid(1)).unwrap().position.x += 1;
        assert_ne!(a.compute_hash(), b.compute_hash());
    }

    #[test]
    fn test_spawn_pickup_ids_monotonic() {
        let mut state = MatchState::new([1; 16], 42);
        let a = state.spawn_pickup(FixedVec2::ZERO, PowerUpKind::Shield);
        let b = state.spawn_pickup(FixedVec2::new(100, 100), PowerUpKind::Teleport);
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(state.pickups.len(), 2);
    }

    #[test]
    fn test_take_events_clears() {
        let mut state = MatchState::new([1; 16], 42);
        state.add_player(pid(1), None, 3);
        assert_eq!(state.take_events().len(), 1);
        assert!(state.take_events().is_empty());
    }
}
