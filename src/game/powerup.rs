//! Power-Up Pickups and Effects
//!
//! Pickups spawn at random clear spots on the arena at randomized
//! intervals, weighted by kind. Collecting one applies its effect
//! immediately: a shield window, a dash speed boost, a radial shockwave
//! push or a position swap with the nearest opponent.

use serde::{Serialize, Deserialize};
use tracing::warn;

use crate::core::fixed::{Fixed, fixed_mul, PLAYER_RADIUS};
use crate::core::rng::DeterministicRng;
use crate::core::vec2::FixedVec2;
use crate::game::collision::circles_overlap;
use crate::game::events::GameEvent;
use crate::game::movement::PushOutcome;
use crate::game::state::{MatchPhase, MatchState, PlayerId};

// =============================================================================
// POWER-UP CONSTANTS
// =============================================================================

/// Shield window granted by a shield pickup (3.0s)
pub const SHIELD_DURATION_TICKS: u32 = 180;

/// Dash speed multiplier granted by a mega dash pickup (2.0)
pub const BOOST_MULTIPLIER: Fixed = 131072;

/// Mega dash boost window (5.0s)
pub const BOOST_DURATION_TICKS: u32 = 300;

/// Teleport target search range (8.0 units)
pub const TELEPORT_RANGE: Fixed = 524288;

/// Shockwave push speed (20.0 units/s)
pub const SHOCKWAVE_FORCE: Fixed = 1310720;

/// Shockwave effect radius (6.0 units)
pub const SHOCKWAVE_RADIUS: Fixed = 393216;

/// Shockwave push window (0.3s)
pub const SHOCKWAVE_PUSH_DURATION_TICKS: u32 = 18;

/// Pickup trigger radius (0.5 units)
pub const PICKUP_RADIUS: Fixed = 32768;

/// Minimum clearance around a fresh pickup (1.0 units)
pub const SPAWN_CLEAR_RADIUS: Fixed = 65536;

/// Placement attempts before skipping a spawn window
const SPAWN_PLACEMENT_TRIES: u32 = 8;

// =============================================================================
// POWER-UP KINDS
// =============================================================================

/// The four pickup kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PowerUpKind {
    /// Blocks incoming pushes for a while
    Shield = 0,
    /// Doubles dash speed for a while
    MegaDash = 1,
    /// Radial push away from the collector
    Shockwave = 2,
    /// Swap positions with the nearest opponent
    Teleport = 3,
}

impl PowerUpKind {
    /// The effect this kind applies when collected.
    pub fn effect(self) -> PowerUpEffect {
        match self {
            PowerUpKind::Shield => PowerUpEffect::Shield {
                duration_ticks: SHIELD_DURATION_TICKS,
            },
            PowerUpKind::MegaDash => PowerUpEffect::SpeedBoost {
                multiplier: BOOST_MULTIPLIER,
                duration_ticks: BOOST_DURATION_TICKS,
            },
            PowerUpKind::Shockwave => PowerUpEffect::AreaPush {
                radius: SHOCKWAVE_RADIUS,
                force: SHOCKWAVE_FORCE,
                duration_ticks: SHOCKWAVE_PUSH_DURATION_TICKS,
            },
            PowerUpKind::Teleport => PowerUpEffect::Teleport {
                range: TELEPORT_RANGE,
            },
        }
    }
}

/// Roll a pickup kind.
///
/// Weights: Shield 30, MegaDash 30, Shockwave 25, Teleport 15.
fn random_kind(rng: &mut DeterministicRng) -> PowerUpKind {
    let roll = rng.next_int(100);
    if roll < 30 {
        PowerUpKind::Shield
    } else if roll < 60 {
        PowerUpKind::MegaDash
    } else if roll < 85 {
        PowerUpKind::Shockwave
    } else {
        PowerUpKind::Teleport
    }
}

// =============================================================================
// EFFECTS
// =============================================================================

/// A concrete effect with its parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PowerUpEffect {
    /// Multiply dash speed for a window
    SpeedBoost { multiplier: Fixed, duration_ticks: u32 },
    /// Block incoming pushes for a window
    Shield { duration_ticks: u32 },
    /// Swap positions with the nearest opponent in range
    Teleport { range: Fixed },
    /// Push everyone nearby outward from the collector
    AreaPush { radius: Fixed, force: Fixed, duration_ticks: u32 },
}

// =============================================================================
// PICKUP STATE
// =============================================================================

/// One pickup on the arena.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PickupState {
    /// Pickup identifier
    pub id: u32,
    /// Arena position
    pub position: FixedVec2,
    /// What it grants
    pub kind: PowerUpKind,
    /// Already collected (one-shot, kept for the replay record)
    pub collected: bool,
    /// Who collected it
    pub collected_by: Option<PlayerId>,
    /// When it was collected
    pub collected_tick: Option<u32>,
}

impl PickupState {
    /// Create an uncollected pickup.
    pub fn new(id: u32, position: FixedVec2, kind: PowerUpKind) -> Self {
        Self {
            id,
            position,
            kind,
            collected: false,
            collected_by: None,
            collected_tick: None,
        }
    }
}

// =============================================================================
// SPAWNING
// =============================================================================

/// Pickup spawn tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PickupSpawnConfig {
    /// Ticks after match start before the first spawn window (5.0s)
    pub initial_delay_ticks: u32,
    /// Shortest gap between spawn windows (10.0s)
    pub min_interval_ticks: u32,
    /// Longest gap between spawn windows (20.0s)
    pub max_interval_ticks: u32,
    /// Most uncollected pickups on the arena at once
    pub max_active: usize,
    /// Spawn area half width, kept inside the arena edges
    pub area_half_width: Fixed,
    /// Spawn area half height, kept inside the arena edges
    pub area_half_height: Fixed,
}

impl Default for PickupSpawnConfig {
    fn default() -> Self {
        Self {
            initial_delay_ticks: 300,
            min_interval_ticks: 600,
            max_interval_ticks: 1200,
            max_active: 3,
            area_half_width: 524288,  // 8.0
            area_half_height: 262144, // 4.0
        }
    }
}

/// Spawn a pickup if a spawn window is due.
///
/// The next window is always rescheduled, even when the active cap or a
/// crowded arena skips this one.
pub fn maybe_spawn_pickup(state: &mut MatchState, config: &PickupSpawnConfig) {
    if state.phase != MatchPhase::Playing {
        return;
    }
    if state.tick < state.next_pickup_spawn_tick {
        return;
    }

    let interval = state.rng.next_int_range(
        config.min_interval_ticks as i32,
        config.max_interval_ticks as i32,
    ) as u32;
    state.next_pickup_spawn_tick = state.tick + interval;

    let active = state.pickups.values().filter(|p| !p.collected).count();
    if active >= config.max_active {
        return;
    }

    let position = match find_clear_position(state, config) {
        Some(p) => p,
        None => return,
    };

    let kind = random_kind(&mut state.rng);
    let id = state.spawn_pickup(position, kind);
    let tick = state.tick;
    state.push_event(GameEvent::pickup_spawned(tick, id, kind, position));
}

/// Find a spawn spot clear of players and other pickups.
fn find_clear_position(state: &mut MatchState, config: &PickupSpawnConfig) -> Option<FixedVec2> {
    let clear_sq = fixed_mul(SPAWN_CLEAR_RADIUS, SPAWN_CLEAR_RADIUS);

    for _ in 0..SPAWN_PLACEMENT_TRIES {
        let candidate = state
            .rng
            .random_position_in_rect(config.area_half_width, config.area_half_height);

        let blocked = state
            .players
            .values()
            .any(|p| p.is_active() && p.position.distance_squared(candidate) < clear_sq)
            || state
                .pickups
                .values()
                .any(|k| !k.collected && k.position.distance_squared(candidate) < clear_sq);

        if !blocked {
            return Some(candidate);
        }
    }
    None
}

// =============================================================================
// COLLECTION
// =============================================================================

/// Scan for players touching uncollected pickups and collect them.
///
/// Sorted iteration on both sides makes the first-collector tiebreak
/// deterministic: the lower player ID wins a contested pickup.
pub fn collect_pickups(state: &mut MatchState) {
    let mut collections: Vec<(PlayerId, u32)> = Vec::new();

    for player in state.players.values() {
        if !player.is_active() || !player.is_alive() {
            continue;
        }
        for pickup in state.pickups.values() {
            if pickup.collected {
                continue;
            }
            if collections.iter().any(|(_, id)| *id == pickup.id) {
                continue;
            }
            if circles_overlap(player.position, PLAYER_RADIUS, pickup.position, PICKUP_RADIUS) {
                collections.push((player.id, pickup.id));
            }
        }
    }

    for (player_id, pickup_id) in collections {
        collect_pickup(state, player_id, pickup_id);
    }
}

/// Collect one pickup and apply its effect.
///
/// Returns false if the pickup is unknown or already collected.
pub fn collect_pickup(state: &mut MatchState, player_id: PlayerId, pickup_id: u32) -> bool {
    let tick = state.tick;

    let kind = {
        let pickup = match state.pickups.get_mut(&pickup_id) {
            Some(p) => p,
            None => return false,
        };
        if pickup.collected {
            return false;
        }
        pickup.collected = true;
        pickup.collected_by = Some(player_id);
        pickup.collected_tick = Some(tick);
        pickup.kind
    };

    state.push_event(GameEvent::powerup_collected(tick, player_id, pickup_id, kind));
    apply_effect(state, player_id, kind.effect());
    true
}

// =============================================================================
// EFFECT APPLICATION
// =============================================================================

/// Apply an effect on behalf of a collector.
///
/// Effects whose player is missing are dropped with a warning; other
/// players' effects are unaffected.
pub fn apply_effect(state: &mut MatchState, source_id: PlayerId, effect: PowerUpEffect) {
    if state.get_player(&source_id).is_none() {
        warn!(
            player = %source_id.to_uuid_string(),
            "dropping power-up effect for unknown player"
        );
        return;
    }

    match effect {
        PowerUpEffect::SpeedBoost { multiplier, duration_ticks } => {
            if let Some(player) = state.get_player_mut(&source_id) {
                player.movement.apply_boost(multiplier, duration_ticks);
            }
        }
        PowerUpEffect::Shield { duration_ticks } => {
            if let Some(player) = state.get_player_mut(&source_id) {
                player.movement.activate_shield(duration_ticks);
            }
        }
        PowerUpEffect::Teleport { range } => {
            apply_teleport(state, source_id, range);
        }
        PowerUpEffect::AreaPush { radius, force, duration_ticks } => {
            apply_area_push(state, source_id, radius, force, duration_ticks);
        }
    }
}

/// Swap positions with the nearest live opponent in range.
fn apply_teleport(state: &mut MatchState, source_id: PlayerId, range: Fixed) {
    let source_pos = match state.get_player(&source_id) {
        Some(p) => p.position,
        None => return,
    };
    let range_sq = fixed_mul(range, range);

    // Nearest eligible target; ties resolve to the lower player ID
    let mut best: Option<(PlayerId, Fixed)> = None;
    for player in state.players.values() {
        if player.id == source_id || !player.is_alive() || !player.is_active() {
            continue;
        }
        let dist_sq = player.position.distance_squared(source_pos);
        if dist_sq > range_sq {
            continue;
        }
        let closer = match best {
            None => true,
            Some((_, best_sq)) => dist_sq < best_sq,
        };
        if closer {
            best = Some((player.id, dist_sq));
        }
    }

    let target_id = match best {
        Some((id, _)) => id,
        None => {
            warn!("teleport found no target in range, effect dropped");
            return;
        }
    };

    let target_pos = match state.get_player(&target_id) {
        Some(p) => p.position,
        None => return,
    };

    if let Some(source) = state.get_player_mut(&source_id) {
        source.position = target_pos;
        source.movement.halt();
    }
    if let Some(target) = state.get_player_mut(&target_id) {
        target.position = source_pos;
        target.movement.halt();
    }
}

/// Push every live player inside the radius outward from the collector.
///
/// Shielded and already-pushed targets are unaffected, as is anyone
/// standing exactly on the collector.
fn apply_area_push(state: &mut MatchState, source_id: PlayerId, radius: Fixed, force: Fixed, duration_ticks: u32) {
    let center = match state.get_player(&source_id) {
        Some(p) => p.position,
        None => return,
    };
    let radius_sq = fixed_mul(radius, radius);
    let tick = state.tick;

    // Collect targets first, then mutate
    let targets: Vec<(PlayerId, FixedVec2)> = state
        .players
        .values()
        .filter(|p| p.id != source_id && p.is_alive() && p.is_active())
        .filter_map(|p| {
            let offset = p.position.sub(center);
            let dist_sq = offset.length_squared();
            if dist_sq > 0 && dist_sq <= radius_sq {
                Some((p.id, offset.normalize()))
            } else {
                None
            }
        })
        .collect();

    let mut events = Vec::new();
    for (target_id, direction) in targets {
        if let Some(target) = state.get_player_mut(&target_id) {
            let outcome = target.movement.apply_push(direction, force, duration_ticks);
            if outcome == PushOutcome::Applied {
                events.push(GameEvent::push_applied(tick, source_id, target_id, direction, force));
            }
        }
    }
    for event in events {
        state.push_event(event);
    }
}

// =============================================================================
// TESTS
// =============================================================================
