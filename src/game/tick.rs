//! The simulation step.
//!
//! One call advances the match by one tick. Given the same seed and
//! input stream, every instance steps through the same states, which
//! is what makes recordings replayable and remote verification work.

use std::collections::BTreeMap;

use crate::core::fixed::{fixed_mul, TICK_DURATION};
use crate::game::dash;
use crate::game::events::GameEvent;
use crate::game::input::{InputFrame, PlayerInputBuffer};
use crate::game::lifecycle::{self, DEFAULT_LIVES};
use crate::game::powerup::{collect_pickups, maybe_spawn_pickup, PickupSpawnConfig};
use crate::game::standings::{self, MatchDecision, REQUIRED_TO_WIN};
use crate::game::state::{MatchPhase, MatchState, PlayerId};

/// Pre-match countdown length (3.0s)
pub const COUNTDOWN_TICKS: u32 = 180;

/// What one call to [`tick`] produced.
#[derive(Debug)]
#[derive(Default)]
pub struct TickResult {
    /// Events the simulation raised this tick
    pub events: Vec<GameEvent>,
    /// The match is decided (this tick or earlier)
    pub match_ended: bool,
    /// Survivor, when decided with one
    pub winner: Option<PlayerId>,
}

/// Tunable match parameters.
#[derive(Clone, Debug)]
pub struct MatchConfig {
    /// Lives each player starts with
    pub max_lives: u32,
    /// Survivor count at which the match is decided
    pub required_to_win: u32,
    /// Pre-match countdown length in ticks
    pub countdown_ticks: u32,
    /// Pickup spawn configuration
    pub pickup_spawn: PickupSpawnConfig,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            max_lives: DEFAULT_LIVES,
            required_to_win: REQUIRED_TO_WIN,
            countdown_ticks: COUNTDOWN_TICKS,
            pickup_spawn: PickupSpawnConfig::default(),
        }
    }
}

/// Begin the pre-match countdown.
pub fn start_match(state: &mut MatchState, config: &MatchConfig) {
    if state.phase == MatchPhase::Waiting {
        state.phase = MatchPhase::Countdown {
            ticks_remaining: config.countdown_ticks,
        };
    }
}

/// Run one simulation tick.
///
/// Every instance of a match calls this with the same inputs and must
/// land on the same state: iteration goes through BTreeMaps, arithmetic
/// is Q16.16 only, and the one source of randomness is `state.rng`.
/// Wall clocks and floats stay out of this path.
pub fn tick(
    state: &mut MatchState,
    inputs: &BTreeMap<PlayerId, InputFrame>,
    config: &MatchConfig,
) -> TickResult {
    let mut result = TickResult::default();

    // Only the Playing phase reaches the pipeline below
    match state.phase {
        MatchPhase::Waiting => {
            return result;
        }
        MatchPhase::Countdown { ticks_remaining } => {
            if ticks_remaining == 0 {
                state.phase = MatchPhase::Playing;
                // First pickup window opens after the initial delay
                state.next_pickup_spawn_tick =
                    state.tick + config.pickup_spawn.initial_delay_ticks;
            } else {
                state.phase = MatchPhase::Countdown {
                    ticks_remaining: ticks_remaining - 1,
                };
            }
            return result;
        }
        MatchPhase::Ended => {
            // Keep reporting the decision without moving the sim
            result.match_ended = true;
            result.winner = state.standings.winner;
            return result;
        }
        MatchPhase::Playing => {}
    }

    // 0. Counter first, so events raised below carry the new tick
    state.tick += 1;

    // 1. Apply player inputs (move intent and dash requests)
    apply_inputs(state, inputs);

    // 2. Advance timers and resolve velocities
    update_movement(state);
    lifecycle::update_life_timers(state);

    // 3. Integrate positions
    integrate_positions(state);

    // 4. Resolve dash contacts into pushes
    dash::resolve_dash_contacts(state);

    // 5. Drop unanswered push requests
    dash::expire_push_requests(state);

    // 6. Pickups: collection before new spawns
    collect_pickups(state);
    maybe_spawn_pickup(state, &config.pickup_spawn);

    // 7. Fall detection
    lifecycle::process_falls(state);

    // 8. Win condition
    if let Some(decision) = standings::evaluate(state, config.required_to_win) {
        result.match_ended = true;
        if let MatchDecision::Winner(winner_id) = decision {
            result.winner = Some(winner_id);
        }
    }

    result.events = state.take_events();
    result
}

/// Apply player inputs to their movement states.
fn apply_inputs(state: &mut MatchState, inputs: &BTreeMap<PlayerId, InputFrame>) {
    // Dash starts need the whole state, so they are collected first
    let mut dash_requests: Vec<(PlayerId, InputFrame)> = Vec::new();

    // The input map iterates in player id order
    for (player_id, input) in inputs {
        if let Some(player) = state.players.get_mut(player_id) {
            if !player.is_alive() || !player.is_active() {
                continue;
            }

            player.movement.set_move_input(input.move_direction());

            if input.dash_pressed() {
                dash_requests.push((*player_id, *input));
            }
        }
    }

    for (player_id, frame) in dash_requests {
        dash::try_start_dash(state, player_id, &frame);
    }
}

/// Step every on-field player's movement state machine.
fn update_movement(state: &mut MatchState) {
    for player in state.players.values_mut() {
        if !player.is_active() {
            continue;
        }
        player.movement.step();
    }
}

/// Integrate positions from resolved velocities.
///
/// No clamping: leaving the arena rectangle is how players fall out.
fn integrate_positions(state: &mut MatchState) {
    for player in state.players.values_mut() {
        if !player.is_active() {
            continue;
        }

        let dx = fixed_mul(player.movement.velocity.x, TICK_DURATION);
        let dy = fixed_mul(player.movement.velocity.y, TICK_DURATION);

        player.position.x = player.position.x.wrapping_add(dx);
        player.position.y = player.position.y.wrapping_add(dy);
    }
}

/// Replay a match from recorded input buffers.
///
/// Buffers are keyed by the pre-tick counter value, matching how a live
/// session records them. Returns the final state and all events.
pub fn replay_match(
    initial_state: MatchState,
    input_buffers: &BTreeMap<PlayerId, PlayerInputBuffer>,
    tick_count: u32,
) -> (MatchState, Vec<GameEvent>) {
    let mut state = initial_state;
    let mut all_events = Vec::new();
    let config = MatchConfig::default();

    // Run as live play whatever phase the snapshot carries
    state.phase = MatchPhase::Playing;

    for _ in 0..tick_count {
        let mut tick_inputs = BTreeMap::new();
        for (player_id, buffer) in input_buffers {
            tick_inputs.insert(*player_id, buffer.get_input_at(state.tick));
        }

        let result = tick(&mut state, &tick_inputs, &config);
        all_events.extend(result.events);

        if result.match_ended {
            break;
        }
    }

    (state, all_events)
}
