//! Dash Arena Game Server
//!
//! Authoritative simulation for Dash Arena. Runs a scripted
//! demonstration match and verifies it replays deterministically
//! from the recorded inputs.

use std::collections::BTreeMap;

use anyhow::bail;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use dash_arena::{
    TICK_RATE, VERSION,
    core::fixed::Fixed,
    core::vec2::FixedVec2,
    game::{
        events::{GameEvent, GameEventData},
        input::{InputFrame, PlayerInputBuffer},
        standings,
        state::{MatchPhase, MatchState, PlayerId},
        tick::{replay_match, tick, MatchConfig},
    },
};

/// Demo cutoff: two minutes of game time.
const DEMO_TICK_LIMIT: u32 = 7200;

/// Bot steering deadzone (0.1)
const STEER_DEADZONE: Fixed = 6554;

/// Bots dash inside this range (6.25 = 2.5 squared)
const DASH_RANGE_SQ: Fixed = 409600;

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Dash Arena Server v{}, simulating at {} Hz", VERSION, TICK_RATE);

    demo_match()
}

/// Run a bot-driven match, then replay it from the recordings.
fn demo_match() -> anyhow::Result<()> {
    info!("=== Demo Match ===");

    let match_id = [7u8; 16];
    let rng_seed = 424_242u64;
    let config = MatchConfig::default();
    let mut state = MatchState::new(match_id, rng_seed);

    info!("match {} seed {}", hex::encode(match_id), rng_seed);

    let player_ids: Vec<PlayerId> = (1..=4)
        .map(|i| PlayerId::new([i; 16]))
        .collect();

    for id in &player_ids {
        state.add_player(*id, None, config.max_lives);
        let player = state.get_player(id).unwrap();
        let (x, y) = player.position.to_floats();
        info!("Added {} at ({:.2}, {:.2})", player.life.display_name, x, y);
    }
    let _ = state.take_events();

    // Straight into live play; the recordings start at tick zero
    state.phase = MatchPhase::Playing;

    let mut recordings: BTreeMap<PlayerId, PlayerInputBuffer> = player_ids
        .iter()
        .map(|id| (*id, PlayerInputBuffer::new(*id, match_id, rng_seed)))
        .collect();

    let mut total_events = 0;
    let mut last_report_tick = 0;
    let mut ticks_run = 0;

    for _ in 0..DEMO_TICK_LIMIT {
        // Chase bots steer from the pre-tick state
        let mut inputs: BTreeMap<PlayerId, InputFrame> = BTreeMap::new();
        for id in &player_ids {
            inputs.insert(*id, bot_frame(&state, id));
        }

        // Record what the simulation is about to consume
        for (id, frame) in &inputs {
            if let Some(buffer) = recordings.get_mut(id) {
                buffer.record(state.tick, *frame);
            }
        }

        let result = tick(&mut state, &inputs, &config);
        ticks_run += 1;
        total_events += result.events.len();

        // Progress line every 10 seconds of game time
        if state.tick - last_report_tick >= 600 {
            let pickups = state.pickups.values().filter(|p| !p.collected).count();
            info!(
                "Tick {}: {} alive, {} pickups, {} events so far",
                state.tick,
                state.alive_count(),
                pickups,
                total_events
            );
            last_report_tick = state.tick;
        }

        for event in &result.events {
            log_event(&state, event);
        }

        if result.match_ended {
            info!("Match ended at tick {}", state.tick);
            break;
        }
    }

    info!("=== Results ===");
    let final_hash = state.compute_hash();
    info!("live hash {}", hex::encode(final_hash));

    for row in standings::placements(&state) {
        if row.placement > 0 {
            info!("#{}: {} - {} lives left", row.placement, row.display_name, row.lives);
        } else {
            info!("--: {} - {} lives left", row.display_name, row.lives);
        }
    }
    info!("{} events over {} ticks", total_events, ticks_run);

    // Close the recordings at the final tick
    for buffer in recordings.values_mut() {
        buffer.finalize(state.tick);
    }
    for (id, buffer) in &recordings {
        info!(
            "Input recording {}: {}",
            display_name(&state, id),
            hex::encode(buffer.content_hash())
        );
    }

    // Replay the recordings against the live hash
    info!("=== Replay Check ===");
    let mut replay_state = MatchState::new(match_id, rng_seed);
    for id in &player_ids {
        replay_state.add_player(*id, None, config.max_lives);
    }
    let _ = replay_state.take_events();

    let (replay_final, _events) = replay_match(replay_state, &recordings, ticks_run);
    let replay_hash = replay_final.compute_hash();
    info!("replay hash {}", hex::encode(replay_hash));

    if final_hash != replay_hash {
        bail!("determinism failure: replay hash differs from live hash");
    }
    info!("replay reproduced the live run");

    Ok(())
}

/// Deterministic chase bot: run at the nearest living opponent and
/// dash once they are in range.
fn bot_frame(state: &MatchState, id: &PlayerId) -> InputFrame {
    let player = match state.get_player(id) {
        Some(p) if p.is_alive() && p.is_active() => p,
        _ => return InputFrame::new(),
    };

    let mut nearest: Option<(Fixed, FixedVec2)> = None;
    for (other_id, other) in &state.players {
        if other_id == id || !other.is_alive() || !other.is_active() {
            continue;
        }
        let dist = player.position.distance_squared(other.position);
        let closer = match nearest {
            Some((best, _)) => dist < best,
            None => true,
        };
        if closer {
            nearest = Some((dist, other.position));
        }
    }

    let (dist, target) = match nearest {
        Some(found) => found,
        None => return InputFrame::new(),
    };

    let offset = target.sub(player.position);
    let mut frame = InputFrame::with_movement(steer(offset.x), steer(offset.y));

    if dist < DASH_RANGE_SQ && player.movement.dash_ready() {
        frame.set_dash(true);
    }

    frame
}

/// Map a fixed-point offset onto a full joystick deflection.
fn steer(v: Fixed) -> i8 {
    if v > STEER_DEADZONE {
        127
    } else if v < -STEER_DEADZONE {
        -127
    } else {
        0
    }
}

/// Log the events spectators care about.
fn log_event(state: &MatchState, event: &GameEvent) {
    match &event.data {
        GameEventData::PushApplied { source_id, target_id, .. } => {
            info!(
                "Tick {}: {} shoved {}",
                event.tick,
                display_name(state, source_id),
                display_name(state, target_id)
            );
        }
        GameEventData::PlayerLifeChanged { player_id, lives, .. } => {
            info!(
                "Tick {}: {} down to {} lives",
                event.tick,
                display_name(state, player_id),
                lives
            );
        }
        GameEventData::PlayerEliminated { player_id, placement, .. } => {
            info!(
                "Tick {}: {} eliminated (placement {})",
                event.tick,
                display_name(state, player_id),
                placement
            );
        }
        GameEventData::PowerUpCollected { player_id, kind, .. } => {
            info!(
                "Tick {}: {} collected {:?}",
                event.tick,
                display_name(state, player_id),
                kind
            );
        }
        GameEventData::GameWon { winner_id, .. } => {
            info!(
                "Tick {}: {} wins the match!",
                event.tick,
                display_name(state, winner_id)
            );
        }
        GameEventData::GameDraw {} => {
            info!("Tick {}: draw, nobody survived", event.tick);
        }
        _ => {}
    }
}

/// Player's display name, or a short hex ID if they are unknown.
fn display_name(state: &MatchState, id: &PlayerId) -> String {
    match state.get_player(id) {
        Some(p) => p.life.display_name.clone(),
        None => hex::encode(&id.0[..4]),
    }
}
