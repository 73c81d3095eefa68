//! Win Condition Aggregation
//!
//! Watches the roster and decides the match outcome exactly once: a
//! single survivor wins, zero survivors is a draw. The survivor count is
//! recomputed from the roster on every evaluation rather than tracked
//! incrementally, so it stays correct across resets and late joins.

use serde::{Serialize, Deserialize};

use crate::game::events::GameEvent;
use crate::game::state::{MatchPhase, MatchState, PlayerId};

/// Survivor threshold at which the match is decided.
pub const REQUIRED_TO_WIN: u32 = 1;

// =============================================================================
// STANDINGS
// =============================================================================

/// Match outcome bookkeeping.
///
/// Once `decided` is set, later eliminations and resets of individual
/// players never change the outcome.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Standings {
    /// The outcome has been decided
    pub decided: bool,
    /// The sole survivor, if the match was won rather than drawn
    pub winner: Option<PlayerId>,
}

/// Final outcome of a decided match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchDecision {
    /// Exactly one player survived
    Winner(PlayerId),
    /// Nobody survived
    Draw,
}

/// One row of the final scoreboard.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayerPlacement {
    /// Player identifier
    pub player_id: PlayerId,
    /// Join index
    pub player_index: u32,
    /// Display name
    pub display_name: String,
    /// 1 = winner; eliminated players count backwards from last place
    pub placement: u32,
    /// Lives left at match end
    pub lives: u32,
}

// =============================================================================
// EVALUATION
// =============================================================================

/// Re-count survivors and decide the match if the threshold is reached.
///
/// Returns the decision the first time it is made; afterwards (and while
/// more than the threshold survive) returns None.
pub fn evaluate(state: &mut MatchState, required_to_win: u32) -> Option<MatchDecision> {
    if state.standings.decided {
        return None;
    }

    let survivors: Vec<PlayerId> = state.alive_players().map(|p| p.id).collect();
    if survivors.len() as u32 > required_to_win {
        return None;
    }

    let tick = state.tick;
    state.standings.decided = true;
    state.phase = MatchPhase::Ended;

    if survivors.len() == 1 {
        let winner_id = survivors[0];
        state.standings.winner = Some(winner_id);

        let index = {
            let winner = state.get_player_mut(&winner_id);
            match winner {
                Some(p) => {
                    p.life.placement = Some(1);
                    p.life.player_index
                }
                None => 0,
            }
        };

        state.push_event(GameEvent::game_won(tick, winner_id, index));
        Some(MatchDecision::Winner(winner_id))
    } else {
        state.push_event(GameEvent::game_draw(tick));
        Some(MatchDecision::Draw)
    }
}

/// Final scoreboard, winner first.
///
/// Undecided players sort after placed ones, by join order.
pub fn placements(state: &MatchState) -> Vec<PlayerPlacement> {
    let mut rows: Vec<PlayerPlacement> = state
        .players
        .values()
        .map(|p| PlayerPlacement {
            player_id: p.id,
            player_index: p.life.player_index,
            display_name: p.life.display_name.clone(),
            placement: p.life.placement.unwrap_or(0),
            lives: p.life.lives,
        })
        .collect();

    rows.sort_by_key(|row| {
        let rank = if row.placement == 0 { u32::MAX } else { row.placement };
        (rank, row.player_index)
    });
    rows
}

// =============================================================================
// TESTS
// =============================================================================
