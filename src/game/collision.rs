//! Contact detection for dashing players.
//!
//! A contact names
//! the dasher, the player they ran into, and the push direction pointing
//! away from the dasher. Two players dashing into each other produce two
//! contacts, one in each direction.

use crate::core::fixed::{Fixed, fixed_mul, PLAYER_RADIUS};
use crate::core::vec2::FixedVec2;
use crate::game::state::{MatchState, PlayerId, PlayerState};

/// True when two circles touch or overlap.
#[inline]
pub fn circles_overlap(
    pos_a: FixedVec2,
    radius_a: Fixed,
    pos_b: FixedVec2,
    radius_b: Fixed,
) -> bool {
    let combined_radius = radius_a + radius_b;
    let combined_radius_sq = fixed_mul(combined_radius, combined_radius);
    pos_a.distance_squared(pos_b) <= combined_radius_sq
}

/// A dashing player touching another player this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashContact {
    /// The player whose dash caused the contact
    pub dasher: PlayerId,
    /// The player being run into
    pub target: PlayerId,
    /// Unit push direction, from dasher towards target
    pub direction: FixedVec2,
}

/// Check a directed dash contact from `dasher` onto `target`.
///
/// Targets already being pushed are skipped so the first push keeps
/// control until its window expires. Shield handling happens later at
/// push application, where the rejection is observable.
pub fn check_dash_contact(dasher: &PlayerState, target: &PlayerState) -> Option<DashContact> {
    if !dasher.movement.is_dashing() {
        return None;
    }

    // Both must be alive and physically on the arena
    if !dasher.is_alive() || !dasher.is_active() {
        return None;
    }
    if !target.is_alive() || !target.is_active() {
        return None;
    }

    if target.movement.is_pushed() {
        return None;
    }

    if !circles_overlap(dasher.position, PLAYER_RADIUS, target.position, PLAYER_RADIUS) {
        return None;
    }

    // Exactly coincident players give no usable contact normal
    let offset = target.position.sub(dasher.position);
    if offset.length_squared() == 0 {
        return None;
    }

    Some(DashContact {
        dasher: dasher.id,
        target: target.id,
        direction: offset.normalize(),
    })
}

/// Find all dash contacts this tick.
///
/// Iterates player pairs in sorted ID order and checks both directions,
/// so contact order is deterministic and a mutual dash yields a contact
/// each way.
pub fn check_all_dash_contacts(state: &MatchState) -> Vec<DashContact> {
    let mut contacts = Vec::new();
    let ids: Vec<PlayerId> = state.players.keys().copied().collect();

    for i in 0..ids.len() {
        for j in (i + 1)..ids.len() {
            let a = &state.players[&ids[i]];
            let b = &state.players[&ids[j]];

            if let Some(contact) = check_dash_contact(a, b) {
                contacts.push(contact);
            }
            if let Some(contact) = check_dash_contact(b, a) {
                contacts.push(contact);
            }
        }
    }

    contacts
}

// =============================================================================
// TESTS
// =============================================================================
