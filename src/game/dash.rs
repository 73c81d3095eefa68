//! Dash Activation and Push Resolution
//!
//! Turns dash input into dashes and dash contacts into pushes. Under
//! authoritative mode a contact pushes the target immediately. Under
//! remote mode the push becomes a request forwarded to the target's
//! owner, applied only on confirmation and dropped after a bounded
//! timeout so an unanswered request can never wedge the match.

use serde::{Serialize, Deserialize};
use tracing::warn;

use crate::core::fixed::{Fixed, DASH_PUSH_DURATION_TICKS, DASH_PUSH_FORCE};
use crate::core::vec2::FixedVec2;
use crate::game::collision::check_all_dash_contacts;
use crate::game::events::GameEvent;
use crate::game::input::InputFrame;
use crate::game::movement::PushOutcome;
use crate::game::state::{AuthorityMode, MatchState, PlayerId};

/// Ticks a forwarded push request may wait for confirmation (0.5s)
pub const PUSH_CONFIRM_TIMEOUT_TICKS: u32 = 30;

// =============================================================================
// PUSH REQUESTS
// =============================================================================

/// A push forwarded to the target's owner for application.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRequest {
    /// Request identifier, unique within the match
    pub request_id: u32,
    /// Player whose dash caused the push
    pub source_id: PlayerId,
    /// Player to be pushed
    pub target_id: PlayerId,
    /// Unit push direction
    pub direction: FixedVec2,
    /// Push speed
    pub force: Fixed,
    /// Push window in ticks
    pub duration_ticks: u32,
}

/// An unconfirmed push request with its expiry deadline.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PendingPush {
    /// The forwarded request
    pub request: PushRequest,
    /// Tick at which the request is dropped
    pub expires_at_tick: u32,
}

/// Why an inbound push request was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PushRejectReason {
    /// No such player in the roster
    UnknownTarget,
    /// Target is eliminated or off the arena
    TargetInactive,
    /// Target's shield rejected the push
    TargetShielded,
    /// Target is already being pushed
    TargetAlreadyPushed,
    /// Direction was zero
    InvalidDirection,
}

/// Outcome of validating an inbound push request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushRequestDecision {
    /// Request passed validation and the push was applied
    Confirmed(PushOutcome),
    /// Request was refused
    Rejected(PushRejectReason),
}

// =============================================================================
// DASH ACTIVATION
// =============================================================================

/// Try to start a dash from an input frame.
///
/// Direction comes from the dash hint when present, then the current
/// move direction, then the last facing. Returns whether the dash
/// started; rejected requests (cooldown, already dashing, being pushed)
/// are dropped silently.
pub fn try_start_dash(state: &mut MatchState, player_id: PlayerId, frame: &InputFrame) -> bool {
    let tick = state.tick;

    let (started, direction) = {
        let player = match state.get_player_mut(&player_id) {
            Some(p) => p,
            None => return false,
        };
        if !player.is_alive() || !player.is_active() {
            return false;
        }

        let direction = frame.dash_hint().unwrap_or_else(|| {
            let mv = frame.move_direction();
            if mv.length_squared() > 0 {
                mv
            } else {
                player.movement.facing
            }
        });

        let started = player.movement.request_dash(direction);
        (started, player.movement.dash_direction)
    };

    if started {
        state.push_event(GameEvent::dash_started(tick, player_id, direction));
    }
    started
}

// =============================================================================
// PUSH RESOLUTION
// =============================================================================

/// Resolve this tick's dash contacts into pushes or push requests.
///
/// Contacts are gathered before any push lands, so two players dashing
/// into each other both get pushed.
pub fn resolve_dash_contacts(state: &mut MatchState) {
    let contacts = check_all_dash_contacts(state);

    for contact in contacts {
        match state.authority {
            AuthorityMode::Authoritative => {
                apply_push_to_target(
                    state,
                    contact.dasher,
                    contact.target,
                    contact.direction,
                    DASH_PUSH_FORCE,
                    DASH_PUSH_DURATION_TICKS,
                );
            }
            AuthorityMode::Remote => {
                queue_push_request(
                    state,
                    contact.dasher,
                    contact.target,
                    contact.direction,
                    DASH_PUSH_FORCE,
                    DASH_PUSH_DURATION_TICKS,
                );
            }
        }
    }
}

/// Apply a push to a target player, emitting the matching event.
///
/// Returns None for an unknown target (logged and dropped). A shield
/// rejection is observable as a PushBlocked event; an already-pushed
/// target swallows the push silently.
pub fn apply_push_to_target(
    state: &mut MatchState,
    source_id: PlayerId,
    target_id: PlayerId,
    direction: FixedVec2,
    force: Fixed,
    duration_ticks: u32,
) -> Option<PushOutcome> {
    let tick = state.tick;

    let outcome = {
        let target = match state.get_player_mut(&target_id) {
            Some(t) => t,
            None => {
                warn!(
                    target = %target_id.to_uuid_string(),
                    "dropping push for unknown target"
                );
                return None;
            }
        };
        target.movement.apply_push(direction, force, duration_ticks)
    };

    match outcome {
        PushOutcome::Applied => {
            state.push_event(GameEvent::push_applied(tick, source_id, target_id, direction, force));
        }
        PushOutcome::Shielded => {
            state.push_event(GameEvent::push_blocked(tick, source_id, target_id));
        }
        PushOutcome::AlreadyPushed => {}
    }

    Some(outcome)
}

/// Queue a push request for the target's owner.
///
/// At most one outstanding request per target; repeat contacts while one
/// is pending are dropped.
fn queue_push_request(
    state: &mut MatchState,
    source_id: PlayerId,
    target_id: PlayerId,
    direction: FixedVec2,
    force: Fixed,
    duration_ticks: u32,
) {
    let already_pending = state
        .pending_pushes
        .values()
        .any(|p| p.request.target_id == target_id);
    if already_pending {
        return;
    }

    let request_id = state.next_push_request_id();
    let request = PushRequest {
        request_id,
        source_id,
        target_id,
        direction,
        force,
        duration_ticks,
    };

    state.pending_pushes.insert(request_id, PendingPush {
        request,
        expires_at_tick: state.tick + PUSH_CONFIRM_TIMEOUT_TICKS,
    });
    state.outbox.push(request);
}

// =============================================================================
// CONFIRMATION
// =============================================================================

/// Apply a confirmed push request.
///
/// Returns None when the request is unknown, which includes requests
/// already dropped by the timeout; a late confirmation is discarded.
pub fn confirm_push(state: &mut MatchState, request_id: u32) -> Option<PushOutcome> {
    let pending = state.pending_pushes.remove(&request_id)?;
    let r = pending.request;
    apply_push_to_target(state, r.source_id, r.target_id, r.direction, r.force, r.duration_ticks)
}

/// Discard a rejected push request.
pub fn reject_push(state: &mut MatchState, request_id: u32) {
    state.pending_pushes.remove(&request_id);
}

/// Drop requests whose confirmation window has passed.
pub fn expire_push_requests(state: &mut MatchState) {
    let tick = state.tick;
    let expired: Vec<u32> = state
        .pending_pushes
        .iter()
        .filter(|(_, p)| tick >= p.expires_at_tick)
        .map(|(id, _)| *id)
        .collect();

    for id in expired {
        if let Some(pending) = state.pending_pushes.remove(&id) {
            warn!(request_id = id, "push confirmation timed out, dropping request");
            state.push_event(GameEvent::push_request_expired(
                tick,
                id,
                pending.request.target_id,
            ));
        }
    }
}

// =============================================================================
// INBOUND VALIDATION
// =============================================================================

/// Validate and apply a push request arriving from a remote instance.
pub fn handle_push_request(
    state: &mut MatchState,
    source_id: PlayerId,
    target_id: PlayerId,
    direction: FixedVec2,
    force: Fixed,
    duration_ticks: u32,
) -> PushRequestDecision {
    if direction.length_squared() == 0 {
        return PushRequestDecision::Rejected(PushRejectReason::InvalidDirection);
    }

    {
        let target = match state.get_player(&target_id) {
            Some(t) => t,
            None => return PushRequestDecision::Rejected(PushRejectReason::UnknownTarget),
        };
        if !target.is_alive() || !target.is_active() {
            return PushRequestDecision::Rejected(PushRejectReason::TargetInactive);
        }
        if target.movement.is_shielded() {
            return PushRequestDecision::Rejected(PushRejectReason::TargetShielded);
        }
        if target.movement.is_pushed() {
            return PushRequestDecision::Rejected(PushRejectReason::TargetAlreadyPushed);
        }
    }

    match apply_push_to_target(state, source_id, target_id, direction, force, duration_ticks) {
        Some(outcome) => PushRequestDecision::Confirmed(outcome),
        None => PushRequestDecision::Rejected(PushRejectReason::UnknownTarget),
    }
}

// =============================================================================
// TESTS
// =============================================================================
