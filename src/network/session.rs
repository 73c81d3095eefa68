//! Session layer: one lobby, one match, one set of connected players.
//!
//! A [`MatchSession`] walks Lobby -> Countdown -> Playing -> Ended ->
//! Closed, feeding buffered client inputs into the deterministic
//! simulation once per tick and recording everything needed to replay
//! the match afterwards. Everything network-visible lives here; the
//! simulation itself never sees a socket.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock, broadcast};

use crate::core::rng::derive_match_seed;
use crate::game::dash::{self, PushRequest, PushRequestDecision};
use crate::game::events::GameEvent;
use crate::game::input::{InputFrame, PlayerInputBuffer};
use crate::game::lifecycle;
use crate::game::movement::PushOutcome;
use crate::game::standings;
use crate::game::state::{AuthorityMode, MatchPhase, MatchState, PlayerId};
use crate::game::tick::{tick, MatchConfig, TickResult};
use crate::network::protocol::{
    ServerMessage, GameStateUpdate, MatchEvent, MatchEndInfo, PlacementInfo,
    MatchStartInfo, InitialPlayerInfo, LobbyUpdate, LobbyPlayer, PushRequestMsg,
};

/// Handle a session is registered under.
pub type SessionId = [u8; 16];

/// Where a session is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Collecting players; nobody is simulating yet.
    Lobby,
    /// All seats ready, countdown running inside the simulation.
    Countdown,
    /// Live match.
    Playing,
    /// Match decided, results pending collection.
    Ended,
    /// Finished with; the manager may drop it.
    Closed,
}

/// Whether a seat currently has a live connection behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Live connection.
    Connected,
    /// Connection lost; the seat is held open for a reconnect.
    Disconnected {
        /// Tick at which the connection dropped.
        since_tick: u32,
    },
}

/// Limits and windows for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Seats available.
    pub max_players: usize,
    /// Seats that must be filled and ready before a match can start.
    pub min_players: usize,
    /// How long a disconnected player keeps their seat, in ticks.
    pub reconnect_timeout_ticks: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_players: 4,
            min_players: 2,
            reconnect_timeout_ticks: 1800, // 30 s at 60 Hz
        }
    }
}

/// One seat in a session.
#[derive(Debug)]
pub struct SessionPlayer {
    /// Who holds the seat.
    pub player_id: PlayerId,
    /// Name to show; the simulation assigns one if missing.
    pub display_name: Option<String>,
    /// Ready to start.
    pub ready: bool,
    /// Live connection or held for reconnect.
    pub connection_state: ConnectionState,
    /// Most recent input frame, replayed until the next one arrives.
    pub last_input: InputFrame,
    /// Tick stamp the client attached to that frame.
    pub last_input_tick: u32,
    /// Round-trip estimate in milliseconds, from ping traffic.
    pub rtt_ms: u32,
    /// Outbound channel for server messages.
    pub sender: mpsc::Sender<ServerMessage>,
}

impl SessionPlayer {
    /// Whether the seat has a live connection.
    pub fn is_connected(&self) -> bool {
        matches!(self.connection_state, ConnectionState::Connected)
    }
}

/// A single match from lobby to results.
pub struct MatchSession {
    /// Session identifier, doubling as the match id.
    pub id: SessionId,
    /// Lifecycle state.
    pub state: SessionState,
    /// Seat limits and reconnect window.
    pub config: SessionConfig,
    /// Simulation parameters for the match.
    pub match_config: MatchConfig,
    /// Seats, keyed by player.
    players: BTreeMap<PlayerId, SessionPlayer>,
    /// The deterministic simulation, present once a match has started.
    game_state: Option<MatchState>,
    /// Per-player input recordings for replay verification.
    recordings: BTreeMap<PlayerId, PlayerInputBuffer>,
    /// State snapshot from the moment the countdown handed over to play.
    replay_base: Option<MatchState>,
    /// Fanout channel for match events.
    event_tx: broadcast::Sender<MatchEvent>,
}

impl MatchSession {
    /// Create a new session in the lobby state.
    pub fn new(id: SessionId, config: SessionConfig) -> Self {
        let (event_tx, _) = broadcast::channel(256);

        Self {
            id,
            state: SessionState::Lobby,
            config,
            match_config: MatchConfig::default(),
            players: BTreeMap::new(),
            game_state: None,
            recordings: BTreeMap::new(),
            replay_base: None,
            event_tx,
        }
    }

    /// Seat a player in the lobby.
    pub fn add_player(
        &mut self,
        player_id: PlayerId,
        display_name: Option<String>,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Result<(), SessionError> {
        if self.state != SessionState::Lobby {
            return Err(SessionError::MatchInProgress);
        }
        if self.players.len() >= self.config.max_players {
            return Err(SessionError::SessionFull);
        }
        if self.players.contains_key(&player_id) {
            return Err(SessionError::AlreadyInSession);
        }

        let seat = SessionPlayer {
            player_id,
            display_name,
            ready: false,
            connection_state: ConnectionState::Connected,
            last_input: InputFrame::new(),
            last_input_tick: 0,
            rtt_ms: 0,
            sender,
        };
        self.players.insert(player_id, seat);
        Ok(())
    }

    /// Remove a player entirely.
    ///
    /// Leaving a running match forfeits it. An emptied lobby closes
    /// itself.
    pub fn remove_player(&mut self, player_id: &PlayerId) -> bool {
        if self.players.remove(player_id).is_none() {
            return false;
        }

        if let Some(state) = self.game_state.as_mut() {
            if !state.is_ended() {
                lifecycle::forfeit_player(state, *player_id);
            }
        }

        if self.state == SessionState::Lobby && self.players.is_empty() {
            self.state = SessionState::Closed;
        }
        true
    }

    /// Mark a seat as disconnected, holding it for a reconnect.
    ///
    /// Returns false for unknown players.
    pub fn mark_disconnected(&mut self, player_id: &PlayerId) -> bool {
        let since_tick = self.current_tick();
        match self.players.get_mut(player_id) {
            Some(player) => {
                player.connection_state = ConnectionState::Disconnected { since_tick };
                // The simulation must not keep replaying their last frame
                player.last_input = InputFrame::new();
                true
            }
            None => false,
        }
    }

    /// Put a returning player back on their seat with a fresh channel.
    ///
    /// Returns the current tick so the caller can resync the client,
    /// or `None` when the seat is unknown or the grace window passed.
    pub fn reconnect_player(
        &mut self,
        player_id: &PlayerId,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Option<u32> {
        let current_tick = self.current_tick();
        let window = self.config.reconnect_timeout_ticks;

        let player = self.players.get_mut(player_id)?;
        if let ConnectionState::Disconnected { since_tick } = player.connection_state {
            if current_tick.saturating_sub(since_tick) > window {
                // Seat already forfeited, or about to be
                return None;
            }
        }

        player.connection_state = ConnectionState::Connected;
        player.sender = sender;
        Some(current_tick)
    }

    /// Whether a disconnected player is still inside the grace window.
    pub fn can_reconnect(&self, player_id: &PlayerId) -> bool {
        let current_tick = self.current_tick();
        match self.players.get(player_id).map(|p| p.connection_state) {
            Some(ConnectionState::Disconnected { since_tick }) => {
                current_tick.saturating_sub(since_tick) <= self.config.reconnect_timeout_ticks
            }
            _ => false,
        }
    }

    /// Forfeit every seat whose grace window has expired.
    ///
    /// Returns the players that were timed out this call.
    pub fn check_reconnect_timeouts(&mut self) -> Vec<PlayerId> {
        let current_tick = self.current_tick();
        let window = self.config.reconnect_timeout_ticks;

        let mut timed_out = Vec::new();
        for (id, player) in &self.players {
            if let ConnectionState::Disconnected { since_tick } = player.connection_state {
                if current_tick.saturating_sub(since_tick) > window {
                    timed_out.push(*id);
                }
            }
        }

        if let Some(state) = self.game_state.as_mut() {
            for player_id in &timed_out {
                lifecycle::forfeit_player(state, *player_id);
            }
        }

        timed_out
    }

    /// Flip a player's ready flag.
    pub fn set_player_ready(&mut self, player_id: &PlayerId, ready: bool) -> bool {
        match self.players.get_mut(player_id) {
            Some(player) => {
                player.ready = ready;
                true
            }
            None => false,
        }
    }

    /// Whether enough players are seated, connected and ready to start.
    pub fn all_players_ready(&self) -> bool {
        self.players.len() >= self.config.min_players
            && self.players.values().all(|p| p.ready && p.is_connected())
    }

    /// Number of seated players.
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Build the lobby roster message.
    pub fn lobby_update(&self) -> LobbyUpdate {
        let players = self.players.iter()
            .enumerate()
            .map(|(index, (id, p))| LobbyPlayer {
                player_id: id.0,
                display_name: p.display_name.clone()
                    .unwrap_or_else(|| format!("P{}", index + 1)),
                ready: p.ready,
            })
            .collect();

        LobbyUpdate {
            players,
            min_players: self.config.min_players as u32,
            max_players: self.config.max_players as u32,
        }
    }

    /// Take the lobby into the countdown.
    pub fn start_match(&mut self) -> Result<MatchStartInfo, SessionError> {
        if self.state != SessionState::Lobby {
            return Err(SessionError::InvalidState);
        }

        if !self.all_players_ready() {
            return Err(SessionError::PlayersNotReady);
        }

        // The seed commits to the match id and the full roster
        let player_ids: Vec<[u8; 16]> = self.players.keys()
            .map(|id| id.0)
            .collect();
        let rng_seed = derive_match_seed(&self.id, &player_ids);

        let mut game_state = MatchState::new(self.id, rng_seed);

        let roster: Vec<(PlayerId, Option<String>)> = self.players.iter()
            .map(|(id, p)| (*id, p.display_name.clone()))
            .collect();
        for (player_id, name) in roster {
            game_state.add_player(player_id, name, self.match_config.max_lives);
        }

        // Spawn data travels in the start info below
        let _ = game_state.take_events();

        // One input recording per player, keyed for replay
        self.recordings = self
            .players
            .keys()
            .map(|id| (*id, PlayerInputBuffer::new(*id, self.id, rng_seed)))
            .collect();

        let players: Vec<InitialPlayerInfo> = game_state.players.values()
            .map(|p| InitialPlayerInfo {
                player_id: p.id.0,
                display_name: p.life.display_name.clone(),
                player_index: p.life.player_index,
                position: [p.position.x, p.position.y],
                lives: p.life.lives,
            })
            .collect();

        let start_tick = game_state.tick;
        game_state.phase = MatchPhase::Countdown {
            ticks_remaining: self.match_config.countdown_ticks,
        };

        self.game_state = Some(game_state);
        self.state = SessionState::Countdown;

        Ok(MatchStartInfo {
            match_id: self.id,
            rng_seed,
            start_tick,
            countdown_ticks: self.match_config.countdown_ticks,
            players,
        })
    }

    /// Buffer a game input from a player.
    ///
    /// The frame is replayed every tick until the next one arrives.
    pub fn process_input(
        &mut self,
        player_id: &PlayerId,
        tick_number: u32,
        input: InputFrame,
    ) -> Result<(), SessionError> {
        if self.state != SessionState::Playing {
            return Err(SessionError::MatchNotInProgress);
        }

        match self.players.get_mut(player_id) {
            Some(player) => {
                player.last_input = input;
                player.last_input_tick = tick_number;
                Ok(())
            }
            None => Err(SessionError::PlayerNotFound),
        }
    }

    /// Advance the session by one tick.
    pub fn run_tick(&mut self) -> Option<TickResult> {
        if self.state != SessionState::Countdown && self.state != SessionState::Playing {
            return None;
        }

        // Eliminate players who have been disconnected too long
        let _timed_out = self.check_reconnect_timeouts();

        // Feed each seat's latest frame; mark_disconnected left a
        // neutral frame behind for anyone who dropped
        let mut inputs = BTreeMap::new();
        for (player_id, player) in &self.players {
            inputs.insert(*player_id, player.last_input);
        }

        // Record what the simulation is about to consume, keyed by the
        // pre-tick counter so a replay looks up the same frames.
        let recording_tick = match self.game_state.as_ref() {
            Some(state) if state.phase == MatchPhase::Playing => Some(state.tick),
            _ => None,
        };
        if let Some(pre_tick) = recording_tick {
            for (player_id, frame) in &inputs {
                if let Some(buffer) = self.recordings.get_mut(player_id) {
                    buffer.record(pre_tick, *frame);
                }
            }
        }

        let (result, handover) = {
            let state = self.game_state.as_mut()?;
            let result = tick(state, &inputs, &self.match_config);

            // The countdown runs inside the simulation; watch for the
            // handover to live play.
            let handover = if self.state == SessionState::Countdown
                && state.phase == MatchPhase::Playing
            {
                Some(state.clone())
            } else {
                None
            };

            (result, handover)
        };

        if let Some(base) = handover {
            // Replays start from this snapshot
            self.state = SessionState::Playing;
            self.replay_base = Some(base);
        }

        if result.match_ended {
            self.state = SessionState::Ended;
        }

        Some(result)
    }

    /// Validate and apply a push requested by a remote instance.
    pub fn handle_push_request(
        &mut self,
        source_id: PlayerId,
        msg: &PushRequestMsg,
    ) -> Result<PushRequestDecision, SessionError> {
        if self.state != SessionState::Playing {
            return Err(SessionError::MatchNotInProgress);
        }

        let target_id = match msg.target_id_bytes() {
            Some(bytes) => PlayerId(bytes),
            None => return Err(SessionError::PlayerNotFound),
        };

        let state = self.game_state.as_mut().ok_or(SessionError::MatchNotInProgress)?;
        Ok(dash::handle_push_request(
            state,
            source_id,
            target_id,
            msg.direction_vec(),
            msg.force,
            msg.duration_ticks,
        ))
    }

    /// Apply a pending push that the target's owner confirmed.
    pub fn confirm_push(&mut self, request_id: u32) -> Option<PushOutcome> {
        let state = self.game_state.as_mut()?;
        dash::confirm_push(state, request_id)
    }

    /// Drop a pending push that the target's owner refused.
    pub fn reject_push(&mut self, request_id: u32) {
        if let Some(state) = self.game_state.as_mut() {
            dash::reject_push(state, request_id);
        }
    }

    /// Drain push requests queued for remote confirmation.
    pub fn pending_push_requests(&mut self) -> Vec<PushRequest> {
        match self.game_state.as_mut() {
            Some(state) => state.take_outbox(),
            None => Vec::new(),
        }
    }

    /// Switch push authority, e.g. for driving a headless replica.
    pub fn set_authority_mode(&mut self, mode: AuthorityMode) {
        if let Some(state) = self.game_state.as_mut() {
            state.authority = mode;
        }
    }

    /// Snapshot the current state for broadcast to clients.
    pub fn generate_state_update(&self) -> Option<GameStateUpdate> {
        let state = self.game_state.as_ref()?;
        Some(GameStateUpdate::from_state(state))
    }

    /// Assemble final results and close the session.
    pub fn finalize(&mut self) -> Option<MatchEndInfo> {
        if self.state != SessionState::Ended {
            return None;
        }

        let (end_tick, final_hash, winner_id, placements) = {
            let state = self.game_state.as_ref()?;

            let placements: Vec<PlacementInfo> = standings::placements(state)
                .into_iter()
                .map(|row| PlacementInfo {
                    player_id: row.player_id.0,
                    display_name: row.display_name,
                    place: row.placement,
                    lives: row.lives,
                })
                .collect();

            (
                state.tick,
                state.compute_hash(),
                state.standings.winner.map(|id| id.0),
                placements,
            )
        };

        // Close the recordings at the final tick
        for buffer in self.recordings.values_mut() {
            buffer.finalize(end_tick);
        }

        self.state = SessionState::Closed;

        Some(MatchEndInfo {
            match_id: self.id,
            end_tick,
            winner_id,
            placements,
            final_state_hash: final_hash,
        })
    }

    /// Take the per-player input recordings.
    pub fn take_recordings(&mut self) -> BTreeMap<PlayerId, PlayerInputBuffer> {
        std::mem::take(&mut self.recordings)
    }

    /// Take the state snapshot captured when live play began.
    pub fn take_replay_base(&mut self) -> Option<MatchState> {
        self.replay_base.take()
    }

    /// Read access to the simulation state, if a match has started.
    pub fn game_state(&self) -> Option<&MatchState> {
        self.game_state.as_ref()
    }

    /// Publish simulation events to subscribers.
    pub fn publish_events(&self, events: &[GameEvent]) {
        for event in events {
            let _ = self.event_tx.send(MatchEvent::from_game_event(event));
        }
    }

    /// Open an event receiver for this session.
    pub fn subscribe_events(&self) -> broadcast::Receiver<MatchEvent> {
        self.event_tx.subscribe()
    }

    /// Send a message to every seat with a live connection.
    pub async fn broadcast(&self, message: ServerMessage) {
        for player in self.players.values() {
            if player.is_connected() {
                let _ = player.sender.send(message.clone()).await;
            }
        }
    }

    /// Current lifecycle state.
    pub fn get_state(&self) -> SessionState {
        self.state
    }

    /// Simulation tick counter, zero before a match starts.
    pub fn current_tick(&self) -> u32 {
        self.game_state.as_ref().map(|s| s.tick).unwrap_or(0)
    }
}

/// Why a session operation was refused.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    /// No free seat.
    #[error("Session has no free seats")]
    SessionFull,

    /// The player already holds a seat here.
    #[error("Player is already in this session")]
    AlreadyInSession,

    /// Seating is only possible in the lobby.
    #[error("Match already in progress")]
    MatchInProgress,

    /// The operation needs a live match.
    #[error("No match in progress")]
    MatchNotInProgress,

    /// The session is in the wrong state for the operation.
    #[error("Invalid session state")]
    InvalidState,

    /// The ready gate is still open.
    #[error("Not all players are ready")]
    PlayersNotReady,

    /// No such player in this session.
    #[error("Player not found in this session")]
    PlayerNotFound,
}

// =============================================================================
// SESSION MANAGER
// =============================================================================

/// Registry of live sessions, shared across connection handlers.
pub struct SessionManager {
    /// Sessions by id.
    sessions: RwLock<BTreeMap<SessionId, Arc<RwLock<MatchSession>>>>,
    /// Which session each player currently occupies.
    player_sessions: RwLock<BTreeMap<PlayerId, SessionId>>,
}

impl SessionManager {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(BTreeMap::new()),
            player_sessions: RwLock::new(BTreeMap::new()),
        }
    }

    /// Open a fresh session and return its id.
    pub async fn create_session(&self, config: SessionConfig) -> SessionId {
        let id = uuid::Uuid::new_v4().into_bytes();
        let session = Arc::new(RwLock::new(MatchSession::new(id, config)));
        self.sessions.write().await.insert(id, session);
        id
    }

    /// Look up a session by id.
    pub async fn get_session(&self, id: &SessionId) -> Option<Arc<RwLock<MatchSession>>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Look up the session a player occupies.
    pub async fn get_player_session(&self, player_id: &PlayerId) -> Option<Arc<RwLock<MatchSession>>> {
        let session_id = *self.player_sessions.read().await.get(player_id)?;
        self.get_session(&session_id).await
    }

    /// Record which session a player occupies.
    pub async fn register_player(&self, player_id: PlayerId, session_id: SessionId) {
        self.player_sessions.write().await.insert(player_id, session_id);
    }

    /// Clear a player's session assignment.
    pub async fn unregister_player(&self, player_id: &PlayerId) {
        self.player_sessions.write().await.remove(player_id);
    }

    /// Drop a session outright.
    pub async fn remove_session(&self, id: &SessionId) {
        self.sessions.write().await.remove(id);
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop sessions that have reached `Closed`.
    ///
    /// Ids are collected under the read lock; the write lock is only
    /// held for the removals.
    pub async fn cleanup(&self) {
        let mut closed = Vec::new();
        {
            let sessions = self.sessions.read().await;
            for (id, session) in sessions.iter() {
                if session.read().await.state == SessionState::Closed {
                    closed.push(*id);
                }
            }
        }

        if !closed.is_empty() {
            let mut sessions = self.sessions.write().await;
            for id in closed {
                sessions.remove(&id);
            }
        }
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vec2::FixedVec2;
    use crate::game::dash::PushRejectReason;
    use crate::game::tick::replay_match;

    fn create_test_session() -> MatchSession {
        MatchSession::new([0; 16], SessionConfig::default())
    }

    /// Seat an unnamed player, returning their id.
    fn join(session: &mut MatchSession, byte: u8) -> PlayerId {
        let id = PlayerId::new([byte; 16]);
        let (tx, _rx) = mpsc::channel(8);
        session.add_player(id, None, tx).unwrap();
        id
    }

    /// Lobby with two ready players and no countdown.
    fn ready_session() -> (MatchSession, PlayerId, PlayerId) {
        let mut session = create_test_session();
        let player1 = join(&mut session, 1);
        let player2 = join(&mut session, 2);
        session.set_player_ready(&player1, true);
        session.set_player_ready(&player2, true);
        session.match_config.countdown_ticks = 0;

        (session, player1, player2)
    }

    fn push_msg(request_id: u32, target: PlayerId) -> PushRequestMsg {
        PushRequestMsg {
            request_id,
            target_id: hex::encode(target.0),
            direction: [65536, 0],
            force: 655360,
            duration_ticks: 12,
        }
    }

    /// March two players into each other along the x axis until the
    /// dasher's first contact queues a push for remote confirmation.
    fn march_to_push_request(
        session: &mut MatchSession,
        dasher: &PlayerId,
        target: &PlayerId,
    ) -> PushRequest {
        let toward_right = InputFrame::with_movement(127, 0);
        let toward_left = InputFrame::with_movement(-127, 0);

        for tick_number in 0..240 {
            let mut dash_frame = toward_right;
            if tick_number >= 50 {
                dash_frame.set_dash(true);
            }
            session.process_input(dasher, tick_number, dash_frame).unwrap();
            session.process_input(target, tick_number, toward_left).unwrap();
            session.run_tick().unwrap();

            let mut requests = session.pending_push_requests();
            if let Some(request) = requests.pop() {
                return request;
            }
        }
        panic!("players never came into dash contact");
    }

    #[tokio::test]
    async fn test_lobby_join_and_leave() {
        let mut session = create_test_session();
        let dasher = join(&mut session, 1);
        assert_eq!(session.player_count(), 1);

        assert!(session.remove_player(&dasher));
        assert_eq!(session.player_count(), 0);
        assert!(!session.remove_player(&dasher));

        // An emptied lobby closes itself
        assert_eq!(session.get_state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_join_rejected_when_full_or_duplicate() {
        let config = SessionConfig {
            max_players: 2,
            ..Default::default()
        };
        let mut session = MatchSession::new([0; 16], config);
        join(&mut session, 1);

        // Same player cannot take two seats
        let (tx, _rx) = mpsc::channel(8);
        assert!(matches!(
            session.add_player(PlayerId::new([1; 16]), None, tx),
            Err(SessionError::AlreadyInSession)
        ));

        join(&mut session, 2);

        // No third seat in a two-seat session
        let (tx, _rx) = mpsc::channel(8);
        assert!(matches!(
            session.add_player(PlayerId::new([3; 16]), None, tx),
            Err(SessionError::SessionFull)
        ));
    }

    #[tokio::test]
    async fn test_ready_gate() {
        let mut session = create_test_session();
        let player1 = join(&mut session, 1);
        let player2 = join(&mut session, 2);

        assert!(!session.all_players_ready());
        session.set_player_ready(&player1, true);
        assert!(!session.all_players_ready());
        session.set_player_ready(&player2, true);
        assert!(session.all_players_ready());

        // Backing out reopens the gate
        session.set_player_ready(&player1, false);
        assert!(!session.all_players_ready());
    }

    #[tokio::test]
    async fn test_lobby_roster() {
        let mut session = create_test_session();
        let ann = PlayerId::new([1; 16]);
        let (tx, _rx) = mpsc::channel(8);
        session.add_player(ann, Some("Ann".to_string()), tx).unwrap();
        let other = join(&mut session, 2);
        session.set_player_ready(&ann, true);

        let lobby = session.lobby_update();
        assert_eq!(lobby.min_players, 2);
        assert_eq!(lobby.max_players, 4);
        assert_eq!(lobby.players.len(), 2);

        assert_eq!(lobby.players[0].display_name, "Ann");
        assert!(lobby.players[0].ready);

        // Unnamed players get a seat-based fallback
        assert_eq!(lobby.players[1].player_id, other.0);
        assert_eq!(lobby.players[1].display_name, "P2");
        assert!(!lobby.players[1].ready);
    }

    #[tokio::test]
    async fn test_start_match() {
        let (mut session, player1, player2) = ready_session();

        let info = session.start_match().unwrap();
        assert_eq!(info.match_id, session.id);
        assert_eq!(info.players.len(), 2);
        assert_eq!(info.rng_seed, derive_match_seed(&session.id, &[player1.0, player2.0]));
        assert_ne!(info.players[0].position, info.players[1].position);
        assert_eq!(session.state, SessionState::Countdown);
    }

    #[tokio::test]
    async fn test_start_requires_ready() {
        let mut session = create_test_session();
        join(&mut session, 1);
        join(&mut session, 2);

        let result = session.start_match();
        assert!(matches!(result, Err(SessionError::PlayersNotReady)));
    }

    #[tokio::test]
    async fn test_run_tick() {
        let (mut session, _player1, _player2) = ready_session();
        session.start_match().unwrap();

        // First tick consumes the zero-length countdown
        session.run_tick().unwrap();
        assert_eq!(session.get_state(), SessionState::Playing);
        assert_eq!(session.current_tick(), 0);

        session.run_tick().unwrap();
        assert_eq!(session.current_tick(), 1);
    }

    #[tokio::test]
    async fn test_countdown_runs_in_simulation() {
        let (mut session, _player1, _player2) = ready_session();
        session.match_config.countdown_ticks = 3;
        session.start_match().unwrap();

        for _ in 0..3 {
            session.run_tick().unwrap();
            assert_eq!(session.get_state(), SessionState::Countdown);
        }

        session.run_tick().unwrap();
        assert_eq!(session.get_state(), SessionState::Playing);
        // No simulation ticks were spent on the countdown
        assert_eq!(session.current_tick(), 0);
    }

    #[tokio::test]
    async fn test_generate_state_update() {
        let (mut session, _player1, _player2) = ready_session();
        session.start_match().unwrap();

        let update = session.generate_state_update();
        assert!(update.is_some());
        let update = update.unwrap();
        assert_eq!(update.players.len(), 2);
    }

    #[tokio::test]
    async fn test_disconnect_neutralizes_input() {
        let (mut session, player1, _player2) = ready_session();
        session.start_match().unwrap();
        session.run_tick();

        session
            .process_input(&player1, 1, InputFrame::with_movement(50, 50))
            .unwrap();
        assert!(session.mark_disconnected(&player1));

        let player = session.players.get(&player1).unwrap();
        assert!(!player.is_connected());
        // The stick reads as released until they return
        assert_eq!(player.last_input.move_x, InputFrame::NO_INPUT);
        assert_eq!(player.last_input.move_y, InputFrame::NO_INPUT);
    }

    #[tokio::test]
    async fn test_reconnect_restores_player() {
        let (mut session, player1, _player2) = ready_session();
        session.start_match().unwrap();
        session.run_tick();

        session.mark_disconnected(&player1);
        assert!(session.can_reconnect(&player1));

        let (new_tx, _new_rx) = mpsc::channel(8);
        assert!(session.reconnect_player(&player1, new_tx).is_some());
        assert!(session.players.get(&player1).unwrap().is_connected());
        // Connected players have nothing to reconnect
        assert!(!session.can_reconnect(&player1));
    }

    #[tokio::test]
    async fn test_reconnect_timeout_forfeits() {
        let config = SessionConfig {
            reconnect_timeout_ticks: 5,
            ..Default::default()
        };
        let mut session = MatchSession::new([0; 16], config);
        let player1 = join(&mut session, 1);
        let player2 = join(&mut session, 2);
        session.set_player_ready(&player1, true);
        session.set_player_ready(&player2, true);
        session.match_config.countdown_ticks = 0;
        session.start_match().unwrap();
        session.run_tick();

        session.mark_disconnected(&player1);

        // With two players, the forfeit decides the match
        let mut ended = false;
        for _ in 0..20 {
            let result = match session.run_tick() {
                Some(r) => r,
                None => break,
            };
            if result.match_ended {
                assert_eq!(result.winner, Some(player2));
                ended = true;
                break;
            }
        }
        assert!(ended, "disconnect timeout should decide the match");

        let state = session.game_state().unwrap();
        assert!(state.players.get(&player1).unwrap().life.eliminated);
    }

    #[tokio::test]
    async fn test_handle_push_request() {
        let (mut session, player1, player2) = ready_session();
        session.start_match().unwrap();
        session.run_tick();

        let decision = session.handle_push_request(player1, &push_msg(1, player2)).unwrap();
        assert!(matches!(
            decision,
            PushRequestDecision::Confirmed(PushOutcome::Applied)
        ));
        let state = session.game_state().unwrap();
        assert!(state.players.get(&player2).unwrap().movement.is_pushed());

        // A push on an already pushed target is refused
        let decision = session.handle_push_request(player1, &push_msg(2, player2)).unwrap();
        assert!(matches!(
            decision,
            PushRequestDecision::Rejected(PushRejectReason::TargetAlreadyPushed)
        ));

        // Unknown targets are refused
        let unknown = PlayerId::new([9; 16]);
        let decision = session.handle_push_request(player1, &push_msg(3, unknown)).unwrap();
        assert!(matches!(
            decision,
            PushRequestDecision::Rejected(PushRejectReason::UnknownTarget)
        ));
    }

    #[tokio::test]
    async fn test_remote_push_confirmed() {
        let (mut session, player1, player2) = ready_session();
        session.start_match().unwrap();
        session.run_tick();
        session.set_authority_mode(AuthorityMode::Remote);

        let request = march_to_push_request(&mut session, &player1, &player2);
        assert_eq!(request.source_id, player1);
        assert_eq!(request.target_id, player2);

        // Confirming applies the push
        let outcome = session.confirm_push(request.request_id);
        assert_eq!(outcome, Some(PushOutcome::Applied));
        let state = session.game_state().unwrap();
        assert!(state.players.get(&player2).unwrap().movement.is_pushed());
    }

    #[tokio::test]
    async fn test_remote_push_rejected() {
        let (mut session, player1, player2) = ready_session();
        session.start_match().unwrap();
        session.run_tick();
        session.set_authority_mode(AuthorityMode::Remote);

        let request = march_to_push_request(&mut session, &player1, &player2);
        session.reject_push(request.request_id);

        // The pending entry is gone; a late confirm is a no-op
        assert_eq!(session.confirm_push(request.request_id), None);
        let state = session.game_state().unwrap();
        assert!(!state.players.get(&player2).unwrap().movement.is_pushed());
    }

    #[tokio::test]
    async fn test_finalize_and_replay_match() {
        let (mut session, player1, player2) = ready_session();
        // Keep pickups out of the scripted march
        session.match_config.pickup_spawn.initial_delay_ticks = 10_000;
        session.start_match().unwrap();
        session.run_tick();

        // Player2 marches off the right edge until their lives run out
        let mut ended = false;
        for tick_number in 0..2000 {
            session
                .process_input(&player2, tick_number, InputFrame::with_movement(127, 0))
                .unwrap();
            let result = session.run_tick().expect("session should be ticking");
            if result.match_ended {
                assert_eq!(result.winner, Some(player1));
                ended = true;
                break;
            }
        }
        assert!(ended, "repeated falls should end the match");
        assert_eq!(session.get_state(), SessionState::Ended);

        let info = session.finalize().expect("ended match finalizes");
        assert_eq!(info.winner_id, Some(player1.0));
        assert_eq!(info.placements[0].player_id, player1.0);
        assert_eq!(info.placements[0].place, 1);
        assert_eq!(info.placements[1].place, 2);
        assert_eq!(session.get_state(), SessionState::Closed);

        // The recorded inputs drive a replay to the same final hash
        let base = session.take_replay_base().expect("snapshot taken at handover");
        let recordings = session.take_recordings();
        let (replayed, _events) = replay_match(base, &recordings, info.end_tick + 10);
        assert_eq!(replayed.tick, info.end_tick);
        assert_eq!(replayed.compute_hash(), info.final_state_hash);
    }

    #[tokio::test]
    async fn test_broadcast_skips_disconnected() {
        let mut session = create_test_session();
        let player1 = PlayerId::new([1; 16]);
        let player2 = PlayerId::new([2; 16]);
        let (tx1, mut rx1) = mpsc::channel(8);
        let (tx2, mut rx2) = mpsc::channel(8);
        session.add_player(player1, None, tx1).unwrap();
        session.add_player(player2, None, tx2).unwrap();
        session.mark_disconnected(&player2);

        session
            .broadcast(ServerMessage::Pong { timestamp: 7, server_time: 8 })
            .await;

        assert!(matches!(
            rx1.try_recv(),
            Ok(ServerMessage::Pong { timestamp: 7, .. })
        ));
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_event_fanout() {
        let session = create_test_session();
        let mut events_rx = session.subscribe_events();

        let source = PlayerId::new([1; 16]);
        let target = PlayerId::new([2; 16]);
        session.publish_events(&[GameEvent::push_applied(
            9,
            source,
            target,
            FixedVec2::RIGHT,
            655360,
        )]);

        match events_rx.try_recv().expect("subscriber sees published events") {
            MatchEvent::PushApplied { tick, source_id, .. } => {
                assert_eq!(tick, 9);
                assert_eq!(source_id, source.0);
            }
            other => panic!("wrong event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_manager_session_lifecycle() {
        let manager = SessionManager::new();
        let session_id = manager.create_session(SessionConfig::default()).await;
        let player_id = PlayerId::new([1; 16]);

        assert_eq!(manager.session_count().await, 1);
        assert!(manager.get_session(&session_id).await.is_some());

        // Player-to-session mapping follows registration
        manager.register_player(player_id, session_id).await;
        assert!(manager.get_player_session(&player_id).await.is_some());

        manager.unregister_player(&player_id).await;
        assert!(manager.get_player_session(&player_id).await.is_none());

        manager.remove_session(&session_id).await;
        assert_eq!(manager.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_manager_cleanup_drops_closed() {
        let manager = SessionManager::new();
        let keep_id = manager.create_session(SessionConfig::default()).await;
        let drop_id = manager.create_session(SessionConfig::default()).await;

        let closing = manager.get_session(&drop_id).await.unwrap();
        closing.write().await.state = SessionState::Closed;

        manager.cleanup().await;
        assert_eq!(manager.session_count().await, 1);
        assert!(manager.get_session(&keep_id).await.is_some());
        assert!(manager.get_session(&drop_id).await.is_none());
    }
}
