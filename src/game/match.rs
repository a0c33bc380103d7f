//! Match task, handles and the match registry

use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::util::time::{TickClock, DEFAULT_TICK_INTERVAL_MS};
use crate::ws::protocol::{ClientCommand, Handshake, ServerMsg};

use super::player::Team;
use super::session::SessionHub;
use super::snapshot;
use super::state::MatchState;
use super::{JoinError, MatchCommand};

/// Capacity of a match's inbound command queue
const COMMAND_QUEUE_CAPACITY: usize = 256;

/// Tunables shared by every match
#[derive(Debug, Clone)]
pub struct MatchSettings {
    pub tick_interval: Duration,
    pub max_dropped_frames: u32,
    pub waiting_timeout: Duration,
    pub max_players: usize,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            max_dropped_frames: 120,
            waiting_timeout: Duration::from_secs(300),
            max_players: 16,
        }
    }
}

impl From<&Config> for MatchSettings {
    fn from(config: &Config) -> Self {
        Self {
            tick_interval: Duration::from_millis(config.tick_interval_ms),
            max_dropped_frames: config.max_dropped_frames,
            waiting_timeout: Duration::from_secs(config.waiting_timeout_secs),
            max_players: config.max_players_per_match,
        }
    }
}

/// Handle to a running match
#[derive(Debug, Clone)]
pub struct MatchHandle {
    /// Instance id, distinct for every match ever created
    pub id: Uuid,
    pub total_players: usize,
    command_tx: mpsc::Sender<MatchCommand>,
    player_count: Arc<AtomicUsize>,
}

impl MatchHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    /// Ask the match to seat a player. Resolves to the player's index.
    pub async fn join(
        &self,
        team: Team,
        outbound: mpsc::Sender<ServerMsg>,
    ) -> Result<usize, JoinError> {
        let (reply, response) = oneshot::channel();
        self.command_tx
            .send(MatchCommand::Join {
                team,
                outbound,
                reply,
            })
            .await
            .map_err(|_| JoinError::MatchClosed)?;
        response.await.map_err(|_| JoinError::MatchClosed)?
    }

    /// Queue a client command for the next tick. False once the match is gone.
    pub async fn send_input(&self, player: usize, command: ClientCommand) -> bool {
        self.command_tx
            .send(MatchCommand::Input { player, command })
            .await
            .is_ok()
    }

    pub async fn leave(&self, player: usize) {
        let _ = self.command_tx.send(MatchCommand::Leave { player }).await;
    }
}

/// Match a connection was seated in
#[derive(Debug)]
pub struct JoinedMatch {
    pub handle: MatchHandle,
    pub player: usize,
}

/// Registry summary row
#[derive(Debug, Clone, serde::Serialize)]
pub struct MatchSummary {
    pub game_id: String,
    pub players: usize,
    pub total_players: usize,
}

/// Registry of all active matches, keyed by the client-chosen game id
pub struct MatchRegistry {
    matches: DashMap<String, MatchHandle>,
    settings: MatchSettings,
}

impl MatchRegistry {
    pub fn new(settings: MatchSettings) -> Self {
        Self {
            matches: DashMap::new(),
            settings,
        }
    }

    /// Remove `game_id` only if it still maps to instance `id`
    pub fn remove(&self, game_id: &str, id: Uuid) -> Option<MatchHandle> {
        self.matches
            .remove_if(game_id, |_, h| h.id == id)
            .map(|(_, h)| h)
    }

    pub fn active_matches(&self) -> usize {
        self.matches.len()
    }

    pub fn total_players(&self) -> usize {
        self.matches
            .iter()
            .map(|m| m.value().player_count())
            .sum()
    }

    pub fn summaries(&self) -> Vec<MatchSummary> {
        let mut rows: Vec<MatchSummary> = self
            .matches
            .iter()
            .map(|m| MatchSummary {
                game_id: m.key().clone(),
                players: m.value().player_count(),
                total_players: m.value().total_players,
            })
            .collect();
        rows.sort_by(|a, b| a.game_id.cmp(&b.game_id));
        rows
    }

    /// Seat a connection in the match named by its handshake, creating the
    /// match on first join.
    pub async fn join(
        self: &Arc<Self>,
        handshake: &Handshake,
        outbound: mpsc::Sender<ServerMsg>,
    ) -> Result<JoinedMatch, JoinError> {
        let team = u8::try_from(handshake.team)
            .ok()
            .and_then(Team::from_index)
            .ok_or(JoinError::InvalidTeam(handshake.team))?;
        let total_players = usize::try_from(handshake.total_players)
            .ok()
            .filter(|n| (1..=self.settings.max_players).contains(n))
            .ok_or(JoinError::InvalidRoster {
                requested: handshake.total_players,
                max: self.settings.max_players,
            })?;

        let handle = self.get_or_create(&handshake.game_id, total_players);
        if handle.total_players != total_players {
            debug!(
                game_id = %handshake.game_id,
                requested = total_players,
                fixed = handle.total_players,
                "Roster size already fixed by first join"
            );
        }

        match handle.join(team, outbound.clone()).await {
            Err(JoinError::MatchClosed) => {
                // Ended between lookup and join; start over with a fresh match
                self.remove(&handshake.game_id, handle.id);
                let handle = self.get_or_create(&handshake.game_id, total_players);
                let player = handle.join(team, outbound).await?;
                Ok(JoinedMatch { handle, player })
            }
            Err(e) => Err(e),
            Ok(player) => Ok(JoinedMatch { handle, player }),
        }
    }

    fn get_or_create(self: &Arc<Self>, game_id: &str, total_players: usize) -> MatchHandle {
        match self.matches.entry(game_id.to_string()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let (game_match, handle) =
                    GameMatch::new(game_id.to_string(), total_players, self.settings.clone());
                entry.insert(handle.clone());

                info!(
                    match_id = %handle.id,
                    game_id = %game_id,
                    total_players,
                    "Created new match"
                );

                let registry = Arc::clone(self);
                let game_id = game_id.to_string();
                let id = handle.id;
                tokio::spawn(async move {
                    game_match.run().await;
                    registry.remove(&game_id, id);
                    info!(match_id = %id, game_id = %game_id, "Match removed from registry");
                });

                handle
            }
        }
    }
}

impl Default for MatchRegistry {
    fn default() -> Self {
        Self::new(MatchSettings::default())
    }
}

/// Why a match task stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndReason {
    AllPlayersLeft,
    RosterNeverFilled,
}

/// The authoritative game match
pub struct GameMatch {
    id: Uuid,
    game_id: String,
    state: MatchState,
    hub: SessionHub,
    command_rx: mpsc::Receiver<MatchCommand>,
    player_count: Arc<AtomicUsize>,
    settings: MatchSettings,
}

impl GameMatch {
    /// Create a new match
    pub fn new(game_id: String, total_players: usize, settings: MatchSettings) -> (Self, MatchHandle) {
        let id = Uuid::new_v4();
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let player_count = Arc::new(AtomicUsize::new(0));

        let handle = MatchHandle {
            id,
            total_players,
            command_tx,
            player_count: player_count.clone(),
        };

        let game_match = Self {
            id,
            game_id,
            state: MatchState::new(total_players),
            hub: SessionHub::new(settings.max_dropped_frames),
            command_rx,
            player_count,
            settings,
        };

        (game_match, handle)
    }

    /// Run the authoritative tick loop
    pub async fn run(mut self) {
        info!(match_id = %self.id, game_id = %self.game_id, "Match task started");

        let mut tick_interval = interval(self.settings.tick_interval);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut clock = TickClock::new();
        let created = Instant::now();
        let mut phase = self.state.phase.name();

        let reason = loop {
            tick_interval.tick().await;

            // Drain input queue
            self.process_commands();

            // Run simulation tick
            let messages = self.state.advance(clock.lap());
            for msg in &messages {
                self.hub.broadcast(msg);
            }

            if self.state.phase.name() != phase {
                phase = self.state.phase.name();
                info!(
                    match_id = %self.id,
                    phase,
                    score = %self.state.score_line(),
                    "Match phase changed"
                );
            }

            if let Some(reason) = self.end_reason(created) {
                break reason;
            }
        };

        info!(
            match_id = %self.id,
            game_id = %self.game_id,
            ?reason,
            score = %self.state.score_line(),
            ticks = self.state.tick,
            "Match ended"
        );
    }

    /// Process all pending commands from players
    fn process_commands(&mut self) {
        while let Ok(command) = self.command_rx.try_recv() {
            match command {
                MatchCommand::Join {
                    team,
                    outbound,
                    reply,
                } => self.handle_join(team, outbound, reply),
                MatchCommand::Input { player, command } => {
                    self.state.apply_command(player, command);
                }
                MatchCommand::Leave { player } => self.handle_leave(player),
            }
        }
    }

    /// Handle player join request
    fn handle_join(
        &mut self,
        team: Team,
        outbound: mpsc::Sender<ServerMsg>,
        reply: oneshot::Sender<Result<usize, JoinError>>,
    ) {
        if self.state.is_full() {
            warn!(match_id = %self.id, "Join rejected, match is full");
            let _ = reply.send(Err(JoinError::MatchFull(self.state.total_players)));
            return;
        }

        let mut effects = Vec::new();
        let index = self.state.add_player(team, &mut effects);
        self.hub.attach(index, outbound);
        self.player_count
            .store(self.state.players.len(), Ordering::Relaxed);

        self.hub.send_to(index, snapshot::hello(&self.state, index));
        self.hub
            .broadcast_except(Some(index), &snapshot::player_joined(&self.state, index));
        for msg in self.state.effects_to_messages(effects) {
            self.hub.broadcast(&msg);
        }

        info!(
            match_id = %self.id,
            player = index,
            team = team.index(),
            player_count = self.state.players.len(),
            total_players = self.state.total_players,
            "Player joined match"
        );

        if reply.send(Ok(index)).is_err() {
            // Connection went away while waiting for the reply
            self.hub.detach(index);
        }
    }

    /// Handle player leave. The body stays in play; only delivery stops.
    fn handle_leave(&mut self, player: usize) {
        if self.hub.detach(player) {
            info!(
                match_id = %self.id,
                player,
                connected = self.hub.connected(),
                "Player left match"
            );
        }
    }

    fn end_reason(&self, created: Instant) -> Option<EndReason> {
        if !self.state.players.is_empty() && self.hub.connected() == 0 {
            return Some(EndReason::AllPlayersLeft);
        }
        if !self.state.is_full() && created.elapsed() >= self.settings.waiting_timeout {
            return Some(EndReason::RosterNeverFilled);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;
    use tokio_test::{assert_err, assert_ok};

    const WAIT: Duration = Duration::from_secs(2);

    fn handshake(game_id: &str, team: i64, total_players: i64) -> Handshake {
        Handshake {
            game_id: game_id.to_string(),
            team,
            total_players,
        }
    }

    async fn next_msg(rx: &mut mpsc::Receiver<ServerMsg>) -> ServerMsg {
        assert_ok!(timeout(WAIT, rx.recv()).await).expect("outbound queue closed")
    }

    /// Wait for a text message, skipping ticks
    async fn next_text(rx: &mut mpsc::Receiver<ServerMsg>) -> String {
        loop {
            if let ServerMsg::Text(text) = next_msg(rx).await {
                return text.message;
            }
        }
    }

    #[tokio::test]
    async fn invalid_handshakes_are_rejected() {
        let registry = Arc::new(MatchRegistry::default());
        let (tx, _rx) = mpsc::channel(8);

        let err = registry.join(&handshake("a", 2, 2), tx.clone()).await;
        assert!(matches!(err, Err(JoinError::InvalidTeam(2))));

        let err = registry.join(&handshake("a", 0, 0), tx.clone()).await;
        assert!(matches!(err, Err(JoinError::InvalidRoster { .. })));

        let err = registry.join(&handshake("a", 0, 99), tx).await;
        assert!(matches!(err, Err(JoinError::InvalidRoster { .. })));

        assert_eq!(registry.active_matches(), 0);
    }

    #[tokio::test]
    async fn joins_fill_roster_and_start_countdown() {
        let registry = Arc::new(MatchRegistry::default());
        let (tx0, mut rx0) = mpsc::channel(64);
        let (tx1, mut rx1) = mpsc::channel(64);

        let first = assert_ok!(registry.join(&handshake("pitch", 0, 2), tx0).await);
        assert_eq!(first.player, 0);
        match next_msg(&mut rx0).await {
            ServerMsg::Hello(hello) => assert_eq!(hello.local_player_index, 0),
            other => panic!("expected hello, got {other:?}"),
        }

        let second = assert_ok!(registry.join(&handshake("pitch", 1, 2), tx1).await);
        assert_eq!(second.player, 1);
        assert_eq!(second.handle.id, first.handle.id);

        match next_msg(&mut rx1).await {
            ServerMsg::Hello(hello) => {
                assert_eq!(hello.local_player_index, 1);
                assert_eq!(hello.teams, vec![0, 1]);
            }
            other => panic!("expected hello, got {other:?}"),
        }
        assert!(matches!(next_msg(&mut rx0).await, ServerMsg::PlayerJoined(_)));

        assert_eq!(next_text(&mut rx0).await, "3");
        assert_eq!(next_text(&mut rx1).await, "3");
        assert_eq!(registry.total_players(), 2);
        assert_eq!(registry.summaries()[0].game_id, "pitch");
    }

    #[tokio::test]
    async fn full_match_rejects_extra_player() {
        let registry = Arc::new(MatchRegistry::default());
        let (tx0, _rx0) = mpsc::channel(64);
        let (tx1, _rx1) = mpsc::channel(64);

        assert_ok!(registry.join(&handshake("solo", 0, 1), tx0).await);
        let err = assert_err!(registry.join(&handshake("solo", 1, 1), tx1).await);
        assert!(matches!(err, JoinError::MatchFull(1)));
    }

    #[tokio::test]
    async fn match_is_evicted_when_everyone_leaves() {
        let registry = Arc::new(MatchRegistry::default());
        let (tx, _rx) = mpsc::channel(64);

        let joined = assert_ok!(registry.join(&handshake("empty", 0, 2), tx).await);
        assert_eq!(registry.active_matches(), 1);

        joined.handle.leave(joined.player).await;

        let evicted = timeout(WAIT, async {
            while registry.matches.contains_key("empty") {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert_ok!(evicted);
        assert_eq!(registry.active_matches(), 0);
        assert!(!joined.handle.send_input(0, ClientCommand::Drive(true)).await);
    }

    #[tokio::test]
    async fn waiting_match_times_out() {
        let settings = MatchSettings {
            waiting_timeout: Duration::from_millis(50),
            ..MatchSettings::default()
        };
        let registry = Arc::new(MatchRegistry::new(settings));
        let (tx, _rx) = mpsc::channel(64);

        assert_ok!(registry.join(&handshake("lonely", 0, 4), tx).await);

        let evicted = timeout(WAIT, async {
            while registry.active_matches() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert_ok!(evicted);
    }

    #[tokio::test]
    async fn new_match_replaces_evicted_one() {
        let registry = Arc::new(MatchRegistry::default());
        let (tx, _rx) = mpsc::channel(64);
        let old = assert_ok!(registry.join(&handshake("again", 0, 2), tx).await);
        old.handle.leave(old.player).await;

        assert_ok!(
            timeout(WAIT, async {
                while registry.matches.contains_key("again") {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            })
            .await
        );

        let (tx, _rx) = mpsc::channel(64);
        let fresh = assert_ok!(registry.join(&handshake("again", 0, 2), tx).await);
        assert_ne!(fresh.handle.id, old.handle.id);
        assert_eq!(fresh.player, 0);
    }

    #[tokio::test]
    async fn join_on_closed_match_lands_in_fresh_one() {
        let registry = Arc::new(MatchRegistry::default());
        let (ended, stale) = GameMatch::new("stale".to_string(), 2, MatchSettings::default());
        drop(ended);
        registry.matches.insert("stale".to_string(), stale.clone());

        let (tx, mut rx) = mpsc::channel(64);
        let joined = assert_ok!(registry.join(&handshake("stale", 1, 2), tx).await);

        assert_ne!(joined.handle.id, stale.id);
        assert_eq!(joined.player, 0);
        assert_eq!(registry.active_matches(), 1);
        assert!(matches!(next_msg(&mut rx).await, ServerMsg::Hello(_)));
        let current = registry.matches.get("stale").map(|m| m.value().id);
        assert_eq!(current, Some(joined.handle.id));
    }

    #[test]
    fn remove_checks_instance_id() {
        let registry = MatchRegistry::default();
        let (_, handle) = GameMatch::new("x".to_string(), 2, MatchSettings::default());
        registry.matches.insert("x".to_string(), handle.clone());

        assert!(registry.remove("x", Uuid::new_v4()).is_none());
        assert!(registry.remove("x", handle.id).is_some());
        assert_eq!(registry.active_matches(), 0);
    }
}
