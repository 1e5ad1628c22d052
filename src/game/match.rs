//! Authoritative match task and registry

use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::util::time::{tick_duration, SNAPSHOT_TPS};
use crate::ws::protocol::{ClientMsg, ParticipantInfo, ServerMsg};

use super::config::{GameMode, MatchConfig};
use super::coordinator::{Broadcast, MatchCoordinator, MatchEvent, ScoreSource, TickOutcome};
use super::error::MatchError;
use super::phase::MatchPhase;
use super::snapshot::SnapshotBuilder;
use super::state::MatchState;
use super::streak::StreakTracker;
use super::{MatchInput, Participant, PlayerInput};

/// Points for eliminating another player
pub const ELIMINATION_POINTS: u32 = 1;

/// Read-only view of a match for HTTP queries
#[derive(Debug, Clone, Serialize)]
pub struct MatchView {
    pub match_id: Uuid,
    pub mode: GameMode,
    pub state: MatchState,
    pub remaining_ms: u64,
    pub connected: usize,
}

/// Handle to a running match
#[derive(Clone)]
pub struct MatchHandle {
    pub id: Uuid,
    pub mode: GameMode,
    pub input_tx: mpsc::Sender<MatchInput>,
    pub broadcast_tx: broadcast::Sender<ServerMsg>,
    pub player_count: Arc<AtomicUsize>,
    pub view: watch::Receiver<MatchView>,
}

impl MatchHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    /// Latest replicated view of the match
    pub fn view(&self) -> MatchView {
        self.view.borrow().clone()
    }
}

/// Registry of all active matches
pub struct MatchRegistry {
    matches: DashMap<Uuid, MatchHandle>,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self {
            matches: DashMap::new(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<MatchHandle> {
        self.matches.get(id).map(|m| m.value().clone())
    }

    pub fn insert(&self, handle: MatchHandle) {
        self.matches.insert(handle.id, handle);
    }

    pub fn remove(&self, id: &Uuid) -> Option<MatchHandle> {
        self.matches.remove(id).map(|(_, h)| h)
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
}

impl Default for MatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The authoritative match: owns the coordinator and drives its ticks
pub struct GameMatch {
    coordinator: MatchCoordinator,
    input_rx: mpsc::Receiver<MatchInput>,
    broadcast_tx: broadcast::Sender<ServerMsg>,
    view_tx: watch::Sender<MatchView>,
    snapshot_builder: SnapshotBuilder,
    player_count: Arc<AtomicUsize>,
    streaks: Arc<StreakTracker>,
    tick: u64,
    had_participants: bool,
}

impl GameMatch {
    /// Create a new match
    pub fn new(
        id: Uuid,
        seed: u64,
        config: MatchConfig,
        streaks: Arc<StreakTracker>,
    ) -> (Self, MatchHandle) {
        let (input_tx, input_rx) = mpsc::channel(256);
        let (broadcast_tx, _) = broadcast::channel(64);
        let player_count = Arc::new(AtomicUsize::new(0));
        let mode = config.mode;

        let coordinator = MatchCoordinator::new(id, config, seed);
        let (view_tx, view_rx) = watch::channel(MatchView {
            match_id: id,
            mode,
            state: coordinator.state().clone(),
            remaining_ms: 0,
            connected: 0,
        });

        let handle = MatchHandle {
            id,
            mode,
            input_tx,
            broadcast_tx: broadcast_tx.clone(),
            player_count: player_count.clone(),
            view: view_rx,
        };

        let snapshot_interval = (coordinator.config().tick_rate / SNAPSHOT_TPS).max(1);
        let game_match = Self {
            coordinator,
            input_rx,
            broadcast_tx,
            view_tx,
            snapshot_builder: SnapshotBuilder::new(snapshot_interval),
            player_count,
            streaks,
            tick: 0,
            had_participants: false,
        };

        (game_match, handle)
    }

    /// Run the authoritative tick loop
    pub async fn run(mut self) {
        let id = self.coordinator.id();
        info!(match_id = %id, mode = ?self.coordinator.config().mode, "Match task started");

        let mut tick_interval = interval(tick_duration(self.coordinator.config().tick_rate));
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;
            self.step();

            if self.is_finished() {
                info!(match_id = %id, "All participants left, closing match");
                break;
            }
        }

        let _ = self.broadcast_tx.send(ServerMsg::MatchClosed {
            match_id: id,
            reason: "all participants left".to_string(),
        });
    }

    /// One simulation tick: drain inputs, advance the coordinator, publish
    pub fn step(&mut self) {
        self.tick += 1;
        let now = self.tick;

        let mut events = Vec::new();
        let mut joining = Vec::new();
        while let Ok(input) = self.input_rx.try_recv() {
            self.translate(input, &mut events, &mut joining);
        }

        match self.coordinator.tick(now, events) {
            Ok(outcome) => self.publish(outcome, joining),
            Err(e) => warn!(match_id = %self.coordinator.id(), error = %e, "Tick rejected"),
        }

        let connected = self.coordinator.roster().len();
        self.player_count.store(connected, Ordering::Relaxed);

        if self.snapshot_builder.should_send() {
            let snapshot = self.snapshot_builder.build(&self.coordinator, now);
            let _ = self.broadcast_tx.send(snapshot);
            self.view_tx.send_replace(MatchView {
                match_id: self.coordinator.id(),
                mode: self.coordinator.config().mode,
                state: self.coordinator.state().clone(),
                remaining_ms: self.coordinator.remaining_time(now).as_millis() as u64,
                connected,
            });
        }
    }

    pub fn is_finished(&self) -> bool {
        self.had_participants && self.coordinator.roster().is_empty()
    }

    pub fn coordinator(&self) -> &MatchCoordinator {
        &self.coordinator
    }

    /// Turn a queued input into coordinator events
    fn translate(
        &mut self,
        input: MatchInput,
        events: &mut Vec<MatchEvent>,
        joining: &mut Vec<Uuid>,
    ) {
        let input = match input {
            MatchInput::Join(participant) => {
                if let Some(wallet) = &participant.wallet {
                    self.streaks.register_wallet(participant.id, wallet);
                }
                joining.push(participant.id);
                events.push(MatchEvent::Joined(Participant {
                    joined_at_tick: self.tick,
                    ..participant
                }));
                return;
            }
            MatchInput::Player(input) => input,
        };

        let PlayerInput { user_id, msg } = input;
        match msg {
            ClientMsg::ReportTargetHit { target_id, points } => {
                let capped = points.min(self.coordinator.config().max_target_points);
                debug!(user_id = %user_id, target_id, points = capped, "Target hit reported");
                events.push(MatchEvent::Score {
                    participant: user_id,
                    points: capped,
                    source: ScoreSource::TargetHit,
                });
            }
            ClientMsg::ReportElimination { victim_id } => {
                if victim_id == user_id {
                    warn!(user_id = %user_id, "Self-elimination reported, ignoring");
                    return;
                }
                events.push(MatchEvent::Score {
                    participant: user_id,
                    points: ELIMINATION_POINTS,
                    source: ScoreSource::Elimination,
                });
            }
            ClientMsg::RequestRestart => {
                events.push(MatchEvent::RestartRequested { by: user_id });
            }
            ClientMsg::Ping { t } => {
                let _ = self.broadcast_tx.send(ServerMsg::Pong { t });
            }
            ClientMsg::LeaveMatch => {
                if self.coordinator.roster().contains(user_id) {
                    let _ = self.broadcast_tx.send(ServerMsg::ParticipantLeft {
                        user_id,
                        reason: "disconnected".to_string(),
                    });
                }
                events.push(MatchEvent::Left(user_id));
            }
        }
    }

    /// Send the outcome of a tick to every connected client
    fn publish(&mut self, outcome: TickOutcome, joining: Vec<Uuid>) {
        for rejection in &outcome.rejections {
            if let MatchError::AuthorityViolation { .. } = rejection.error {
                continue;
            }
            let _ = self.broadcast_tx.send(ServerMsg::error_to(
                rejection.participant,
                rejection.error.code(),
                rejection.error.to_string(),
            ));
        }

        // A join and a leave inside one tick still counts as occupancy
        if !joining.is_empty() {
            self.had_participants = true;
        }

        let admitted: Vec<ParticipantInfo> = joining
            .iter()
            .filter_map(|&id| self.coordinator.roster().get(id))
            .map(|p| ParticipantInfo {
                user_id: p.id,
                display_name: p.display_name.clone(),
            })
            .collect();
        if !admitted.is_empty() {
            for participant in &admitted {
                let _ = self.broadcast_tx.send(ServerMsg::ParticipantJoined {
                    participant: participant.clone(),
                });
            }
            let participants = self
                .coordinator
                .roster()
                .iter()
                .map(|p| ParticipantInfo {
                    user_id: p.id,
                    display_name: p.display_name.clone(),
                })
                .collect();
            let _ = self.broadcast_tx.send(ServerMsg::MatchJoined {
                match_id: self.coordinator.id(),
                mode: self.coordinator.config().mode,
                participants,
            });
        }

        if outcome.phase_changed() {
            self.snapshot_builder.force_next();
        }

        for broadcast in outcome.broadcasts {
            let msg = match broadcast {
                Broadcast::GameOver {
                    winner,
                    reason,
                    scores,
                } => {
                    let ids: Vec<Uuid> = scores.iter().map(|e| e.participant).collect();
                    let streaks = self.streaks.record_result(winner, &ids);
                    ServerMsg::GameOver {
                        winner_user_id: winner,
                        reason,
                        scores,
                        streaks,
                        ended_at: chrono::Utc::now(),
                    }
                }
                other => match ServerMsg::from_broadcast(&other) {
                    Some(msg) => msg,
                    None => continue,
                },
            };
            let _ = self.broadcast_tx.send(msg);
        }

        if self.coordinator.current_phase() == MatchPhase::GameOver {
            debug!(match_id = %self.coordinator.id(), "Waiting for restart");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::config::MatchDefaults;
    use crate::game::state::WinReason;
    use std::time::Duration;

    fn quick_duel() -> (GameMatch, MatchHandle, Arc<StreakTracker>) {
        let defaults = MatchDefaults {
            countdown: Duration::from_millis(100),
            match_duration: Duration::from_secs(1),
            ..MatchDefaults::default()
        };
        let config = MatchConfig::for_mode(GameMode::StakedDuel, &defaults).unwrap();
        let streaks = Arc::new(StreakTracker::new());
        let (game_match, handle) = GameMatch::new(Uuid::new_v4(), 7, config, streaks.clone());
        (game_match, handle, streaks)
    }

    fn player(user_id: Uuid, msg: ClientMsg) -> MatchInput {
        MatchInput::Player(PlayerInput { user_id, msg })
    }

    fn drain(rx: &mut broadcast::Receiver<ServerMsg>) -> Vec<ServerMsg> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    async fn seat(handle: &MatchHandle, name: &str, wallet: &str) -> Uuid {
        let id = Uuid::new_v4();
        handle
            .input_tx
            .send(MatchInput::Join(Participant::new(id, name).with_wallet(wallet)))
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn duel_plays_through_to_game_over() {
        let (mut game_match, handle, streaks) = quick_duel();
        let mut rx = handle.broadcast_tx.subscribe();

        let a = seat(&handle, "a", "wallet-a").await;
        let b = seat(&handle, "b", "wallet-b").await;
        game_match.step();
        assert_eq!(game_match.coordinator().current_phase(), MatchPhase::Countdown);
        assert_eq!(handle.player_count(), 2);

        for _ in 0..3 {
            game_match.step();
        }
        assert_eq!(game_match.coordinator().current_phase(), MatchPhase::Playing);

        handle
            .input_tx
            .send(player(a, ClientMsg::ReportTargetHit { target_id: 1, points: 50 }))
            .await
            .unwrap();
        game_match.step();

        assert_eq!(game_match.coordinator().current_phase(), MatchPhase::GameOver);
        assert_eq!(game_match.coordinator().score_of(a), 10);
        assert_eq!(streaks.streak(a), 1);
        assert_eq!(streaks.streak(b), 0);

        let msgs = drain(&mut rx);
        assert!(msgs.iter().any(|m| matches!(
            m,
            ServerMsg::GameOver { winner_user_id, reason: WinReason::ScoreTarget, .. } if *winner_user_id == a
        )));
    }

    #[tokio::test]
    async fn scores_reported_before_play_are_rejected() {
        let (mut game_match, handle, _) = quick_duel();
        let mut rx = handle.broadcast_tx.subscribe();
        let a = seat(&handle, "a", "").await;
        let b = seat(&handle, "b", "").await;
        handle
            .input_tx
            .send(player(a, ClientMsg::ReportElimination { victim_id: b }))
            .await
            .unwrap();
        game_match.step();

        assert_eq!(game_match.coordinator().score_of(a), 0);
        let errors: Vec<ServerMsg> = drain(&mut rx)
            .into_iter()
            .filter(|m| matches!(m, ServerMsg::Error { .. }))
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], ServerMsg::Error { code, .. } if code == "invalid_phase"));
        assert!(errors[0].is_for(a));
        assert!(!errors[0].is_for(b));
    }

    #[tokio::test]
    async fn match_finishes_when_everyone_leaves() {
        let (mut game_match, handle, _) = quick_duel();
        let a = seat(&handle, "a", "").await;
        game_match.step();
        assert!(!game_match.is_finished());

        handle.input_tx.send(player(a, ClientMsg::LeaveMatch)).await.unwrap();
        game_match.step();
        assert!(game_match.is_finished());
    }

    #[tokio::test]
    async fn join_and_leave_in_one_tick_still_finishes() {
        let (mut game_match, handle, _) = quick_duel();
        let a = seat(&handle, "a", "").await;
        handle.input_tx.send(player(a, ClientMsg::LeaveMatch)).await.unwrap();
        game_match.step();

        assert_eq!(handle.player_count(), 0);
        assert!(game_match.is_finished());
    }

    #[tokio::test]
    async fn view_tracks_replicated_state() {
        let (mut game_match, handle, _) = quick_duel();
        seat(&handle, "a", "").await;
        seat(&handle, "b", "").await;
        for _ in 0..3 {
            game_match.step();
        }

        let view = handle.view();
        assert_eq!(view.connected, 2);
        assert_eq!(view.state.phase, MatchPhase::Countdown);
        assert_eq!(view.mode, GameMode::StakedDuel);
    }
}
