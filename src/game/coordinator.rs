//! Match lifecycle and scoring coordinator
//!
//! The coordinator is a synchronous state machine. Its owner calls
//! [`MatchCoordinator::tick`] once per simulation tick with the current tick
//! number and the events queued since the previous tick, and forwards the
//! returned broadcasts to every replica.
//!
//! Only a coordinator holding [`Authority::Authoritative`] mutates
//! [`MatchState`]. Replicas receive snapshots through
//! [`MatchCoordinator::apply_replicated`] and reject every mutation with
//! [`MatchError::AuthorityViolation`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::clock::TickTimer;
use super::config::MatchConfig;
use super::error::MatchError;
use super::phase::MatchPhase;
use super::roster::{Participant, Roster};
use super::spawn::{SpawnAssignment, SpawnPlanner};
use super::state::{MatchState, ScoreEntry, WinReason};

/// Whether this replica may write match state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    Authoritative,
    Replica,
}

/// What produced a score event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    TargetHit,
    Elimination,
}

/// Input to a tick, applied in arrival order
#[derive(Debug, Clone)]
pub enum MatchEvent {
    Joined(Participant),
    Left(Uuid),
    Score {
        participant: Uuid,
        points: u32,
        source: ScoreSource,
    },
    RestartRequested {
        by: Uuid,
    },
}

/// Outbound message for every replica
#[derive(Debug, Clone, PartialEq)]
pub enum Broadcast {
    PhaseChanged {
        phase: MatchPhase,
        deadline: Option<u64>,
        round: u32,
        spawns: Vec<SpawnAssignment>,
    },
    GameOver {
        winner: Uuid,
        reason: WinReason,
        scores: Vec<ScoreEntry>,
    },
    Restarted {
        round: u32,
        requested_by: Option<Uuid>,
    },
}

/// An event the tick refused to apply
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub participant: Uuid,
    pub error: MatchError,
}

/// Result of one simulation step
#[derive(Debug, Default)]
pub struct TickOutcome {
    pub broadcasts: Vec<Broadcast>,
    pub rejections: Vec<Rejection>,
}

impl TickOutcome {
    pub fn phase_changed(&self) -> bool {
        !self.broadcasts.is_empty()
    }
}

pub struct MatchCoordinator {
    id: Uuid,
    config: MatchConfig,
    authority: Authority,
    state: MatchState,
    roster: Roster,
    spawns: SpawnPlanner,
    /// Broadcasts produced outside `tick`, flushed with the next outcome
    outbox: Vec<Broadcast>,
}

impl MatchCoordinator {
    /// Authoritative coordinator for a new match
    pub fn new(id: Uuid, config: MatchConfig, seed: u64) -> Self {
        let spawns = SpawnPlanner::new(seed, config.spawn_points);
        Self {
            id,
            config,
            authority: Authority::Authoritative,
            state: MatchState::default(),
            roster: Roster::new(),
            spawns,
            outbox: Vec::new(),
        }
    }

    /// Read-only mirror of a match hosted elsewhere
    pub fn replica(id: Uuid, config: MatchConfig) -> Self {
        Self {
            authority: Authority::Replica,
            ..Self::new(id, config, 0)
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn has_state_authority(&self) -> bool {
        self.authority == Authority::Authoritative
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn current_phase(&self) -> MatchPhase {
        self.state.phase
    }

    pub fn winner(&self) -> Option<Uuid> {
        self.state.winner
    }

    pub fn score_of(&self, participant: Uuid) -> u32 {
        self.state.score_of(participant)
    }

    /// Time left in the current phase; zero outside countdown and play
    pub fn remaining_time(&self, now: u64) -> Duration {
        if !self.state.phase.is_timed() {
            return Duration::ZERO;
        }
        TickTimer::from(self.state.phase_deadline).remaining(now, self.config.tick_rate)
    }

    fn ensure_authority(&self, operation: &'static str) -> Result<(), MatchError> {
        if self.has_state_authority() {
            Ok(())
        } else {
            debug!(match_id = %self.id, operation, "Mutation rejected on replica");
            Err(MatchError::AuthorityViolation { operation })
        }
    }

    // ------------------------------------------------------------------
    // Roster
    // ------------------------------------------------------------------

    pub fn participant_joined(&mut self, participant: Participant) -> Result<(), MatchError> {
        self.ensure_authority("participant_joined")?;

        let id = participant.id;
        if self.roster.contains(id) {
            return Ok(());
        }
        if self.roster.len() >= self.config.max_participants {
            return Err(MatchError::MatchFull);
        }

        self.roster.join(participant);
        self.state.connected.push(id);
        self.state.ensure_entry(id);
        info!(
            match_id = %self.id,
            participant = %id,
            connected = self.roster.len(),
            "Participant joined"
        );
        Ok(())
    }

    /// Remove a participant from the roster. Their score entry is kept.
    pub fn participant_left(&mut self, id: Uuid) -> Result<Option<Participant>, MatchError> {
        self.ensure_authority("participant_left")?;

        let left = self.roster.leave(id);
        if left.is_some() {
            self.state.connected.retain(|&connected| connected != id);
            info!(
                match_id = %self.id,
                participant = %id,
                connected = self.roster.len(),
                "Participant left"
            );
        }
        Ok(left)
    }

    // ------------------------------------------------------------------
    // Scoring and restart
    // ------------------------------------------------------------------

    /// Award points and check the score target immediately.
    ///
    /// Returns the participant's new score. A resulting game over is queued
    /// and delivered with the next [`tick`](Self::tick) or
    /// [`take_broadcasts`](Self::take_broadcasts).
    pub fn register_score_event(
        &mut self,
        participant: Uuid,
        points: u32,
    ) -> Result<u32, MatchError> {
        let total = self.apply_score(participant, points)?;
        self.check_score_target();
        Ok(total)
    }

    fn apply_score(&mut self, participant: Uuid, points: u32) -> Result<u32, MatchError> {
        self.ensure_authority("register_score_event")?;

        if !self.state.phase.accepts_scores() {
            return Err(MatchError::InvalidPhase {
                operation: "register_score_event",
                phase: self.state.phase,
            });
        }
        if points == 0 {
            return Err(MatchError::InvalidPoints);
        }

        let total = self
            .state
            .add_points(participant, points)
            .ok_or(MatchError::UnknownParticipant)?;
        debug!(match_id = %self.id, participant = %participant, points, total, "Score registered");
        Ok(total)
    }

    /// Restart a finished match. Valid only in `GameOver`.
    pub fn request_restart(&mut self, now: u64) -> Result<Vec<Broadcast>, MatchError> {
        self.restart(now, None)?;
        Ok(self.take_broadcasts())
    }

    fn restart(&mut self, now: u64, requested_by: Option<Uuid>) -> Result<(), MatchError> {
        self.ensure_authority("request_restart")?;

        if !self.state.phase.can_restart() {
            return Err(MatchError::InvalidPhase {
                operation: "request_restart",
                phase: self.state.phase,
            });
        }

        self.advance_to(now)?;
        self.reset_scores();
        self.enter_countdown(now);
        info!(match_id = %self.id, round = self.state.round, "Match restarted");

        // Restarted goes out ahead of the countdown phase change
        let phase_change = self.outbox.pop();
        self.outbox.push(Broadcast::Restarted {
            round: self.state.round,
            requested_by,
        });
        self.outbox.extend(phase_change);
        Ok(())
    }

    pub fn take_broadcasts(&mut self) -> Vec<Broadcast> {
        std::mem::take(&mut self.outbox)
    }

    // ------------------------------------------------------------------
    // Simulation step
    // ------------------------------------------------------------------

    /// Advance the match to tick `now`.
    ///
    /// Events are applied in order, then phase transitions are evaluated
    /// once, so every score event of the tick is visible to the win check.
    pub fn tick(&mut self, now: u64, events: Vec<MatchEvent>) -> Result<TickOutcome, MatchError> {
        self.ensure_authority("tick")?;
        self.advance_to(now)?;

        let mut rejections = Vec::new();

        for event in events {
            let (participant, result) = match event {
                MatchEvent::Joined(participant) => {
                    let id = participant.id;
                    (id, self.participant_joined(participant).map(|_| ()))
                }
                MatchEvent::Left(id) => (id, self.participant_left(id).map(|_| ())),
                MatchEvent::Score {
                    participant,
                    points,
                    source,
                } => {
                    let result = self.apply_score(participant, points).map(|_| ());
                    if result.is_ok() {
                        debug!(match_id = %self.id, participant = %participant, ?source, "Scoring trigger");
                    }
                    (participant, result)
                }
                MatchEvent::RestartRequested { by } => {
                    let result = if self.roster.contains(by) {
                        self.restart(now, Some(by))
                    } else {
                        Err(MatchError::UnknownParticipant)
                    };
                    (by, result)
                }
            };

            if let Err(error) = result {
                warn!(match_id = %self.id, participant = %participant, %error, "Match event rejected");
                rejections.push(Rejection { participant, error });
            }
        }

        self.evaluate(now);

        Ok(TickOutcome {
            broadcasts: self.take_broadcasts(),
            rejections,
        })
    }

    /// Ticks only move forward, so replicas can order snapshots by tick
    fn advance_to(&mut self, now: u64) -> Result<(), MatchError> {
        if now < self.state.tick {
            return Err(MatchError::TickRegressed {
                now,
                last: self.state.tick,
            });
        }
        self.state.tick = now;
        Ok(())
    }

    fn evaluate(&mut self, now: u64) {
        let deadline = TickTimer::from(self.state.phase_deadline);

        match self.state.phase {
            MatchPhase::WaitingForParticipants => {
                if self.roster.len() >= self.config.min_participants {
                    self.enter_countdown(now);
                }
            }
            MatchPhase::Countdown => {
                if deadline.expired(now) {
                    self.enter_playing(now);
                }
            }
            MatchPhase::Playing => {
                if self.check_score_target() {
                    return;
                }
                if deadline.expired(now) {
                    match self.state.leader() {
                        Some(winner) => self.declare_winner(winner, WinReason::TimeLimit),
                        None => self.abort_to_waiting(),
                    }
                }
            }
            MatchPhase::GameOver => {}
        }
    }

    /// Declare the first participant in join order at the score target
    fn check_score_target(&mut self) -> bool {
        if self.state.phase != MatchPhase::Playing {
            return false;
        }
        match self.state.first_to_reach(self.config.score_to_win) {
            Some(winner) => {
                self.declare_winner(winner, WinReason::ScoreTarget);
                true
            }
            None => false,
        }
    }

    /// Fresh zero scores for everyone connected, in join order
    fn reset_scores(&mut self) {
        self.state.scores = self
            .roster
            .ids()
            .map(|participant| ScoreEntry {
                participant,
                score: 0,
            })
            .collect();
    }

    fn enter_countdown(&mut self, now: u64) {
        let timer = TickTimer::from_duration(now, self.config.countdown, self.config.tick_rate);
        self.state.phase = MatchPhase::Countdown;
        self.state.phase_deadline = timer.target();
        self.state.winner = None;
        self.state.win_reason = None;
        self.state.round += 1;

        let ids: Vec<Uuid> = self.roster.ids().collect();
        let spawns = self.spawns.assign(self.state.round, &ids);

        info!(match_id = %self.id, round = self.state.round, deadline = ?timer.target(), "Countdown started");
        self.outbox.push(Broadcast::PhaseChanged {
            phase: MatchPhase::Countdown,
            deadline: timer.target(),
            round: self.state.round,
            spawns,
        });
    }

    fn enter_playing(&mut self, now: u64) {
        let timer =
            TickTimer::from_duration(now, self.config.match_duration, self.config.tick_rate);
        self.reset_scores();
        self.state.phase = MatchPhase::Playing;
        self.state.phase_deadline = timer.target();

        info!(match_id = %self.id, round = self.state.round, "Match playing");
        self.outbox.push(Broadcast::PhaseChanged {
            phase: MatchPhase::Playing,
            deadline: timer.target(),
            round: self.state.round,
            spawns: Vec::new(),
        });
    }

    fn declare_winner(&mut self, winner: Uuid, reason: WinReason) {
        self.state.phase = MatchPhase::GameOver;
        self.state.phase_deadline = None;
        self.state.winner = Some(winner);
        self.state.win_reason = Some(reason);

        info!(match_id = %self.id, winner = %winner, ?reason, "Game over");
        self.outbox.push(Broadcast::GameOver {
            winner,
            reason,
            scores: self.state.scores.clone(),
        });
    }

    /// Nobody is left to win: drop back to waiting
    fn abort_to_waiting(&mut self) {
        warn!(match_id = %self.id, "Time limit reached with no participants, match aborted");
        self.state.phase = MatchPhase::WaitingForParticipants;
        self.state.phase_deadline = None;
        self.outbox.push(Broadcast::PhaseChanged {
            phase: MatchPhase::WaitingForParticipants,
            deadline: None,
            round: self.state.round,
            spawns: Vec::new(),
        });
    }

    // ------------------------------------------------------------------
    // Replication
    // ------------------------------------------------------------------

    /// Install a snapshot from the authoritative replica.
    ///
    /// Returns `Ok(false)` for snapshots older than the current one.
    pub fn apply_replicated(&mut self, state: MatchState) -> Result<bool, MatchError> {
        if self.has_state_authority() {
            return Err(MatchError::AuthorityViolation {
                operation: "apply_replicated",
            });
        }
        if state.tick < self.state.tick {
            return Ok(false);
        }
        self.state = state;
        Ok(true)
    }

    /// Take over authority from the last replicated state.
    ///
    /// The roster is rebuilt from the replicated connected list, in join
    /// order. Participant details come from `known` where the caller has
    /// them. Deadlines are tick-denominated, so the new authority continues
    /// the current phase where the previous one stopped.
    pub fn assume_authority(&mut self, known: &[Participant]) {
        if self.has_state_authority() {
            return;
        }
        self.authority = Authority::Authoritative;
        self.roster = Roster::new();
        for &id in &self.state.connected {
            let participant = known
                .iter()
                .find(|p| p.id == id)
                .cloned()
                .unwrap_or_else(|| Participant::new(id, String::new()));
            self.roster.join(participant);
        }
        warn!(
            match_id = %self.id,
            phase = %self.state.phase,
            connected = self.roster.len(),
            "Assumed state authority"
        );
    }
}
