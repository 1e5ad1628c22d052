//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::config::GameMode;
use crate::game::coordinator::Broadcast;
use crate::game::phase::MatchPhase;
use crate::game::spawn::SpawnAssignment;
use crate::game::state::{MatchState, ScoreEntry, WinReason};
use crate::game::streak::StreakUpdate;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// An arrow from this player hit an arena target
    ReportTargetHit {
        /// Target identifier in the arena scene
        target_id: u32,
        /// Point value of the target
        points: u32,
    },

    /// This player's arrow eliminated another player
    ReportElimination {
        victim_id: Uuid,
    },

    /// Ask the host to restart a finished match
    RequestRestart,

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// Leave current match
    LeaveMatch,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        user_id: Uuid,
        server_time: u64,
    },

    /// Confirmation of match join
    MatchJoined {
        match_id: Uuid,
        mode: GameMode,
        /// Participants in the match at join time, in join order
        participants: Vec<ParticipantInfo>,
    },

    ParticipantJoined {
        participant: ParticipantInfo,
    },

    ParticipantLeft {
        user_id: Uuid,
        reason: String,
    },

    /// Replicated match state (sent at regular intervals)
    MatchState {
        state: MatchState,
        /// Milliseconds left in the current timed phase
        remaining_ms: u64,
    },

    /// The match entered a new phase
    PhaseChanged {
        phase: MatchPhase,
        deadline_tick: Option<u64>,
        round: u32,
        spawns: Vec<SpawnAssignment>,
    },

    /// A winner has been decided
    GameOver {
        winner_user_id: Uuid,
        reason: WinReason,
        scores: Vec<ScoreEntry>,
        streaks: Vec<StreakUpdate>,
        ended_at: chrono::DateTime<chrono::Utc>,
    },

    /// A finished match was restarted
    MatchRestarted {
        round: u32,
        requested_by: Option<Uuid>,
    },

    /// The hosting match task stopped
    MatchClosed {
        match_id: Uuid,
        reason: String,
    },

    /// Error message for a single client
    Error {
        code: String,
        message: String,
        /// Only this user is sent the error; never serialized
        #[serde(skip)]
        recipient: Option<Uuid>,
    },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

impl ServerMsg {
    /// Wire form of a coordinator broadcast. Game over is built by the
    /// match task, which adds streaks, so it maps to `None` here.
    pub fn from_broadcast(broadcast: &Broadcast) -> Option<Self> {
        match broadcast {
            Broadcast::PhaseChanged {
                phase,
                deadline,
                round,
                spawns,
            } => Some(Self::PhaseChanged {
                phase: *phase,
                deadline_tick: *deadline,
                round: *round,
                spawns: spawns.clone(),
            }),
            Broadcast::Restarted {
                round,
                requested_by,
            } => Some(Self::MatchRestarted {
                round: *round,
                requested_by: *requested_by,
            }),
            Broadcast::GameOver { .. } => None,
        }
    }

    /// Error addressed to one user on a shared match channel
    pub fn error_to(user_id: Uuid, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
            recipient: Some(user_id),
        }
    }

    /// Whether `user_id` should be sent this message
    pub fn is_for(&self, user_id: Uuid) -> bool {
        match self {
            Self::Error {
                recipient: Some(recipient),
                ..
            } => *recipient == user_id,
            _ => true,
        }
    }
}

/// Participant info for lobby/join
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantInfo {
    pub user_id: Uuid,
    pub display_name: String,
}
