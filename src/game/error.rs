//! Match coordinator errors

use super::phase::MatchPhase;

/// Reasons a match operation was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    #[error("{operation} rejected: this replica does not hold state authority")]
    AuthorityViolation { operation: &'static str },

    #[error("{operation} is not valid while the match is {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: MatchPhase,
    },

    #[error("score events must award at least one point")]
    InvalidPoints,

    #[error("participant is not part of this match")]
    UnknownParticipant,

    #[error("match is full")]
    MatchFull,

    #[error("invalid match configuration: {0}")]
    InvalidConfig(String),

    #[error("tick {now} is behind the last applied tick {last}")]
    TickRegressed { now: u64, last: u64 },
}

impl MatchError {
    /// Short machine-readable code for client error messages
    pub fn code(&self) -> &'static str {
        match self {
            Self::AuthorityViolation { .. } => "authority_violation",
            Self::InvalidPhase { .. } => "invalid_phase",
            Self::InvalidPoints => "invalid_points",
            Self::UnknownParticipant => "unknown_participant",
            Self::MatchFull => "match_full",
            Self::InvalidConfig(_) => "invalid_config",
            Self::TickRegressed { .. } => "tick_regressed",
        }
    }
}
