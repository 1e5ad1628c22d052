//! Match phase

use serde::{Deserialize, Serialize};

/// Phase of a match's lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// Not enough participants connected yet
    #[default]
    WaitingForParticipants,
    /// Short countdown before play starts
    Countdown,
    /// Match in progress, scores count
    Playing,
    /// Winner decided; waits for a restart
    GameOver,
}

impl MatchPhase {
    /// Whether this phase runs against a deadline
    pub fn is_timed(&self) -> bool {
        matches!(self, Self::Countdown | Self::Playing)
    }

    /// Whether score events are accepted in this phase
    pub fn accepts_scores(&self) -> bool {
        matches!(self, Self::Playing)
    }

    /// Whether a restart may be requested from this phase
    pub fn can_restart(&self) -> bool {
        matches!(self, Self::GameOver)
    }
}

impl std::fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::WaitingForParticipants => "waiting_for_participants",
            Self::Countdown => "countdown",
            Self::Playing => "playing",
            Self::GameOver => "game_over",
        };
        f.write_str(name)
    }
}
