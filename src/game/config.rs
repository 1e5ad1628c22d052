//! Per-match configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::util::time::SIMULATION_TPS;

use super::error::MatchError;

/// Game modes offered by matchmaking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    /// Single player against arena targets
    SoloArena,
    /// Two players, stake on the outcome
    StakedDuel,
}

impl GameMode {
    /// Participants needed before the countdown starts
    pub fn min_participants(&self) -> usize {
        match self {
            Self::SoloArena => 1,
            Self::StakedDuel => 2,
        }
    }

    pub fn max_participants(&self) -> usize {
        match self {
            Self::SoloArena => 1,
            Self::StakedDuel => 2,
        }
    }
}

/// Server-wide defaults that every match configuration starts from
#[derive(Debug, Clone)]
pub struct MatchDefaults {
    pub match_duration: Duration,
    pub score_to_win: u32,
    pub countdown: Duration,
    pub spawn_points: usize,
    pub max_target_points: u32,
    pub tick_rate: u32,
}

impl Default for MatchDefaults {
    fn default() -> Self {
        Self {
            match_duration: Duration::from_secs(300),
            score_to_win: 5,
            countdown: Duration::from_secs(3),
            spawn_points: 4,
            max_target_points: 10,
            tick_rate: SIMULATION_TPS,
        }
    }
}

/// Immutable parameters of one match
#[derive(Debug, Clone)]
pub struct MatchConfig {
    pub mode: GameMode,
    /// Length of the playing phase
    pub match_duration: Duration,
    /// Score that ends the match immediately
    pub score_to_win: u32,
    /// Length of the countdown phase
    pub countdown: Duration,
    pub min_participants: usize,
    pub max_participants: usize,
    /// Number of spawn slots in the arena
    pub spawn_points: usize,
    /// Cap on points a single target hit may award
    pub max_target_points: u32,
    /// Simulation ticks per second
    pub tick_rate: u32,
}

impl MatchConfig {
    /// Build the configuration for `mode` from the server defaults
    pub fn for_mode(mode: GameMode, defaults: &MatchDefaults) -> Result<Self, MatchError> {
        let config = Self {
            mode,
            match_duration: defaults.match_duration,
            score_to_win: defaults.score_to_win,
            countdown: defaults.countdown,
            min_participants: mode.min_participants(),
            max_participants: mode.max_participants(),
            spawn_points: defaults.spawn_points,
            max_target_points: defaults.max_target_points,
            tick_rate: defaults.tick_rate,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MatchError> {
        if self.score_to_win == 0 {
            return Err(MatchError::InvalidConfig("score_to_win must be positive".into()));
        }
        if self.match_duration.is_zero() || self.countdown.is_zero() {
            return Err(MatchError::InvalidConfig("phase durations must be positive".into()));
        }
        if self.tick_rate == 0 {
            return Err(MatchError::InvalidConfig("tick_rate must be positive".into()));
        }
        if self.min_participants == 0 || self.min_participants > self.max_participants {
            return Err(MatchError::InvalidConfig(
                "participant bounds are inconsistent".into(),
            ));
        }
        Ok(())
    }
}
