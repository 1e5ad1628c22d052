//! Match simulation modules

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod r#match;
pub mod phase;
pub mod roster;
pub mod snapshot;
pub mod spawn;
pub mod state;
pub mod streak;

pub use config::{GameMode, MatchConfig, MatchDefaults};
pub use r#match::{GameMatch, MatchRegistry, MatchView};
pub use roster::Participant;
pub use streak::StreakTracker;

use crate::ws::protocol::ClientMsg;
use uuid::Uuid;

/// Player message received from WebSocket
#[derive(Debug, Clone)]
pub struct PlayerInput {
    pub user_id: Uuid,
    pub msg: ClientMsg,
}

/// Input queued to a match task, drained at the start of each tick
#[derive(Debug, Clone)]
pub enum MatchInput {
    /// Matchmaking seats a participant
    Join(Participant),
    /// A message from a seated player
    Player(PlayerInput),
}
