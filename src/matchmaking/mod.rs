//! Matchmaking: per-mode queues and match creation

pub mod queue;
pub mod service;

pub use service::MatchmakingService;
