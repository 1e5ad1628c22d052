//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{MatchRegistry, StreakTracker};
use crate::matchmaking::MatchmakingService;

/// Shared application state.
///
/// Every service is constructed here and passed down explicitly.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub streaks: Arc<StreakTracker>,
    pub matchmaking: Arc<MatchmakingService>,
    pub match_registry: Arc<MatchRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // Streaks outlive individual matches
        let streaks = Arc::new(StreakTracker::new());

        // Initialize match registry
        let match_registry = Arc::new(MatchRegistry::new());

        // Initialize matchmaking service (Arc for sharing across cloned AppState)
        let matchmaking = Arc::new(MatchmakingService::new(
            match_registry.clone(),
            streaks.clone(),
            config.match_defaults.clone(),
        ));

        Self {
            config,
            streaks,
            matchmaking,
            match_registry,
        }
    }
}
