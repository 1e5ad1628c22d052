//! Matchmaking service - manages queues and match creation

use dashmap::{DashMap, DashSet};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::game::{
    GameMatch, GameMode, MatchConfig, MatchDefaults, MatchInput, MatchRegistry, PlayerInput,
    StreakTracker,
};
use crate::ws::protocol::{ClientMsg, ServerMsg};

use super::queue::{MatchmakingQueue, QueuedPlayer};

/// Matchmaking errors
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("Already in a match")]
    AlreadyInMatch,
}

/// Matchmaking service
#[derive(Clone)]
pub struct MatchmakingService {
    queues: Arc<Mutex<HashMap<GameMode, MatchmakingQueue>>>,
    registry: Arc<MatchRegistry>,
    streaks: Arc<StreakTracker>,
    defaults: Arc<MatchDefaults>,
    /// Connected players awaiting or in matches
    players: Arc<DashSet<Uuid>>,
    /// Map of player -> current match
    player_matches: Arc<DashMap<Uuid, Uuid>>,
}

impl MatchmakingService {
    pub fn new(
        registry: Arc<MatchRegistry>,
        streaks: Arc<StreakTracker>,
        defaults: MatchDefaults,
    ) -> Self {
        let queues = [GameMode::SoloArena, GameMode::StakedDuel]
            .into_iter()
            .map(|mode| (mode, MatchmakingQueue::new(mode)))
            .collect();

        Self {
            queues: Arc::new(Mutex::new(queues)),
            registry,
            streaks,
            defaults: Arc::new(defaults),
            players: Arc::new(DashSet::new()),
            player_matches: Arc::new(DashMap::new()),
        }
    }

    /// Register a player connection (called when WebSocket connects)
    /// Returns channels for communication
    pub async fn register_player(
        &self,
        user_id: Uuid,
    ) -> (mpsc::Sender<PlayerInput>, broadcast::Receiver<ServerMsg>) {
        // Create personal channels for this player
        let (input_tx, mut input_rx) = mpsc::channel::<PlayerInput>(64);
        let (outbound_tx, outbound_rx) = broadcast::channel::<ServerMsg>(64);

        self.players.insert(user_id);

        // Route messages from the personal channel to the current match
        let registry = self.registry.clone();
        let player_matches = self.player_matches.clone();

        tokio::spawn(async move {
            while let Some(input) = input_rx.recv().await {
                let Some(match_id) = player_matches.get(&user_id).map(|r| *r) else {
                    continue;
                };
                if let Some(match_handle) = registry.get(&match_id) {
                    if match_handle
                        .input_tx
                        .send(MatchInput::Player(input))
                        .await
                        .is_err()
                    {
                        warn!(user_id = %user_id, "Failed to send input to match");
                    }
                }
            }
        });

        // Route match broadcasts to the player
        let player_matches = self.player_matches.clone();
        let registry = self.registry.clone();
        let players = self.players.clone();

        tokio::spawn(async move {
            let mut current_match_rx: Option<broadcast::Receiver<ServerMsg>> = None;
            let mut current_match_id: Option<Uuid> = None;

            loop {
                // Check if player's match changed
                let new_match_id = player_matches.get(&user_id).map(|r| *r);

                if new_match_id != current_match_id {
                    current_match_id = new_match_id;
                    current_match_rx = new_match_id.and_then(|mid| {
                        registry.get(&mid).map(|h| h.broadcast_tx.subscribe())
                    });
                }

                if let Some(ref mut rx) = current_match_rx {
                    match rx.recv().await {
                        Ok(msg) if msg.is_for(user_id) => {
                            let _ = outbound_tx.send(msg);
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(user_id = %user_id, lagged = n, "Match receiver lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            current_match_rx = None;
                            current_match_id = None;
                        }
                    }
                } else {
                    // No match, wait a bit
                    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
                }

                // Check if player disconnected
                if !players.contains(&user_id) {
                    break;
                }
            }
        });

        (input_tx, outbound_rx)
    }

    /// Unregister a player (called when WebSocket disconnects)
    pub async fn unregister_player(&self, user_id: Uuid) {
        // The leave goes straight to the match while the mapping still exists
        self.leave(user_id).await;
        self.players.remove(&user_id);

        info!(user_id = %user_id, "Player unregistered from matchmaking");
    }

    /// Join the queue for the player's chosen mode
    pub async fn join_queue(&self, player: QueuedPlayer) -> Result<(), MatchmakingError> {
        let user_id = player.user_id;
        let mode = player.mode;

        if self.player_matches.contains_key(&user_id) {
            return Err(MatchmakingError::AlreadyInMatch);
        }

        let mut queues = self.queues.lock().await;
        // A player waits in one queue at a time
        for queue in queues.values_mut() {
            queue.dequeue(user_id);
        }
        let queue = queues
            .entry(mode)
            .or_insert_with(|| MatchmakingQueue::new(mode));
        queue.enqueue(player);

        info!(user_id = %user_id, ?mode, queue_size = queue.len(), "Player joined matchmaking queue");
        Ok(())
    }

    /// Leave the matchmaking queue, or the current match
    pub async fn leave(&self, user_id: Uuid) {
        {
            let mut queues = self.queues.lock().await;
            for queue in queues.values_mut() {
                queue.dequeue(user_id);
            }
        }

        let Some(match_id) = self.get_player_match(&user_id) else {
            return;
        };
        if let Some(handle) = self.registry.get(&match_id) {
            let leave = MatchInput::Player(PlayerInput {
                user_id,
                msg: ClientMsg::LeaveMatch,
            });
            let _ = handle.input_tx.send(leave).await;
        }
        self.player_matches.remove(&user_id);
    }

    /// Create a match with the given players
    async fn create_match(&self, mode: GameMode, players: Vec<QueuedPlayer>) {
        let config = match MatchConfig::for_mode(mode, &self.defaults) {
            Ok(config) => config,
            Err(e) => {
                error!(?mode, error = %e, "Cannot create match");
                return;
            }
        };

        let match_id = Uuid::new_v4();
        let seed = rand::random::<u64>();
        let (game_match, handle) = GameMatch::new(match_id, seed, config, self.streaks.clone());

        // Register match
        self.registry.insert(handle.clone());

        // Associate players with match
        for player in &players {
            self.player_matches.insert(player.user_id, match_id);
        }

        info!(
            match_id = %match_id,
            ?mode,
            player_count = players.len(),
            "Created new match"
        );

        // Spawn match task
        let registry = self.registry.clone();
        let player_matches = self.player_matches.clone();
        let match_player_ids: Vec<Uuid> = players.iter().map(|p| p.user_id).collect();

        tokio::spawn(async move {
            game_match.run().await;

            // Cleanup after match ends
            registry.remove(&match_id);
            for pid in match_player_ids {
                player_matches.remove_if(&pid, |_, mid| *mid == match_id);
            }

            info!(match_id = %match_id, "Match removed from registry");
        });

        // Seat players in queue order, which becomes their join order
        for player in players {
            info!(
                user_id = %player.user_id,
                waited_ms = player.wait_time().as_millis() as u64,
                "Seating player"
            );
            if handle
                .input_tx
                .send(MatchInput::Join(player.to_participant()))
                .await
                .is_err()
            {
                error!(user_id = %player.user_id, "Failed to send join to match");
            }
        }
    }

    /// One matchmaking pass over every mode queue
    pub async fn form_matches(&self) {
        let connected: HashSet<Uuid> = self.players.iter().map(|entry| *entry.key()).collect();

        let mut formed = Vec::new();
        {
            let mut queues = self.queues.lock().await;
            for queue in queues.values_mut() {
                while let Some(players) = queue.take_match(&connected) {
                    formed.push((queue.mode(), players));
                }
            }
        }

        for (mode, players) in formed {
            self.create_match(mode, players).await;
        }
    }

    /// Run the matchmaking service (periodic queue processing)
    pub async fn run(&self) {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_millis(500));

        loop {
            interval.tick().await;
            self.form_matches().await;
        }
    }

    /// Get current queue size across modes
    pub async fn queue_size(&self) -> usize {
        self.queues.lock().await.values().map(|q| q.len()).sum()
    }

    /// Check if player is in queue
    pub async fn is_in_queue(&self, user_id: &Uuid) -> bool {
        self.queues
            .lock()
            .await
            .values()
            .any(|q| q.contains(user_id))
    }

    /// Get player's current match ID
    pub fn get_player_match(&self, user_id: &Uuid) -> Option<Uuid> {
        self.player_matches.get(user_id).map(|r| *r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn service() -> MatchmakingService {
        MatchmakingService::new(
            Arc::new(MatchRegistry::new()),
            Arc::new(StreakTracker::new()),
            MatchDefaults::default(),
        )
    }

    fn queued(user_id: Uuid, mode: GameMode) -> QueuedPlayer {
        QueuedPlayer::new(user_id, "player".to_string(), mode)
    }

    #[tokio::test]
    async fn duel_forms_once_two_players_are_connected() {
        let service = service();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let _a_channels = service.register_player(a).await;
        let _b_channels = service.register_player(b).await;

        service.join_queue(queued(a, GameMode::StakedDuel)).await.unwrap();
        service.form_matches().await;
        assert!(service.get_player_match(&a).is_none());
        assert!(service.is_in_queue(&a).await);

        service.join_queue(queued(b, GameMode::StakedDuel)).await.unwrap();
        service.form_matches().await;

        let match_id = service.get_player_match(&a).unwrap();
        assert_eq!(service.get_player_match(&b), Some(match_id));
        assert_eq!(service.queue_size().await, 0);
        assert_eq!(service.registry.get(&match_id).unwrap().mode, GameMode::StakedDuel);
    }

    #[tokio::test]
    async fn solo_forms_immediately() {
        let service = service();
        let a = Uuid::new_v4();
        let _channels = service.register_player(a).await;

        service.join_queue(queued(a, GameMode::SoloArena)).await.unwrap();
        service.form_matches().await;
        assert!(service.get_player_match(&a).is_some());

        let err = service
            .join_queue(queued(a, GameMode::SoloArena))
            .await
            .unwrap_err();
        assert!(matches!(err, MatchmakingError::AlreadyInMatch));
    }

    #[tokio::test]
    async fn switching_modes_leaves_previous_queue() {
        let service = service();
        let a = Uuid::new_v4();
        tokio_test::assert_ok!(service.join_queue(queued(a, GameMode::StakedDuel)).await);
        tokio_test::assert_ok!(service.join_queue(queued(a, GameMode::SoloArena)).await);
        assert_eq!(service.queue_size().await, 1);

        service.leave(a).await;
        assert!(!service.is_in_queue(&a).await);
    }

    #[tokio::test]
    async fn disconnect_removes_participant_and_closes_match() {
        let service = service();
        let a = Uuid::new_v4();
        let _channels = service.register_player(a).await;
        tokio_test::assert_ok!(service.join_queue(queued(a, GameMode::SoloArena)).await);
        service.form_matches().await;

        let match_id = service.get_player_match(&a).unwrap();
        let handle = service.registry.get(&match_id).unwrap();
        let mut match_rx = handle.broadcast_tx.subscribe();

        let seated = tokio::time::timeout(Duration::from_secs(2), async {
            while handle.player_count() == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(seated.is_ok());

        service.unregister_player(a).await;
        assert!(service.get_player_match(&a).is_none());

        let closed = tokio::time::timeout(Duration::from_secs(2), async {
            let mut left = false;
            loop {
                match match_rx.recv().await {
                    Ok(ServerMsg::ParticipantLeft { user_id, .. }) if user_id == a => left = true,
                    Ok(ServerMsg::MatchClosed { .. }) => return left,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => return left,
                }
            }
        })
        .await;
        assert_eq!(closed.ok(), Some(true));
        assert_eq!(handle.player_count(), 0);

        let removed = tokio::time::timeout(Duration::from_secs(2), async {
            while service.registry.get(&match_id).is_some() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(removed.is_ok());
    }
}
