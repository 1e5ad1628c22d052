//! Matchmaking queue implementation

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::game::config::GameMode;
use crate::game::roster::Participant;

/// Player in the matchmaking queue
#[derive(Debug, Clone)]
pub struct QueuedPlayer {
    pub user_id: Uuid,
    pub display_name: String,
    pub wallet: Option<String>,
    pub mode: GameMode,
    pub queued_at: Instant,
}

impl QueuedPlayer {
    pub fn new(user_id: Uuid, display_name: String, mode: GameMode) -> Self {
        Self {
            user_id,
            display_name,
            wallet: None,
            mode,
            queued_at: Instant::now(),
        }
    }

    pub fn with_wallet(mut self, wallet: Option<String>) -> Self {
        self.wallet = wallet.filter(|w| !w.is_empty());
        self
    }

    /// How long this player has been waiting
    pub fn wait_time(&self) -> Duration {
        self.queued_at.elapsed()
    }

    /// Participant record for the match this player is seated in
    pub fn to_participant(&self) -> Participant {
        Participant {
            id: self.user_id,
            display_name: self.display_name.clone(),
            wallet: self.wallet.clone(),
            joined_at_tick: 0,
        }
    }
}

/// The matchmaking queue for one game mode
pub struct MatchmakingQueue {
    mode: GameMode,
    queue: VecDeque<QueuedPlayer>,
}

impl MatchmakingQueue {
    pub fn new(mode: GameMode) -> Self {
        Self {
            mode,
            queue: VecDeque::new(),
        }
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    /// Add a player to the queue
    pub fn enqueue(&mut self, player: QueuedPlayer) {
        // Remove if already in queue (rejoin)
        self.queue.retain(|p| p.user_id != player.user_id);
        self.queue.push_back(player);
    }

    /// Remove a player from the queue
    pub fn dequeue(&mut self, user_id: Uuid) -> Option<QueuedPlayer> {
        let pos = self.queue.iter().position(|p| p.user_id == user_id)?;
        self.queue.remove(pos)
    }

    /// Check if a player is in the queue
    pub fn contains(&self, user_id: &Uuid) -> bool {
        self.queue.iter().any(|p| &p.user_id == user_id)
    }

    /// Get queue length
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Take the oldest connected players for one match, if there are enough.
    ///
    /// Players keep their queue order, which becomes their join order.
    pub fn take_match(&mut self, connected: &HashSet<Uuid>) -> Option<Vec<QueuedPlayer>> {
        let needed = self.mode.min_participants();
        let picked: Vec<Uuid> = self
            .queue
            .iter()
            .filter(|p| connected.contains(&p.user_id))
            .take(self.mode.max_participants())
            .map(|p| p.user_id)
            .collect();

        if picked.len() < needed {
            return None;
        }

        Some(picked.into_iter().filter_map(|id| self.dequeue(id)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queued(mode: GameMode) -> QueuedPlayer {
        let id = Uuid::new_v4();
        QueuedPlayer::new(id, format!("Player_{}", &id.to_string()[..8]), mode)
    }

    #[test]
    fn duel_needs_two_connected_players() {
        let mut queue = MatchmakingQueue::new(GameMode::StakedDuel);
        let first = queued(GameMode::StakedDuel);
        let second = queued(GameMode::StakedDuel);
        let offline = queued(GameMode::StakedDuel);

        queue.enqueue(first.clone());
        queue.enqueue(offline.clone());
        let connected: HashSet<Uuid> = [first.user_id, second.user_id].into_iter().collect();
        assert!(queue.take_match(&connected).is_none());

        queue.enqueue(second.clone());
        let players = queue.take_match(&connected).unwrap();
        let ids: Vec<Uuid> = players.iter().map(|p| p.user_id).collect();
        assert_eq!(ids, vec![first.user_id, second.user_id]);
        assert_eq!(queue.len(), 1);
        assert!(queue.contains(&offline.user_id));
    }

    #[test]
    fn solo_matches_take_one_player_each() {
        let mut queue = MatchmakingQueue::new(GameMode::SoloArena);
        let a = queued(GameMode::SoloArena);
        let b = queued(GameMode::SoloArena);
        queue.enqueue(a.clone());
        queue.enqueue(b.clone());
        let connected: HashSet<Uuid> = [a.user_id, b.user_id].into_iter().collect();

        assert_eq!(queue.take_match(&connected).unwrap()[0].user_id, a.user_id);
        assert_eq!(queue.take_match(&connected).unwrap()[0].user_id, b.user_id);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn rejoining_moves_player_to_back() {
        let mut queue = MatchmakingQueue::new(GameMode::StakedDuel);
        let a = queued(GameMode::StakedDuel);
        let b = queued(GameMode::StakedDuel);
        queue.enqueue(a.clone());
        queue.enqueue(b.clone());
        queue.enqueue(a.clone());
        assert_eq!(queue.len(), 2);

        let connected: HashSet<Uuid> = [a.user_id, b.user_id].into_iter().collect();
        let order: Vec<Uuid> = queue
            .take_match(&connected)
            .unwrap()
            .iter()
            .map(|p| p.user_id)
            .collect();
        assert_eq!(order, vec![b.user_id, a.user_id]);
    }
}
