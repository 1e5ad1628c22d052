//! Win streak tracking across matches

use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

/// Bonus percent granted per consecutive win
pub const STREAK_BONUS_PERCENT: f64 = 2.0;

/// Streak length beyond which the bonus stops growing
pub const MAX_BONUS_STREAK: u32 = 10;

/// Streak announced in match results
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StreakUpdate {
    pub participant: Uuid,
    pub streak: u32,
    pub bonus_percent: f64,
}

#[derive(Default)]
struct Inner {
    /// Streak per wallet address
    streaks: HashMap<String, u32>,
    /// Wallet registered by each user
    wallets: HashMap<Uuid, String>,
}

/// Shared win streak tracker, keyed by wallet address
#[derive(Default)]
pub struct StreakTracker {
    inner: Mutex<Inner>,
}

impl StreakTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate a wallet with a user; empty addresses are ignored
    pub fn register_wallet(&self, user_id: Uuid, wallet: &str) {
        if wallet.is_empty() {
            return;
        }
        let mut inner = self.inner.lock();
        inner.wallets.insert(user_id, wallet.to_string());
        let streak = *inner.streaks.entry(wallet.to_string()).or_insert(0);
        debug!(user_id = %user_id, wallet, streak, "Registered wallet");
    }

    pub fn record_win(&self, user_id: Uuid) -> Option<u32> {
        let mut inner = self.inner.lock();
        let wallet = inner.wallets.get(&user_id)?.clone();
        let streak = inner.streaks.entry(wallet.clone()).or_insert(0);
        *streak += 1;
        info!(wallet = %wallet, streak = *streak, "Win streak extended");
        Some(*streak)
    }

    pub fn record_loss(&self, user_id: Uuid) -> Option<u32> {
        let mut inner = self.inner.lock();
        let wallet = inner.wallets.get(&user_id)?.clone();
        inner.streaks.insert(wallet, 0);
        Some(0)
    }

    pub fn streak(&self, user_id: Uuid) -> u32 {
        let inner = self.inner.lock();
        inner
            .wallets
            .get(&user_id)
            .and_then(|wallet| inner.streaks.get(wallet))
            .copied()
            .unwrap_or(0)
    }

    pub fn bonus_percent(&self, user_id: Uuid) -> f64 {
        self.streak(user_id).min(MAX_BONUS_STREAK) as f64 * STREAK_BONUS_PERCENT
    }

    /// Scale `base` by the user's streak bonus
    pub fn apply_bonus(&self, base: f64, user_id: Uuid) -> f64 {
        base * (1.0 + self.bonus_percent(user_id) / 100.0)
    }

    /// Record a finished match; returns the updated streaks of wallet holders
    pub fn record_result(&self, winner: Uuid, participants: &[Uuid]) -> Vec<StreakUpdate> {
        participants
            .iter()
            .filter_map(|&participant| {
                let streak = if participant == winner {
                    self.record_win(participant)?
                } else {
                    self.record_loss(participant)?
                };
                Some(StreakUpdate {
                    participant,
                    streak,
                    bonus_percent: self.bonus_percent(participant),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wins_accumulate_and_losses_reset() {
        let tracker = StreakTracker::new();
        let user = Uuid::new_v4();
        tracker.register_wallet(user, "wallet-a");

        tracker.record_win(user);
        tracker.record_win(user);
        assert_eq!(tracker.streak(user), 2);
        assert_eq!(tracker.bonus_percent(user), 4.0);

        tracker.record_loss(user);
        assert_eq!(tracker.streak(user), 0);
    }

    #[test]
    fn bonus_is_capped() {
        let tracker = StreakTracker::new();
        let user = Uuid::new_v4();
        tracker.register_wallet(user, "wallet-b");
        for _ in 0..15 {
            tracker.record_win(user);
        }
        assert_eq!(tracker.bonus_percent(user), 20.0);
        assert!((tracker.apply_bonus(0.02, user) - 0.024).abs() < 1e-9);
    }

    #[test]
    fn users_without_wallets_are_ignored() {
        let tracker = StreakTracker::new();
        let winner = Uuid::new_v4();
        let loser = Uuid::new_v4();
        tracker.register_wallet(loser, "wallet-c");
        tracker.register_wallet(winner, "");

        let updates = tracker.record_result(winner, &[winner, loser]);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].participant, loser);
        assert_eq!(tracker.streak(winner), 0);
    }

    #[test]
    fn streak_follows_wallet_across_sessions() {
        let tracker = StreakTracker::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        tracker.register_wallet(first, "shared");
        tracker.record_win(first);

        tracker.register_wallet(second, "shared");
        assert_eq!(tracker.streak(second), 1);
    }
}
