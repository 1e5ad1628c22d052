//! Connected participants, in join order

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A connected contender
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: Uuid,
    pub display_name: String,
    /// Wallet address used for streak tracking
    pub wallet: Option<String>,
    pub joined_at_tick: u64,
}

impl Participant {
    pub fn new(id: Uuid, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            wallet: None,
            joined_at_tick: 0,
        }
    }

    pub fn with_wallet(mut self, wallet: impl Into<String>) -> Self {
        self.wallet = Some(wallet.into());
        self
    }
}

/// Ordered set of connected participants
#[derive(Debug, Clone, Default)]
pub struct Roster {
    participants: Vec<Participant>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a participant; returns false if already present
    pub fn join(&mut self, participant: Participant) -> bool {
        if self.contains(participant.id) {
            return false;
        }
        self.participants.push(participant);
        true
    }

    pub fn leave(&mut self, id: Uuid) -> Option<Participant> {
        let pos = self.participants.iter().position(|p| p.id == id)?;
        Some(self.participants.remove(pos))
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.participants.iter().any(|p| p.id == id)
    }

    pub fn get(&self, id: Uuid) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.participants.iter().map(|p| p.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_join_order_and_rejects_duplicates() {
        let mut roster = Roster::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert!(roster.join(Participant::new(a, "a")));
        assert!(roster.join(Participant::new(b, "b")));
        assert!(!roster.join(Participant::new(a, "a again")));

        assert_eq!(roster.ids().collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(roster.leave(a).map(|p| p.id), Some(a));
        assert_eq!(roster.len(), 1);
        assert!(roster.leave(a).is_none());
    }
}
