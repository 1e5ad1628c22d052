//! Replicated match state

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::phase::MatchPhase;

/// How the winner was decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinReason {
    /// A participant reached the score target
    ScoreTarget,
    /// The playing phase ran out of time
    TimeLimit,
}

/// One participant's score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub participant: Uuid,
    pub score: u32,
}

/// The shared match record.
///
/// Written only by the authoritative replica and pushed to every other
/// replica. `scores` is kept in join order, which is also the tie-break order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MatchState {
    pub phase: MatchPhase,
    /// Tick at which the current timed phase expires
    pub phase_deadline: Option<u64>,
    pub scores: Vec<ScoreEntry>,
    /// Participants currently connected, in join order
    pub connected: Vec<Uuid>,
    pub winner: Option<Uuid>,
    pub win_reason: Option<WinReason>,
    /// Authoritative tick of the last write
    pub tick: u64,
    /// Incremented on every countdown start
    pub round: u32,
}

impl MatchState {
    pub fn score_of(&self, participant: Uuid) -> u32 {
        self.scores
            .iter()
            .find(|entry| entry.participant == participant)
            .map(|entry| entry.score)
            .unwrap_or(0)
    }

    pub fn has_entry(&self, participant: Uuid) -> bool {
        self.scores.iter().any(|entry| entry.participant == participant)
    }

    /// Add a zero entry at the end of the order if absent
    pub fn ensure_entry(&mut self, participant: Uuid) {
        if !self.has_entry(participant) {
            self.scores.push(ScoreEntry {
                participant,
                score: 0,
            });
        }
    }

    /// Add points, returning the new total
    pub(crate) fn add_points(&mut self, participant: Uuid, points: u32) -> Option<u32> {
        let entry = self
            .scores
            .iter_mut()
            .find(|entry| entry.participant == participant)?;
        entry.score = entry.score.saturating_add(points);
        Some(entry.score)
    }

    /// First entry, in join order, at or above `target`
    pub fn first_to_reach(&self, target: u32) -> Option<Uuid> {
        self.scores
            .iter()
            .find(|entry| entry.score >= target)
            .map(|entry| entry.participant)
    }

    /// Strictly highest score; the earliest entry wins ties
    pub fn leader(&self) -> Option<Uuid> {
        let mut best: Option<&ScoreEntry> = None;
        for entry in &self.scores {
            if best.map_or(true, |b| entry.score > b.score) {
                best = Some(entry);
            }
        }
        best.map(|entry| entry.participant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(scores: &[(Uuid, u32)]) -> MatchState {
        MatchState {
            scores: scores
                .iter()
                .map(|&(participant, score)| ScoreEntry { participant, score })
                .collect(),
            ..MatchState::default()
        }
    }

    #[test]
    fn leader_prefers_earliest_on_tie() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(state_with(&[(a, 3), (b, 3)]).leader(), Some(a));
        assert_eq!(state_with(&[(b, 3), (a, 3)]).leader(), Some(b));
        assert_eq!(state_with(&[(a, 2), (b, 4)]).leader(), Some(b));
        assert_eq!(MatchState::default().leader(), None);
    }

    #[test]
    fn first_to_reach_uses_join_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let state = state_with(&[(a, 6), (b, 5)]);
        assert_eq!(state.first_to_reach(5), Some(a));
        assert_eq!(state.first_to_reach(7), None);
    }

    #[test]
    fn unknown_participant_scores_zero() {
        let state = MatchState::default();
        assert_eq!(state.score_of(Uuid::new_v4()), 0);
    }
}
