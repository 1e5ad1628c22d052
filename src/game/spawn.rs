//! Spawn slot assignment for each round

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Spawn slot handed to a participant at countdown start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnAssignment {
    pub participant: Uuid,
    pub slot: usize,
}

/// Deterministic spawn planner, seeded per match
#[derive(Debug, Clone)]
pub struct SpawnPlanner {
    seed: u64,
    slots: usize,
}

impl SpawnPlanner {
    pub fn new(seed: u64, slots: usize) -> Self {
        Self {
            seed,
            slots: slots.max(1),
        }
    }

    /// Assign slots for `round`; distinct while slots last, then reused in order
    pub fn assign(&self, round: u32, participants: &[Uuid]) -> Vec<SpawnAssignment> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed ^ ((round as u64) << 32));
        let mut order: Vec<usize> = (0..self.slots).collect();
        order.shuffle(&mut rng);

        participants
            .iter()
            .enumerate()
            .map(|(i, &participant)| SpawnAssignment {
                participant,
                slot: order[i % order.len()],
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_and_round_are_deterministic() {
        let ids: Vec<Uuid> = (0..2).map(|_| Uuid::new_v4()).collect();
        let planner = SpawnPlanner::new(42, 4);
        assert_eq!(planner.assign(1, &ids), planner.assign(1, &ids));
    }

    #[test]
    fn slots_are_distinct_while_available() {
        let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let planner = SpawnPlanner::new(7, 4);
        let mut slots: Vec<usize> = planner.assign(3, &ids).iter().map(|a| a.slot).collect();
        slots.sort_unstable();
        assert_eq!(slots, vec![0, 1, 2, 3]);
    }

    #[test]
    fn slots_wrap_when_oversubscribed() {
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let assignments = SpawnPlanner::new(1, 2).assign(1, &ids);
        assert_eq!(assignments[2].slot, assignments[0].slot);
    }
}
