//! Match state replication cadence

use crate::ws::protocol::ServerMsg;

use super::coordinator::MatchCoordinator;

/// Builds replicated state messages for network transmission
pub struct SnapshotBuilder {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (used for phase changes)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    /// Build a snapshot of the coordinator's state at tick `now`
    pub fn build(&self, coordinator: &MatchCoordinator, now: u64) -> ServerMsg {
        ServerMsg::MatchState {
            state: coordinator.state().clone(),
            remaining_ms: coordinator.remaining_time(now).as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sends_on_interval_and_when_forced() {
        let mut builder = SnapshotBuilder::new(3);
        assert!(!builder.should_send());
        assert!(!builder.should_send());
        assert!(builder.should_send());

        builder.force_next();
        assert!(builder.should_send());
        assert!(!builder.should_send());
    }
}
