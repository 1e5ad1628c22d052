//! Tick-denominated timers

use std::time::Duration;

use crate::util::time::{ticks_for, ticks_to_duration};

/// A deadline measured in simulation ticks.
///
/// A default timer is unset: it never expires and has no remaining time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickTimer {
    target: Option<u64>,
}

impl TickTimer {
    /// Timer that expires `duration` after tick `now`
    pub fn from_duration(now: u64, duration: Duration, tick_rate: u32) -> Self {
        Self {
            target: Some(now + ticks_for(duration, tick_rate)),
        }
    }

    pub fn target(&self) -> Option<u64> {
        self.target
    }

    /// True once `now` has reached the deadline
    pub fn expired(&self, now: u64) -> bool {
        self.target.is_some_and(|target| now >= target)
    }

    /// Ticks left before expiry, `None` for an unset timer
    pub fn remaining_ticks(&self, now: u64) -> Option<u64> {
        self.target.map(|target| target.saturating_sub(now))
    }

    /// Wall-clock time left before expiry, zero when unset or expired
    pub fn remaining(&self, now: u64, tick_rate: u32) -> Duration {
        self.remaining_ticks(now)
            .map(|ticks| ticks_to_duration(ticks, tick_rate))
            .unwrap_or(Duration::ZERO)
    }
}

impl From<Option<u64>> for TickTimer {
    fn from(target: Option<u64>) -> Self {
        Self { target }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_at_target_tick() {
        let timer = TickTimer::from_duration(10, Duration::from_secs(3), 30);
        assert_eq!(timer.target(), Some(100));
        assert!(!timer.expired(99));
        assert!(timer.expired(100));
        assert!(timer.expired(250));
    }

    #[test]
    fn unset_timer_never_expires() {
        let timer = TickTimer::default();
        assert!(!timer.expired(u64::MAX));
        assert_eq!(timer.remaining(5, 30), Duration::ZERO);
        assert_eq!(timer.remaining_ticks(5), None);
    }

    #[test]
    fn remaining_saturates_after_expiry() {
        let timer = TickTimer::from(Some(60));
        assert_eq!(timer.remaining(30, 30), Duration::from_secs(1));
        assert_eq!(timer.remaining(90, 30), Duration::ZERO);
    }
}
