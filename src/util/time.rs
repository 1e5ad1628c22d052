//! Time utilities for match simulation

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Tick rate configuration
pub const SIMULATION_TPS: u32 = 30; // 30 ticks per second
pub const SNAPSHOT_TPS: u32 = 10; // match state replication rate

/// Wall-clock length of one tick at the given rate
pub fn tick_duration(tick_rate: u32) -> Duration {
    Duration::from_micros(1_000_000 / tick_rate.max(1) as u64)
}

/// Number of whole ticks needed to cover `duration`, rounded up
pub fn ticks_for(duration: Duration, tick_rate: u32) -> u64 {
    let scaled = duration.as_micros() * tick_rate as u128;
    scaled.div_ceil(1_000_000) as u64
}

/// Wall-clock span covered by `ticks` ticks at the given rate
pub fn ticks_to_duration(ticks: u64, tick_rate: u32) -> Duration {
    Duration::from_micros(ticks.saturating_mul(1_000_000) / tick_rate.max(1) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_round_up() {
        assert_eq!(ticks_for(Duration::from_secs(3), 30), 90);
        assert_eq!(ticks_for(Duration::from_millis(10), 30), 1);
        assert_eq!(ticks_for(Duration::ZERO, 30), 0);
    }

    #[test]
    fn ticks_convert_back_to_duration() {
        assert_eq!(ticks_to_duration(90, 30), Duration::from_secs(3));
        assert_eq!(ticks_to_duration(15, 30), Duration::from_millis(500));
    }

    #[test]
    fn tick_duration_for_default_rate() {
        assert_eq!(tick_duration(SIMULATION_TPS), Duration::from_micros(33_333));
    }
}
