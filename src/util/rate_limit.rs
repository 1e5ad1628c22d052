//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Max client messages per second on a WebSocket session
pub const MESSAGE_RATE_LIMIT: u32 = 30;

/// Max restart requests per second per player
pub const RESTART_RATE_LIMIT: u32 = 1;

/// Per-player rate limiter state
#[derive(Clone)]
pub struct PlayerRateLimiter {
    message_limiter: Arc<Limiter>,
    restart_limiter: Arc<Limiter>,
}

impl PlayerRateLimiter {
    pub fn new() -> Self {
        Self {
            message_limiter: create_limiter(MESSAGE_RATE_LIMIT),
            restart_limiter: create_limiter(RESTART_RATE_LIMIT),
        }
    }

    /// Check if a client message is allowed (returns true if allowed)
    pub fn check_message(&self) -> bool {
        self.message_limiter.check().is_ok()
    }

    /// Check if a restart request is allowed
    pub fn check_restart(&self) -> bool {
        self.restart_limiter.check().is_ok()
    }
}

impl Default for PlayerRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restart_requests_are_throttled() {
        let limiter = PlayerRateLimiter::new();
        assert!(limiter.check_restart());
        assert!(!limiter.check_restart());
        assert!(limiter.check_message());
    }
}
