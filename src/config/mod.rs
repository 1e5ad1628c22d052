//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::game::MatchDefaults;
use crate::util::time::SIMULATION_TPS;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// HS256 secret for player session tokens
    pub jwt_secret: String,

    /// Public base URL for callbacks
    pub public_base_url: String,
    /// Allowed client origin for CORS
    pub client_origin: String,

    /// Defaults every match configuration starts from
    pub match_defaults: MatchDefaults,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let match_defaults = MatchDefaults {
            match_duration: Duration::from_secs(parse_or("MATCH_DURATION_SECS", 300)?),
            score_to_win: parse_or("SCORE_TO_WIN", 5)?,
            countdown: Duration::from_secs(parse_or("COUNTDOWN_SECS", 3)?),
            spawn_points: parse_or("SPAWN_POINTS", 4)?,
            max_target_points: parse_or("MAX_TARGET_POINTS", 10)?,
            tick_rate: SIMULATION_TPS,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            jwt_secret: env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?,

            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            client_origin: env::var("CLIENT_ORIGIN")
                .map_err(|_| ConfigError::Missing("CLIENT_ORIGIN"))?,

            match_defaults,
        })
    }
}

/// Parse an optional numeric variable, falling back to `default` when unset
fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
