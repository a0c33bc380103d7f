//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::util::time::DEFAULT_TICK_INTERVAL_MS;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Simulation tick period in milliseconds
    pub tick_interval_ms: u64,
    /// Capacity of each player's outbound message queue
    pub outbound_queue_capacity: usize,
    /// Consecutive dropped frames before a player is disconnected
    pub max_dropped_frames: u32,
    /// Upper bound on the roster size a handshake may request
    pub max_players_per_match: usize,
    /// How long a match may wait for its roster before it is closed
    pub waiting_timeout_secs: u64,
    /// How long a new connection has to send its handshake
    pub handshake_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 6006)),
            log_level: "info".to_string(),
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            outbound_queue_capacity: 100,
            max_dropped_frames: 120,
            max_players_per_match: 16,
            waiting_timeout_secs: 300,
            handshake_timeout_secs: 10,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        // PORT wins over SERVER_ADDR, as on most hosting platforms
        let server_addr = match (lookup("PORT"), lookup("SERVER_ADDR")) {
            (Some(port), _) => format!("0.0.0.0:{}", port),
            (None, Some(addr)) => addr,
            (None, None) => defaults.server_addr.to_string(),
        };

        let config = Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress(server_addr.clone()))?,

            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),

            tick_interval_ms: parse_or(&lookup, "TICK_INTERVAL_MS", defaults.tick_interval_ms)?,
            outbound_queue_capacity: parse_or(
                &lookup,
                "OUTBOUND_QUEUE_CAPACITY",
                defaults.outbound_queue_capacity,
            )?,
            max_dropped_frames: parse_or(&lookup, "MAX_DROPPED_FRAMES", defaults.max_dropped_frames)?,
            max_players_per_match: parse_or(
                &lookup,
                "MAX_PLAYERS_PER_MATCH",
                defaults.max_players_per_match,
            )?,
            waiting_timeout_secs: parse_or(
                &lookup,
                "WAITING_TIMEOUT_SECS",
                defaults.waiting_timeout_secs,
            )?,
            handshake_timeout_secs: parse_or(
                &lookup,
                "HANDSHAKE_TIMEOUT_SECS",
                defaults.handshake_timeout_secs,
            )?,
        };

        if config.tick_interval_ms == 0 {
            return Err(ConfigError::OutOfRange("TICK_INTERVAL_MS"));
        }
        if config.outbound_queue_capacity == 0 {
            return Err(ConfigError::OutOfRange("OUTBOUND_QUEUE_CAPACITY"));
        }
        if config.max_players_per_match == 0 {
            return Err(ConfigError::OutOfRange("MAX_PLAYERS_PER_MATCH"));
        }

        Ok(config)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidNumber(key)),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server address: {0}")]
    InvalidAddress(String),

    #[error("Environment variable {0} is not a valid number")]
    InvalidNumber(&'static str),

    #[error("Environment variable {0} must be greater than zero")]
    OutOfRange(&'static str),
}
