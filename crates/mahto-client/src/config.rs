//! Client configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the client starts with zero
//! configuration.

use std::time::Duration;

use mahto_shared::constants::{
    DEFAULT_DIRECTORY_LIMIT, DEFAULT_LOOKUP_TIMEOUT_MS, DEFAULT_PROFILE_CACHE_CAPACITY,
    DEFAULT_PROFILE_FANOUT, DEFAULT_SEND_TIMEOUT_MS,
};

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bounded wait for user-initiated writes (send, start conversation).
    /// Env: `MAHTO_SEND_TIMEOUT_MS`
    /// Default: 8000
    pub send_timeout: Duration,

    /// Bounded wait for point reads (property detail, owner profile).
    /// Env: `MAHTO_LOOKUP_TIMEOUT_MS`
    /// Default: 8000
    pub lookup_timeout: Duration,

    /// Capacity of the counterpart-profile cache in the directory.
    /// Env: `MAHTO_PROFILE_CACHE_CAPACITY`
    /// Default: 64
    pub profile_cache_capacity: usize,

    /// Bound on concurrent counterpart-profile fetches per emission.
    /// Env: `MAHTO_PROFILE_FANOUT`
    /// Default: 8
    pub profile_fanout: usize,

    /// Cap on the number of conversations the directory loads.
    /// Env: `MAHTO_DIRECTORY_LIMIT`
    /// Default: 200
    pub directory_limit: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_millis(DEFAULT_SEND_TIMEOUT_MS),
            lookup_timeout: Duration::from_millis(DEFAULT_LOOKUP_TIMEOUT_MS),
            profile_cache_capacity: DEFAULT_PROFILE_CACHE_CAPACITY,
            profile_fanout: DEFAULT_PROFILE_FANOUT,
            directory_limit: DEFAULT_DIRECTORY_LIMIT,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults. Invalid values warn and keep the default.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(ms) = read_u64("MAHTO_SEND_TIMEOUT_MS") {
            config.send_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = read_u64("MAHTO_LOOKUP_TIMEOUT_MS") {
            config.lookup_timeout = Duration::from_millis(ms);
        }
        if let Some(n) = read_usize("MAHTO_PROFILE_CACHE_CAPACITY") {
            config.profile_cache_capacity = n;
        }
        if let Some(n) = read_usize("MAHTO_PROFILE_FANOUT") {
            // A zero bound would stall enrichment entirely.
            if n == 0 {
                tracing::warn!("MAHTO_PROFILE_FANOUT must be positive, using default");
            } else {
                config.profile_fanout = n;
            }
        }
        if let Some(n) = read_usize("MAHTO_DIRECTORY_LIMIT") {
            config.directory_limit = n;
        }

        config
    }
}

fn read_u64(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.parse::<u64>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "invalid value, using default");
            None
        }
    }
}

fn read_usize(name: &str) -> Option<usize> {
    let raw = std::env::var(name).ok()?;
    match raw.parse::<usize>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "invalid value, using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.send_timeout, Duration::from_millis(8_000));
        assert_eq!(config.profile_cache_capacity, 64);
        assert_eq!(config.profile_fanout, 8);
        assert_eq!(config.directory_limit, 200);
    }
}
