//! Server configuration, read from the environment with sensible defaults.

use std::time::Duration;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Period of the matchmaking pairing pass.
    pub match_tick: Duration,
    /// Period of the idle session sweep.
    pub reap_tick: Duration,
    /// How long a session may sit without an action before it is reaped.
    pub idle_timeout: Duration,
    /// Cards dealt to each participant at session creation.
    pub hand_size: usize,
    /// Attempts to finalize a battle record before giving up.
    pub finalize_retries: u32,
    /// Initial backoff between finalization attempts; doubles per attempt.
    pub finalize_backoff: Duration,
    /// Seed for the in-memory store's card dealing.
    pub store_seed: u64,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("LANECLASH_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: read_u16("LANECLASH_PORT", 4000),
            match_tick: read_ms("LANECLASH_MATCH_TICK_MS", 5_000),
            reap_tick: read_ms("LANECLASH_REAP_TICK_MS", 30_000),
            idle_timeout: read_ms("LANECLASH_IDLE_TIMEOUT_MS", 300_000),
            hand_size: read_usize("LANECLASH_HAND_SIZE", 5),
            finalize_retries: read_u32("LANECLASH_FINALIZE_RETRIES", 5),
            finalize_backoff: read_ms("LANECLASH_FINALIZE_BACKOFF_MS", 500),
            store_seed: read_u64("LANECLASH_STORE_SEED", 42),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
            match_tick: Duration::from_millis(5_000),
            reap_tick: Duration::from_millis(30_000),
            idle_timeout: Duration::from_millis(300_000),
            hand_size: 5,
            finalize_retries: 5,
            finalize_backoff: Duration::from_millis(500),
            store_seed: 42,
        }
    }
}

fn read_ms(key: &str, fallback: u64) -> Duration {
    Duration::from_millis(read_u64(key, fallback))
}

fn read_u16(key: &str, fallback: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u16>().ok())
        .unwrap_or(fallback)
}

fn read_u32(key: &str, fallback: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .unwrap_or(fallback)
}

fn read_u64(key: &str, fallback: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or(fallback)
}

fn read_usize(key: &str, fallback: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(fallback)
}
