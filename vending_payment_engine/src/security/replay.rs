use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

use thiserror::Error;

/// Allowed clock drift between a machine and the server.
pub const DEFAULT_TIMESTAMP_TOLERANCE_SECS: i64 = 30;
/// How long a nonce stays on the deny list. Must comfortably exceed twice the timestamp
/// tolerance, otherwise a replay could slip in after the nonce is forgotten.
pub const DEFAULT_NONCE_TTL: Duration = Duration::from_secs(120);
/// Nonces shorter than this are rejected outright.
pub const MIN_NONCE_LEN: usize = 32;

#[derive(Debug, Clone, Copy)]
pub struct ReplayConfig {
    pub timestamp_tolerance_secs: i64,
    pub nonce_ttl: Duration,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self { timestamp_tolerance_secs: DEFAULT_TIMESTAMP_TOLERANCE_SECS, nonce_ttl: DEFAULT_NONCE_TTL }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReplayError {
    #[error("Timestamp too old (diff={0}s)")]
    StaleTimestamp(i64),
    #[error("Timestamp in future (diff={0}s)")]
    FutureTimestamp(i64),
    #[error("Nonce too short (min {MIN_NONCE_LEN} chars)")]
    WeakNonce,
    #[error("Nonce already used (replay detected)")]
    NonceReused,
}

/// Tracks recently seen nonces per machine and validates request timestamps.
///
/// The nonce set is checked and updated under a single lock, so two concurrent requests with the
/// same nonce cannot both pass. Expired entries are dropped lazily on each check; an entry is
/// never dropped before its TTL has elapsed.
pub struct ReplayGuard {
    config: ReplayConfig,
    seen: Mutex<HashMap<(i64, String), Instant>>,
}

impl Default for ReplayGuard {
    fn default() -> Self {
        Self::new(ReplayConfig::default())
    }
}

impl ReplayGuard {
    pub fn new(config: ReplayConfig) -> Self {
        Self { config, seen: Mutex::new(HashMap::new()) }
    }

    /// Rejects timestamps outside the configured drift window.
    pub fn check_timestamp(&self, timestamp: i64) -> Result<(), ReplayError> {
        let now = chrono::Utc::now().timestamp();
        let diff = now - timestamp;
        if diff.abs() > self.config.timestamp_tolerance_secs {
            if diff > 0 {
                Err(ReplayError::StaleTimestamp(diff))
            } else {
                Err(ReplayError::FutureTimestamp(diff))
            }
        } else {
            Ok(())
        }
    }

    /// Atomically records the nonce for the machine, failing if it has been seen within the TTL.
    pub fn check_and_store_nonce(&self, machine_id: i64, nonce: &str) -> Result<(), ReplayError> {
        if nonce.len() < MIN_NONCE_LEN {
            return Err(ReplayError::WeakNonce);
        }
        let now = Instant::now();
        let ttl = self.config.nonce_ttl;
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        seen.retain(|_, stored| now.duration_since(*stored) < ttl);
        let key = (machine_id, nonce.to_string());
        if seen.contains_key(&key) {
            return Err(ReplayError::NonceReused);
        }
        seen.insert(key, now);
        Ok(())
    }

    /// Number of nonces currently on the deny list.
    pub fn tracked_nonces(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
