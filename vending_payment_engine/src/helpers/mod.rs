//! Small helpers shared between the security layer and the tooling around it.

use rand::RngCore;

/// Generates a hex-encoded random nonce of `n_bytes` bytes (so `2 * n_bytes` characters).
pub fn generate_nonce(n_bytes: usize) -> String {
    let mut bytes = vec![0u8; n_bytes];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// The current Unix timestamp in seconds.
pub fn unix_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}
