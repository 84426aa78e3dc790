use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

use crate::security::canonical::canonical_json;

type HmacSha256 = Hmac<Sha256>;

/// Computes the hex-encoded HMAC-SHA256 signature over the canonical form of `payload`.
pub fn sign_payload(key: &str, payload: &Value) -> String {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(canonical_json(payload).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a hex-encoded signature in constant time. Malformed hex is just an invalid signature.
pub fn verify_payload(key: &str, payload: &Value, signature: &str) -> bool {
    let sig_bytes = match hex::decode(signature.trim()) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let mut mac = match HmacSha256::new_from_slice(key.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(canonical_json(payload).as_bytes());
    mac.verify_slice(&sig_bytes).is_ok()
}
