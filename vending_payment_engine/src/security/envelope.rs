use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    helpers::{generate_nonce, unix_timestamp},
    security::hmac_signature::sign_payload,
};

/// The wire format for every secured machine request:
///
/// ```json
/// {
///   "data": { ... actual payload ... },
///   "meta": { "machine_id": 7, "timestamp": 1705491082, "nonce": "...", "session_id": "..." },
///   "signature": "hmac_sha256_hex"
/// }
/// ```
///
/// The signature covers `data` plus the `timestamp` and `nonce` fields only, so the optional
/// meta fields can be added without re-signing firmware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecureEnvelope {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub meta: EnvelopeMeta,
    #[serde(default)]
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvelopeMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_id: Option<i64>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// The exact value the HMAC is computed over.
pub fn signing_payload(data: &Value, timestamp: i64, nonce: &str) -> Value {
    json!({
        "data": data,
        "meta": {
            "timestamp": timestamp,
            "nonce": nonce,
        }
    })
}

impl SecureEnvelope {
    /// Builds a fully signed envelope the way device firmware does. Used by the provisioning
    /// tooling and by tests.
    pub fn seal(machine_id: i64, data: Value, shared_secret: &str) -> Self {
        Self::seal_at(machine_id, data, shared_secret, unix_timestamp(), generate_nonce(16))
    }

    /// Like [`SecureEnvelope::seal`], but with explicit timestamp and nonce.
    pub fn seal_at(machine_id: i64, data: Value, shared_secret: &str, timestamp: i64, nonce: String) -> Self {
        let signature = sign_payload(shared_secret, &signing_payload(&data, timestamp, &nonce));
        Self {
            data: Some(data),
            meta: EnvelopeMeta { machine_id: Some(machine_id), timestamp: Some(timestamp), nonce: Some(nonce), session_id: None },
            signature: Some(signature),
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.meta.session_id = Some(session_id.into());
        self
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;
    use crate::security::hmac_signature::verify_payload;

    #[test]
    fn sealed_envelope_verifies() {
        let env = SecureEnvelope::seal(7, json!({"order_code": 555, "success": true}), "secret");
        let data = env.data.as_ref().unwrap();
        let payload = signing_payload(data, env.meta.timestamp.unwrap(), env.meta.nonce.as_ref().unwrap());
        assert!(verify_payload("secret", &payload, env.signature.as_ref().unwrap()));
        assert_eq!(env.meta.machine_id, Some(7));
    }

    #[test]
    fn envelope_parses_with_missing_parts() {
        let env: SecureEnvelope = serde_json::from_str(r#"{"data": {"x": 1}}"#).unwrap();
        assert!(env.signature.is_none());
        assert!(env.meta.timestamp.is_none());

        let env: SecureEnvelope = serde_json::from_str("{}").unwrap();
        assert!(env.data.is_none());
    }

    #[test]
    fn session_id_does_not_change_signature() {
        let plain = SecureEnvelope::seal_at(7, json!({"a": 1}), "secret", 1705491082, "ff".repeat(16));
        let with_session = plain.clone().with_session("sess-1");
        assert_eq!(plain.signature, with_session.signature);
    }
}
