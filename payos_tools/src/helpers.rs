use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub fn hmac_sha256_hex(key: &str, message: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Builds the PayOS request signature: fields are sorted by key and joined as
/// `key1=value1&key2=value2`, then HMAC-SHA256'd with the checksum key.
pub fn sign_request_fields(checksum_key: &str, fields: &[(&str, String)]) -> String {
    let mut fields = fields.to_vec();
    fields.sort_by(|a, b| a.0.cmp(b.0));
    let message = fields.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<String>>().join("&");
    hmac_sha256_hex(checksum_key, &message)
}

/// Verifies the signature on a webhook delivery. The signature covers the compact JSON
/// serialization of the `data` object with keys in lexicographic order.
pub fn verify_webhook_signature(checksum_key: &str, data: &Value, signature: &str) -> bool {
    let message = data.to_string();
    let mut mac = match HmacSha256::new_from_slice(checksum_key.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(message.as_bytes());
    let sig_bytes = match hex::decode(signature.trim()) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    mac.verify_slice(&sig_bytes).is_ok()
}
