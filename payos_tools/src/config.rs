use log::*;
use vpg_common::Secret;

#[derive(Debug, Clone)]
pub struct PayOsConfig {
    pub client_id: String,
    pub api_key: Secret<String>,
    pub checksum_key: Secret<String>,
    pub api_url: String,
    /// Base URL of this deployment. Used to build absolute return/cancel URLs.
    pub domain: String,
}

impl Default for PayOsConfig {
    fn default() -> Self {
        Self {
            client_id: String::default(),
            api_key: Secret::default(),
            checksum_key: Secret::default(),
            api_url: "https://api-merchant.payos.vn/v2".to_string(),
            domain: "http://localhost:8480".to_string(),
        }
    }
}

impl PayOsConfig {
    pub fn new_from_env_or_default() -> Self {
        let client_id = std::env::var("VPG_PAYOS_CLIENT_ID").unwrap_or_else(|_| {
            warn!("VPG_PAYOS_CLIENT_ID not set, using (probably useless) default");
            "00000000-0000-0000-0000-000000000000".to_string()
        });
        let api_key = Secret::new(std::env::var("VPG_PAYOS_API_KEY").unwrap_or_else(|_| {
            warn!("VPG_PAYOS_API_KEY not set, using (probably useless) default");
            "00000000000000".to_string()
        }));
        let checksum_key = Secret::new(std::env::var("VPG_PAYOS_CHECKSUM_KEY").unwrap_or_else(|_| {
            warn!("VPG_PAYOS_CHECKSUM_KEY not set, using (probably useless) default");
            "00000000000000".to_string()
        }));
        let api_url =
            std::env::var("VPG_PAYOS_API_URL").unwrap_or_else(|_| "https://api-merchant.payos.vn/v2".to_string());
        let domain = std::env::var("VPG_DOMAIN").unwrap_or_else(|_| {
            warn!("VPG_DOMAIN not set, using http://localhost:8480 as default");
            "http://localhost:8480".to_string()
        });
        Self { client_id, api_key, checksum_key, api_url, domain }
    }

    /// Turns a path into an absolute URL on this deployment. Absolute URLs are passed through.
    pub fn absolute_url(&self, path_or_url: &str) -> String {
        if path_or_url.starts_with("http") {
            path_or_url.to_string()
        } else {
            format!("{}{path_or_url}", self.domain.trim_end_matches('/'))
        }
    }
}
