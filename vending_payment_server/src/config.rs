use std::env;

use log::*;
use payos_tools::PayOsConfig;
use vending_payment_engine::security::ReplayConfig;
use vpg_common::parse_boolean_flag;

const DEFAULT_VPG_HOST: &str = "127.0.0.1";
const DEFAULT_VPG_PORT: u16 = 8480;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address,
    /// rather than the connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather
    /// than the connection's remote address.
    pub use_forwarded: bool,
    /// PayOS payment gateway configuration.
    pub payos: PayOsConfig,
    /// Timestamp tolerance and nonce retention for the IoT security gate.
    pub replay: ReplayConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_VPG_HOST.to_string(),
            port: DEFAULT_VPG_PORT,
            database_url: String::default(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            payos: PayOsConfig::default(),
            replay: ReplayConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("VPG_HOST").ok().unwrap_or_else(|| DEFAULT_VPG_HOST.into());
        let port = env::var("VPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for VPG_PORT. {e} Using the default, {DEFAULT_VPG_PORT}, instead."
                    );
                    DEFAULT_VPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_VPG_PORT);
        let database_url = env::var("VPG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ VPG_DATABASE_URL is not set. Please set it to the URL for the gateway database.");
            String::default()
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("VPG_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("VPG_USE_FORWARDED").ok(), false);
        let payos = PayOsConfig::new_from_env_or_default();
        let replay = configure_replay();
        Self { host, port, database_url, use_x_forwarded_for, use_forwarded, payos, replay }
    }
}

fn configure_replay() -> ReplayConfig {
    let mut config = ReplayConfig::default();
    if let Ok(s) = env::var("VPG_IOT_TIMESTAMP_TOLERANCE") {
        match s.parse::<i64>() {
            Ok(secs) => config.timestamp_tolerance_secs = secs,
            Err(e) => warn!("🪛️ Invalid configuration value for VPG_IOT_TIMESTAMP_TOLERANCE. {e}"),
        }
    }
    if let Ok(s) = env::var("VPG_IOT_NONCE_TTL") {
        match s.parse::<u64>() {
            Ok(secs) => config.nonce_ttl = std::time::Duration::from_secs(secs),
            Err(e) => warn!("🪛️ Invalid configuration value for VPG_IOT_NONCE_TTL. {e}"),
        }
    }
    config
}
