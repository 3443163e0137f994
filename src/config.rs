//! Typed, layered client configuration. Construct via [`Config::builder`]
//! for programmatic callers, or deserialize from TOML for host applications
//! that keep settings in a file — every field carries a
//! `#[serde(default = "...")]` so a caller's file only needs to override
//! what differs from the primary-chain defaults.

use serde::{Deserialize, Serialize};

use crate::signer::{SignatureType, PRIMARY_CHAIN_ID};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default = "default_exchange_address")]
    pub exchange_address: String,
    #[serde(default = "default_clob_base")]
    pub clob_base: String,
    #[serde(default = "default_gamma_base")]
    pub gamma_base: String,
    #[serde(default = "default_data_api_base")]
    pub data_api_base: String,
    #[serde(default = "default_ws_base")]
    pub ws_base: String,
    #[serde(default)]
    pub use_server_time: bool,
    #[serde(default = "default_signature_type")]
    pub default_signature_type: SignatureType,
    #[serde(default)]
    pub auth_nonce: u64,
    #[serde(default)]
    pub funder: Option<String>,
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            exchange_address: default_exchange_address(),
            clob_base: default_clob_base(),
            gamma_base: default_gamma_base(),
            data_api_base: default_data_api_base(),
            ws_base: default_ws_base(),
            use_server_time: false,
            default_signature_type: default_signature_type(),
            auth_nonce: 0,
            funder: None,
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            reconnect: ReconnectConfig::default(),
            user_agent: default_user_agent(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

fn default_chain_id() -> u64 {
    PRIMARY_CHAIN_ID
}

fn default_exchange_address() -> String {
    "0x4bFb41d5B3570DeFd03C39a9A4D8dE6Bd8B8982E".to_string()
}

fn default_clob_base() -> String {
    "https://clob.polymarket.com".to_string()
}

fn default_gamma_base() -> String {
    "https://gamma-api.polymarket.com".to_string()
}

fn default_data_api_base() -> String {
    "https://data-api.polymarket.com".to_string()
}

fn default_ws_base() -> String {
    "wss://ws-subscriptions-clob.polymarket.com".to_string()
}

fn default_signature_type() -> SignatureType {
    SignatureType::Eoa
}

fn default_heartbeat_interval_ms() -> u64 {
    10_000
}

fn default_user_agent() -> String {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_reconnect_enabled")]
    pub enabled: bool,
    #[serde(default = "default_reconnect_max_attempts")]
    pub max_attempts: i64,
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: default_reconnect_enabled(),
            max_attempts: default_reconnect_max_attempts(),
            base_delay_ms: default_reconnect_base_delay_ms(),
            max_delay_ms: default_reconnect_max_delay_ms(),
        }
    }
}

fn default_reconnect_enabled() -> bool {
    true
}

fn default_reconnect_max_attempts() -> i64 {
    5
}

fn default_reconnect_base_delay_ms() -> u64 {
    2_000
}

fn default_reconnect_max_delay_ms() -> u64 {
    30_000
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    inner: Config,
}

macro_rules! setter {
    ($name:ident, $field:ident, $ty:ty) => {
        pub fn $name(mut self, v: $ty) -> Self {
            self.inner.$field = v;
            self
        }
    };
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            inner: Config::default(),
        }
    }

    setter!(chain_id, chain_id, u64);
    setter!(exchange_address, exchange_address, String);
    setter!(clob_base, clob_base, String);
    setter!(gamma_base, gamma_base, String);
    setter!(data_api_base, data_api_base, String);
    setter!(ws_base, ws_base, String);
    setter!(use_server_time, use_server_time, bool);
    setter!(default_signature_type, default_signature_type, SignatureType);
    setter!(auth_nonce, auth_nonce, u64);
    setter!(heartbeat_interval_ms, heartbeat_interval_ms, u64);
    setter!(reconnect, reconnect, ReconnectConfig);
    setter!(user_agent, user_agent, String);
    setter!(request_timeout_ms, request_timeout_ms, u64);

    pub fn funder(mut self, funder: impl Into<String>) -> Self {
        self.inner.funder = Some(funder.into());
        self
    }

    pub fn build(self) -> Config {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_primary_chain() {
        let cfg = Config::default();
        assert_eq!(cfg.chain_id, PRIMARY_CHAIN_ID);
        assert!(cfg.reconnect.enabled);
    }

    #[test]
    fn default_round_trips_through_toml() {
        let cfg = Config::default();
        let toml_str = toml::to_string(&cfg).unwrap();
        let back: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(back.chain_id, cfg.chain_id);
        assert_eq!(back.clob_base, cfg.clob_base);
        assert_eq!(back.reconnect.max_attempts, cfg.reconnect.max_attempts);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: Config = toml::from_str("chain_id = 80002\n").unwrap();
        assert_eq!(cfg.chain_id, 80002);
        assert_eq!(cfg.clob_base, default_clob_base());
        assert!(cfg.reconnect.enabled);
    }

    #[test]
    fn builder_overrides_defaults() {
        let cfg = Config::builder().chain_id(80002).auth_nonce(5).build();
        assert_eq!(cfg.chain_id, 80002);
        assert_eq!(cfg.auth_nonce, 5);
    }
}
