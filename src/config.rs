//! Engine configuration, layered from a file and `ENGINE_`-prefixed
//! environment variables. See `spec.md` §6 ("Configuration keys").

use anyhow::Result;
use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub base_url: String,
    pub api_key: String,
    pub request_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub rate_limit_mode: String,
    pub max_concurrent_requests: usize,
    pub tenant_sub_domain: String,
    pub tenant_local_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    pub sync_enabled: bool,
    pub session_idle_ttl_s: u64,
    pub message_trail_cap: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    pub restaurant_lat: f64,
    pub restaurant_lng: f64,
    pub tax_rate: Decimal,
    pub size_multipliers: FxHashMap<String, Decimal>,
    pub extras_price_table: FxHashMap<String, Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub metrics_enabled: bool,
    pub metrics_path: String,
}

/// Top-level settings for the engine binary. Every section falls back
/// to its own `Default` impl when absent from the file or environment,
/// so a partially-specified override layer still deserializes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_server")]
    pub server: ServerConfig,
    #[serde(default = "default_remote")]
    pub remote: RemoteConfig,
    #[serde(default = "default_conversation")]
    pub conversation: ConversationConfig,
    #[serde(default = "default_pricing")]
    pub pricing: PricingConfig,
    #[serde(default = "default_monitoring")]
    pub monitoring: MonitoringConfig,
}

fn default_server() -> ServerConfig {
    Settings::default().server
}

fn default_remote() -> RemoteConfig {
    Settings::default().remote
}

fn default_conversation() -> ConversationConfig {
    Settings::default().conversation
}

fn default_pricing() -> PricingConfig {
    Settings::default().pricing
}

fn default_monitoring() -> MonitoringConfig {
    Settings::default().monitoring
}

impl Default for Settings {
    fn default() -> Self {
        let mut size_multipliers = FxHashMap::default();
        size_multipliers.insert("small".to_string(), Decimal::from_str("0.8").unwrap());
        size_multipliers.insert("medium".to_string(), Decimal::from_str("1.0").unwrap());
        size_multipliers.insert("large".to_string(), Decimal::from_str("1.3").unwrap());
        size_multipliers.insert("xlarge".to_string(), Decimal::from_str("1.5").unwrap());

        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            remote: RemoteConfig {
                base_url: "https://api.example-backend.invalid".to_string(),
                api_key: String::new(),
                request_timeout_ms: 10_000,
                max_retries: 3,
                retry_delay_ms: 1_000,
                rate_limit_mode: "exp".to_string(),
                max_concurrent_requests: 10,
                tenant_sub_domain: String::new(),
                tenant_local_id: String::new(),
            },
            conversation: ConversationConfig {
                sync_enabled: true,
                session_idle_ttl_s: 1_800,
                message_trail_cap: 20,
            },
            pricing: PricingConfig {
                restaurant_lat: 0.0,
                restaurant_lng: 0.0,
                tax_rate: Decimal::ZERO,
                size_multipliers,
                extras_price_table: FxHashMap::default(),
            },
            monitoring: MonitoringConfig {
                metrics_enabled: true,
                metrics_path: "/metrics".to_string(),
            },
        }
    }
}

impl Settings {
    /// Loads settings from `path` (if it exists) layered under
    /// `ENGINE_`-prefixed environment variable overrides, e.g.
    /// `ENGINE_REMOTE__API_KEY`.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("ENGINE").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    #[must_use]
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.remote.request_timeout_ms)
    }

    #[must_use]
    pub fn session_idle_ttl(&self) -> Duration {
        Duration::from_secs(self.conversation.session_idle_ttl_s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_size_multipliers_match_spec() {
        let settings = Settings::default();
        assert_eq!(
            settings.pricing.size_multipliers["large"],
            Decimal::from_str("1.3").unwrap()
        );
    }

    #[test]
    fn server_address_combines_host_and_port() {
        let settings = Settings::default();
        assert_eq!(settings.server_address(), "0.0.0.0:8080");
    }
}
