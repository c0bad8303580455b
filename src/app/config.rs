// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::data_path::resolve_data_path;
use crate::domain::constants;
use crate::domain::error::EngineError;
use alloy::primitives::Address;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct GlobalSettings {
    // General
    #[serde(default = "default_debug")]
    pub debug: bool,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default = "default_log_json")]
    pub log_json: bool,

    // Identity
    pub wallet_key: String,
    pub wallet_address: Address,

    // Roles. Both default to the wallet when unset.
    pub admin_address: Option<Address>,
    pub pool_address: Option<Address>,

    // Providers
    pub http_providers: Option<HashMap<String, String>>,

    // Portfolio wiring
    pub base_token: Option<Address>,
    #[serde(default = "default_base_symbol")]
    pub base_symbol: String,
    #[serde(default = "default_base_decimals")]
    pub base_decimals: u8,
    pub bridge_token: Option<Address>,
    pub router_address: Option<Address>,
    pub tokenlist_path: Option<String>,
    pub data_dir: Option<String>,

    // Initial target portfolio, applied at startup when present.
    #[serde(default)]
    pub allocations: Vec<AllocationEntry>,

    // Tuning
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
    #[serde(default = "default_oracle_staleness_secs")]
    pub oracle_staleness_secs: u64,
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    #[serde(default = "default_quote_retry_attempts")]
    pub quote_retry_attempts: u32,
}

/// One initial allocation line in the config file. The token may be a
/// tokenlist symbol or a hex address.
#[derive(Debug, Deserialize, Clone)]
pub struct AllocationEntry {
    pub token: String,
    pub weight_bps: u64,
}

// Defaults
fn default_debug() -> bool {
    false
}
fn default_chain_id() -> u64 {
    constants::CHAIN_ETHEREUM
}
fn default_log_json() -> bool {
    false
}
fn default_base_symbol() -> String {
    "USDC".to_string()
}
fn default_base_decimals() -> u8 {
    6
}
fn default_metrics_port() -> u16 {
    9100
}
fn default_oracle_staleness_secs() -> u64 {
    constants::ORACLE_STALENESS_SECS
}
fn default_call_timeout_secs() -> u64 {
    constants::EXTERNAL_CALL_TIMEOUT_SECS
}
fn default_quote_retry_attempts() -> u32 {
    constants::QUOTE_RETRY_ATTEMPTS
}

impl GlobalSettings {
    pub fn load_with_path(path: Option<&str>) -> Result<Self, EngineError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let selected_config = resolve_config_path(path);
        let mut builder = Config::builder();

        if let Some(ref selected_path) = selected_config {
            builder = builder.add_source(File::from(Path::new(selected_path)).required(true));
        } else {
            builder = builder.add_source(File::with_name("config").required(false));
        }
        // Deterministic precedence: CLI (in main) > env/.env > selected profile file.
        builder = builder.add_source(Environment::default());

        let settings: GlobalSettings = builder.build()?.try_deserialize()?;

        if settings.wallet_key.is_empty() {
            return Err(EngineError::Config("WALLET_KEY is missing".to_string()));
        }

        Ok(settings)
    }

    pub fn load() -> Result<Self, EngineError> {
        Self::load_with_path(None)
    }

    /// RPC URL for the configured chain, config map first, then env
    /// conventions `http_provider_<id>` and `http_provider`.
    pub fn get_http_provider(&self, chain_id: u64) -> Result<String, EngineError> {
        if let Some(urls) = &self.http_providers
            && let Some(url) = urls.get(&chain_id.to_string())
        {
            return Ok(url.clone());
        }

        let candidates = [
            format!("http_provider_{}", chain_id),
            "http_provider".to_string(),
        ];
        for key in candidates {
            if let Ok(v) = std::env::var(&key) {
                let trimmed = v.trim();
                if !trimmed.is_empty() {
                    return Ok(trimmed.to_string());
                }
            }
        }

        Err(EngineError::Config(format!(
            "No RPC URL found for chain {}",
            chain_id
        )))
    }

    pub fn admin(&self) -> Address {
        self.admin_address.unwrap_or(self.wallet_address)
    }

    pub fn pool(&self) -> Address {
        self.pool_address.unwrap_or(self.wallet_address)
    }

    pub fn base_token_value(&self) -> Address {
        self.base_token.unwrap_or(match self.chain_id {
            constants::CHAIN_OPTIMISM => constants::USDC_OPTIMISM,
            constants::CHAIN_ARBITRUM => constants::USDC_ARBITRUM,
            constants::CHAIN_POLYGON => constants::USDC_POLYGON,
            _ => constants::USDC_MAINNET,
        })
    }

    pub fn bridge_token_value(&self) -> Address {
        self.bridge_token
            .unwrap_or_else(|| constants::wrapped_native_for_chain(self.chain_id))
    }

    pub fn router_address_value(&self) -> Address {
        self.router_address
            .unwrap_or_else(|| constants::default_router_for_chain(self.chain_id))
    }

    pub fn tokenlist_path_value(&self) -> Option<String> {
        let raw = std::env::var("TOKENLIST_PATH")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(|| {
                self.tokenlist_path
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(ToString::to_string)
            })?;
        Some(resolve_data_path(&raw).to_string_lossy().to_string())
    }

    pub fn oracle_staleness(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.oracle_staleness_secs.max(60))
    }

    pub fn call_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.call_timeout_secs.clamp(2, 60))
    }

    pub fn quote_retry_attempts_value(&self) -> u32 {
        self.quote_retry_attempts.clamp(1, 10)
    }

    pub fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            constants::DEFAULT_LOG_LEVEL
        }
    }
}

fn resolve_config_path(path: Option<&str>) -> Option<String> {
    if let Some(path) = path {
        return Some(path.to_string());
    }
    detect_active_config_file()
}

fn detect_active_config_file() -> Option<String> {
    // Check common config.*.toml files first
    let priority_files = [
        "config.prod.toml",
        "config.dev.toml",
        "config.testnet.toml",
        "config.example.toml",
        "config.toml",
    ];

    for file in priority_files.iter() {
        if let Some(true) = config_has_active_flag(file) {
            return Some((*file).to_string());
        }
    }

    // Fallback: scan current dir for config.*.toml with THIS_ACTIVE = true
    if let Ok(entries) = fs::read_dir(".") {
        for entry in entries.flatten() {
            let path = entry.path();
            if let Some(name) = path.file_name().and_then(|n| n.to_str())
                && name.starts_with("config.")
                && name.ends_with(".toml")
                && let Some(true) = config_has_active_flag(name)
            {
                return Some(name.to_string());
            }
        }
    }

    None
}

fn config_has_active_flag(path: &str) -> Option<bool> {
    let p = Path::new(path);
    if !p.exists() {
        return None;
    }

    Config::builder()
        .add_source(File::from(p))
        .build()
        .ok()?
        .get_bool("THIS_ACTIVE")
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    fn env_lock_guard() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn base_settings() -> GlobalSettings {
        GlobalSettings {
            debug: default_debug(),
            chain_id: default_chain_id(),
            log_json: default_log_json(),
            wallet_key: "0x0".to_string(),
            wallet_address: Address::ZERO,
            admin_address: None,
            pool_address: None,
            http_providers: None,
            base_token: None,
            base_symbol: default_base_symbol(),
            base_decimals: default_base_decimals(),
            bridge_token: None,
            router_address: None,
            tokenlist_path: None,
            data_dir: None,
            allocations: Vec::new(),
            metrics_port: default_metrics_port(),
            oracle_staleness_secs: default_oracle_staleness_secs(),
            call_timeout_secs: default_call_timeout_secs(),
            quote_retry_attempts: default_quote_retry_attempts(),
        }
    }

    #[test]
    fn roles_default_to_the_wallet() {
        let mut settings = base_settings();
        settings.wallet_address = Address::repeat_byte(0xaa);
        assert_eq!(settings.admin(), settings.wallet_address);
        assert_eq!(settings.pool(), settings.wallet_address);

        settings.admin_address = Some(Address::repeat_byte(0xbb));
        assert_eq!(settings.admin(), Address::repeat_byte(0xbb));
        assert_eq!(settings.pool(), settings.wallet_address);
    }

    #[test]
    fn chain_defaults_pick_usdc_and_wrapped_native() {
        let mut settings = base_settings();
        settings.chain_id = constants::CHAIN_ARBITRUM;
        assert_eq!(settings.base_token_value(), constants::USDC_ARBITRUM);
        assert_eq!(settings.bridge_token_value(), constants::WETH_ARBITRUM);

        settings.chain_id = constants::CHAIN_BSC;
        assert_eq!(settings.base_token_value(), constants::USDC_MAINNET);
        assert_eq!(settings.bridge_token_value(), constants::WBNB_BSC);
    }

    #[test]
    fn tuning_values_have_safe_floors() {
        let mut settings = base_settings();
        settings.oracle_staleness_secs = 5;
        settings.call_timeout_secs = 0;
        settings.quote_retry_attempts = 0;
        assert_eq!(settings.oracle_staleness().as_secs(), 60);
        assert_eq!(settings.call_timeout().as_secs(), 2);
        assert_eq!(settings.quote_retry_attempts_value(), 1);
    }

    #[test]
    fn http_provider_prefers_configured_map() {
        let _env_lock = env_lock_guard();
        let old = std::env::var("http_provider_1").ok();
        unsafe { std::env::remove_var("http_provider_1") };

        let mut settings = base_settings();
        settings.http_providers = Some(HashMap::from([(
            "1".to_string(),
            "http://localhost:8545".to_string(),
        )]));
        assert_eq!(
            settings.get_http_provider(1).unwrap(),
            "http://localhost:8545"
        );

        if let Some(v) = old {
            unsafe { std::env::set_var("http_provider_1", v) };
        }
    }

    #[test]
    fn explicit_config_path_wins_over_active_discovery() {
        let resolved = resolve_config_path(Some("custom-config.toml"));
        assert_eq!(resolved.as_deref(), Some("custom-config.toml"));
    }

    #[test]
    fn env_overrides_selected_profile_file_values() {
        let _env_lock = env_lock_guard();
        let tmp = std::env::temp_dir().join(format!(
            "alloc-config-env-override-{}-{}.toml",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ));
        let body = r#"
wallet_key = "file_wallet_key"
wallet_address = "0x0000000000000000000000000000000000000001"
"#;
        std::fs::write(&tmp, body).expect("write temp config");
        let old_wallet_key = std::env::var("WALLET_KEY").ok();
        unsafe {
            std::env::set_var("WALLET_KEY", "env_wallet_key");
        }

        let loaded = GlobalSettings::load_with_path(Some(tmp.to_str().expect("utf8 path")))
            .expect("load settings");
        assert_eq!(loaded.wallet_key, "env_wallet_key");

        std::fs::remove_file(&tmp).ok();
        if let Some(v) = old_wallet_key {
            unsafe { std::env::set_var("WALLET_KEY", v) };
        } else {
            unsafe { std::env::remove_var("WALLET_KEY") };
        }
    }

    #[test]
    fn allocations_deserialize_from_profile_file() {
        let _env_lock = env_lock_guard();
        let tmp = std::env::temp_dir().join(format!(
            "alloc-config-allocations-{}-{}.toml",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ));
        let body = r#"
wallet_key = "file_wallet_key"
wallet_address = "0x0000000000000000000000000000000000000001"

[[allocations]]
token = "WETH"
weight_bps = 6000

[[allocations]]
token = "0x2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599"
weight_bps = 4000
"#;
        std::fs::write(&tmp, body).expect("write temp config");
        let old_wallet_key = std::env::var("WALLET_KEY").ok();
        unsafe { std::env::remove_var("WALLET_KEY") };

        let loaded = GlobalSettings::load_with_path(Some(tmp.to_str().expect("utf8 path")))
            .expect("load settings");
        assert_eq!(loaded.allocations.len(), 2);
        assert_eq!(loaded.allocations[0].token, "WETH");
        assert_eq!(loaded.allocations[1].weight_bps, 4000);

        std::fs::remove_file(&tmp).ok();
        if let Some(v) = old_wallet_key {
            unsafe { std::env::set_var("WALLET_KEY", v) };
        }
    }
}
