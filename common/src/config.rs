// common/src/config.rs
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use config::{Config as ConfigFile, File, Environment};

use crate::auth::DEFAULT_VALID_BLOCK_AGE;
use crate::chain::RpcConfig;
use crate::delegation::guest_holder_account_id;
use crate::error::Result;
use crate::polling::PollConfig;
use crate::utils::parse_near_amount;

/// Central configuration for the backend and the client
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub web_server_addr: String,
    pub log_level: String,

    pub near: NearConfig,
    pub contract_methods: ContractMethods,
    pub auth: AuthConfig,
    pub keys: KeysConfig,
    pub client: ClientConfig,
    pub deposit: PollConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NearConfig {
    pub network_id: String,
    pub node_url: String,
    pub wallet_url: String,
    /// Contract account, also the account the backend signs for
    pub contract_name: String,
    /// Root of `<network>/<account>.json` credential files
    pub credentials_dir: String,
    pub gas: u64,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContractMethods {
    pub change_methods: Vec<String>,
    pub view_methods: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Blocks a signed height stays valid for
    pub valid_block_age: u64,
    /// Serve /add-key, /delete-access-keys and /add-guest without a signature
    pub open_key_endpoints: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeysConfig {
    /// Fee allowance of issued keys in NEAR ("0.1")
    pub allowance: String,
    /// Account holding guest keys, `guests.<contract>` when unset
    #[serde(default)]
    pub guest_account_id: Option<String>,
    /// Methods guest keys may call, the contract's change methods when empty
    #[serde(default)]
    pub guest_methods: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    pub backend_url: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Directory of the client's local key-value store
    pub storage_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            web_server_addr: "127.0.0.1:3000".to_string(),
            log_level: "info".to_string(),

            near: NearConfig {
                network_id: "testnet".to_string(),
                node_url: "https://rpc.testnet.near.org".to_string(),
                wallet_url: "https://wallet.testnet.near.org".to_string(),
                contract_name: "contract.testnet".to_string(),
                credentials_dir: "~/.near-credentials".to_string(),
                gas: 200_000_000_000_000,
                timeout_secs: 30,
                connect_timeout_secs: 10,
            },
            contract_methods: ContractMethods {
                change_methods: vec!["new".to_string(), "deposit".to_string(), "withdraw".to_string()],
                view_methods: vec!["get_balance".to_string()],
            },
            auth: AuthConfig {
                valid_block_age: DEFAULT_VALID_BLOCK_AGE,
                open_key_endpoints: true,
            },
            keys: KeysConfig {
                allowance: "0.1".to_string(),
                guest_account_id: None,
                guest_methods: Vec::new(),
            },
            client: ClientConfig {
                backend_url: "http://localhost:3000".to_string(),
                timeout_secs: 30,
                connect_timeout_secs: 10,
                storage_dir: "./.local-keys".to_string(),
            },
            deposit: PollConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> std::result::Result<Self, config::ConfigError> {
        // Get the run mode, defaulting to "development"
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        // Locate the config directory
        let config_dir = env::var("CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                // Check if we're in the project root or a subcrate
                let mut path = PathBuf::from("./config");
                if !path.exists() {
                    path = PathBuf::from("../config");
                }
                path
            });

        tracing::info!("Loading configuration from {}", config_dir.display());
        tracing::info!("Using run mode: {}", run_mode);

        let config = ConfigFile::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", run_mode))).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // APP__NEAR__CONTRACT_NAME=... overrides near.contract_name
            .add_source(Environment::with_prefix("APP").separator("__"))
            .set_override_option("log_level", env::var("LOG_LEVEL").ok())?
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load from files, falling back to plain environment variables and defaults
    pub fn from_env() -> Self {
        match Self::load() {
            Ok(config) => {
                tracing::info!("Configuration loaded from files and environment");
                config
            },
            Err(e) => {
                tracing::warn!("Failed to load configuration from files: {}", e);
                tracing::info!("Falling back to environment variables only");

                let mut config = Self::default();

                if let Ok(addr) = env::var("WEB_SERVER_ADDR") {
                    config.web_server_addr = addr;
                }
                if let Ok(level) = env::var("LOG_LEVEL") {
                    config.log_level = level;
                }
                if let Ok(network_id) = env::var("NEAR_NETWORK_ID") {
                    config.near.network_id = network_id;
                }
                if let Ok(node_url) = env::var("NEAR_NODE_URL") {
                    config.near.node_url = node_url;
                }
                if let Ok(contract_name) = env::var("CONTRACT_NAME") {
                    config.near.contract_name = contract_name;
                }
                if let Ok(dir) = env::var("NEAR_CREDENTIALS_DIR") {
                    config.near.credentials_dir = dir;
                }
                if let Some(age) = env::var("VALID_BLOCK_AGE").ok().and_then(|v| v.parse().ok()) {
                    config.auth.valid_block_age = age;
                }
                config.auth.open_key_endpoints = env::var("OPEN_KEY_ENDPOINTS")
                    .map(|v| v.to_lowercase() == "true")
                    .unwrap_or(true);
                if let Ok(backend_url) = env::var("BACKEND_URL") {
                    config.client.backend_url = backend_url;
                }

                config
            }
        }
    }

    /// Account guest keys are added to
    pub fn guest_account_id(&self) -> String {
        self.keys
            .guest_account_id
            .clone()
            .unwrap_or_else(|| guest_holder_account_id(&self.near.contract_name))
    }

    pub fn guest_methods(&self) -> Vec<String> {
        if self.keys.guest_methods.is_empty() {
            self.contract_methods.change_methods.clone()
        } else {
            self.keys.guest_methods.clone()
        }
    }

    /// Allowance of issued keys in yocto
    pub fn allowance(&self) -> Result<u128> {
        parse_near_amount(&self.keys.allowance)
    }

    /// Credentials directory with a leading `~` expanded
    pub fn credentials_dir(&self) -> PathBuf {
        match self.near.credentials_dir.strip_prefix("~/") {
            Some(rest) => env::var("HOME")
                .map(|home| PathBuf::from(home).join(rest))
                .unwrap_or_else(|_| PathBuf::from(&self.near.credentials_dir)),
            None => PathBuf::from(&self.near.credentials_dir),
        }
    }

    pub fn rpc_config(&self) -> RpcConfig {
        RpcConfig {
            node_url: self.near.node_url.clone(),
            timeout: Duration::from_secs(self.near.timeout_secs),
            connect_timeout: Duration::from_secs(self.near.connect_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::tracing_level;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.auth.valid_block_age, 100);
        assert!(config.auth.open_key_endpoints);
        assert_eq!(config.allowance().unwrap(), 10u128.pow(23));
        assert_eq!(config.deposit.max_attempts, 60);
        assert_eq!(config.deposit.interval_ms, 2000);
    }

    #[test]
    fn test_guest_account_defaults_to_contract_sub_account() {
        let mut config = Config::default();
        config.near.contract_name = "token.test".to_string();
        assert_eq!(config.guest_account_id(), "guests.token.test");
        assert_eq!(config.guest_methods(), config.contract_methods.change_methods);

        config.keys.guest_account_id = Some("holder.test".to_string());
        config.keys.guest_methods = vec!["mint".to_string()];
        assert_eq!(config.guest_account_id(), "holder.test");
        assert_eq!(config.guest_methods(), vec!["mint".to_string()]);
    }

    #[test]
    fn test_default_toml_matches_defaults() {
        let config: Config = ConfigFile::builder()
            .add_source(File::from_str(
                include_str!("../../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        let defaults = Config::default();
        assert_eq!(config.auth.valid_block_age, defaults.auth.valid_block_age);
        assert_eq!(config.near.gas, defaults.near.gas);
        assert_eq!(config.contract_methods.change_methods, defaults.contract_methods.change_methods);
        assert_eq!(config.log_level, defaults.log_level);
    }

    #[test]
    fn test_log_level_sets_tracing_level() {
        let mut config = Config::default();
        assert_eq!(tracing_level(&config.log_level), tracing::Level::INFO);

        config.log_level = "debug".to_string();
        assert_eq!(tracing_level(&config.log_level), tracing::Level::DEBUG);

        config.log_level = "chatty".to_string();
        assert_eq!(tracing_level(&config.log_level), tracing::Level::INFO);
    }
}
