//! Agent configuration
//!
//! Sources, later ones overriding earlier ones:
//! 1. the bundled `config/axs.json`
//! 2. the file named by `AXS_CONFIG`, if set
//! 3. `AXS_*` environment variables, `__` separating nested keys
//!    (e.g. `AXS_PROVIDER__ADDRESS`)
//!
//! The vault passphrase only comes from `VAULT_PASS`.
//!
//! Keys are case-insensitive and lowercased on load, including the keys of
//! `registration.source`.

use crate::actuation::ExecutorConfig;
use crate::gateway::GatewayConfig;
use crate::vault::Passphrase;
use anyhow::{anyhow, bail, Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// Environment variable naming an override configuration file
pub const CONFIG_PATH_ENV: &str = "AXS_CONFIG";

/// Environment variable holding the vault passphrase
pub const PASSPHRASE_ENV: &str = "VAULT_PASS";

const ENV_PREFIX: &str = "AXS";
const BUNDLED_CONFIG: &str = include_str!("../config/axs.json");

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    /// Default log directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    pub provider: ProviderConfig,

    #[serde(default)]
    pub vault: VaultConfig,

    #[serde(default)]
    pub executor: ExecutorSettings,

    #[serde(default)]
    pub registration: RegistrationConfig,

    /// Passphrase protecting the vault, from `VAULT_PASS`
    #[serde(skip)]
    pub vault_passphrase: Passphrase,
}

/// Connection to the remote device-provider service
#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    pub provider_id: Uuid,

    pub address: String,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,

    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Upper bound for handing one outbound frame to the socket
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VaultConfig {
    /// Directory holding one `<uuid>.vault` file per secret
    #[serde(default = "default_vault_directory")]
    pub directory: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExecutorSettings {
    #[serde(default = "default_max_concurrent_actuations")]
    pub max_concurrent_actuations: usize,

    #[serde(default = "default_actuation_timeout_ms")]
    pub actuation_timeout_ms: u64,
}

/// Static description used when claiming devices
#[derive(Debug, Deserialize, Clone)]
pub struct RegistrationConfig {
    #[serde(default = "default_actuators")]
    pub actuators: Vec<String>,

    #[serde(default)]
    pub source: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_reconnect_delay_ms() -> u64 {
    1_000
}

fn default_max_reconnect_delay_ms() -> u64 {
    30_000
}

fn default_heartbeat_interval_ms() -> u64 {
    5_000
}

fn default_send_timeout_ms() -> u64 {
    10_000
}

fn default_vault_directory() -> String {
    "./vault".to_string()
}

fn default_max_concurrent_actuations() -> usize {
    64
}

fn default_actuation_timeout_ms() -> u64 {
    30_000
}

fn default_actuators() -> Vec<String> {
    vec!["actuator1".to_string()]
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            directory: default_vault_directory(),
        }
    }
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            max_concurrent_actuations: default_max_concurrent_actuations(),
            actuation_timeout_ms: default_actuation_timeout_ms(),
        }
    }
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            actuators: default_actuators(),
            source: HashMap::new(),
        }
    }
}

impl AgentConfig {
    /// Load from the bundled document, `AXS_CONFIG`, `AXS_*` and `VAULT_PASS`
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).ok();
        let passphrase = std::env::var(PASSPHRASE_ENV).ok();
        Self::from_sources(path.as_deref(), passphrase)
    }

    /// Load with an explicit override file and passphrase
    pub fn from_sources(path: Option<&str>, passphrase: Option<String>) -> Result<Self> {
        let mut builder =
            Config::builder().add_source(File::from_str(BUNDLED_CONFIG, FileFormat::Json));

        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        let mut config: AgentConfig = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Couldn't load the configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        let passphrase = passphrase
            .filter(|p| !p.is_empty())
            .ok_or_else(|| anyhow!("{} is not set", PASSPHRASE_ENV))?;
        config.vault_passphrase = Passphrase::new(passphrase);

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.provider.address.is_empty() {
            bail!("provider.address must not be empty");
        }
        if self.provider.heartbeat_interval_ms == 0 {
            bail!("provider.heartbeat_interval_ms must be positive");
        }
        if self.provider.send_timeout_ms == 0 {
            bail!("provider.send_timeout_ms must be positive");
        }
        if self.provider.reconnect_delay_ms == 0 {
            bail!("provider.reconnect_delay_ms must be positive");
        }
        if self.executor.max_concurrent_actuations == 0 {
            bail!("executor.max_concurrent_actuations must be positive");
        }
        if self.executor.actuation_timeout_ms == 0 {
            bail!("executor.actuation_timeout_ms must be positive");
        }
        Ok(())
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            provider_id: self.provider.provider_id,
            address: self.provider.address.clone(),
            connect_timeout: Duration::from_millis(self.provider.connect_timeout_ms),
            reconnect_delay: Duration::from_millis(self.provider.reconnect_delay_ms),
            max_reconnect_delay: Duration::from_millis(
                self.provider
                    .max_reconnect_delay_ms
                    .max(self.provider.reconnect_delay_ms),
            ),
            heartbeat_interval: Duration::from_millis(self.provider.heartbeat_interval_ms),
            send_timeout: Duration::from_millis(self.provider.send_timeout_ms),
        }
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            max_concurrent_actuations: self.executor.max_concurrent_actuations,
            actuation_timeout: Duration::from_millis(self.executor.actuation_timeout_ms),
        }
    }
}
