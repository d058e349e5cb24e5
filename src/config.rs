use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use thiserror::Error;

/// Payment windows a shopper may be given to complete a payment (seconds).
pub const PAYMENT_WINDOWS: [u64; 5] = [300, 600, 900, 1800, 3600];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config yaml: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    pub ledger: LedgerRpcConfig,
    pub wallet: WalletConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    pub trigger: TriggerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub urls: UrlTemplates,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

/// Connection settings for the ledger node's JSON-RPC port
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LedgerRpcConfig {
    #[serde(default = "default_rpc_host")]
    pub rpc_host: String,
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,
    #[serde(default = "default_true")]
    pub use_tls: bool,
    #[serde(default)]
    pub rpc_user: String,
    #[serde(default)]
    pub rpc_pass: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_rpc_host() -> String {
    "s1.ripple.com".to_string()
}

fn default_rpc_port() -> u16 {
    51234
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for LedgerRpcConfig {
    fn default() -> Self {
        Self {
            rpc_host: default_rpc_host(),
            rpc_port: default_rpc_port(),
            use_tls: true,
            rpc_user: String::new(),
            rpc_pass: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LedgerRpcConfig {
    /// Node URL, e.g. `https://s1.ripple.com:51234/`
    pub fn endpoint(&self) -> String {
        let scheme = if self.use_tls { "https" } else { "http" };
        format!("{}://{}:{}/", scheme, self.rpc_host, self.rpc_port)
    }

    /// Basic auth credentials, only when both user and password are set
    pub fn credentials(&self) -> Option<(String, String)> {
        if self.rpc_user.is_empty() || self.rpc_pass.is_empty() {
            None
        } else {
            Some((self.rpc_user.clone(), self.rpc_pass.clone()))
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WalletConfig {
    /// Account that receives shopper payments
    pub address: String,
    /// Contact name suggested to the shopper's wallet
    #[serde(default)]
    pub display_name: String,
    #[serde(default = "default_expiration_secs")]
    pub expiration_secs: u64,
}

fn default_expiration_secs() -> u64 {
    3600
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReconcileConfig {
    pub interval_secs: u64,
    pub pending_window_days: i64,
    pub overlap: i64,
    /// `account_tx` pages read per pass
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}

fn default_max_pages() -> usize {
    20
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            pending_window_days: 7,
            overlap: 10,
            max_pages: default_max_pages(),
        }
    }
}

impl ReconcileConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn pending_window(&self) -> chrono::Duration {
        chrono::Duration::days(self.pending_window_days)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TriggerConfig {
    /// Shared secret for the on-demand reconcile endpoint
    pub cron_secret: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StorageConfig {
    /// In-memory stores are used when absent
    #[serde(default)]
    pub postgres_url: Option<String>,
}

/// Shop page URLs handed to the shopper's wallet. `{order_id}` is substituted.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct UrlTemplates {
    #[serde(default)]
    pub info_url: String,
    #[serde(default)]
    pub return_url: String,
    #[serde(default)]
    pub abort_url: String,
}

impl UrlTemplates {
    pub fn render(template: &str, order_id: i64) -> String {
        template.replace("{order_id}", &order_id.to_string())
    }
}

impl AppConfig {
    /// Load `config/{env}.yaml`
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig =
            serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wallet.address.trim().is_empty() {
            return Err(ConfigError::Invalid("wallet.address is empty".into()));
        }
        if !PAYMENT_WINDOWS.contains(&self.wallet.expiration_secs) {
            return Err(ConfigError::Invalid(format!(
                "wallet.expiration_secs must be one of {:?}, got {}",
                PAYMENT_WINDOWS, self.wallet.expiration_secs
            )));
        }
        if self.trigger.cron_secret.is_empty() {
            return Err(ConfigError::Invalid("trigger.cron_secret is empty".into()));
        }
        if self.reconcile.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "reconcile.interval_secs must be positive".into(),
            ));
        }
        if self.reconcile.max_pages == 0 {
            return Err(ConfigError::Invalid(
                "reconcile.max_pages must be positive".into(),
            ));
        }
        if self.reconcile.overlap < 0 || self.reconcile.pending_window_days <= 0 {
            return Err(ConfigError::Invalid(
                "reconcile.overlap must be >= 0 and pending_window_days > 0".into(),
            ));
        }
        Ok(())
    }
}
