use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use url::Url;

use crate::lander::{CommitmentTarget, LandingTiming};
use crate::rpc::ConfirmationStatus;

use super::loader::ConfigError;

#[derive(Debug, Clone, Deserialize)]
pub struct LanderConfig {
    #[serde(default = "super::default_rpc_url")]
    pub rpc_url: String,
    /// 可选的独立发送端点；状态查询与区块高度仍走 `rpc_url`。
    #[serde(default)]
    pub send_rpc_url: Option<String>,
    /// blockhash / 区块高度 / 模拟读取使用的 commitment。
    #[serde(default = "super::default_commitment")]
    pub commitment: ConfirmationStatus,
    /// 未显式指定时 `submit` 等待的确认级别。
    #[serde(default = "super::default_target")]
    pub target: CommitmentTarget,
    #[serde(default = "super::default_mode")]
    pub mode: BroadcastMode,
    #[serde(default)]
    pub spam: SpamConfig,
    #[serde(default)]
    pub single_shot: SingleShotConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub compute_budget: ComputeBudgetConfig,
    #[serde(default)]
    pub lookup_tables: Vec<String>,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

impl Default for LanderConfig {
    fn default() -> Self {
        Self {
            rpc_url: super::default_rpc_url(),
            send_rpc_url: None,
            commitment: super::default_commitment(),
            target: super::default_target(),
            mode: super::default_mode(),
            spam: SpamConfig::default(),
            single_shot: SingleShotConfig::default(),
            relay: RelayConfig::default(),
            compute_budget: ComputeBudgetConfig::default(),
            lookup_tables: Vec::new(),
            wallet: WalletConfig::default(),
            logging: LoggingConfig::default(),
            prometheus: PrometheusConfig::default(),
        }
    }
}

impl LanderConfig {
    pub fn lookup_table_keys(&self) -> Result<Vec<Pubkey>, ConfigError> {
        parse_pubkeys("lookup_tables", &self.lookup_tables)
    }

    /// 加载后校验端点与地址，尽早暴露配置错误。
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_url("rpc_url", &self.rpc_url)?;
        if let Some(url) = self.send_rpc_url.as_deref().filter(|url| !url.trim().is_empty()) {
            parse_url("send_rpc_url", url)?;
        }
        for endpoint in self.relay.endpoint_list() {
            parse_url("relay.endpoints", &endpoint)?;
        }
        self.lookup_table_keys()?;
        self.relay.tip_account_keys()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastMode {
    SingleShot,
    Spam,
    Relay,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpamConfig {
    #[serde(default = "super::default_resend_interval_ms")]
    pub resend_interval_ms: u64,
    #[serde(default = "super::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "super::default_poll_attempts")]
    pub poll_attempts: usize,
    #[serde(default = "super::default_true")]
    pub precheck: bool,
}

impl Default for SpamConfig {
    fn default() -> Self {
        Self {
            resend_interval_ms: super::default_resend_interval_ms(),
            poll_interval_ms: super::default_poll_interval_ms(),
            poll_attempts: super::default_poll_attempts(),
            precheck: true,
        }
    }
}

impl SpamConfig {
    pub fn timing(&self) -> LandingTiming {
        LandingTiming {
            resend_interval: Duration::from_millis(self.resend_interval_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            poll_attempts: self.poll_attempts.max(1),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SingleShotConfig {
    #[serde(default)]
    pub max_retries: Option<usize>,
    #[serde(default)]
    pub skip_preflight: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(default)]
    pub tip_lamports: u64,
    #[serde(default)]
    pub tip_accounts: Vec<String>,
    #[serde(default = "super::default_http_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            tip_lamports: 0,
            tip_accounts: Vec::new(),
            timeout_ms: super::default_http_timeout_ms(),
        }
    }
}

impl RelayConfig {
    pub fn tip_account_keys(&self) -> Result<Vec<Pubkey>, ConfigError> {
        parse_pubkeys("relay.tip_accounts", &self.tip_accounts)
    }

    pub fn endpoint_list(&self) -> Vec<String> {
        self.endpoints
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComputeBudgetConfig {
    #[serde(default)]
    pub unit_limit: u32,
    #[serde(default)]
    pub unit_price_micro_lamports: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WalletConfig {
    #[serde(default)]
    pub private_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "super::default_logging_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: super::default_logging_level(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrometheusConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "super::default_prometheus_listen")]
    pub listen: String,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            enable: false,
            listen: super::default_prometheus_listen(),
        }
    }
}

fn parse_url(field: &str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value.trim())
        .map_err(|err| ConfigError::Invalid(format!("{field} 中的地址 {value} 非法: {err}")))
}

fn parse_pubkeys(field: &str, values: &[String]) -> Result<Vec<Pubkey>, ConfigError> {
    values
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            Pubkey::from_str(s)
                .map_err(|err| ConfigError::Invalid(format!("{field} 中的地址 {s} 非法: {err}")))
        })
        .collect()
}
