use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::info;

use crate::config::{BroadcastMode, LanderConfig};
use crate::rpc::LedgerRpc;

use super::cycle::LandingCycle;
use super::error::LanderError;
use super::relay::{BundleRelay, JitoRelay, RelayLander, TipPolicy};
use super::rpc::RpcLander;
use super::spam::SpamLander;
use super::stack::LanderVariant;

#[derive(Clone)]
pub struct LanderFactory {
    rpc: Arc<dyn LedgerRpc>,
    send_rpc: Option<Arc<dyn LedgerRpc>>,
    http_client: Client,
}

impl LanderFactory {
    pub fn new(
        rpc: Arc<dyn LedgerRpc>,
        send_rpc: Option<Arc<dyn LedgerRpc>>,
        http_client: Client,
    ) -> Self {
        Self {
            rpc,
            send_rpc,
            http_client,
        }
    }

    /// 按 `mode` 构建唯一的广播策略；中继模式使用 Jito JSON-RPC 客户端。
    pub fn build(&self, config: &LanderConfig) -> Result<LanderVariant, LanderError> {
        let relay = match config.mode {
            BroadcastMode::Relay => {
                let endpoints = config.relay.endpoint_list();
                if endpoints.is_empty() {
                    return Err(LanderError::fatal("relay 模式缺少 relay.endpoints 配置"));
                }
                let client = if config.relay.timeout_ms > 0 {
                    Client::builder()
                        .timeout(Duration::from_millis(config.relay.timeout_ms))
                        .build()?
                } else {
                    self.http_client.clone()
                };
                Some(Arc::new(JitoRelay::new(endpoints, client)) as Arc<dyn BundleRelay>)
            }
            _ => None,
        };
        self.build_with_relay(config, relay)
    }

    pub fn build_with_relay(
        &self,
        config: &LanderConfig,
        relay: Option<Arc<dyn BundleRelay>>,
    ) -> Result<LanderVariant, LanderError> {
        let cycle = LandingCycle::new(
            self.rpc.clone(),
            self.send_rpc.clone(),
            config.commitment.commitment_config(),
            config.spam.timing(),
        );

        let variant = match config.mode {
            BroadcastMode::SingleShot => LanderVariant::Rpc(RpcLander::new(
                cycle,
                config.single_shot.skip_preflight,
                config.single_shot.max_retries,
                Some(config.commitment.commitment_config().commitment),
            )),
            BroadcastMode::Spam => LanderVariant::Spam(SpamLander::new(cycle, config.spam.precheck)),
            BroadcastMode::Relay => {
                let relay =
                    relay.ok_or_else(|| LanderError::fatal("relay 模式缺少中继客户端"))?;
                let tip_accounts = config
                    .relay
                    .tip_account_keys()
                    .map_err(LanderError::fatal)?;
                LanderVariant::Relay(RelayLander::new(
                    cycle,
                    relay,
                    TipPolicy::new(config.relay.tip_lamports, tip_accounts),
                    config.spam.precheck,
                ))
            }
        };

        info!(
            target: "lander::factory",
            lander = variant.name(),
            endpoints = ?variant.endpoints(),
            "lander configured"
        );
        Ok(variant)
    }
}
