use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use once_cell::sync::Lazy;
use rand::seq::IndexedRandom;
use reqwest::Client;
use serde_json::{Value, json};
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::VersionedTransaction;
use solana_system_interface::instruction as system_instruction;
use tracing::{debug, warn};

use crate::monitoring::events;
use crate::rpc::{BlockhashSnapshot, ConfirmationStatus, SendOptions, SignatureStatus};
use crate::tx::serialize_transaction;

use super::cycle::{CycleRequest, LandingCycle, RelayWatch};
use super::error::LanderError;
use super::poller::CommitmentTarget;
use super::stack::LanderReceipt;

static TIP_WALLETS: Lazy<Vec<Pubkey>> = Lazy::new(|| {
    [
        "ADuUkR4vqLUMWXxW9gh6D6L8pMSawimctcNZ5pGwDcEt",
        "DfXygSm4jCyNCybVYYK6DwvWqjKee8pbDmJGcLWNDXjh",
        "DttWaMuVvTiduZRnguLF7jNxTgiMBZ1hyAumKUiL2KRL",
        "HFqU5x63VTqvQss8hp11i4wVV8bD44PvwucfZ2bU7gRe",
        "3AVi9Tg9Uo68tJfuvoKvqKNWKkC5wPdSSdeBnizKZ6jT",
        "Cw8CFyM9FkoMi7K7Crf6HNQqf4uEMzpKw6QNghXLvLkY",
        "96gYZGLnJYVFmbjzopPSU6QiEV5fGqZNyN9nmNhvrZU5",
        "ADaUMid9yfUytqMBgopwjb2DTLSokTSzL1zt6iGPaS49",
    ]
    .iter()
    .filter_map(|value| Pubkey::from_str(value).ok())
    .collect()
});

pub(crate) const JSONRPC_VERSION: &str = "2.0";

/// 中继 tip：从配置的账户（未配置时用内置列表）随机选一个收款方。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TipPolicy {
    pub lamports: u64,
    pub accounts: Vec<Pubkey>,
}

impl TipPolicy {
    pub fn new(lamports: u64, accounts: Vec<Pubkey>) -> Self {
        Self { lamports, accounts }
    }

    pub fn draw_recipient(&self) -> Option<Pubkey> {
        let pool: &[Pubkey] = if self.accounts.is_empty() {
            TIP_WALLETS.as_slice()
        } else {
            &self.accounts
        };
        let mut rng = rand::rng();
        pool.choose(&mut rng).copied()
    }

    /// `lamports` 为零时不生成 tip。
    pub fn instruction(&self, payer: &Pubkey) -> Option<Instruction> {
        if self.lamports == 0 {
            return None;
        }
        let recipient = self.draw_recipient()?;
        Some(system_instruction::transfer(payer, &recipient, self.lamports))
    }
}

/// 中继对 bundle 的状态报告。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BundleStatus {
    pub slot: u64,
    pub confirmation_status: Option<ConfirmationStatus>,
    pub err: Option<String>,
    pub transactions: Vec<String>,
}

impl BundleStatus {
    pub fn into_signature_status(self) -> SignatureStatus {
        SignatureStatus {
            slot: self.slot,
            confirmations: None,
            confirmation_status: Some(
                self.confirmation_status
                    .unwrap_or(ConfirmationStatus::Processed),
            ),
            err: self.err,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayAcceptance {
    pub endpoint: String,
    pub bundle_id: String,
}

/// 第三方加速器（bundle 中继）的能力。
#[async_trait]
pub trait BundleRelay: Send + Sync {
    fn endpoints(&self) -> Vec<String>;

    /// `transactions` 为 base64 编码的已签名交易。
    async fn send_bundle(&self, transactions: &[String]) -> Result<RelayAcceptance, LanderError>;

    async fn bundle_status(&self, bundle_id: &str) -> Result<Option<BundleStatus>, LanderError>;
}

pub(crate) fn build_jsonrpc_payload(method: &str, params: Vec<Value>) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": 1,
        "method": method,
        "params": params,
    })
}

pub(crate) fn encode_transaction(tx: &VersionedTransaction) -> Result<String, LanderError> {
    let bytes = serialize_transaction(tx)?;
    Ok(BASE64_STANDARD.encode(bytes))
}

/// Jito block engine 的 JSON-RPC 客户端，按配置顺序尝试各个端点。
#[derive(Clone)]
pub struct JitoRelay {
    endpoints: Vec<String>,
    client: Client,
}

impl JitoRelay {
    pub fn new(endpoints: Vec<String>, client: Client) -> Self {
        Self { endpoints, client }
    }

    async fn call(&self, endpoint: &str, payload: &Value) -> Result<Value, LanderError> {
        let response = self
            .client
            .post(endpoint)
            .json(payload)
            .send()
            .await
            .map_err(LanderError::Network)?;

        if !response.status().is_success() {
            return Err(LanderError::fatal(format!(
                "relay 返回非成功状态: {}",
                response.status()
            )));
        }

        let value: Value = response.json().await.map_err(LanderError::Network)?;
        if let Some(error) = value.get("error") {
            return Err(LanderError::fatal(format!("relay 返回错误: {error}")));
        }
        Ok(value.get("result").cloned().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl BundleRelay for JitoRelay {
    fn endpoints(&self) -> Vec<String> {
        self.endpoints.clone()
    }

    async fn send_bundle(&self, transactions: &[String]) -> Result<RelayAcceptance, LanderError> {
        let bundle = Value::Array(transactions.iter().cloned().map(Value::String).collect());
        let payload =
            build_jsonrpc_payload("sendBundle", vec![bundle, json!({ "encoding": "base64" })]);

        let mut last_err = None;
        for endpoint in &self.endpoints {
            if endpoint.trim().is_empty() {
                continue;
            }
            match self.call(endpoint, &payload).await {
                Ok(result) => match result.as_str() {
                    Some(bundle_id) => {
                        return Ok(RelayAcceptance {
                            endpoint: endpoint.clone(),
                            bundle_id: bundle_id.to_string(),
                        });
                    }
                    None => {
                        warn!(
                            target: "lander::relay",
                            endpoint,
                            result = %result,
                            "sendBundle result missing bundle id"
                        );
                        last_err = Some(LanderError::fatal("sendBundle 未返回 bundle id"));
                    }
                },
                Err(err) => {
                    warn!(
                        target: "lander::relay",
                        endpoint,
                        error = %err,
                        "bundle submission failed"
                    );
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| LanderError::fatal("no relay endpoints configured")))
    }

    async fn bundle_status(&self, bundle_id: &str) -> Result<Option<BundleStatus>, LanderError> {
        let payload = build_jsonrpc_payload("getBundleStatuses", vec![json!([bundle_id])]);

        let mut last_err = None;
        for endpoint in &self.endpoints {
            if endpoint.trim().is_empty() {
                continue;
            }
            match self.call(endpoint, &payload).await {
                Ok(result) => return parse_bundle_statuses(&result),
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or_else(|| LanderError::fatal("no relay endpoints configured")))
    }
}

pub(crate) fn parse_bundle_statuses(result: &Value) -> Result<Option<BundleStatus>, LanderError> {
    let Some(entry) = result
        .get("value")
        .and_then(Value::as_array)
        .and_then(|values| values.first())
    else {
        return Ok(None);
    };
    if entry.is_null() {
        return Ok(None);
    }

    let slot = entry.get("slot").and_then(Value::as_u64).unwrap_or_default();
    let confirmation_status = match entry.get("confirmation_status") {
        Some(Value::Null) | None => None,
        Some(value) => Some(serde_json::from_value::<ConfirmationStatus>(value.clone())?),
    };
    // Jito 以 {"Ok": null} 表示成功
    let err = match entry.get("err") {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) if map.contains_key("Ok") => None,
        Some(other) => Some(other.to_string()),
    };
    let transactions = entry
        .get("transactions")
        .and_then(Value::as_array)
        .map(|txs| {
            txs.iter()
                .filter_map(|tx| tx.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    Ok(Some(BundleStatus {
        slot,
        confirmation_status,
        err,
        transactions,
    }))
}

/// 先把交易作为 bundle 提交给中继，再走标准重发循环，同时轮询 bundle 状态。
#[derive(Clone)]
pub struct RelayLander {
    cycle: LandingCycle,
    relay: Arc<dyn BundleRelay>,
    tip: TipPolicy,
    precheck: bool,
}

impl RelayLander {
    pub(crate) fn new(
        cycle: LandingCycle,
        relay: Arc<dyn BundleRelay>,
        tip: TipPolicy,
        precheck: bool,
    ) -> Self {
        Self {
            cycle,
            relay,
            tip,
            precheck,
        }
    }

    pub fn tip(&self) -> &TipPolicy {
        &self.tip
    }

    pub fn endpoints(&self) -> Vec<String> {
        self.relay.endpoints()
    }

    pub async fn land(
        &self,
        transaction: &VersionedTransaction,
        snapshot: &BlockhashSnapshot,
        target: CommitmentTarget,
    ) -> Result<LanderReceipt, LanderError> {
        if self.precheck {
            self.cycle.precheck("relay", transaction, snapshot).await?;
        }

        let encoded = encode_transaction(transaction)?;
        let bundle_id = match self.relay.send_bundle(&[encoded]).await {
            Ok(acceptance) => {
                if let Some(signature) = transaction.signatures.first() {
                    events::relay_bundle_accepted(
                        &acceptance.endpoint,
                        &acceptance.bundle_id,
                        signature,
                    );
                }
                Some(acceptance.bundle_id)
            }
            Err(err) => {
                events::relay_bundle_rejected(&self.relay.endpoints().join(","), &err.to_string());
                None
            }
        };
        debug!(
            target: "lander::relay",
            bundle_id = bundle_id.as_deref().unwrap_or_default(),
            "falling back to resend loop"
        );

        self.cycle
            .run(CycleRequest {
                lander: "relay",
                transaction,
                snapshot,
                target,
                options: SendOptions {
                    skip_preflight: true,
                    max_retries: Some(0),
                    preflight_commitment: None,
                    min_context_slot: Some(snapshot.min_context_slot()),
                },
                resend: true,
                relay: Some(RelayWatch {
                    relay: self.relay.clone(),
                    bundle_id,
                }),
            })
            .await
    }
}
