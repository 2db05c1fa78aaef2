use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use solana_account_decoder::UiAccount;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_client::rpc_request::{RpcError, RpcRequest, RpcResponseErrorData};
use solana_client::rpc_response::{Response as RpcResponse, RpcBlockhash};
use solana_commitment_config::CommitmentConfig;
use solana_sdk::account::Account;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use tracing::debug;

use crate::tx::serialize_transaction;

use super::error::{PreflightFailure, RpcFailure};
use super::{
    BlockhashSnapshot, ConfirmationStatus, LedgerRpc, SendOptions, SignatureStatus,
    SimulateOptions, SimulationReport,
};

/// `solana-client` 非阻塞 RpcClient 之上的 [`LedgerRpc`] 实现。
#[derive(Clone)]
pub struct SolanaRpc {
    client: Arc<RpcClient>,
}

impl SolanaRpc {
    pub fn new(client: Arc<RpcClient>) -> Self {
        Self { client }
    }

    pub fn from_url(url: impl Into<String>, commitment: CommitmentConfig) -> Self {
        Self::new(Arc::new(RpcClient::new_with_commitment(url.into(), commitment)))
    }

    pub fn client(&self) -> &Arc<RpcClient> {
        &self.client
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSignatureStatus {
    slot: u64,
    confirmations: Option<usize>,
    #[serde(default)]
    err: Option<Value>,
    #[serde(default)]
    confirmation_status: Option<ConfirmationStatus>,
}

impl From<RawSignatureStatus> for SignatureStatus {
    fn from(raw: RawSignatureStatus) -> Self {
        Self {
            slot: raw.slot,
            confirmations: raw.confirmations,
            confirmation_status: raw.confirmation_status,
            err: raw.err.filter(|value| !value.is_null()).map(|value| value.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSimulation {
    #[serde(default)]
    err: Option<Value>,
    #[serde(default)]
    logs: Option<Vec<String>>,
    #[serde(default)]
    accounts: Option<Vec<Option<UiAccount>>>,
    #[serde(default)]
    units_consumed: Option<u64>,
}

#[async_trait]
impl LedgerRpc for SolanaRpc {
    fn endpoint(&self) -> String {
        self.client.url()
    }

    async fn latest_blockhash(
        &self,
        commitment: CommitmentConfig,
    ) -> Result<BlockhashSnapshot, RpcFailure> {
        let response: RpcResponse<RpcBlockhash> = self
            .client
            .send(RpcRequest::GetLatestBlockhash, json!([commitment]))
            .await?;
        let blockhash = Hash::from_str(&response.value.blockhash)
            .map_err(|err| RpcFailure::malformed(format!("blockhash 非法: {err}")))?;
        Ok(BlockhashSnapshot {
            blockhash,
            last_valid_block_height: response.value.last_valid_block_height,
            context_slot: response.context.slot,
        })
    }

    async fn signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> Result<Vec<Option<SignatureStatus>>, RpcFailure> {
        let encoded: Vec<String> = signatures.iter().map(|sig| sig.to_string()).collect();
        let response: RpcResponse<Vec<Option<RawSignatureStatus>>> = self
            .client
            .send(
                RpcRequest::GetSignatureStatuses,
                json!([encoded, { "searchTransactionHistory": false }]),
            )
            .await?;
        Ok(response
            .value
            .into_iter()
            .map(|status| status.map(SignatureStatus::from))
            .collect())
    }

    async fn block_height(&self, commitment: CommitmentConfig) -> Result<u64, RpcFailure> {
        Ok(self
            .client
            .get_block_height_with_commitment(commitment)
            .await?)
    }

    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
        options: &SendOptions,
    ) -> Result<Signature, RpcFailure> {
        let mut config = RpcSendTransactionConfig::default();
        config.skip_preflight = options.skip_preflight;
        config.preflight_commitment = options.preflight_commitment;
        config.max_retries = options.max_retries;
        config.min_context_slot = options.min_context_slot;

        Ok(self
            .client
            .send_transaction_with_config(transaction, config)
            .await?)
    }

    async fn simulate_transaction(
        &self,
        transaction: &VersionedTransaction,
        options: &SimulateOptions,
    ) -> Result<SimulationReport, RpcFailure> {
        let bytes = serialize_transaction(transaction).map_err(RpcFailure::malformed)?;
        let encoded = BASE64_STANDARD.encode(bytes);

        let mut config = Map::with_capacity(6);
        config.insert("encoding".to_string(), json!("base64"));
        config.insert("sigVerify".to_string(), json!(options.sig_verify));
        config.insert(
            "replaceRecentBlockhash".to_string(),
            json!(options.replace_recent_blockhash),
        );
        if let Some(commitment) = options.commitment {
            config.insert("commitment".to_string(), json!(commitment));
        }
        if let Some(slot) = options.min_context_slot {
            if slot > 0 {
                config.insert("minContextSlot".to_string(), json!(slot));
            }
        }
        if !options.accounts.is_empty() {
            let addresses: Vec<String> = options.accounts.iter().map(|k| k.to_string()).collect();
            config.insert(
                "accounts".to_string(),
                json!({ "encoding": "base64", "addresses": addresses }),
            );
        }

        let response: RpcResponse<RawSimulation> = self
            .client
            .send(
                RpcRequest::SimulateTransaction,
                json!([encoded, Value::Object(config)]),
            )
            .await?;

        let raw = response.value;
        let decoded: Vec<Option<Account>> = match raw.accounts {
            Some(accounts) => accounts
                .into_iter()
                .map(|account| account.and_then(|ui| ui.decode::<Account>()))
                .collect(),
            None => Vec::new(),
        };
        let mut accounts = Vec::with_capacity(options.accounts.len());
        for (index, address) in options.accounts.iter().enumerate() {
            accounts.push((*address, decoded.get(index).cloned().flatten()));
        }

        debug!(
            target: "rpc::simulate",
            slot = response.context.slot,
            units = ?raw.units_consumed,
            failed = raw.err.is_some(),
            "simulateTransaction finished"
        );

        Ok(SimulationReport {
            context_slot: response.context.slot,
            err: raw.err.filter(|value| !value.is_null()).map(|value| value.to_string()),
            logs: raw.logs.unwrap_or_default(),
            units_consumed: raw.units_consumed,
            accounts,
        })
    }

    async fn multiple_accounts(&self, keys: &[Pubkey]) -> Result<Vec<Option<Account>>, RpcFailure> {
        Ok(self.client.get_multiple_accounts(keys).await?)
    }
}

impl From<ClientError> for RpcFailure {
    fn from(err: ClientError) -> Self {
        match err.kind() {
            ClientErrorKind::RpcError(RpcError::RpcResponseError {
                code,
                message,
                data,
                ..
            }) => {
                let preflight = match data {
                    RpcResponseErrorData::SendTransactionPreflightFailure(result) => {
                        Some(PreflightFailure {
                            err: result
                                .err
                                .as_ref()
                                .and_then(|err| serde_json::to_value(err).ok())
                                .map(|value| value.to_string()),
                            logs: result.logs.clone().unwrap_or_default(),
                            units_consumed: result.units_consumed,
                        })
                    }
                    _ => None,
                };
                RpcFailure::Rejected {
                    code: *code,
                    message: message.clone(),
                    preflight,
                }
            }
            ClientErrorKind::RpcError(RpcError::ParseError(message)) => {
                RpcFailure::Malformed(message.clone())
            }
            ClientErrorKind::SerdeJson(inner) => RpcFailure::Malformed(inner.to_string()),
            _ => RpcFailure::Transport(err.to_string()),
        }
    }
}
