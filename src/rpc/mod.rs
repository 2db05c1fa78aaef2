pub mod blockhash;
mod client;
pub mod error;

pub use blockhash::BlockhashOracle;
pub use client::SolanaRpc;
pub use error::{PreflightFailure, RpcFailure};

use async_trait::async_trait;
use serde::Deserialize;
use solana_commitment_config::{CommitmentConfig, CommitmentLevel};
use solana_sdk::account::Account;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;

/// 模拟 / 状态查询使用的 minContextSlot 相对快照 slot 的回退量。
pub const MIN_CONTEXT_SLOT_MARGIN: u64 = 4;

/// 表示一个可供落地使用的区块哈希快照。
///
/// 三个字段来自同一次 `getLatestBlockhash` 往返，只在该 blockhash 的有效期内使用。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockhashSnapshot {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
    pub context_slot: u64,
}

impl BlockhashSnapshot {
    pub fn min_context_slot(&self) -> u64 {
        self.context_slot.saturating_sub(MIN_CONTEXT_SLOT_MARGIN)
    }

    /// 当前区块高度严格大于 `last_valid_block_height` 时视为过期。
    pub fn is_expired_at(&self, block_height: u64) -> bool {
        block_height > self.last_valid_block_height
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationStatus {
    Processed,
    Confirmed,
    Finalized,
}

impl ConfirmationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfirmationStatus::Processed => "processed",
            ConfirmationStatus::Confirmed => "confirmed",
            ConfirmationStatus::Finalized => "finalized",
        }
    }

    pub fn commitment_config(self) -> CommitmentConfig {
        match self {
            ConfirmationStatus::Processed => CommitmentConfig::processed(),
            ConfirmationStatus::Confirmed => CommitmentConfig::confirmed(),
            ConfirmationStatus::Finalized => CommitmentConfig::finalized(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureStatus {
    pub slot: u64,
    pub confirmations: Option<usize>,
    pub confirmation_status: Option<ConfirmationStatus>,
    pub err: Option<String>,
}

impl SignatureStatus {
    /// 旧节点不返回 `confirmationStatus`；`confirmations` 为空表示已 root。
    pub fn level(&self) -> ConfirmationStatus {
        match (self.confirmation_status, self.confirmations) {
            (Some(status), _) => status,
            (None, None) => ConfirmationStatus::Finalized,
            (None, Some(_)) => ConfirmationStatus::Processed,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SendOptions {
    pub skip_preflight: bool,
    pub max_retries: Option<usize>,
    pub preflight_commitment: Option<CommitmentLevel>,
    pub min_context_slot: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SimulateOptions {
    pub sig_verify: bool,
    pub replace_recent_blockhash: bool,
    pub commitment: Option<CommitmentLevel>,
    pub min_context_slot: Option<u64>,
    pub accounts: Vec<Pubkey>,
}

/// `simulateTransaction` 的结果。程序执行失败不是 RPC 错误，体现为 `err` 非空。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SimulationReport {
    pub context_slot: u64,
    pub err: Option<String>,
    pub logs: Vec<String>,
    pub units_consumed: Option<u64>,
    pub accounts: Vec<(Pubkey, Option<Account>)>,
}

impl SimulationReport {
    pub fn is_success(&self) -> bool {
        self.err.is_none()
    }

    pub fn account(&self, key: &Pubkey) -> Option<&Account> {
        self.accounts
            .iter()
            .find(|(address, _)| address == key)
            .and_then(|(_, account)| account.as_ref())
    }

    /// 按调用方提供的解码器把账户快照转换为领域类型，解码失败的条目为 `None`。
    pub fn decode_accounts<T, F>(&self, decoder: F) -> Vec<(Pubkey, Option<T>)>
    where
        F: Fn(&Pubkey, &Account) -> Option<T>,
    {
        self.accounts
            .iter()
            .map(|(address, account)| {
                let decoded = account
                    .as_ref()
                    .and_then(|account| decoder(address, account));
                (*address, decoded)
            })
            .collect()
    }
}

/// 账本节点的 JSON-RPC 能力。生产实现为 [`SolanaRpc`]，测试使用内存节点。
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    fn endpoint(&self) -> String;

    async fn latest_blockhash(
        &self,
        commitment: CommitmentConfig,
    ) -> Result<BlockhashSnapshot, RpcFailure>;

    /// 有界查询，不搜索完整交易历史。
    async fn signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> Result<Vec<Option<SignatureStatus>>, RpcFailure>;

    async fn block_height(&self, commitment: CommitmentConfig) -> Result<u64, RpcFailure>;

    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
        options: &SendOptions,
    ) -> Result<Signature, RpcFailure>;

    async fn simulate_transaction(
        &self,
        transaction: &VersionedTransaction,
        options: &SimulateOptions,
    ) -> Result<SimulationReport, RpcFailure>;

    async fn multiple_accounts(&self, keys: &[Pubkey]) -> Result<Vec<Option<Account>>, RpcFailure>;
}
