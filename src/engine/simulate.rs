use std::sync::Arc;

use solana_commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use tracing::debug;

use crate::monitoring::events;
use crate::rpc::{BlockhashSnapshot, LedgerRpc, RpcFailure, SimulateOptions, SimulationReport};

/// 只模拟不发送。程序执行失败体现在报告的 `err` 中，RPC 失败才返回错误。
#[derive(Clone)]
pub struct Simulator {
    rpc: Arc<dyn LedgerRpc>,
    commitment: CommitmentConfig,
}

impl Simulator {
    pub fn new(rpc: Arc<dyn LedgerRpc>, commitment: CommitmentConfig) -> Self {
        Self { rpc, commitment }
    }

    /// 签名齐全时校验签名；缺少签名（例如未经钱包签名）时让节点替换 blockhash。
    pub async fn simulate(
        &self,
        transaction: &VersionedTransaction,
        snapshot: Option<&BlockhashSnapshot>,
        accounts: &[Pubkey],
    ) -> Result<SimulationReport, RpcFailure> {
        let fully_signed = !transaction.signatures.is_empty()
            && transaction
                .signatures
                .iter()
                .all(|signature| *signature != Signature::default());
        let options = SimulateOptions {
            sig_verify: fully_signed,
            replace_recent_blockhash: !fully_signed,
            commitment: Some(self.commitment.commitment),
            min_context_slot: snapshot.map(BlockhashSnapshot::min_context_slot),
            accounts: accounts.to_vec(),
        };

        let report = self.rpc.simulate_transaction(transaction, &options).await?;
        debug!(
            target: "engine::simulate",
            sig_verify = options.sig_verify,
            accounts = accounts.len(),
            logs = report.logs.len(),
            err = ?report.err,
            "simulation returned"
        );
        events::simulation_finished(&report);
        Ok(report)
    }
}
