use std::sync::Arc;

use serde::Deserialize;
use solana_sdk::signature::Signature;
use tracing::trace;

use crate::rpc::{ConfirmationStatus, LedgerRpc, RpcFailure, SignatureStatus};

/// 调用方要求的确认级别，作为参数贯穿轮询器。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitmentTarget {
    ProcessedOrBetter,
    Confirmed,
    #[default]
    Finalized,
}

impl CommitmentTarget {
    pub fn is_met_by(self, status: ConfirmationStatus) -> bool {
        let required = match self {
            CommitmentTarget::ProcessedOrBetter => ConfirmationStatus::Processed,
            CommitmentTarget::Confirmed => ConfirmationStatus::Confirmed,
            CommitmentTarget::Finalized => ConfirmationStatus::Finalized,
        };
        status >= required
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CommitmentTarget::ProcessedOrBetter => "processed_or_better",
            CommitmentTarget::Confirmed => "confirmed",
            CommitmentTarget::Finalized => "finalized",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// 节点尚未看到签名，或确认级别未达到目标。
    Pending(Option<SignatureStatus>),
    Reached(SignatureStatus),
    /// 交易已被处理但执行失败。
    Failed(SignatureStatus),
}

/// 单次、有界的签名状态查询。重复与过期判断由调用方负责。
#[derive(Clone)]
pub struct ConfirmationPoller {
    rpc: Arc<dyn LedgerRpc>,
}

impl ConfirmationPoller {
    pub fn new(rpc: Arc<dyn LedgerRpc>) -> Self {
        Self { rpc }
    }

    pub async fn poll(
        &self,
        signature: &Signature,
        target: CommitmentTarget,
    ) -> Result<PollOutcome, RpcFailure> {
        let status = self
            .rpc
            .signature_statuses(std::slice::from_ref(signature))
            .await?
            .into_iter()
            .next()
            .flatten();

        trace!(
            target: "lander::poller",
            signature = %signature,
            status = ?status.as_ref().map(|s| s.level()),
            target = target.as_str(),
            "signature status polled"
        );

        Ok(match status {
            Some(status) if status.err.is_some() => PollOutcome::Failed(status),
            Some(status) if target.is_met_by(status.level()) => PollOutcome::Reached(status),
            other => PollOutcome::Pending(other),
        })
    }
}
