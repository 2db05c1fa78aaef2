use solana_sdk::signature::Signature;
use thiserror::Error;

use crate::rpc::RpcFailure;
use crate::tx::BuildError;

/// 调用方看到的失败分类。每次提交要么得到确认结果，要么得到其中之一。
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("交易构建失败: {0}")]
    TransactionBuilding(#[from] BuildError),
    #[error("模拟失败: {description}")]
    Simulation {
        description: String,
        err: Option<String>,
        logs: Vec<String>,
    },
    #[error("blockhash 有效期内未确认: {signature} (last_valid={last_valid_block_height}, height={observed_height})")]
    Timeout {
        signature: Signature,
        last_valid_block_height: u64,
        observed_height: u64,
    },
    #[error("中继与重发均未确认: {signature}")]
    NotConfirmed {
        signature: Signature,
        bundle_id: Option<String>,
    },
    #[error("交易执行失败: {signature}: {description}")]
    Reverted {
        signature: Signature,
        description: String,
    },
    #[error("网络错误: {0}")]
    Network(RpcFailure),
    #[error("{0}")]
    Fallthrough(String),
}

impl SubmitError {
    pub fn fallthrough(reason: impl std::fmt::Display) -> Self {
        Self::Fallthrough(reason.to_string())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SubmitError::TransactionBuilding(_) => "transaction_building",
            SubmitError::Simulation { .. } => "simulation",
            SubmitError::Timeout { .. } => "timeout",
            SubmitError::NotConfirmed { .. } => "not_confirmed",
            SubmitError::Reverted { .. } => "reverted",
            SubmitError::Network(_) => "network",
            SubmitError::Fallthrough(_) => "fallthrough",
        }
    }

    /// 面向用户展示的描述，优先使用从链上日志解析出的文本。
    pub fn description(&self) -> String {
        match self {
            SubmitError::Simulation { description, .. } => description.clone(),
            SubmitError::Reverted { description, .. } => description.clone(),
            other => other.to_string(),
        }
    }

    pub fn logs(&self) -> &[String] {
        match self {
            SubmitError::Simulation { logs, .. } => logs,
            _ => &[],
        }
    }

    pub fn signature(&self) -> Option<&Signature> {
        match self {
            SubmitError::Timeout { signature, .. }
            | SubmitError::NotConfirmed { signature, .. }
            | SubmitError::Reverted { signature, .. } => Some(signature),
            _ => None,
        }
    }

    pub fn is_too_large(&self) -> bool {
        matches!(
            self,
            SubmitError::TransactionBuilding(BuildError::Compile(err)) if err.is_too_large()
        )
    }
}

pub type SubmitResult<T> = Result<T, SubmitError>;
