use thiserror::Error;

/// 预检模拟失败时节点随错误一起返回的执行信息。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PreflightFailure {
    pub err: Option<String>,
    pub logs: Vec<String>,
    pub units_consumed: Option<u64>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RpcFailure {
    #[error("RPC 传输失败: {0}")]
    Transport(String),
    #[error("RPC 响应解析失败: {0}")]
    Malformed(String),
    #[error("RPC 拒绝请求 ({code}): {message}")]
    Rejected {
        code: i64,
        message: String,
        preflight: Option<PreflightFailure>,
    },
}

impl RpcFailure {
    pub fn transport(reason: impl std::fmt::Display) -> Self {
        Self::Transport(reason.to_string())
    }

    pub fn malformed(reason: impl std::fmt::Display) -> Self {
        Self::Malformed(reason.to_string())
    }

    pub fn preflight(&self) -> Option<&PreflightFailure> {
        match self {
            RpcFailure::Rejected { preflight, .. } => preflight.as_ref(),
            _ => None,
        }
    }

    /// 重发同一笔交易时节点可能返回 "already processed"，说明此前的副本已被接收。
    pub fn is_already_processed(&self) -> bool {
        match self {
            RpcFailure::Rejected { message, .. } => {
                message.to_ascii_lowercase().contains("already been processed")
            }
            _ => false,
        }
    }
}
