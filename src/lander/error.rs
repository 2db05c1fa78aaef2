use std::fmt;

use reqwest::Error as ReqwestError;
use solana_sdk::signature::Signature;
use thiserror::Error;

use crate::rpc::{RpcFailure, SimulationReport};
use crate::tx::CompileError;

#[derive(Debug, Error)]
pub enum LanderError {
    #[error("RPC 提交失败: {0}")]
    Rpc(#[from] RpcFailure),
    /// 区块高度、预检模拟等只读查询失败，与发送被拒区分开。
    #[error("RPC 查询失败: {0}")]
    Unavailable(RpcFailure),
    #[error("网络请求失败: {0}")]
    Network(#[from] ReqwestError),
    #[error("JSON 解析失败: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("序列化交易失败: {0}")]
    Encode(#[from] CompileError),
    #[error("blockhash 已过期: {signature} (last_valid={last_valid_block_height}, height={observed_height})")]
    Expired {
        signature: Signature,
        last_valid_block_height: u64,
        observed_height: u64,
    },
    #[error("中继与重发均未观察到确认: {signature}")]
    NotConfirmed {
        signature: Signature,
        bundle_id: Option<String>,
    },
    #[error("交易已上链但执行失败: {signature}: {err}")]
    Reverted { signature: Signature, err: String },
    #[error("预检模拟失败: {}", .0.err.as_deref().unwrap_or("unknown"))]
    PrecheckFailed(Box<SimulationReport>),
    #[error("{0}")]
    Fatal(String),
}

impl LanderError {
    pub fn fatal(reason: impl fmt::Display) -> Self {
        Self::Fatal(reason.to_string())
    }
}
