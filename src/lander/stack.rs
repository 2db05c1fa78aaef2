use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;

use crate::rpc::{BlockhashSnapshot, SignatureStatus};

use super::error::LanderError;
use super::poller::CommitmentTarget;
use super::relay::{RelayLander, TipPolicy};
use super::rpc::RpcLander;
use super::spam::SpamLander;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanderReceipt {
    pub lander: &'static str,
    pub endpoint: String,
    pub signature: Signature,
    pub status: SignatureStatus,
    pub sends: usize,
    pub polls: usize,
    pub bundle_id: Option<String>,
}

/// 由配置选出的广播策略，三者共享同一个发送/轮询循环。
#[derive(Clone)]
pub enum LanderVariant {
    Rpc(RpcLander),
    Spam(SpamLander),
    Relay(RelayLander),
}

impl LanderVariant {
    pub fn name(&self) -> &'static str {
        match self {
            LanderVariant::Rpc(_) => "rpc",
            LanderVariant::Spam(_) => "spam",
            LanderVariant::Relay(_) => "relay",
        }
    }

    pub fn endpoints(&self) -> Vec<String> {
        match self {
            LanderVariant::Rpc(lander) => vec![lander.endpoint()],
            LanderVariant::Spam(lander) => vec![lander.endpoint()],
            LanderVariant::Relay(lander) => lander.endpoints(),
        }
    }

    /// 仅中继模式需要在交易中附带 tip。
    pub fn tip(&self) -> Option<&TipPolicy> {
        match self {
            LanderVariant::Relay(lander) => Some(lander.tip()),
            _ => None,
        }
    }

    pub async fn land(
        &self,
        transaction: &VersionedTransaction,
        snapshot: &BlockhashSnapshot,
        target: CommitmentTarget,
    ) -> Result<LanderReceipt, LanderError> {
        match self {
            LanderVariant::Rpc(lander) => lander.land(transaction, snapshot, target).await,
            LanderVariant::Spam(lander) => lander.land(transaction, snapshot, target).await,
            LanderVariant::Relay(lander) => lander.land(transaction, snapshot, target).await,
        }
    }
}
