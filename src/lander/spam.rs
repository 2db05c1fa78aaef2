use solana_sdk::transaction::VersionedTransaction;

use crate::rpc::{BlockhashSnapshot, SendOptions};

use super::cycle::{CycleRequest, LandingCycle};
use super::error::LanderError;
use super::poller::CommitmentTarget;
use super::stack::LanderReceipt;

/// 关闭节点重试，反复发送同一份已签名字节直到确认或 blockhash 过期。
#[derive(Clone)]
pub struct SpamLander {
    cycle: LandingCycle,
    precheck: bool,
}

impl SpamLander {
    pub(crate) fn new(cycle: LandingCycle, precheck: bool) -> Self {
        Self { cycle, precheck }
    }

    pub fn endpoint(&self) -> String {
        self.cycle.endpoint()
    }

    pub async fn land(
        &self,
        transaction: &VersionedTransaction,
        snapshot: &BlockhashSnapshot,
        target: CommitmentTarget,
    ) -> Result<LanderReceipt, LanderError> {
        if self.precheck {
            self.cycle.precheck("spam", transaction, snapshot).await?;
        }

        self.cycle
            .run(CycleRequest {
                lander: "spam",
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
                relay: None,
            })
            .await
    }
}
