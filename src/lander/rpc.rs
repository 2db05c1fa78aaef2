use solana_commitment_config::CommitmentLevel;
use solana_sdk::transaction::VersionedTransaction;
use tracing::info;

use crate::rpc::{BlockhashSnapshot, SendOptions};

use super::cycle::{CycleRequest, LandingCycle};
use super::error::LanderError;
use super::poller::CommitmentTarget;
use super::stack::LanderReceipt;

/// 单次发送：交给节点自身的重播机制，本地不重发，只轮询到确认或过期。
#[derive(Clone)]
pub struct RpcLander {
    cycle: LandingCycle,
    skip_preflight: bool,
    max_retries: Option<usize>,
    preflight_commitment: Option<CommitmentLevel>,
}

impl RpcLander {
    pub(crate) fn new(
        cycle: LandingCycle,
        skip_preflight: bool,
        max_retries: Option<usize>,
        preflight_commitment: Option<CommitmentLevel>,
    ) -> Self {
        Self {
            cycle,
            skip_preflight,
            max_retries,
            preflight_commitment,
        }
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
        info!(
            target: "lander::rpc",
            endpoint = %self.endpoint(),
            skip_preflight = self.skip_preflight,
            max_retries = ?self.max_retries,
            min_context_slot = snapshot.min_context_slot(),
            "submitting transaction via rpc"
        );

        self.cycle
            .run(CycleRequest {
                lander: "rpc",
                transaction,
                snapshot,
                target,
                options: SendOptions {
                    skip_preflight: self.skip_preflight,
                    max_retries: self.max_retries,
                    preflight_commitment: self.preflight_commitment,
                    min_context_slot: Some(snapshot.min_context_slot()),
                },
                resend: false,
                relay: None,
            })
            .await
    }
}
