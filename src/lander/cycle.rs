use std::sync::Arc;
use std::time::Duration;

use solana_commitment_config::CommitmentConfig;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use tracing::{debug, warn};

use crate::monitoring::events;
use crate::rpc::{
    BlockhashSnapshot, LedgerRpc, RpcFailure, SendOptions, SignatureStatus, SimulateOptions,
    SimulationReport,
};

use super::error::LanderError;
use super::poller::{CommitmentTarget, ConfirmationPoller, PollOutcome};
use super::relay::BundleRelay;
use super::stack::LanderReceipt;

pub const DEFAULT_POLL_ATTEMPTS: usize = 5;
/// 交易发出后允许连续读取区块高度失败的次数。
pub const MAX_HEIGHT_FAILURES: usize = 3;

/// 发送与轮询的节奏。全部为零时循环不会休眠。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LandingTiming {
    pub resend_interval: Duration,
    pub poll_interval: Duration,
    pub poll_attempts: usize,
}

impl Default for LandingTiming {
    fn default() -> Self {
        Self {
            resend_interval: Duration::from_millis(500),
            poll_interval: Duration::from_millis(200),
            poll_attempts: DEFAULT_POLL_ATTEMPTS,
        }
    }
}

impl LandingTiming {
    pub fn immediate() -> Self {
        Self {
            resend_interval: Duration::ZERO,
            poll_interval: Duration::ZERO,
            poll_attempts: DEFAULT_POLL_ATTEMPTS,
        }
    }
}

/// 轮询期间同时关注中继返回的 bundle 状态。
#[derive(Clone)]
pub(crate) struct RelayWatch {
    pub relay: Arc<dyn BundleRelay>,
    pub bundle_id: Option<String>,
}

pub(crate) struct CycleRequest<'a> {
    pub lander: &'static str,
    pub transaction: &'a VersionedTransaction,
    pub snapshot: &'a BlockhashSnapshot,
    pub target: CommitmentTarget,
    pub options: SendOptions,
    /// false 表示只发送一次，之后仅轮询直到确认或过期。
    pub resend: bool,
    pub relay: Option<RelayWatch>,
}

enum PollStep {
    Confirmed(SignatureStatus),
    Reverted(SignatureStatus),
    Pending,
}

/// 发送 + 轮询的有界循环，由区块高度而不是墙钟决定何时放弃。
#[derive(Clone)]
pub(crate) struct LandingCycle {
    rpc: Arc<dyn LedgerRpc>,
    sender: Arc<dyn LedgerRpc>,
    poller: ConfirmationPoller,
    height_commitment: CommitmentConfig,
    timing: LandingTiming,
}

impl LandingCycle {
    pub fn new(
        rpc: Arc<dyn LedgerRpc>,
        sender: Option<Arc<dyn LedgerRpc>>,
        height_commitment: CommitmentConfig,
        timing: LandingTiming,
    ) -> Self {
        let sender = sender.unwrap_or_else(|| rpc.clone());
        Self {
            poller: ConfirmationPoller::new(rpc.clone()),
            rpc,
            sender,
            height_commitment,
            timing,
        }
    }

    pub fn rpc(&self) -> &Arc<dyn LedgerRpc> {
        &self.rpc
    }

    pub fn endpoint(&self) -> String {
        self.sender.endpoint()
    }

    pub fn timing(&self) -> LandingTiming {
        self.timing
    }

    /// 发送前模拟一次，必然失败的交易不进入重发循环。
    pub async fn precheck(
        &self,
        lander: &'static str,
        transaction: &VersionedTransaction,
        snapshot: &BlockhashSnapshot,
    ) -> Result<SimulationReport, LanderError> {
        let options = SimulateOptions {
            sig_verify: true,
            replace_recent_blockhash: false,
            commitment: Some(self.height_commitment.commitment),
            min_context_slot: Some(snapshot.min_context_slot()),
            accounts: Vec::new(),
        };
        let report = self
            .rpc
            .simulate_transaction(transaction, &options)
            .await
            .map_err(LanderError::Unavailable)?;
        events::simulation_finished(&report);
        if !report.is_success() {
            let signature = transaction.signatures.first().copied().unwrap_or_default();
            events::precheck_failed(lander, &signature, &report);
            return Err(LanderError::PrecheckFailed(Box::new(report)));
        }
        Ok(report)
    }

    pub async fn run(&self, request: CycleRequest<'_>) -> Result<LanderReceipt, LanderError> {
        let signature = request
            .transaction
            .signatures
            .first()
            .copied()
            .ok_or_else(|| LanderError::fatal("交易缺少签名"))?;
        let mut sends = 0usize;
        let mut polls = 0usize;
        let mut height_failures = 0usize;
        let mut height = self
            .rpc
            .block_height(self.height_commitment)
            .await
            .map_err(LanderError::Unavailable)?;

        loop {
            if request.snapshot.is_expired_at(height) {
                events::lander_expired(
                    request.lander,
                    &signature,
                    request.snapshot.last_valid_block_height,
                    height,
                    sends,
                );
                return Err(match &request.relay {
                    Some(watch) => LanderError::NotConfirmed {
                        signature,
                        bundle_id: watch.bundle_id.clone(),
                    },
                    None => LanderError::Expired {
                        signature,
                        last_valid_block_height: request.snapshot.last_valid_block_height,
                        observed_height: height,
                    },
                });
            }

            if sends == 0 || request.resend {
                sends += 1;
                self.send_step(&request, &signature, sends).await?;
                sleep_for(self.timing.resend_interval).await;
            }

            match self
                .poll_step(&signature, request.target, request.relay.as_ref(), &mut polls)
                .await
            {
                PollStep::Confirmed(status) => {
                    let receipt = LanderReceipt {
                        lander: request.lander,
                        endpoint: self.endpoint(),
                        signature,
                        status,
                        sends,
                        polls,
                        bundle_id: request
                            .relay
                            .as_ref()
                            .and_then(|watch| watch.bundle_id.clone()),
                    };
                    events::lander_confirmed(&receipt);
                    return Ok(receipt);
                }
                PollStep::Reverted(status) => {
                    let err = status.err.unwrap_or_default();
                    events::lander_reverted(request.lander, &signature, &err);
                    return Err(LanderError::Reverted { signature, err });
                }
                PollStep::Pending => {}
            }

            // 交易已在途，高度读取失败时沿用上一次的值继续轮询。
            match self.rpc.block_height(self.height_commitment).await {
                Ok(observed) => {
                    height = observed;
                    height_failures = 0;
                }
                Err(err) => {
                    height_failures += 1;
                    events::block_height_failed(request.lander, &signature, height_failures, &err);
                    if height_failures >= MAX_HEIGHT_FAILURES {
                        return Err(LanderError::Unavailable(err));
                    }
                }
            }
            debug!(
                target: "lander::cycle",
                lander = request.lander,
                signature = %signature,
                height,
                last_valid_block_height = request.snapshot.last_valid_block_height,
                sends,
                polls,
                "not yet confirmed"
            );
        }
    }

    async fn send_step(
        &self,
        request: &CycleRequest<'_>,
        signature: &Signature,
        attempt: usize,
    ) -> Result<(), LanderError> {
        events::lander_send(request.lander, &self.endpoint(), signature, attempt);
        match self
            .sender
            .send_transaction(request.transaction, &request.options)
            .await
        {
            Ok(returned) => {
                if returned != *signature {
                    warn!(
                        target: "lander::cycle",
                        expected = %signature,
                        returned = %returned,
                        "节点返回的签名与交易不一致"
                    );
                }
                Ok(())
            }
            Err(err) if err.is_already_processed() => {
                debug!(
                    target: "lander::cycle",
                    signature = %signature,
                    attempt,
                    "duplicate send ignored"
                );
                Ok(())
            }
            Err(err) if !request.resend => Err(err.into()),
            Err(err @ (RpcFailure::Transport(_) | RpcFailure::Malformed(_))) => {
                events::lander_send_failed(request.lander, attempt, &err);
                Ok(())
            }
            // 首次发送即被拒绝说明交易本身有问题；重发时旧副本可能仍会落地。
            Err(err) if attempt == 1 => Err(err.into()),
            Err(err) => {
                events::lander_send_failed(request.lander, attempt, &err);
                Ok(())
            }
        }
    }

    async fn poll_step(
        &self,
        signature: &Signature,
        target: CommitmentTarget,
        relay: Option<&RelayWatch>,
        polls: &mut usize,
    ) -> PollStep {
        let attempts = self.timing.poll_attempts.max(1);
        for attempt in 0..attempts {
            if attempt > 0 {
                sleep_for(self.timing.poll_interval).await;
            }
            *polls += 1;
            match self.poller.poll(signature, target).await {
                Ok(PollOutcome::Reached(status)) => return PollStep::Confirmed(status),
                Ok(PollOutcome::Failed(status)) => return PollStep::Reverted(status),
                Ok(PollOutcome::Pending(_)) => {}
                Err(err) => {
                    warn!(
                        target: "lander::cycle",
                        signature = %signature,
                        error = %err,
                        "查询签名状态失败，视为未确认"
                    );
                }
            }

            if let Some(step) = self.poll_relay(relay, target).await {
                return step;
            }
        }
        PollStep::Pending
    }

    async fn poll_relay(
        &self,
        relay: Option<&RelayWatch>,
        target: CommitmentTarget,
    ) -> Option<PollStep> {
        let watch = relay?;
        let bundle_id = watch.bundle_id.as_deref()?;
        match watch.relay.bundle_status(bundle_id).await {
            Ok(Some(status)) => {
                let status = status.into_signature_status();
                if status.err.is_some() {
                    Some(PollStep::Reverted(status))
                } else if target.is_met_by(status.level()) {
                    Some(PollStep::Confirmed(status))
                } else {
                    None
                }
            }
            Ok(None) => None,
            Err(err) => {
                warn!(
                    target: "lander::cycle",
                    bundle_id,
                    error = %err,
                    "查询 bundle 状态失败"
                );
                None
            }
        }
    }
}

async fn sleep_for(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
