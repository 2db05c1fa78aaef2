use solana_sdk::signature::Signature;

use crate::lander::LanderReceipt;
use crate::rpc::{ConfirmationStatus, SignatureStatus};

/// 成功提交的结果：签名 + 达到的确认级别。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionOutcome {
    pub signature: Signature,
    pub status: ConfirmationStatus,
    pub slot: u64,
    pub lander: &'static str,
    pub sends: usize,
    pub polls: usize,
    pub bundle_id: Option<String>,
}

impl SubmissionOutcome {
    pub fn is_finalized(&self) -> bool {
        self.status == ConfirmationStatus::Finalized
    }
}

impl From<LanderReceipt> for SubmissionOutcome {
    fn from(receipt: LanderReceipt) -> Self {
        let SignatureStatus { slot, .. } = receipt.status;
        Self {
            signature: receipt.signature,
            status: receipt.status.level(),
            slot,
            lander: receipt.lander,
            sends: receipt.sends,
            polls: receipt.polls,
            bundle_id: receipt.bundle_id,
        }
    }
}
