pub mod loader;
pub mod types;
pub mod wallet;

pub use loader::*;
pub use types::*;

use crate::lander::CommitmentTarget;
use crate::rpc::ConfirmationStatus;

use self::types as cfg;

pub(crate) fn default_true() -> bool {
    true
}

pub(crate) fn default_rpc_url() -> String {
    "https://api.mainnet-beta.solana.com".to_string()
}

pub(crate) fn default_commitment() -> ConfirmationStatus {
    ConfirmationStatus::Confirmed
}

pub(crate) fn default_target() -> CommitmentTarget {
    CommitmentTarget::Finalized
}

pub(crate) fn default_mode() -> cfg::BroadcastMode {
    cfg::BroadcastMode::Spam
}

pub(crate) fn default_resend_interval_ms() -> u64 {
    500
}

pub(crate) fn default_poll_interval_ms() -> u64 {
    200
}

pub(crate) fn default_poll_attempts() -> usize {
    crate::lander::DEFAULT_POLL_ATTEMPTS
}

pub(crate) fn default_http_timeout_ms() -> u64 {
    5_000
}

pub(crate) fn default_logging_level() -> String {
    "info".to_string()
}

pub(crate) fn default_prometheus_listen() -> String {
    "0.0.0.0:9898".to_string()
}
