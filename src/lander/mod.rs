mod cycle;
pub mod error;
mod factory;
mod poller;
mod relay;
mod rpc;
mod spam;
mod stack;

pub use cycle::{DEFAULT_POLL_ATTEMPTS, LandingTiming, MAX_HEIGHT_FAILURES};
pub use error::LanderError;
pub use factory::LanderFactory;
pub use poller::{CommitmentTarget, ConfirmationPoller, PollOutcome};
pub use relay::{BundleRelay, BundleStatus, JitoRelay, RelayAcceptance, RelayLander, TipPolicy};
pub use rpc::RpcLander;
pub use spam::SpamLander;
pub use stack::{LanderReceipt, LanderVariant};

#[cfg(test)]
mod tests;
