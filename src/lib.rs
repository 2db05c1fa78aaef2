pub mod cache;
pub mod config;
pub mod engine;
pub mod lander;
pub mod monitoring;
pub mod rpc;
pub mod tx;

#[cfg(test)]
mod test_support;

pub use engine::{
    ErrorClassifier, SubmissionOutcome, SubmitError, SubmitResult, TransactionEngine,
};
pub use lander::CommitmentTarget;
pub use tx::InstructionSet;
