mod compiler;
pub mod compute_budget;
mod packer;
mod signer;

pub use compiler::{
    CompileError, CompiledMessage, MAX_TX_ACCOUNTS, PACKET_DATA_SIZE, compile,
    serialize_transaction, transaction_size,
};
pub use packer::pack_instruction_sets;
pub use signer::{
    KeypairWallet, PartiallySigned, SignError, SignedTransaction, WalletSigner, sign_local,
    sign_with_wallet,
};

use std::fmt;
use std::sync::Arc;

use solana_sdk::instruction::Instruction;
use solana_sdk::signature::{Keypair, Signer};
use thiserror::Error;

/// 领域调用方交给引擎的指令集合：有序指令 + 额外需要的本地签名者。
#[derive(Clone, Default)]
pub struct InstructionSet {
    instructions: Vec<Instruction>,
    signers: Vec<Arc<Keypair>>,
}

impl InstructionSet {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self {
            instructions,
            signers: Vec::new(),
        }
    }

    pub fn with_signer(mut self, signer: Arc<Keypair>) -> Self {
        self.signers.push(signer);
        self
    }

    pub fn with_signers(mut self, signers: impl IntoIterator<Item = Arc<Keypair>>) -> Self {
        self.signers.extend(signers);
        self
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn signers(&self) -> &[Arc<Keypair>] {
        &self.signers
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// 合并另一组指令，签名者按公钥去重。
    pub fn merged(&self, other: &InstructionSet) -> InstructionSet {
        let mut merged = self.clone();
        merged
            .instructions
            .extend(other.instructions.iter().cloned());
        for signer in &other.signers {
            if !merged
                .signers
                .iter()
                .any(|existing| existing.pubkey() == signer.pubkey())
            {
                merged.signers.push(signer.clone());
            }
        }
        merged
    }
}

impl fmt::Debug for InstructionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstructionSet")
            .field("instructions", &self.instructions.len())
            .field(
                "signers",
                &self
                    .signers
                    .iter()
                    .map(|signer| signer.pubkey())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// 发送前（编译或签名阶段）的失败。
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("指令集为空")]
    EmptyInstructions,
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Sign(#[from] SignError),
}
