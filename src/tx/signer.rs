use std::sync::Arc;

use async_trait::async_trait;
use solana_sdk::message::VersionedMessage;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::VersionedTransaction;
use thiserror::Error;

use super::compiler::CompiledMessage;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignError {
    #[error("缺少必需签名者 {0} 的本地密钥")]
    MissingSigner(Pubkey),
    #[error("钱包签名失败: {0}")]
    Wallet(String),
    #[error("钱包返回的交易消息被改动")]
    WalletTampered,
    #[error("签名者 {0} 的签名缺失")]
    MissingSignature(Pubkey),
}

/// 外部钱包的签名能力：接收部分签名的交易，补上自己的签名后返回。
///
/// 钱包可能位于进程外（浏览器扩展、硬件设备），因此签名是异步的。
#[async_trait]
pub trait WalletSigner: Send + Sync {
    fn pubkey(&self) -> Pubkey;

    async fn sign_transaction(
        &self,
        transaction: VersionedTransaction,
    ) -> Result<VersionedTransaction, SignError>;
}

/// 以本地密钥充当钱包，用于服务端或脚本场景。
#[derive(Clone)]
pub struct KeypairWallet {
    keypair: Arc<Keypair>,
}

impl KeypairWallet {
    pub fn new(keypair: Arc<Keypair>) -> Self {
        Self { keypair }
    }

    pub fn keypair(&self) -> &Arc<Keypair> {
        &self.keypair
    }
}

#[async_trait]
impl WalletSigner for KeypairWallet {
    fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    async fn sign_transaction(
        &self,
        mut transaction: VersionedTransaction,
    ) -> Result<VersionedTransaction, SignError> {
        let pubkey = self.keypair.pubkey();
        let index = signer_index(&transaction.message, &pubkey)
            .ok_or(SignError::MissingSigner(pubkey))?;
        let signature = self
            .keypair
            .try_sign_message(&transaction.message.serialize())
            .map_err(|err| SignError::Wallet(err.to_string()))?;
        let required = usize::from(transaction.message.header().num_required_signatures);
        if transaction.signatures.len() < required {
            transaction
                .signatures
                .resize(required, Signature::default());
        }
        transaction.signatures[index] = signature;
        Ok(transaction)
    }
}

/// 本地签名者已签、等待钱包签名的交易。
#[derive(Clone, Debug)]
pub struct PartiallySigned {
    transaction: VersionedTransaction,
    wallet: Pubkey,
}

impl PartiallySigned {
    pub fn transaction(&self) -> &VersionedTransaction {
        &self.transaction
    }

    pub fn wallet(&self) -> &Pubkey {
        &self.wallet
    }
}

/// 全部必需签名齐备的交易。首个签名即交易 ID。
#[derive(Clone, Debug, PartialEq)]
pub struct SignedTransaction {
    transaction: VersionedTransaction,
    signature: Signature,
}

impl SignedTransaction {
    /// 接收外部已签名交易；任一必需签名为空时拒绝。
    pub fn from_transaction(transaction: VersionedTransaction) -> Result<Self, SignError> {
        ensure_fully_signed(&transaction)?;
        let signature = transaction.signatures[0];
        Ok(Self {
            transaction,
            signature,
        })
    }

    pub fn transaction(&self) -> &VersionedTransaction {
        &self.transaction
    }

    pub fn into_transaction(self) -> VersionedTransaction {
        self.transaction
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }
}

fn signer_index(message: &VersionedMessage, key: &Pubkey) -> Option<usize> {
    let required = usize::from(message.header().num_required_signatures);
    message
        .static_account_keys()
        .iter()
        .take(required)
        .position(|candidate| candidate == key)
}

fn ensure_fully_signed(transaction: &VersionedTransaction) -> Result<(), SignError> {
    let required = usize::from(transaction.message.header().num_required_signatures);
    let keys = transaction.message.static_account_keys();
    if required == 0 || transaction.signatures.len() != required {
        let missing = keys.first().copied().unwrap_or_default();
        return Err(SignError::MissingSignature(missing));
    }
    for (index, signature) in transaction.signatures.iter().enumerate() {
        if *signature == Signature::default() {
            let key = keys.get(index).copied().unwrap_or_default();
            return Err(SignError::MissingSignature(key));
        }
    }
    Ok(())
}

/// 用本地密钥为除钱包以外的所有必需签名者签名，钱包位置保留为空。
pub fn sign_local(
    compiled: CompiledMessage,
    wallet: &Pubkey,
    signers: &[Arc<Keypair>],
) -> Result<PartiallySigned, SignError> {
    let required: Vec<Pubkey> = compiled.required_signers().to_vec();
    let message = compiled.into_message();
    let bytes = message.serialize();

    let mut signatures = vec![Signature::default(); required.len()];
    for (index, key) in required.iter().enumerate() {
        if key == wallet {
            continue;
        }
        let signer = signers
            .iter()
            .find(|signer| signer.pubkey() == *key)
            .ok_or(SignError::MissingSigner(*key))?;
        signatures[index] = signer
            .try_sign_message(&bytes)
            .map_err(|err| SignError::Wallet(err.to_string()))?;
    }

    Ok(PartiallySigned {
        transaction: VersionedTransaction {
            signatures,
            message,
        },
        wallet: *wallet,
    })
}

/// 把部分签名的交易交给钱包补签，并校验钱包没有改动消息。
pub async fn sign_with_wallet(
    partial: PartiallySigned,
    wallet: &dyn WalletSigner,
) -> Result<SignedTransaction, SignError> {
    let PartiallySigned {
        transaction,
        wallet: expected,
    } = partial;
    if wallet.pubkey() != expected {
        return Err(SignError::MissingSigner(expected));
    }

    let transaction = if signer_index(&transaction.message, &expected).is_some() {
        let original = transaction.message.clone();
        let local = transaction.signatures.clone();
        let signed = wallet.sign_transaction(transaction).await?;
        if signed.message != original || signed.signatures.len() != local.len() {
            return Err(SignError::WalletTampered);
        }
        let overwritten = local
            .iter()
            .zip(&signed.signatures)
            .any(|(before, after)| *before != Signature::default() && before != after);
        if overwritten {
            return Err(SignError::WalletTampered);
        }
        signed
    } else {
        transaction
    };

    SignedTransaction::from_transaction(transaction)
}
