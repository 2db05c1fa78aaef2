use bincode::config::{self, Config};
use bincode::serde::encode_to_vec;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::v0::Message as V0Message;
use solana_sdk::message::{AddressLookupTableAccount, VersionedMessage};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use thiserror::Error;

/// 单笔交易序列化后的最大字节数（IPv6 MTU 减去报头）。
pub const PACKET_DATA_SIZE: usize = 1232;
/// 单笔交易可解析的账户上限，解析后账户数必须严格小于该值。
pub const MAX_TX_ACCOUNTS: usize = 64;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("编译交易消息失败: {0}")]
    Compile(String),
    #[error("交易超出协议限制: {size} bytes / {accounts} accounts")]
    TooLarge { size: usize, accounts: usize },
    #[error("序列化交易失败: {0}")]
    Encode(String),
}

impl CompileError {
    pub fn is_too_large(&self) -> bool {
        matches!(self, CompileError::TooLarge { .. })
    }
}

/// 已通过协议上限校验、可签名的 v0 消息。
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledMessage {
    message: VersionedMessage,
    serialized_size: usize,
    account_count: usize,
}

impl CompiledMessage {
    pub fn message(&self) -> &VersionedMessage {
        &self.message
    }

    pub fn into_message(self) -> VersionedMessage {
        self.message
    }

    pub fn blockhash(&self) -> &Hash {
        self.message.recent_blockhash()
    }

    pub fn payer(&self) -> Option<&Pubkey> {
        self.message.static_account_keys().first()
    }

    /// 按消息声明顺序排列的必需签名者。
    pub fn required_signers(&self) -> &[Pubkey] {
        let keys = self.message.static_account_keys();
        let required = usize::from(self.message.header().num_required_signatures);
        &keys[..required.min(keys.len())]
    }

    pub fn serialized_size(&self) -> usize {
        self.serialized_size
    }

    pub fn account_count(&self) -> usize {
        self.account_count
    }
}

pub(crate) fn wire_config() -> impl Config {
    config::standard()
        .with_fixed_int_encoding()
        .with_little_endian()
}

pub fn serialize_transaction(tx: &VersionedTransaction) -> Result<Vec<u8>, CompileError> {
    encode_to_vec(tx, wire_config()).map_err(|err| CompileError::Encode(err.to_string()))
}

/// 以占位签名计算消息签名后的线上大小。
pub fn transaction_size(message: &VersionedMessage) -> Result<usize, CompileError> {
    let signatures = usize::from(message.header().num_required_signatures);
    let placeholder = VersionedTransaction {
        signatures: vec![Signature::default(); signatures],
        message: message.clone(),
    };
    serialize_transaction(&placeholder).map(|bytes| bytes.len())
}

fn resolved_account_count(message: &VersionedMessage) -> usize {
    let static_keys = message.static_account_keys().len();
    let loaded: usize = message
        .address_table_lookups()
        .map(|lookups| {
            lookups
                .iter()
                .map(|lookup| lookup.writable_indexes.len() + lookup.readonly_indexes.len())
                .sum()
        })
        .unwrap_or(0);
    static_keys + loaded
}

/// 编译 v0 消息。能通过查找表解析的账户一律走索引，否则内联。
///
/// 超出 [`PACKET_DATA_SIZE`] 或账户数达到 [`MAX_TX_ACCOUNTS`] 时返回
/// [`CompileError::TooLarge`]，调用方据此拆分指令集。
#[cfg_attr(feature = "hotpath", hotpath::measure)]
pub fn compile(
    payer: &Pubkey,
    instructions: &[Instruction],
    blockhash: Hash,
    lookup_tables: &[AddressLookupTableAccount],
) -> Result<CompiledMessage, CompileError> {
    let message = V0Message::try_compile(payer, instructions, lookup_tables, blockhash)
        .map_err(|err| CompileError::Compile(err.to_string()))?;
    let message = VersionedMessage::V0(message);

    let serialized_size = transaction_size(&message)?;
    let account_count = resolved_account_count(&message);
    if serialized_size > PACKET_DATA_SIZE || account_count >= MAX_TX_ACCOUNTS {
        return Err(CompileError::TooLarge {
            size: serialized_size,
            accounts: account_count,
        });
    }

    Ok(CompiledMessage {
        message,
        serialized_size,
        account_count,
    })
}
