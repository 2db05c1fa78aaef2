use std::sync::Arc;

use parking_lot::RwLock;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::AddressLookupTableAccount;
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::cache::AltCache;
use crate::lander::TipPolicy;
use crate::rpc::BlockhashSnapshot;
use crate::tx::{
    BuildError, CompileError, CompiledMessage, InstructionSet, PartiallySigned, SignError,
    SignedTransaction, WalletSigner, compile, compute_budget, pack_instruction_sets, sign_local,
    sign_with_wallet,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuilderConfig {
    pub compute_unit_limit: u32,
    pub compute_unit_price: u64,
}

impl BuilderConfig {
    pub fn new(compute_unit_limit: u32, compute_unit_price: u64) -> Self {
        Self {
            compute_unit_limit,
            compute_unit_price,
        }
    }
}

/// 单次提交使用的已签名交易，和编译时使用的快照绑定。
#[derive(Clone, Debug)]
pub struct PreparedTransaction {
    pub transaction: SignedTransaction,
    pub snapshot: BlockhashSnapshot,
    pub serialized_size: usize,
    pub account_count: usize,
}

/// 指令拼装 + 编译 + 签名。查找表在构造时加载，之后只在显式 reload 时替换。
#[derive(Clone)]
pub struct TransactionBuilder {
    wallet: Arc<dyn WalletSigner>,
    alts: AltCache,
    table_keys: Vec<Pubkey>,
    tables: Arc<RwLock<Vec<AddressLookupTableAccount>>>,
    config: BuilderConfig,
}

impl TransactionBuilder {
    pub fn new(
        wallet: Arc<dyn WalletSigner>,
        alts: AltCache,
        table_keys: Vec<Pubkey>,
        config: BuilderConfig,
    ) -> Self {
        Self {
            wallet,
            alts,
            table_keys,
            tables: Arc::new(RwLock::new(Vec::new())),
            config,
        }
    }

    pub fn payer(&self) -> Pubkey {
        self.wallet.pubkey()
    }

    pub fn wallet(&self) -> &Arc<dyn WalletSigner> {
        &self.wallet
    }

    pub fn config(&self) -> BuilderConfig {
        self.config
    }

    pub fn lookup_tables(&self) -> Vec<AddressLookupTableAccount> {
        self.tables.read().clone()
    }

    /// 首次加载查找表，已缓存的表不会重新拉取。
    pub async fn load_lookup_tables(&self) -> anyhow::Result<usize> {
        let tables = self.alts.fetch_many(&self.table_keys).await?;
        Ok(self.replace_tables(tables))
    }

    /// 强制重新拉取全部查找表并替换当前快照。
    pub async fn reload_lookup_tables(&self) -> anyhow::Result<usize> {
        let tables = self.alts.refresh_many(&self.table_keys).await?;
        Ok(self.replace_tables(tables))
    }

    fn replace_tables(&self, tables: Vec<AddressLookupTableAccount>) -> usize {
        let count = tables.len();
        debug!(
            target: "engine::builder",
            configured = self.table_keys.len(),
            loaded = count,
            "lookup tables replaced"
        );
        *self.tables.write() = tables;
        count
    }

    /// compute budget 前缀 + 调用方指令 + 可选 tip 转账。
    pub fn assemble(&self, set: &InstructionSet, tip: Option<&TipPolicy>) -> Vec<Instruction> {
        let mut instructions = compute_budget::with_compute_budget(
            set.instructions(),
            self.config.compute_unit_limit,
            self.config.compute_unit_price,
        );
        if let Some(tip_ix) = tip.and_then(|tip| tip.instruction(&self.payer())) {
            instructions.push(tip_ix);
        }
        instructions
    }

    pub fn compile(
        &self,
        set: &InstructionSet,
        snapshot: &BlockhashSnapshot,
        tip: Option<&TipPolicy>,
    ) -> Result<CompiledMessage, BuildError> {
        if set.is_empty() {
            return Err(BuildError::EmptyInstructions);
        }
        let instructions = self.assemble(set, tip);
        let tables = self.tables.read();
        let compiled = compile(&self.payer(), &instructions, snapshot.blockhash, &tables)?;
        debug!(
            target: "engine::builder",
            instructions = instructions.len(),
            size = compiled.serialized_size(),
            accounts = compiled.account_count(),
            "message compiled"
        );
        Ok(compiled)
    }

    pub fn sign_local(
        &self,
        compiled: CompiledMessage,
        set: &InstructionSet,
    ) -> Result<PartiallySigned, SignError> {
        sign_local(compiled, &self.payer(), set.signers())
    }

    pub async fn sign(
        &self,
        compiled: CompiledMessage,
        set: &InstructionSet,
    ) -> Result<SignedTransaction, SignError> {
        let partial = self.sign_local(compiled, set)?;
        sign_with_wallet(partial, self.wallet.as_ref()).await
    }

    /// 按提交时的完整形态（含 compute budget 与 tip）估算尺寸后合并指令集。
    pub fn pack(
        &self,
        sets: &[InstructionSet],
        tip: Option<&TipPolicy>,
    ) -> Result<Vec<InstructionSet>, CompileError> {
        let reserved = self.assemble(&InstructionSet::default(), tip);
        let tables = self.tables.read();
        pack_instruction_sets(&self.payer(), sets, &tables, &reserved)
    }
}
