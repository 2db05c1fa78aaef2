mod builder;
mod classifier;
mod error;
mod simulate;
mod types;

pub use builder::{BuilderConfig, PreparedTransaction, TransactionBuilder};
pub use classifier::ErrorClassifier;
pub use error::{SubmitError, SubmitResult};
pub use simulate::Simulator;
pub use types::SubmissionOutcome;

use std::sync::Arc;

use anyhow::Context;
use reqwest::Client;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::VersionedTransaction;
use tracing::{debug, info};

use crate::cache::AltCache;
use crate::config::{LanderConfig, wallet::load_keypair};
use crate::lander::{CommitmentTarget, LanderFactory, LanderVariant};
use crate::monitoring::events;
use crate::rpc::{BlockhashOracle, BlockhashSnapshot, LedgerRpc, SimulationReport, SolanaRpc};
use crate::tx::{BuildError, InstructionSet, KeypairWallet, SignedTransaction, WalletSigner};

/// 交易生命周期的唯一入口：取 blockhash、编译、签名、广播、确认，失败统一分类。
#[derive(Clone)]
pub struct TransactionEngine {
    oracle: BlockhashOracle,
    builder: TransactionBuilder,
    simulator: Simulator,
    lander: LanderVariant,
    classifier: ErrorClassifier,
    default_target: CommitmentTarget,
}

pub struct EngineBuilder {
    rpc: Arc<dyn LedgerRpc>,
    wallet: Arc<dyn WalletSigner>,
    lander: LanderVariant,
    commitment: CommitmentConfig,
    lookup_tables: Vec<Pubkey>,
    config: BuilderConfig,
    classifier: ErrorClassifier,
    default_target: CommitmentTarget,
}

impl EngineBuilder {
    pub fn commitment(mut self, commitment: CommitmentConfig) -> Self {
        self.commitment = commitment;
        self
    }

    pub fn lookup_tables(mut self, keys: Vec<Pubkey>) -> Self {
        self.lookup_tables = keys;
        self
    }

    pub fn compute_budget(mut self, config: BuilderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn default_target(mut self, target: CommitmentTarget) -> Self {
        self.default_target = target;
        self
    }

    /// 构造时加载查找表；之后只有 [`TransactionEngine::reload_lookup_tables`] 会替换它们。
    pub async fn build(self) -> anyhow::Result<TransactionEngine> {
        let builder = TransactionBuilder::new(
            self.wallet,
            AltCache::new(self.rpc.clone()),
            self.lookup_tables,
            self.config,
        );
        let loaded = builder
            .load_lookup_tables()
            .await
            .context("加载地址查找表失败")?;

        info!(
            target: "engine::submit",
            lander = self.lander.name(),
            payer = %builder.payer(),
            lookup_tables = loaded,
            "transaction engine ready"
        );

        Ok(TransactionEngine {
            oracle: BlockhashOracle::new(self.rpc.clone(), self.commitment),
            simulator: Simulator::new(self.rpc, self.commitment),
            builder,
            lander: self.lander,
            classifier: self.classifier,
            default_target: self.default_target,
        })
    }
}

impl TransactionEngine {
    pub fn builder(
        rpc: Arc<dyn LedgerRpc>,
        wallet: Arc<dyn WalletSigner>,
        lander: LanderVariant,
    ) -> EngineBuilder {
        EngineBuilder {
            rpc,
            wallet,
            lander,
            commitment: CommitmentConfig::confirmed(),
            lookup_tables: Vec::new(),
            config: BuilderConfig::default(),
            classifier: ErrorClassifier::default(),
            default_target: CommitmentTarget::default(),
        }
    }

    /// 按配置组装全部组件：RPC 客户端、本地钱包、广播策略与查找表。
    pub async fn from_config(
        config: &LanderConfig,
        classifier: ErrorClassifier,
    ) -> anyhow::Result<Self> {
        let commitment = config.commitment.commitment_config();
        let rpc: Arc<dyn LedgerRpc> = Arc::new(SolanaRpc::from_url(&config.rpc_url, commitment));
        let send_rpc = config
            .send_rpc_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(|url| Arc::new(SolanaRpc::from_url(url, commitment)) as Arc<dyn LedgerRpc>);

        let keypair = load_keypair(&config.wallet)?;
        let wallet: Arc<dyn WalletSigner> = Arc::new(KeypairWallet::new(keypair));

        let lander = LanderFactory::new(rpc.clone(), send_rpc, Client::new()).build(config)?;

        Self::builder(rpc, wallet, lander)
            .commitment(commitment)
            .lookup_tables(config.lookup_table_keys()?)
            .compute_budget(BuilderConfig::new(
                config.compute_budget.unit_limit,
                config.compute_budget.unit_price_micro_lamports,
            ))
            .classifier(classifier)
            .default_target(config.target)
            .build()
            .await
    }

    pub fn payer(&self) -> Pubkey {
        self.builder.payer()
    }

    pub fn lander(&self) -> &LanderVariant {
        &self.lander
    }

    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    pub fn default_target(&self) -> CommitmentTarget {
        self.default_target
    }

    /// 以配置的默认确认级别提交。
    pub async fn submit_default(&self, set: &InstructionSet) -> SubmitResult<SubmissionOutcome> {
        self.submit(set, self.default_target).await
    }

    /// 提交指令集并等待 `target` 级别的确认。要么返回签名与确认状态，要么返回分类后的失败。
    pub async fn submit(
        &self,
        set: &InstructionSet,
        target: CommitmentTarget,
    ) -> SubmitResult<SubmissionOutcome> {
        let result = match self.prepare(set).await {
            Ok(prepared) => {
                self.land(prepared.transaction.transaction(), &prepared.snapshot, target)
                    .await
            }
            Err(err) => Err(err),
        };
        self.report(result)
    }

    /// 广播外部已签名的交易。`snapshot` 必须是编译该交易时使用的那一份。
    pub async fn submit_signed(
        &self,
        transaction: VersionedTransaction,
        snapshot: &BlockhashSnapshot,
        target: CommitmentTarget,
    ) -> SubmitResult<SubmissionOutcome> {
        let result = match SignedTransaction::from_transaction(transaction) {
            Ok(signed) => self.land(signed.transaction(), snapshot, target).await,
            Err(err) => Err(self.classifier.classify_sign(err)),
        };
        self.report(result)
    }

    /// 取新 blockhash 并完成编译与签名，不发送。
    #[cfg_attr(feature = "hotpath", hotpath::measure)]
    pub async fn prepare(&self, set: &InstructionSet) -> SubmitResult<PreparedTransaction> {
        if set.is_empty() {
            return Err(BuildError::EmptyInstructions.into());
        }
        let snapshot = self.fetch_snapshot().await?;
        let compiled = self.builder.compile(set, &snapshot, self.lander.tip())?;
        let serialized_size = compiled.serialized_size();
        let account_count = compiled.account_count();
        let transaction = self
            .builder
            .sign(compiled, set)
            .await
            .map_err(|err| self.classifier.classify_sign(err))?;

        debug!(
            target: "engine::submit",
            signature = %transaction.signature(),
            size = serialized_size,
            accounts = account_count,
            last_valid_block_height = snapshot.last_valid_block_height,
            "transaction prepared"
        );
        Ok(PreparedTransaction {
            transaction,
            snapshot,
            serialized_size,
            account_count,
        })
    }

    /// 模拟指令集。只使用本地签名者，钱包位置留空并由节点替换 blockhash。
    /// 程序执行失败以 `err` 体现在报告中。
    pub async fn simulate(
        &self,
        set: &InstructionSet,
        accounts: &[Pubkey],
    ) -> SubmitResult<SimulationReport> {
        if set.is_empty() {
            return Err(BuildError::EmptyInstructions.into());
        }
        let snapshot = self.fetch_snapshot().await?;
        let compiled = self.builder.compile(set, &snapshot, None)?;
        let partial = self
            .builder
            .sign_local(compiled, set)
            .map_err(|err| self.classifier.classify_sign(err))?;
        self.simulator
            .simulate(partial.transaction(), Some(&snapshot), accounts)
            .await
            .map_err(|err| self.classifier.classify_query(&err))
    }

    /// 同 [`simulate`](Self::simulate)，但执行失败也作为 [`SubmitError::Simulation`] 返回。
    pub async fn simulate_checked(
        &self,
        set: &InstructionSet,
        accounts: &[Pubkey],
    ) -> SubmitResult<SimulationReport> {
        let report = self.simulate(set, accounts).await?;
        match self.classifier.classify_simulation(&report) {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }

    pub async fn simulate_transaction(
        &self,
        transaction: &VersionedTransaction,
        accounts: &[Pubkey],
    ) -> SubmitResult<SimulationReport> {
        self.simulator
            .simulate(transaction, None, accounts)
            .await
            .map_err(|err| self.classifier.classify_query(&err))
    }

    /// 把多组指令合并成尽量少、且提交时不会超限的指令集。
    pub fn pack(&self, sets: &[InstructionSet]) -> SubmitResult<Vec<InstructionSet>> {
        self.builder
            .pack(sets, self.lander.tip())
            .map_err(|err| BuildError::Compile(err).into())
    }

    pub async fn reload_lookup_tables(&self) -> SubmitResult<usize> {
        self.builder
            .reload_lookup_tables()
            .await
            .map_err(|err| self.classifier.classify_lookup_tables(&err))
    }

    async fn fetch_snapshot(&self) -> SubmitResult<BlockhashSnapshot> {
        self.oracle
            .fetch_snapshot()
            .await
            .map_err(|err| self.classifier.classify_query(&err))
    }

    async fn land(
        &self,
        transaction: &VersionedTransaction,
        snapshot: &BlockhashSnapshot,
        target: CommitmentTarget,
    ) -> SubmitResult<SubmissionOutcome> {
        self.lander
            .land(transaction, snapshot, target)
            .await
            .map(SubmissionOutcome::from)
            .map_err(|err| self.classifier.classify_lander(err))
    }

    fn report(
        &self,
        result: SubmitResult<SubmissionOutcome>,
    ) -> SubmitResult<SubmissionOutcome> {
        match &result {
            Ok(outcome) => info!(
                target: "engine::submit",
                signature = %outcome.signature,
                status = outcome.status.as_str(),
                lander = outcome.lander,
                sends = outcome.sends,
                polls = outcome.polls,
                "submission confirmed"
            ),
            Err(err) => events::submit_failed(err.kind(), &err.description()),
        }
        result
    }
}
