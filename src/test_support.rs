//! 内存中的账本节点 / 中继 / 钱包替身，按脚本返回结果并记录调用次数。

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::account::Account;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;

use crate::lander::{BundleRelay, BundleStatus, LanderError, RelayAcceptance};
use crate::rpc::{
    BlockhashSnapshot, ConfirmationStatus, LedgerRpc, RpcFailure, SendOptions, SignatureStatus,
    SimulateOptions, SimulationReport,
};
use crate::tx::{KeypairWallet, SignError, WalletSigner};

pub const TEST_LAST_VALID: u64 = 150;
pub const TEST_CONTEXT_SLOT: u64 = 1_000;

pub fn status(level: ConfirmationStatus) -> SignatureStatus {
    SignatureStatus {
        slot: TEST_CONTEXT_SLOT + 1,
        confirmations: match level {
            ConfirmationStatus::Finalized => None,
            _ => Some(1),
        },
        confirmation_status: Some(level),
        err: None,
    }
}

pub fn failed_status(err: &str) -> SignatureStatus {
    SignatureStatus {
        err: Some(err.to_string()),
        ..status(ConfirmationStatus::Confirmed)
    }
}

/// 构造地址查找表账户数据：56 字节元数据头 + 地址数组。
pub fn lookup_table_account(addresses: &[Pubkey]) -> Account {
    let mut data = Vec::with_capacity(56 + addresses.len() * 32);
    data.extend_from_slice(&1u32.to_le_bytes());
    data.extend_from_slice(&u64::MAX.to_le_bytes());
    data.extend_from_slice(&0u64.to_le_bytes());
    data.push(0);
    data.push(0);
    data.resize(56, 0);
    for address in addresses {
        data.extend_from_slice(address.as_ref());
    }
    Account {
        lamports: 1_000_000,
        data,
        owner: Pubkey::new_unique(),
        executable: false,
        rent_epoch: 0,
    }
}

struct LedgerState {
    snapshot: BlockhashSnapshot,
    heights: VecDeque<u64>,
    last_height: u64,
    failing_height_calls: Vec<usize>,
    statuses: VecDeque<Option<SignatureStatus>>,
    land_on_send: Option<SignatureStatus>,
    landed: HashMap<Signature, SignatureStatus>,
    processed: HashMap<Signature, usize>,
    send_errors: VecDeque<RpcFailure>,
    reject_duplicates: bool,
    simulation: SimulationReport,
    simulate_error: Option<RpcFailure>,
    accounts: HashMap<Pubkey, Account>,
    sent: Vec<(VersionedTransaction, SendOptions)>,
    simulated: Vec<SimulateOptions>,
}

#[derive(Default)]
struct Counters {
    sends: AtomicUsize,
    polls: AtomicUsize,
    heights: AtomicUsize,
    simulations: AtomicUsize,
    account_calls: AtomicUsize,
    blockhashes: AtomicUsize,
}

/// 按签名去重的内存节点：同一签名最多被“处理”一次。
pub struct FakeLedger {
    state: Mutex<LedgerState>,
    counters: Counters,
}

impl FakeLedger {
    pub fn new(height: u64) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(LedgerState {
                snapshot: BlockhashSnapshot {
                    blockhash: Hash::new_unique(),
                    last_valid_block_height: TEST_LAST_VALID,
                    context_slot: TEST_CONTEXT_SLOT,
                },
                heights: VecDeque::new(),
                last_height: height,
                failing_height_calls: Vec::new(),
                statuses: VecDeque::new(),
                land_on_send: None,
                landed: HashMap::new(),
                processed: HashMap::new(),
                send_errors: VecDeque::new(),
                reject_duplicates: false,
                simulation: SimulationReport {
                    context_slot: TEST_CONTEXT_SLOT,
                    units_consumed: Some(1_500),
                    logs: vec!["Program 11111111111111111111111111111111 success".to_string()],
                    ..SimulationReport::default()
                },
                simulate_error: None,
                accounts: HashMap::new(),
                sent: Vec::new(),
                simulated: Vec::new(),
            }),
            counters: Counters::default(),
        })
    }

    pub fn snapshot(&self) -> BlockhashSnapshot {
        self.state.lock().snapshot.clone()
    }

    /// 依次返回的区块高度，用完后保持最后一个值。
    pub fn script_heights(&self, heights: impl IntoIterator<Item = u64>) {
        self.state.lock().heights.extend(heights);
    }

    /// 第 n 次（从 1 开始）读取区块高度时返回传输错误。
    pub fn fail_height_calls(&self, calls: impl IntoIterator<Item = usize>) {
        self.state.lock().failing_height_calls.extend(calls);
    }

    /// 依次返回的状态查询结果，用完后回落到已落地的状态。
    pub fn script_statuses(&self, statuses: impl IntoIterator<Item = Option<SignatureStatus>>) {
        self.state.lock().statuses.extend(statuses);
    }

    pub fn land_on_send(&self, status: SignatureStatus) {
        self.state.lock().land_on_send = Some(status);
    }

    pub fn fail_sends(&self, errors: impl IntoIterator<Item = RpcFailure>) {
        self.state.lock().send_errors.extend(errors);
    }

    pub fn reject_duplicates(&self) {
        self.state.lock().reject_duplicates = true;
    }

    pub fn set_simulation(&self, report: SimulationReport) {
        self.state.lock().simulation = report;
    }

    pub fn fail_simulation(&self, err: RpcFailure) {
        self.state.lock().simulate_error = Some(err);
    }

    pub fn put_account(&self, key: Pubkey, account: Account) {
        self.state.lock().accounts.insert(key, account);
    }

    pub fn sends(&self) -> usize {
        self.counters.sends.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.counters.polls.load(Ordering::SeqCst)
    }

    pub fn height_calls(&self) -> usize {
        self.counters.heights.load(Ordering::SeqCst)
    }

    pub fn simulations(&self) -> usize {
        self.counters.simulations.load(Ordering::SeqCst)
    }

    pub fn account_calls(&self) -> usize {
        self.counters.account_calls.load(Ordering::SeqCst)
    }

    pub fn blockhash_calls(&self) -> usize {
        self.counters.blockhashes.load(Ordering::SeqCst)
    }

    pub fn processed_count(&self, signature: &Signature) -> usize {
        self.state
            .lock()
            .processed
            .get(signature)
            .copied()
            .unwrap_or_default()
    }

    pub fn sent(&self) -> Vec<(VersionedTransaction, SendOptions)> {
        self.state.lock().sent.clone()
    }

    pub fn simulated(&self) -> Vec<SimulateOptions> {
        self.state.lock().simulated.clone()
    }
}

#[async_trait]
impl LedgerRpc for FakeLedger {
    fn endpoint(&self) -> String {
        "memory://ledger".to_string()
    }

    async fn latest_blockhash(
        &self,
        _commitment: CommitmentConfig,
    ) -> Result<BlockhashSnapshot, RpcFailure> {
        self.counters.blockhashes.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().snapshot.clone())
    }

    async fn signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> Result<Vec<Option<SignatureStatus>>, RpcFailure> {
        self.counters.polls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        let scripted = state.statuses.pop_front();
        Ok(signatures
            .iter()
            .map(|signature| match &scripted {
                Some(value) => value.clone(),
                None => state.landed.get(signature).cloned(),
            })
            .collect())
    }

    async fn block_height(&self, _commitment: CommitmentConfig) -> Result<u64, RpcFailure> {
        let call = self.counters.heights.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.state.lock();
        if state.failing_height_calls.contains(&call) {
            return Err(RpcFailure::transport("block height unavailable"));
        }
        if let Some(next) = state.heights.pop_front() {
            state.last_height = next;
        }
        Ok(state.last_height)
    }

    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
        options: &SendOptions,
    ) -> Result<Signature, RpcFailure> {
        self.counters.sends.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        state.sent.push((transaction.clone(), options.clone()));
        if let Some(err) = state.send_errors.pop_front() {
            return Err(err);
        }

        let signature = transaction.signatures.first().copied().unwrap_or_default();
        let already = state.processed.contains_key(&signature);
        if already && state.reject_duplicates {
            return Err(RpcFailure::Rejected {
                code: -32002,
                message: "Transaction simulation failed: This transaction has already been processed"
                    .to_string(),
                preflight: None,
            });
        }
        if !already {
            state.processed.insert(signature, 1);
            if let Some(landed) = state.land_on_send.clone() {
                state.landed.insert(signature, landed);
            }
        }
        Ok(signature)
    }

    async fn simulate_transaction(
        &self,
        _transaction: &VersionedTransaction,
        options: &SimulateOptions,
    ) -> Result<SimulationReport, RpcFailure> {
        self.counters.simulations.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        state.simulated.push(options.clone());
        if let Some(err) = state.simulate_error.clone() {
            return Err(err);
        }
        let mut report = state.simulation.clone();
        report.accounts = options
            .accounts
            .iter()
            .map(|key| (*key, state.accounts.get(key).cloned()))
            .collect();
        Ok(report)
    }

    async fn multiple_accounts(&self, keys: &[Pubkey]) -> Result<Vec<Option<Account>>, RpcFailure> {
        self.counters.account_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock();
        Ok(keys.iter().map(|key| state.accounts.get(key).cloned()).collect())
    }
}

/// 脚本化的 bundle 中继。
pub struct FakeRelay {
    accept: bool,
    statuses: Mutex<VecDeque<Option<BundleStatus>>>,
    bundles: Mutex<Vec<Vec<String>>>,
    status_calls: AtomicUsize,
}

impl FakeRelay {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self::with_acceptance(true))
    }

    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self::with_acceptance(false))
    }

    fn with_acceptance(accept: bool) -> Self {
        Self {
            accept,
            statuses: Mutex::new(VecDeque::new()),
            bundles: Mutex::new(Vec::new()),
            status_calls: AtomicUsize::new(0),
        }
    }

    pub fn script_statuses(&self, statuses: impl IntoIterator<Item = Option<BundleStatus>>) {
        self.statuses.lock().extend(statuses);
    }

    pub fn bundles(&self) -> Vec<Vec<String>> {
        self.bundles.lock().clone()
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BundleRelay for FakeRelay {
    fn endpoints(&self) -> Vec<String> {
        vec!["memory://relay".to_string()]
    }

    async fn send_bundle(&self, transactions: &[String]) -> Result<RelayAcceptance, LanderError> {
        self.bundles.lock().push(transactions.to_vec());
        if self.accept {
            Ok(RelayAcceptance {
                endpoint: "memory://relay".to_string(),
                bundle_id: "bundle-1".to_string(),
            })
        } else {
            Err(LanderError::fatal("relay unavailable"))
        }
    }

    async fn bundle_status(&self, _bundle_id: &str) -> Result<Option<BundleStatus>, LanderError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.statuses.lock().pop_front().flatten())
    }
}

/// 记录签名次数的钱包，可配置为直接失败。
pub struct RecordingWallet {
    inner: KeypairWallet,
    fail: bool,
    calls: AtomicUsize,
}

impl RecordingWallet {
    pub fn new(inner: KeypairWallet) -> Arc<Self> {
        Arc::new(Self {
            inner,
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(inner: KeypairWallet) -> Arc<Self> {
        Arc::new(Self {
            inner,
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletSigner for RecordingWallet {
    fn pubkey(&self) -> Pubkey {
        self.inner.pubkey()
    }

    async fn sign_transaction(
        &self,
        transaction: VersionedTransaction,
    ) -> Result<VersionedTransaction, SignError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SignError::Wallet("device disconnected".to_string()));
        }
        self.inner.sign_transaction(transaction).await
    }
}
