use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use dashmap::DashMap;
use solana_address_lookup_table_interface::state::AddressLookupTable;
use solana_sdk::account::Account;
use solana_sdk::message::AddressLookupTableAccount;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, warn};

use crate::rpc::LedgerRpc;

const ALT_BATCH_LIMIT: usize = 100;

/// 地址查找表缓存，编译消息时按配置顺序提供已解码的 ALT。
#[derive(Clone)]
pub struct AltCache {
    rpc: Arc<dyn LedgerRpc>,
    entries: Arc<DashMap<Pubkey, AddressLookupTableAccount>>,
}

impl AltCache {
    pub fn new(rpc: Arc<dyn LedgerRpc>) -> Self {
        Self {
            rpc,
            entries: Arc::new(DashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按 `keys` 顺序返回查找表，命中缓存直接返回，未命中则通过 RPC 拉取。
    /// 账户不存在或解码失败的表被跳过，不会让整批失败。
    pub async fn fetch_many(&self, keys: &[Pubkey]) -> Result<Vec<AddressLookupTableAccount>> {
        let missing: Vec<Pubkey> = keys
            .iter()
            .filter(|key| !self.entries.contains_key(*key))
            .copied()
            .collect();
        if !missing.is_empty() {
            self.refresh_many(&missing).await?;
        }

        Ok(keys
            .iter()
            .filter_map(|key| self.entries.get(key).map(|entry| entry.value().clone()))
            .collect())
    }

    /// 忽略缓存强制刷新一批 ALT。
    pub async fn refresh_many(&self, keys: &[Pubkey]) -> Result<Vec<AddressLookupTableAccount>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut collected = Vec::new();
        for chunk in keys.chunks(ALT_BATCH_LIMIT) {
            let accounts = self
                .rpc
                .multiple_accounts(chunk)
                .await
                .map_err(|err| anyhow!(err))
                .with_context(|| format!("批量拉取 ALT 失败: {} 个地址", chunk.len()))?;

            for (address, maybe_account) in chunk.iter().zip(accounts) {
                match maybe_account {
                    Some(account) => {
                        if let Some(table) = self.decode_and_store(address, account) {
                            collected.push(table);
                        }
                    }
                    None => {
                        warn!(
                            target: "cache::alt",
                            address = %address,
                            "批量拉取 ALT 返回空账户"
                        );
                        self.entries.remove(address);
                    }
                }
            }
        }

        debug!(
            target: "cache::alt",
            requested = keys.len(),
            loaded = collected.len(),
            "ALT refreshed"
        );
        Ok(collected)
    }

    fn decode_and_store(
        &self,
        address: &Pubkey,
        account: Account,
    ) -> Option<AddressLookupTableAccount> {
        match deserialize_lookup_table(address, account) {
            Ok(table) => {
                self.entries.insert(table.key, table.clone());
                Some(table)
            }
            Err(err) => {
                warn!(
                    target: "cache::alt",
                    address = %address,
                    error = %err,
                    "反序列化 ALT 失败，移除缓存"
                );
                self.entries.remove(address);
                None
            }
        }
    }
}

pub fn deserialize_lookup_table(
    address: &Pubkey,
    account: Account,
) -> Result<AddressLookupTableAccount> {
    AddressLookupTable::deserialize(&account.data)
        .map(|table| AddressLookupTableAccount {
            key: *address,
            addresses: table.addresses.into_owned(),
        })
        .map_err(|err| anyhow!("{err}"))
        .with_context(|| format!("反序列化 ALT 失败: {address}"))
}
