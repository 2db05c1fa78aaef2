use std::sync::Arc;

use solana_commitment_config::CommitmentConfig;
use tracing::debug;

use super::{BlockhashSnapshot, LedgerRpc, RpcFailure};

#[derive(Clone)]
pub struct BlockhashOracle {
    rpc: Arc<dyn LedgerRpc>,
    commitment: CommitmentConfig,
}

impl BlockhashOracle {
    pub fn new(rpc: Arc<dyn LedgerRpc>, commitment: CommitmentConfig) -> Self {
        Self { rpc, commitment }
    }

    pub fn commitment(&self) -> CommitmentConfig {
        self.commitment
    }

    /// blockhash、last_valid_block_height 与 context slot 取自同一次 RPC 往返。
    pub async fn fetch_snapshot(&self) -> Result<BlockhashSnapshot, RpcFailure> {
        let snapshot = self.rpc.latest_blockhash(self.commitment).await?;
        debug!(
            target: "rpc::blockhash",
            blockhash = %snapshot.blockhash,
            last_valid_block_height = snapshot.last_valid_block_height,
            context_slot = snapshot.context_slot,
            min_context_slot = snapshot.min_context_slot(),
            "fetched blockhash snapshot"
        );
        Ok(snapshot)
    }
}
