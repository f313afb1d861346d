use std::sync::Arc;

use async_trait::async_trait;
use mining_pool::application::collaborators::Chain;
use mining_pool::application::collaborators::ChainError;
use mining_pool::application::collaborators::CommitOutcome;
use mining_pool::application::regtest::chain::RegtestChain;
use mining_pool::protocol::consensus::block::block_height::BlockHeight;
use mining_pool::protocol::consensus::block::Block;
use mining_pool::protocol::consensus::digest::Digest;
use tokio::sync::Notify;
use tokio::sync::Semaphore;

/// A [`RegtestChain`] whose `commit` blocks until the test opens the gate.
///
/// Lets a test hold the work loop inside a submission to fill up the
/// mailbox or run into timeouts.
#[derive(Debug)]
pub struct GatedChain {
    pub inner: Arc<RegtestChain>,
    gate: Semaphore,
    entered: Notify,
}

impl GatedChain {
    pub fn new(inner: Arc<RegtestChain>) -> Self {
        Self {
            inner,
            gate: Semaphore::new(0),
            entered: Notify::new(),
        }
    }

    /// Resolves once a commit is waiting at the gate.
    pub async fn commit_entered(&self) {
        self.entered.notified().await;
    }

    /// Let `n` commits through.
    pub fn open(&self, n: usize) {
        self.gate.add_permits(n);
    }
}

#[async_trait]
impl Chain for GatedChain {
    async fn best_height(&self) -> BlockHeight {
        self.inner.best_height().await
    }

    async fn tip_digest(&self) -> Digest {
        self.inner.tip_digest().await
    }

    async fn wait_for_height(&self, height: BlockHeight) {
        self.inner.wait_for_height(height).await
    }

    async fn commit(&self, block: Block) -> Result<CommitOutcome, ChainError> {
        self.entered.notify_one();
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| ChainError::Storage(e.to_string()))?;
        permit.forget();
        self.inner.commit(block).await
    }
}
