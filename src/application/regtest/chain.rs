use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::debug;

use super::mempool::RegtestMempool;
use crate::application::collaborators::Chain;
use crate::application::collaborators::ChainError;
use crate::application::collaborators::CommitOutcome;
use crate::protocol::consensus::block::block_commitment::BlockCommitment;
use crate::protocol::consensus::block::block_header::BlockHeader;
use crate::protocol::consensus::block::block_header::Nonce;
use crate::protocol::consensus::block::block_header::BLOCK_HEADER_VERSION;
use crate::protocol::consensus::block::block_height::BlockHeight;
use crate::protocol::consensus::block::Block;
use crate::protocol::consensus::digest::Digest;
use crate::protocol::consensus::timestamp::Timestamp;
use crate::protocol::consensus::transaction::Transaction;

/// How [`RegtestChain::commit`](Chain::commit) treats blocks that pass the
/// structural checks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CommitPolicy {
    #[default]
    Validate,

    /// Refuse every block with [`ChainError::InvalidBlock`] carrying the
    /// given reason.
    Reject(String),

    /// Report every block as an orphan.
    Orphan,
}

#[derive(Debug)]
struct ChainState {
    blocks: Vec<Block>,
    policy: CommitPolicy,
}

/// A linear chain kept in memory, starting from [`Block::genesis`].
///
/// Proof-of-work is not checked. A block is accepted when its commitment
/// matches its transactions and it extends the tip.
#[derive(Debug)]
pub struct RegtestChain {
    state: Mutex<ChainState>,
    height_tx: watch::Sender<BlockHeight>,

    /// Transactions of committed blocks are removed from here.
    mempool: Option<Arc<RegtestMempool>>,
}

impl Default for RegtestChain {
    fn default() -> Self {
        Self::new()
    }
}

impl RegtestChain {
    pub fn new() -> Self {
        let genesis = Block::genesis();
        let (height_tx, _) = watch::channel(genesis.height());
        Self {
            state: Mutex::new(ChainState {
                blocks: vec![genesis],
                policy: CommitPolicy::default(),
            }),
            height_tx,
            mempool: None,
        }
    }

    /// A chain that prunes `mempool` of the transactions it commits.
    pub fn with_mempool(mempool: Arc<RegtestMempool>) -> Self {
        Self {
            mempool: Some(mempool),
            ..Self::new()
        }
    }

    pub fn set_commit_policy(&self, policy: CommitPolicy) {
        self.lock_state().policy = policy;
    }

    pub fn tip(&self) -> Block {
        self.lock_state()
            .blocks
            .last()
            .cloned()
            .unwrap_or_else(Block::genesis)
    }

    pub fn height_now(&self) -> BlockHeight {
        *self.height_tx.borrow()
    }

    pub fn blocks(&self) -> Vec<Block> {
        self.lock_state().blocks.clone()
    }

    /// Append a block found elsewhere on the network, bypassing the commit
    /// policy.
    pub fn extend_external(&self) -> Block {
        let mut state = self.lock_state();
        let tip = state.blocks.last().cloned().unwrap_or_else(Block::genesis);
        let height = tip.height().next();
        let transactions = vec![Transaction::coinbase(height, Digest::hash(b"someone else"))];
        let header = BlockHeader {
            version: BLOCK_HEADER_VERSION,
            height,
            prev_block_digest: tip.hash(),
            timestamp: Timestamp::now(),
            nonce: Nonce::default(),
            bits: tip.header().bits,
            commitment: BlockCommitment::from_transactions(&transactions),
        };
        let block = Block::new(header, transactions);

        state.blocks.push(block.clone());
        drop(state);

        debug!(%height, "regtest chain extended by external block");
        self.height_tx.send_replace(height);
        block
    }

    fn lock_state(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn validate(state: &ChainState, block: &Block) -> Result<CommitOutcome, ChainError> {
        if !block.has_matching_commitment() {
            return Err(ChainError::InvalidBlock(format!(
                "commitment {} does not match the block's transactions",
                block.header().commitment
            )));
        }

        let Some(tip) = state.blocks.last() else {
            return Err(ChainError::Storage("chain has no genesis block".to_string()));
        };
        if block.header().prev_block_digest != tip.hash() {
            return Ok(CommitOutcome::Orphan);
        }
        if block.height() != tip.height().next() {
            return Err(ChainError::InvalidBlock(format!(
                "height {} does not follow tip height {}",
                block.height(),
                tip.height()
            )));
        }

        match &state.policy {
            CommitPolicy::Validate => Ok(CommitOutcome::Accepted),
            CommitPolicy::Reject(reason) => Err(ChainError::InvalidBlock(reason.clone())),
            CommitPolicy::Orphan => Ok(CommitOutcome::Orphan),
        }
    }
}

#[async_trait]
impl Chain for RegtestChain {
    async fn best_height(&self) -> BlockHeight {
        self.tip().height()
    }

    async fn tip_digest(&self) -> Digest {
        self.tip().hash()
    }

    async fn wait_for_height(&self, height: BlockHeight) {
        let mut rx = self.height_tx.subscribe();
        if rx.wait_for(|h| *h >= height).await.is_err() {
            // sender lives as long as self
            std::future::pending::<()>().await;
        }
    }

    async fn commit(&self, block: Block) -> Result<CommitOutcome, ChainError> {
        let mut state = self.lock_state();
        let outcome = Self::validate(&state, &block)?;
        if outcome == CommitOutcome::Orphan {
            return Ok(outcome);
        }

        let height = block.height();
        if let Some(mempool) = &self.mempool {
            mempool.remove_included(block.transactions());
        }
        state.blocks.push(block);
        drop(state);

        self.height_tx.send_replace(height);
        Ok(CommitOutcome::Accepted)
    }
}
