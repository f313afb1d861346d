//! Contracts of the node components the work coordinator depends on but does
//! not implement: the chain, the mempool, the wallet, the block template
//! builder and the event bus.
//!
//! All are held as `Arc<dyn ...>` so that a node can plug in its own
//! implementations. [`crate::application::regtest`] provides in-memory ones.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::protocol::consensus::block::block_height::BlockHeight;
use crate::protocol::consensus::block::Block;
use crate::protocol::consensus::digest::Digest;
use crate::protocol::consensus::transaction::Transaction;

/// Result of handing a fully assembled block to the chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub enum CommitOutcome {
    /// The block is valid and is now the tip of the best chain.
    Accepted,

    /// The block is valid but does not extend the best chain.
    Orphan,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ChainError {
    #[error("invalid block: {0}")]
    InvalidBlock(String),

    #[error("chain storage failure: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum EventBusError {
    #[error("event bus is closed")]
    Closed,

    #[error("no subscriber received the event")]
    NoSubscribers,
}

/// Announces a locally produced block that the chain accepted.
#[derive(Clone, Debug)]
pub struct MinedBlockEvent {
    pub block: Box<Block>,
}

#[async_trait]
pub trait Chain: Send + Sync {
    async fn best_height(&self) -> BlockHeight;

    async fn tip_digest(&self) -> Digest;

    /// Resolves once the chain height is at least `height`.
    ///
    /// Resolves at most once per call; the caller must call again to wait for
    /// a subsequent height.
    async fn wait_for_height(&self, height: BlockHeight);

    /// Fully validate the block (including proof-of-work) and, if accepted,
    /// store it and advance the best height.
    async fn commit(&self, block: Block) -> Result<CommitOutcome, ChainError>;
}

pub trait Mempool: Send + Sync {
    /// Up to `max` transactions, in the order they should appear in a block.
    fn transactions_for_block(&self, max: usize) -> Vec<Transaction>;
}

pub trait WalletManager: Send + Sync {
    /// The transaction paying the reward of a block at `height` to this node.
    fn coinbase_transaction(&self, height: BlockHeight) -> anyhow::Result<Transaction>;
}

/// Builds a candidate block on top of the current tip.
///
/// Must not have side effects on the work coordinator's state.
#[async_trait]
pub trait TemplateBuilder: Send + Sync {
    async fn build(
        &self,
        chain: &dyn Chain,
        mempool: &dyn Mempool,
        wallet: &dyn WalletManager,
    ) -> anyhow::Result<Block>;
}

pub trait EventBus: Send + Sync {
    fn publish(&self, event: MinedBlockEvent) -> Result<(), EventBusError>;
}

/// The set of collaborators a [`MiningPool`](crate::application::mining_pool::MiningPool)
/// is started with.
#[derive(Clone)]
pub struct Collaborators {
    pub chain: Arc<dyn Chain>,
    pub mempool: Arc<dyn Mempool>,
    pub wallet: Arc<dyn WalletManager>,
    pub template_builder: Arc<dyn TemplateBuilder>,
    pub event_bus: Arc<dyn EventBus>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("chain", &"Arc<dyn Chain>")
            .field("mempool", &"Arc<dyn Mempool>")
            .field("wallet", &"Arc<dyn WalletManager>")
            .field("template_builder", &"Arc<dyn TemplateBuilder>")
            .field("event_bus", &"Arc<dyn EventBus>")
            .finish()
    }
}
