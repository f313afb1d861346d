use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use anyhow::bail;
use anyhow::Context;
use async_trait::async_trait;

use crate::application::collaborators::Chain;
use crate::application::collaborators::Mempool;
use crate::application::collaborators::TemplateBuilder;
use crate::application::collaborators::WalletManager;
use crate::protocol::consensus::block::block_commitment::BlockCommitment;
use crate::protocol::consensus::block::block_header::BlockHeader;
use crate::protocol::consensus::block::block_header::Nonce;
use crate::protocol::consensus::block::block_header::BLOCK_HEADER_VERSION;
use crate::protocol::consensus::block::block_height::BlockHeight;
use crate::protocol::consensus::block::Block;
use crate::protocol::consensus::digest::Digest;
use crate::protocol::consensus::timestamp::Timestamp;

pub const DEFAULT_MAX_BLOCK_TRANSACTIONS: usize = 1000;

/// Difficulty of regtest blocks, in leading zero bits of the block hash.
/// The regtest chain does not enforce it; the toy miner honors it.
pub const REGTEST_BITS: u64 = 8;

const TIP_READ_ATTEMPTS: usize = 8;

/// Builds candidates from a coinbase followed by the mempool's transactions
/// in mempool order.
#[derive(Debug)]
pub struct RegtestTemplateBuilder {
    max_block_transactions: usize,
    failing: AtomicBool,
}

impl RegtestTemplateBuilder {
    pub fn new(max_block_transactions: usize) -> Self {
        Self {
            max_block_transactions,
            failing: AtomicBool::new(false),
        }
    }

    /// While set, every build fails.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl Default for RegtestTemplateBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BLOCK_TRANSACTIONS)
    }
}

#[async_trait]
impl TemplateBuilder for RegtestTemplateBuilder {
    async fn build(
        &self,
        chain: &dyn Chain,
        mempool: &dyn Mempool,
        wallet: &dyn WalletManager,
    ) -> anyhow::Result<Block> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("template builder is switched to failing");
        }

        let (parent_height, prev_block_digest) = consistent_tip(chain).await?;
        let height = parent_height.next();

        let coinbase = wallet
            .coinbase_transaction(height)
            .with_context(|| format!("no coinbase for height {height}"))?;
        let mut transactions = vec![coinbase];
        transactions.extend(
            mempool.transactions_for_block(self.max_block_transactions.saturating_sub(1)),
        );

        let header = BlockHeader {
            version: BLOCK_HEADER_VERSION,
            height,
            prev_block_digest,
            timestamp: Timestamp::now(),
            nonce: Nonce::default(),
            bits: REGTEST_BITS,
            commitment: BlockCommitment::from_transactions(&transactions),
        };

        Ok(Block::new(header, transactions))
    }
}

/// Height and digest of the same tip block. The chain may grow between the
/// two queries; a digest read between two equal heights belongs to that
/// height.
async fn consistent_tip(chain: &dyn Chain) -> anyhow::Result<(BlockHeight, Digest)> {
    for _ in 0..TIP_READ_ATTEMPTS {
        let height = chain.best_height().await;
        let digest = chain.tip_digest().await;
        if chain.best_height().await == height {
            return Ok((height, digest));
        }
    }
    bail!("chain tip kept moving while reading it {TIP_READ_ATTEMPTS} times")
}
