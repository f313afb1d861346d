//! In-memory implementations of every collaborator of a
//! [`MiningPool`](crate::application::mining_pool::MiningPool), for tests and
//! the `mining-pool` binary.

pub mod chain;
pub mod event_bus;
pub mod mempool;
pub mod miner;
pub mod runner;
pub mod template_builder;
pub mod wallet;

use std::sync::Arc;

use chain::RegtestChain;
use event_bus::RegtestEventBus;
use mempool::RegtestMempool;
use template_builder::RegtestTemplateBuilder;
use template_builder::DEFAULT_MAX_BLOCK_TRANSACTIONS;
use wallet::RegtestWallet;

use super::collaborators::Collaborators;

/// One regtest node: a chain that prunes its mempool on commit, plus wallet,
/// template builder and event bus.
#[derive(Debug, Clone)]
pub struct RegtestNode {
    pub chain: Arc<RegtestChain>,
    pub mempool: Arc<RegtestMempool>,
    pub wallet: Arc<RegtestWallet>,
    pub template_builder: Arc<RegtestTemplateBuilder>,
    pub event_bus: Arc<RegtestEventBus>,
}

impl RegtestNode {
    pub fn new(max_block_transactions: usize) -> Self {
        let mempool = Arc::new(RegtestMempool::new());
        Self {
            chain: Arc::new(RegtestChain::with_mempool(mempool.clone())),
            mempool,
            wallet: Arc::new(RegtestWallet::default()),
            template_builder: Arc::new(RegtestTemplateBuilder::new(max_block_transactions)),
            event_bus: Arc::new(RegtestEventBus::default()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            chain: self.chain.clone(),
            mempool: self.mempool.clone(),
            wallet: self.wallet.clone(),
            template_builder: self.template_builder.clone(),
            event_bus: self.event_bus.clone(),
        }
    }

    pub fn add_mempool_transactions(&self, count: usize) {
        self.mempool.fill_random(count);
    }
}

impl Default for RegtestNode {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BLOCK_TRANSACTIONS)
    }
}
