use std::sync::Arc;
use std::time::Duration;

use mining_pool::application::collaborators::Collaborators;
use mining_pool::application::config::mining_pool_config::MiningPoolConfig;
use mining_pool::application::mining_pool::MiningPool;
use mining_pool::application::regtest::RegtestNode;
use mining_pool::state::mining::candidate_store::MiningPoolStats;

use super::gated_chain::GatedChain;

pub struct PoolNode;

impl PoolNode {
    pub async fn start(config: MiningPoolConfig) -> (RegtestNode, MiningPool) {
        let node = RegtestNode::new(100);
        let pool = MiningPool::start(node.collaborators(), config).await;
        (node, pool)
    }

    /// Like [`Self::start`], with commits held at a gate.
    pub async fn start_gated(
        config: MiningPoolConfig,
    ) -> (RegtestNode, Arc<GatedChain>, MiningPool) {
        let node = RegtestNode::new(100);
        let gated = Arc::new(GatedChain::new(node.chain.clone()));
        let collaborators = Collaborators {
            chain: gated.clone(),
            ..node.collaborators()
        };
        let pool = MiningPool::start(collaborators, config).await;
        (node, gated, pool)
    }

    /// Poll the pool's stats until `done` holds, for at most five seconds.
    pub async fn wait_for_stats(
        pool: &MiningPool,
        done: impl Fn(&MiningPoolStats) -> bool,
    ) -> MiningPoolStats {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let stats = pool.stats().await;
                if done(&stats) {
                    return stats;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("pool stats did not reach the expected state in time")
    }
}
