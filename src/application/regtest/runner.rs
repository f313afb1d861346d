use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use futures::future::join_all;
use itertools::Itertools;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing::warn;

use super::miner::mine;
use super::miner::MinerReport;
use super::RegtestNode;
use crate::application::collaborators::MinedBlockEvent;
use crate::application::mining_pool::MiningPool;

/// Time each toy miner rests after a block of its own is accepted.
const MINER_PAUSE: Duration = Duration::from_secs(1);

/// A started regtest node with its mining pool and toy miners.
#[derive(Debug)]
pub struct RegtestRunner {
    pub(crate) node: RegtestNode,
    pub(crate) pool: Arc<MiningPool>,
    pub(crate) miners: Vec<JoinHandle<MinerReport>>,
    pub(crate) announcer: JoinHandle<()>,
    pub(crate) cancel: CancellationToken,
    pub(crate) run_for: Option<Duration>,
}

impl RegtestRunner {
    pub(crate) fn spawn_miners(
        pool: &Arc<MiningPool>,
        count: usize,
        cancel: &CancellationToken,
    ) -> Vec<JoinHandle<MinerReport>> {
        (0..count)
            .map(|miner_id| {
                tokio::spawn(mine(pool.clone(), miner_id, MINER_PAUSE, cancel.clone()))
            })
            .collect()
    }

    /// Log every announced block until the bus closes or `cancel` fires.
    pub(crate) fn spawn_announcer(
        mut rx: broadcast::Receiver<MinedBlockEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    () = cancel.cancelled() => break,
                    event = rx.recv() => event,
                };
                match event {
                    Ok(MinedBlockEvent { block }) => {
                        let header = serde_json::to_string(block.header())
                            .unwrap_or_else(|e| format!("<unserializable header: {e}>"));
                        info!(transactions = block.transactions().len(), "block mined: {header}");
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("block announcer missed {n} events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Mine until ctrl-c or until the configured run time is over, then shut
    /// everything down. Returns the process exit code.
    pub async fn run(self) -> anyhow::Result<i32> {
        match self.run_for {
            Some(limit) => {
                tokio::select! {
                    () = tokio::time::sleep(limit) => info!(?limit, "run time over"),
                    signal = tokio::signal::ctrl_c() => signal.context("listening for ctrl-c")?,
                }
            }
            None => tokio::signal::ctrl_c()
                .await
                .context("listening for ctrl-c")?,
        }

        info!("shutting down");
        self.cancel.cancel();

        let reports = join_all(self.miners)
            .await
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .context("miner task failed")?;
        info!(
            "miner reports (accepted/rejected): {}",
            reports
                .iter()
                .enumerate()
                .map(|(id, r)| format!("#{id}: {}/{}", r.accepted, r.rejected))
                .join(", ")
        );
        let total = reports
            .iter()
            .fold(MinerReport::default(), |total, r| MinerReport {
                accepted: total.accepted + r.accepted,
                rejected: total.rejected + r.rejected,
            });
        self.announcer.await.context("announcer task failed")?;

        let stats = self.pool.stats().await;
        info!(
            height = %self.node.chain.height_now(),
            accepted = total.accepted,
            rejected = total.rejected,
            "pool statistics: {}",
            serde_json::to_string(&stats)?
        );

        match Arc::try_unwrap(self.pool) {
            Ok(pool) => pool.stop().await?,
            Err(_) => warn!("mining pool still shared at shutdown; dropping it"),
        }

        Ok(0)
    }
}
