//! A toy CPU miner for exercising a [`MiningPool`] by hand.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::application::mining_pool::errors::SubmitWorkError;
use crate::application::mining_pool::MiningPool;
use crate::protocol::consensus::block::block_header::BlockHeader;
use crate::protocol::consensus::block::block_header::Nonce;
use crate::protocol::consensus::digest::Digest;

/// Nonces tried between two checks for cancellation.
const NONCES_PER_BATCH: u64 = 4096;

const WORK_UNAVAILABLE_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MinerReport {
    pub accepted: u64,
    pub rejected: u64,
}

pub fn leading_zero_bits(digest: &Digest) -> u32 {
    let mut bits = 0;
    for byte in digest.as_bytes() {
        bits += byte.leading_zeros();
        if *byte != 0 {
            break;
        }
    }
    bits
}

/// Whether the header's hash has at least `bits` leading zero bits.
pub fn meets_target(header: &BlockHeader) -> bool {
    u64::from(leading_zero_bits(&header.hash())) >= header.bits
}

/// Try `attempts` consecutive nonces starting at `start`.
pub fn search_nonce(mut header: BlockHeader, start: u64, attempts: u64) -> Option<BlockHeader> {
    for i in 0..attempts {
        header.nonce = Nonce(start.wrapping_add(i));
        if meets_target(&header) {
            return Some(header);
        }
    }
    None
}

/// Fetch work, search for a nonce, submit, repeat; until `cancel` fires.
///
/// Sleeps for `pause` after every accepted block.
pub async fn mine(
    pool: Arc<MiningPool>,
    miner_id: usize,
    pause: Duration,
    cancel: CancellationToken,
) -> MinerReport {
    let mut report = MinerReport::default();

    while !cancel.is_cancelled() {
        let work = match pool.get_work().await {
            Ok(work) => work,
            Err(e) => {
                debug!(miner_id, "{e}; backing off");
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(WORK_UNAVAILABLE_BACKOFF) => continue,
                }
            }
        };

        // hashing is cpu-bound; keep it off the async executor
        let start = rand::rng().random::<u64>();
        let batch =
            tokio::task::spawn_blocking(move || search_nonce(work, start, NONCES_PER_BATCH)).await;
        let solution = match batch {
            Ok(Some(solution)) => solution,
            Ok(None) => continue,
            Err(e) => {
                warn!(miner_id, "nonce search task failed: {e}");
                break;
            }
        };

        match pool.submit_work_cancellable(solution, &cancel).await {
            Ok(()) => {
                report.accepted += 1;
                info!(miner_id, height = %solution.height, nonce = %solution.nonce, "solution accepted");
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(pause) => {}
                }
            }
            Err(SubmitWorkError::Cancelled) => break,
            Err(
                e @ (SubmitWorkError::StaleWork { .. } | SubmitWorkError::UnknownCommitment(_)),
            ) => {
                report.rejected += 1;
                debug!(miner_id, "solution came too late: {e}");
            }
            Err(e) => {
                report.rejected += 1;
                warn!(miner_id, "solution not accepted: {e}");
            }
        }
    }

    debug!(miner_id, ?report, "miner stopped");
    report
}
