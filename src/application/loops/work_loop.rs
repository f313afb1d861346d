use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::channel::SubmitWorkReceiver;
use super::channel::SubmitWorkRequest;
use crate::application::collaborators::Collaborators;
use crate::application::collaborators::CommitOutcome;
use crate::application::collaborators::MinedBlockEvent;
use crate::application::config::mining_pool_config::MiningPoolConfig;
use crate::application::locks::tokio::AtomicRw;
use crate::application::mining_pool::errors::SubmitWorkError;
use crate::protocol::consensus::block::block_header::BlockHeader;
use crate::protocol::consensus::block::block_height::BlockHeight;
use crate::state::mining::candidate_store::CandidateStore;

/// Lower bound for the recommit period. `tokio::time::interval` panics on a
/// zero period.
const MIN_RECOMMIT_INTERVAL: Duration = Duration::from_millis(1);

/// What caused a new candidate to be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub(crate) enum RegenerationReason {
    Startup,

    /// Recommit timer fired. Keeps the current epoch so that solutions for
    /// earlier templates of the same height stay acceptable.
    Timer,

    /// The chain grew past the height we were building on.
    NewHeight,

    /// One of our candidates was committed.
    BlockSubmitted,
}

impl RegenerationReason {
    pub(crate) fn starts_epoch(self) -> bool {
        !matches!(self, Self::Timer)
    }
}

enum WorkLoopEvent {
    Stop,
    Recommit,
    NewHeight,
    Submission(Option<SubmitWorkRequest>),
}

/// The single writer of the candidate store.
///
/// Timer ticks, chain growth and miner submissions are all handled here, one
/// at a time, so a regeneration never interleaves with a submission.
pub(crate) struct WorkLoop {
    collaborators: Collaborators,
    store: AtomicRw<CandidateStore>,
    config: MiningPoolConfig,

    /// Chain height the current candidate builds on.
    best_height: BlockHeight,
}

impl WorkLoop {
    pub(crate) fn new(
        collaborators: Collaborators,
        store: AtomicRw<CandidateStore>,
        config: MiningPoolConfig,
    ) -> Self {
        Self {
            collaborators,
            store,
            config,
            best_height: BlockHeight::genesis(),
        }
    }

    /// Build a new candidate and install it.
    ///
    /// The template is built without holding the lock; starting a new epoch
    /// and installing happen under a single write lock. When the builder
    /// fails the previous candidate stays current.
    pub(crate) async fn regenerate(&mut self, reason: RegenerationReason) {
        let chain = self.collaborators.chain.clone();
        self.best_height = chain.best_height().await;

        let started = Instant::now();
        let built = self
            .collaborators
            .template_builder
            .build(
                chain.as_ref(),
                self.collaborators.mempool.as_ref(),
                self.collaborators.wallet.as_ref(),
            )
            .await;

        let starts_epoch = reason.starts_epoch();
        let (epoch, installed) = self
            .store
            .lock_mut(|store| {
                if starts_epoch {
                    store.start_epoch();
                }
                let installed = match built {
                    Ok(block) => {
                        let header = *block.header();
                        store.install(block);
                        Ok(header)
                    }
                    Err(e) => {
                        store.record_generation_failure();
                        Err(e)
                    }
                };
                (store.epoch(), installed)
            })
            .await;

        match installed {
            Ok(header) => debug!(
                %reason,
                epoch,
                height = %header.height,
                commitment = %header.commitment,
                elapsed = ?started.elapsed(),
                "installed new mining candidate"
            ),
            Err(e) => warn!(
                %reason,
                epoch,
                "failed to build block template, keeping previous candidate: {e:#}"
            ),
        }
    }

    /// Validate a solution, commit the block it designates and announce it.
    pub(crate) async fn handle_submission(
        &self,
        solution: &BlockHeader,
    ) -> Result<(), SubmitWorkError> {
        let block = self
            .store
            .lock(|store| store.assemble_solution(solution))
            .await?;
        let height = block.height();
        let hash = block.hash();

        match self.collaborators.chain.commit(block.clone()).await? {
            CommitOutcome::Accepted => {}
            CommitOutcome::Orphan => return Err(SubmitWorkError::Orphan),
        }
        info!(%height, hash = %hash, nonce = %solution.nonce, "mined block committed to chain");

        self.collaborators
            .event_bus
            .publish(MinedBlockEvent {
                block: Box::new(block),
            })
            .map_err(SubmitWorkError::EventPublishFailed)
    }

    /// Handle one mailbox entry and reply to its sender. Returns true when a
    /// block was committed, in which case a new epoch has already begun.
    pub(crate) async fn process_request(&mut self, request: SubmitWorkRequest) -> bool {
        if request.is_abandoned() {
            debug!(
                commitment = %request.header.commitment,
                "submitter went away before its solution was processed; skipping"
            );
            return false;
        }

        let outcome = self.handle_submission(&request.header).await;
        let committed = match &outcome {
            Ok(()) => true,
            Err(e) => e.block_committed(),
        };

        if let Err(e) = &outcome {
            debug!(commitment = %request.header.commitment, "submission not accepted: {e}");
        }

        if committed {
            self.regenerate(RegenerationReason::BlockSubmitted).await;
        }
        self.store
            .lock_mut(|store| store.record_submission(committed))
            .await;

        if request.reply.send(outcome).is_err() {
            warn!("submitter dropped before receiving the verdict on its solution");
        }

        committed
    }

    /// Serve until a stop signal arrives or every submission sender is gone.
    pub(crate) async fn run(
        mut self,
        mut submit_rx: SubmitWorkReceiver,
        mut rx_stop: watch::Receiver<()>,
    ) {
        let period = if self.config.recommit_interval.is_zero() {
            warn!("recommit interval of zero requested, using {MIN_RECOMMIT_INTERVAL:?}");
            MIN_RECOMMIT_INTERVAL
        } else {
            self.config.recommit_interval
        };
        let mut recommit = time::interval_at(Instant::now() + period, period);
        recommit.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let chain = self.collaborators.chain.clone();

        debug!(?period, "work loop started");
        loop {
            let next_height = self.best_height.next();

            // a fresh wait is armed on every iteration, for the height after
            // the one the current candidate builds on
            let event = tokio::select! {
                biased;

                _ = rx_stop.changed() => WorkLoopEvent::Stop,
                () = chain.wait_for_height(next_height) => WorkLoopEvent::NewHeight,
                request = submit_rx.recv() => WorkLoopEvent::Submission(request),
                _ = recommit.tick() => WorkLoopEvent::Recommit,
            };

            match event {
                WorkLoopEvent::Stop => {
                    debug!("work loop received stop signal");
                    break;
                }
                WorkLoopEvent::Recommit => {
                    self.regenerate(RegenerationReason::Timer).await;
                }
                WorkLoopEvent::NewHeight => {
                    self.regenerate(RegenerationReason::NewHeight).await;
                    recommit.reset();
                }
                WorkLoopEvent::Submission(Some(request)) => {
                    if self.process_request(request).await {
                        recommit.reset();
                    }
                }
                WorkLoopEvent::Submission(None) => {
                    debug!("all submission senders dropped");
                    break;
                }
            }
        }
        debug!("work loop exiting");
    }
}
