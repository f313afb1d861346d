//! The handle miners talk to: [`MiningPool::get_work`] and
//! [`MiningPool::submit_work`].
//!
//! Starting a pool spawns the work loop, which owns every write to the
//! candidate store. `get_work` reads the store directly under a shared lock;
//! `submit_work` hands the solution to the work loop through a bounded
//! mailbox and waits for the verdict.

pub mod errors;

use std::future::Future;
use std::time::Duration;

use errors::GetWorkError;
use errors::StopPoolError;
use errors::SubmitStage;
use errors::SubmitWorkError;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::application::collaborators::Collaborators;
use crate::application::config::mining_pool_config::MiningPoolConfig;
use crate::application::locks::tokio::AtomicRw;
use crate::application::loops::channel::SubmitWorkRequest;
use crate::application::loops::channel::SubmitWorkSender;
use crate::application::loops::work_loop::RegenerationReason;
use crate::application::loops::work_loop::WorkLoop;
use crate::protocol::consensus::block::block_header::BlockHeader;
use crate::protocol::consensus::timestamp::Timestamp;
use crate::state::mining::candidate_store::CandidateStore;
use crate::state::mining::candidate_store::MiningPoolStats;

/// A running work coordinator.
///
/// # Examples
/// ```
/// # use mining_pool::application::mining_pool::MiningPool;
/// # use mining_pool::application::regtest::RegtestNode;
/// # tokio_test::block_on(async {
/// let node = RegtestNode::default();
/// let _announcements = node.event_bus.subscribe();
/// let pool = MiningPool::start(node.collaborators(), Default::default()).await;
///
/// let work = pool.get_work().await.unwrap();
/// // ... search for a nonce ...
/// pool.submit_work(work).await.unwrap();
///
/// assert_eq!(1, node.chain.height_now().value());
/// pool.stop().await.unwrap();
/// # })
/// ```
#[derive(Debug)]
pub struct MiningPool {
    store: AtomicRw<CandidateStore>,
    submit_tx: SubmitWorkSender,
    tx_stop: watch::Sender<()>,
    config: MiningPoolConfig,
    work_loop_task_handle: Option<JoinHandle<()>>,
}

// we implement Drop so we can send stop message to the work loop
impl Drop for MiningPool {
    fn drop(&mut self) {
        tracing::debug!("in MiningPool::drop()");

        if !self.tx_stop.is_closed() {
            if let Err(e) = self.tx_stop.send(()) {
                tracing::error!("{}", e);
            }
        }
    }
}

impl MiningPool {
    /// Build the first candidate and spawn the work loop.
    ///
    /// If the first build fails the pool still starts; `get_work` reports
    /// [`GetWorkError::WorkUnavailable`] until a later regeneration succeeds.
    pub async fn start(collaborators: Collaborators, config: MiningPoolConfig) -> Self {
        let store = AtomicRw::new(
            CandidateStore::new(),
            "CandidateStore",
            Some(crate::LOG_TOKIO_LOCK_EVENT_CB),
        );

        let mut work_loop = WorkLoop::new(collaborators, store.clone(), config);
        work_loop.regenerate(RegenerationReason::Startup).await;

        let (submit_tx, submit_rx) = mpsc::channel(config.submit_queue_capacity.max(1));
        let (tx_stop, rx_stop) = watch::channel(());

        let work_loop_task_handle = tokio::spawn(work_loop.run(submit_rx, rx_stop));

        tracing::info!(
            recommit_interval = ?config.recommit_interval,
            queue_capacity = config.submit_queue_capacity,
            "mining pool started"
        );

        Self {
            store,
            submit_tx,
            tx_stop,
            config,
            work_loop_task_handle: Some(work_loop_task_handle),
        }
    }

    /// Stop the work loop and wait for it to finish.
    ///
    /// Solutions still waiting in the mailbox are answered with
    /// [`SubmitWorkError::CoordinatorStopped`].
    pub async fn stop(mut self) -> Result<(), StopPoolError> {
        tracing::info!("MiningPool: stopping.");

        self.tx_stop.send(())?;

        if let Some(jh) = self.work_loop_task_handle.take() {
            jh.await?;
        }

        Ok(())
    }

    /// The current work unit: a copy of the candidate's header stamped with
    /// the current time.
    pub async fn get_work(&self) -> Result<BlockHeader, GetWorkError> {
        let mut header = self
            .store
            .lock(CandidateStore::work)
            .await
            .ok_or(GetWorkError::WorkUnavailable)?;

        header.timestamp = Timestamp::now();
        Ok(header)
    }

    /// Submit a solution and wait for the verdict.
    ///
    /// Waits while the mailbox is full, bounded by
    /// [`MiningPoolConfig::submit_enqueue_timeout`], and for the verdict,
    /// bounded by [`MiningPoolConfig::submit_reply_timeout`].
    pub async fn submit_work(&self, header: BlockHeader) -> Result<(), SubmitWorkError> {
        self.submit_work_cancellable(header, &CancellationToken::new())
            .await
    }

    /// Like [`Self::submit_work`], but gives up with
    /// [`SubmitWorkError::Cancelled`] as soon as `cancel` fires.
    ///
    /// A solution that already reached the mailbox is dropped unprocessed
    /// if the work loop has not started on it yet, and otherwise processed
    /// without anyone hearing the verdict.
    pub async fn submit_work_cancellable(
        &self,
        header: BlockHeader,
        cancel: &CancellationToken,
    ) -> Result<(), SubmitWorkError> {
        let (request, reply_rx) = SubmitWorkRequest::new(header);

        bounded_wait(
            SubmitStage::Enqueue,
            self.config.submit_enqueue_timeout,
            cancel,
            self.submit_tx.send(request),
        )
        .await?
        .map_err(|_| SubmitWorkError::CoordinatorStopped)?;

        bounded_wait(
            SubmitStage::Reply,
            self.config.submit_reply_timeout,
            cancel,
            reply_rx,
        )
        .await?
        .map_err(|_| SubmitWorkError::CoordinatorStopped)?
    }

    pub async fn stats(&self) -> MiningPoolStats {
        self.store.lock(CandidateStore::stats).await
    }

    pub fn config(&self) -> &MiningPoolConfig {
        &self.config
    }
}

/// Await `future` unless `cancel` fires or `limit` elapses first.
async fn bounded_wait<F: Future>(
    stage: SubmitStage,
    limit: Option<Duration>,
    cancel: &CancellationToken,
    future: F,
) -> Result<F::Output, SubmitWorkError> {
    let limited = async {
        match limit {
            Some(after) => time::timeout(after, future)
                .await
                .map_err(|_| SubmitWorkError::Timeout { stage, after }),
            None => Ok(future.await),
        }
    };

    tokio::select! {
        biased;

        () = cancel.cancelled() => Err(SubmitWorkError::Cancelled),
        output = limited => output,
    }
}
