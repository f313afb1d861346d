mod common;

use std::sync::Arc;
use std::time::Duration;

use assert2::assert;
use assert2::let_assert;
use common::logging::tracing_logger;
use common::pool_node::PoolNode;
use mining_pool::application::collaborators::EventBusError;
use mining_pool::application::config::mining_pool_config::MiningPoolConfig;
use mining_pool::application::mining_pool::errors::GetWorkError;
use mining_pool::application::mining_pool::errors::SubmitStage;
use mining_pool::application::mining_pool::errors::SubmitWorkError;
use mining_pool::application::mining_pool::MiningPool;
use mining_pool::application::regtest::chain::CommitPolicy;
use mining_pool::application::regtest::RegtestNode;
use mining_pool::protocol::consensus::block::block_header::Nonce;
use mining_pool::protocol::consensus::block::block_height::BlockHeight;
use mining_pool::protocol::consensus::block::Block;
use mining_pool::protocol::consensus::digest::Digest;
use tokio::sync::broadcast::error::TryRecvError;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn stale_previous_block_is_refused() {
    tracing_logger();
    let (node, pool) = PoolNode::start(MiningPoolConfig::default()).await;

    let work = pool.get_work().await.unwrap();
    let mut solution = work;
    solution.prev_block_digest = Digest::hash(b"some other chain");

    let_assert!(
        Err(SubmitWorkError::StaleWork { submitted, expected }) = pool.submit_work(solution).await
    );
    assert!(submitted == solution.prev_block_digest);
    assert!(expected == work.prev_block_digest);

    let stats = pool.stats().await;
    assert!(stats.epoch == 1);
    assert!(stats.rejected_submissions == 1);
    assert!(node.chain.height_now().is_genesis());
    assert!(pool.get_work().await.unwrap().commitment == work.commitment);
}

#[tokio::test]
async fn accepted_solution_starts_new_epoch() {
    tracing_logger();
    let (node, pool) = PoolNode::start(MiningPoolConfig::default()).await;
    let mut announcements = node.event_bus.subscribe();
    let generated_before = pool.stats().await.generated;

    let mut solution = pool.get_work().await.unwrap();
    solution.nonce = Nonce(0xdead_beef);
    pool.submit_work(solution).await.unwrap();

    let tip = node.chain.tip();
    assert!(tip.height() == BlockHeight::new(1));
    assert!(tip.header().nonce == Nonce(0xdead_beef));

    // exactly one announcement
    assert!(announcements.try_recv().unwrap().block.hash() == tip.hash());
    let_assert!(Err(TryRecvError::Empty) = announcements.try_recv());

    // exactly one regeneration
    let stats = pool.stats().await;
    assert!(stats.generated == generated_before + 1);
    assert!(stats.epoch == 2);
    assert!(stats.history_len == 1);
    assert!(stats.accepted_submissions == 1);

    let next = pool.get_work().await.unwrap();
    assert!(next.prev_block_digest == tip.hash());
    assert!(next.height == BlockHeight::new(2));

    // the commitment of the previous epoch is gone
    let mut late = next;
    late.commitment = solution.commitment;
    let_assert!(Err(SubmitWorkError::UnknownCommitment(k)) = pool.submit_work(late).await);
    assert!(k == solution.commitment);
}

#[tokio::test]
async fn external_block_invalidates_previous_commitments() {
    tracing_logger();
    let (node, pool) = PoolNode::start(MiningPoolConfig::default()).await;
    let old_work = pool.get_work().await.unwrap();

    let external = node.chain.extend_external();
    PoolNode::wait_for_stats(&pool, |s| s.epoch == 2).await;

    let new_work = pool.get_work().await.unwrap();
    assert!(new_work.prev_block_digest == external.hash());
    assert!(new_work.commitment != old_work.commitment);

    let mut late = new_work;
    late.commitment = old_work.commitment;
    let_assert!(Err(SubmitWorkError::UnknownCommitment(_)) = pool.submit_work(late).await);

    let_assert!(Err(SubmitWorkError::StaleWork { .. }) = pool.submit_work(old_work).await);
    assert!(node.chain.height_now() == BlockHeight::new(1));
}

#[tokio::test(start_paused = true)]
async fn failed_regeneration_keeps_previous_work() {
    tracing_logger();
    let config = MiningPoolConfig {
        recommit_interval: Duration::from_secs(1),
        ..Default::default()
    };
    let (node, pool) = PoolNode::start(config).await;
    let before = pool.get_work().await.unwrap();

    node.template_builder.set_failing(true);
    node.add_mempool_transactions(3);
    tokio::time::sleep(Duration::from_millis(1_500)).await;

    let stats = pool.stats().await;
    assert!(stats.generation_failures == 1);
    assert!(stats.generated == 1);

    let after = pool.get_work().await.unwrap();
    assert!(after.commitment == before.commitment);
    assert!(after.prev_block_digest == before.prev_block_digest);
    assert!(after.timestamp >= before.timestamp);
}

#[tokio::test(start_paused = true)]
async fn timer_regeneration_keeps_earlier_work_valid() {
    tracing_logger();
    let config = MiningPoolConfig {
        recommit_interval: Duration::from_secs(1),
        ..Default::default()
    };
    let (node, pool) = PoolNode::start(config).await;
    let _announcements = node.event_bus.subscribe();
    let early = pool.get_work().await.unwrap();

    node.add_mempool_transactions(5);
    tokio::time::sleep(Duration::from_millis(1_500)).await;

    let late = pool.get_work().await.unwrap();
    assert!(late.commitment != early.commitment);
    assert!(pool.stats().await.history_len == 2);

    pool.submit_work(early).await.unwrap();

    let tip = node.chain.tip();
    assert!(tip.transactions().len() == 1);
    assert!(tip.header().commitment == early.commitment);
    assert!(node.mempool.len() == 5);
}

#[tokio::test]
async fn failed_announcement_still_commits() {
    tracing_logger();
    let (node, pool) = PoolNode::start(MiningPoolConfig::default()).await;

    let work = pool.get_work().await.unwrap();
    let_assert!(
        Err(e @ SubmitWorkError::EventPublishFailed(EventBusError::NoSubscribers)) =
            pool.submit_work(work).await
    );
    assert!(e.block_committed());

    assert!(node.chain.height_now() == BlockHeight::new(1));
    let stats = pool.stats().await;
    assert!(stats.epoch == 2);
    assert!(stats.accepted_submissions == 1);
    assert!(pool.get_work().await.unwrap().height == BlockHeight::new(2));
}

#[tokio::test]
async fn chain_verdicts_leave_epoch_untouched() {
    tracing_logger();
    let (node, pool) = PoolNode::start(MiningPoolConfig::default()).await;
    let work = pool.get_work().await.unwrap();

    node.chain.set_commit_policy(CommitPolicy::Orphan);
    let_assert!(Err(SubmitWorkError::Orphan) = pool.submit_work(work).await);

    node.chain
        .set_commit_policy(CommitPolicy::Reject("insufficient work".to_string()));
    let_assert!(Err(SubmitWorkError::ChainRejected(e)) = pool.submit_work(work).await);
    assert!(e.to_string().contains("insufficient work"));

    let stats = pool.stats().await;
    assert!(stats.epoch == 1);
    assert!(stats.rejected_submissions == 2);
    assert!(pool.get_work().await.unwrap().commitment == work.commitment);
}

#[tokio::test(start_paused = true)]
async fn full_mailbox_times_out() {
    tracing_logger();
    let config = MiningPoolConfig {
        submit_queue_capacity: 1,
        submit_enqueue_timeout: Some(Duration::from_millis(50)),
        submit_reply_timeout: None,
        ..Default::default()
    };
    let (node, gated, pool) = PoolNode::start_gated(config).await;
    let pool = Arc::new(pool);
    let _announcements = node.event_bus.subscribe();
    let work = pool.get_work().await.unwrap();

    // first submission holds the work loop at the gate
    let first = tokio::spawn({
        let pool = pool.clone();
        async move { pool.submit_work(work).await }
    });
    gated.commit_entered().await;

    // second one occupies the only mailbox slot
    let second = tokio::spawn({
        let pool = pool.clone();
        async move { pool.submit_work(work).await }
    });
    tokio::task::yield_now().await;

    let_assert!(
        Err(SubmitWorkError::Timeout { stage, after }) = pool.submit_work(work).await
    );
    assert!(stage == SubmitStage::Enqueue);
    assert!(after == Duration::from_millis(50));

    gated.open(2);
    assert!(first.await.unwrap().is_ok());
    let_assert!(Err(SubmitWorkError::StaleWork { .. }) = second.await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn slow_verdict_times_out_but_still_runs() {
    tracing_logger();
    let config = MiningPoolConfig {
        submit_reply_timeout: Some(Duration::from_millis(50)),
        ..Default::default()
    };
    let (node, gated, pool) = PoolNode::start_gated(config).await;
    let _announcements = node.event_bus.subscribe();
    let work = pool.get_work().await.unwrap();

    let_assert!(
        Err(SubmitWorkError::Timeout {
            stage: SubmitStage::Reply,
            ..
        }) = pool.submit_work(work).await
    );

    gated.open(1);
    let stats = PoolNode::wait_for_stats(&pool, |s| s.accepted_submissions == 1).await;
    assert!(stats.epoch == 2);
    assert!(node.chain.height_now() == BlockHeight::new(1));
}

#[tokio::test]
async fn cancellation_while_waiting_for_verdict() {
    tracing_logger();
    let (_node, gated, pool) = PoolNode::start_gated(MiningPoolConfig::default()).await;
    let work = pool.get_work().await.unwrap();

    let cancel = CancellationToken::new();
    let (outcome, ()) = tokio::join!(pool.submit_work_cancellable(work, &cancel), async {
        gated.commit_entered().await;
        cancel.cancel();
    });

    let_assert!(Err(SubmitWorkError::Cancelled) = outcome);
    gated.open(1);
}

#[tokio::test]
async fn work_unavailable_until_first_successful_build() {
    tracing_logger();
    let node = RegtestNode::default();
    node.template_builder.set_failing(true);
    let config = MiningPoolConfig {
        recommit_interval: Duration::from_millis(10),
        ..Default::default()
    };
    let pool = MiningPool::start(node.collaborators(), config).await;

    let_assert!(Err(GetWorkError::WorkUnavailable) = pool.get_work().await);
    let solution = *Block::genesis().header();
    let_assert!(Err(SubmitWorkError::WorkUnavailable) = pool.submit_work(solution).await);

    node.template_builder.set_failing(false);
    PoolNode::wait_for_stats(&pool, |s| s.generated >= 1).await;
    assert!(pool.get_work().await.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_readers_see_consistent_work() {
    tracing_logger();
    let config = MiningPoolConfig {
        recommit_interval: Duration::from_millis(1),
        ..Default::default()
    };
    let (node, pool) = PoolNode::start(config).await;
    let pool = Arc::new(pool);

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let pool = pool.clone();
            let chain = node.chain.clone();
            tokio::spawn(async move {
                for _ in 0..200 {
                    let work = pool.get_work().await.unwrap();
                    let blocks = chain.blocks();
                    let parent_index = usize::try_from(work.height.value() - 1).unwrap();
                    assert!(work.prev_block_digest == blocks[parent_index].hash());
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    for _ in 0..10 {
        node.add_mempool_transactions(1);
        node.chain.extend_external();
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    for reader in readers {
        reader.await.unwrap();
    }
    assert!(pool.stats().await.epoch >= 2);
}
