#![deny(clippy::shadow_unrelated)]
//
// enables nightly feature async_fn_track_caller for crate feature
// track-lock-location, which puts the acquirer's source location in lock
// events. to enable: cargo +nightly build --features track-lock-location
#![cfg_attr(feature = "track-lock-location", feature(async_fn_track_caller))]
//
// `#[cfg_attr(coverage_nightly, coverage(off))]` on test modules excludes them
// from coverage reports made with cargo-llvm-cov on nightly.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod application;
pub mod protocol;
pub mod state;


use std::sync::Arc;

use anyhow::Result;
use application::config::cli_args;
use application::config::mining_pool_config::MiningPoolConfig;
use application::mining_pool::MiningPool;
use application::regtest::runner::RegtestRunner;
use application::regtest::RegtestNode;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::application::locks::tokio as sync_tokio;

/// Start a regtest node with a mining pool and `args.num_miners` toy miners.
///
/// Call [`RegtestRunner::run`] on the result to mine until shutdown.
pub async fn initialize(args: cli_args::Args) -> Result<RegtestRunner> {
    let config = MiningPoolConfig::from(&args);
    info!(
        "Starting regtest mining pool with {} miner(s). config: {}",
        args.num_miners,
        serde_json::to_string(&config)?
    );

    let node = RegtestNode::new(args.max_block_transactions);
    node.add_mempool_transactions(args.mempool_transactions);

    let cancel = CancellationToken::new();
    let announcer = RegtestRunner::spawn_announcer(node.event_bus.subscribe(), cancel.clone());

    let pool = Arc::new(MiningPool::start(node.collaborators(), config).await);
    let miners = RegtestRunner::spawn_miners(&pool, args.num_miners, &cancel);

    Ok(RegtestRunner {
        node,
        pool,
        miners,
        announcer,
        cancel,
        run_for: args.run_for,
    })
}

pub(crate) fn log_tokio_lock_event_cb(lock_event: sync_tokio::LockEvent) {
    #[cfg(feature = "log-lock_events")]
    log_tokio_lock_event(&lock_event);

    match lock_event.acquisition() {
        #[cfg(feature = "log-slow-read-lock")]
        sync_tokio::LockAcquisition::Read => log_slow_locks(&lock_event, "read"),
        #[cfg(feature = "log-slow-write-lock")]
        sync_tokio::LockAcquisition::Write => log_slow_locks(&lock_event, "write"),

        _ => {}
    }
}

// very verbose; meant for debugging lock contention on the candidate store
#[cfg(feature = "log-lock_events")]
pub(crate) fn log_tokio_lock_event(lock_event: &sync_tokio::LockEvent) {
    let tokio_id = tokio::task::try_id()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "?".to_string());

    let location = lock_event
        .location()
        .map(|l| format!("\n\t|-- acquirer: {l}"))
        .unwrap_or_default();
    let waited = match (lock_event.try_acquire_at(), lock_event.acquire_at()) {
        (Some(t), Some(a)) => format!(
            "\n\t|-- waited for acquire: {} secs",
            a.duration_since(t).as_secs_f32()
        ),
        _ => String::default(),
    };
    let held = match lock_event.acquire_at() {
        Some(t) if matches!(lock_event, sync_tokio::LockEvent::Release { .. }) => {
            format!("\n\t|-- held: {} secs", t.elapsed().as_secs_f32())
        }
        _ => String::default(),
    };

    tracing::trace!(
        "{} tokio lock `{}` for `{}` by\n\t|-- thread `{}`\n\t|-- tokio task {}{}{}{}",
        lock_event.event_type_name(),
        lock_event.info().name().unwrap_or("?"),
        lock_event.acquisition(),
        std::thread::current().name().unwrap_or("?"),
        tokio_id,
        location,
        waited,
        held,
    );
}

/// Warn when acquiring a lock took longer than
/// `LOG_SLOW_{READ,WRITE}_LOCK_ACQUIRE_THRESHOLD` seconds (default 0.1), or
/// when a released lock was held longer than
/// `LOG_SLOW_{READ,WRITE}_LOCK_THRESHOLD` seconds (default 0.1).
///
/// Needs the `track-lock-time` feature to have anything to measure.
#[cfg(any(feature = "log-slow-read-lock", feature = "log-slow-write-lock"))]
pub(crate) fn log_slow_locks(event: &sync_tokio::LockEvent, read_or_write: &str) {
    fn threshold_secs(env_var: String) -> f32 {
        std::env::var(env_var)
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(0.1)
    }

    let location = event
        .location()
        .map(|l| l.to_string())
        .unwrap_or_else(|| "?".to_string());

    if let (sync_tokio::LockEvent::Acquire { .. }, Some(try_acquire_at), Some(acquire_at)) =
        (event, event.try_acquire_at(), event.acquire_at())
    {
        let waited = acquire_at.duration_since(try_acquire_at).as_secs_f32();
        let max = threshold_secs(format!(
            "LOG_SLOW_{}_LOCK_ACQUIRE_THRESHOLD",
            read_or_write.to_uppercase()
        ));
        if waited > max {
            tracing::warn!(
                "{read_or_write}-lock acquisition took {waited} seconds. (exceeds max: {max} secs)  location: {location}"
            );
        }
    }

    if let (sync_tokio::LockEvent::Release { .. }, Some(acquire_at)) = (event, event.acquire_at())
    {
        let held = acquire_at.elapsed().as_secs_f32();
        let max = threshold_secs(format!(
            "LOG_SLOW_{}_LOCK_THRESHOLD",
            read_or_write.to_uppercase()
        ));
        if held > max {
            tracing::warn!(
                "{read_or_write}-lock held for {held} seconds. (exceeds max: {max} secs)  location: {location}"
            );
        }
    }
}

pub(crate) const LOG_TOKIO_LOCK_EVENT_CB: sync_tokio::LockCallbackFn = log_tokio_lock_event_cb;
