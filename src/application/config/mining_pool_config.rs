use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use super::cli_args::optional_timeout;
use super::cli_args::Args;

pub const DEFAULT_RECOMMIT_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_SUBMIT_QUEUE_CAPACITY: usize = 50;
pub const DEFAULT_SUBMIT_ENQUEUE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_SUBMIT_REPLY_TIMEOUT: Duration = Duration::from_secs(60);

/// Settings of a [`MiningPool`](crate::application::mining_pool::MiningPool).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiningPoolConfig {
    /// Period of the recommit timer. The timer restarts whenever the chain
    /// grows or a block is committed.
    pub recommit_interval: Duration,

    /// Capacity of the submission mailbox. Submitters wait while it is full.
    pub submit_queue_capacity: usize,

    /// Bound on waiting for mailbox capacity. `None` waits indefinitely.
    pub submit_enqueue_timeout: Option<Duration>,

    /// Bound on waiting for the verdict. `None` waits indefinitely.
    pub submit_reply_timeout: Option<Duration>,
}

impl Default for MiningPoolConfig {
    fn default() -> Self {
        Self {
            recommit_interval: DEFAULT_RECOMMIT_INTERVAL,
            submit_queue_capacity: DEFAULT_SUBMIT_QUEUE_CAPACITY,
            submit_enqueue_timeout: Some(DEFAULT_SUBMIT_ENQUEUE_TIMEOUT),
            submit_reply_timeout: Some(DEFAULT_SUBMIT_REPLY_TIMEOUT),
        }
    }
}

impl From<&Args> for MiningPoolConfig {
    fn from(args: &Args) -> Self {
        Self {
            recommit_interval: args.recommit_interval,
            submit_queue_capacity: args.submit_queue_capacity,
            submit_enqueue_timeout: optional_timeout(args.submit_enqueue_timeout),
            submit_reply_timeout: optional_timeout(args.submit_reply_timeout),
        }
    }
}
