use std::time::Duration;

use crate::application::collaborators::ChainError;
use crate::application::collaborators::EventBusError;
use crate::protocol::consensus::block::block_commitment::BlockCommitment;
use crate::protocol::consensus::digest::Digest;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum GetWorkError {
    #[error("no block is ready for mining")]
    WorkUnavailable,
}

/// The stage of a submission a [`SubmitWorkError::Timeout`] occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum SubmitStage {
    /// Waiting for room in the coordinator's mailbox.
    Enqueue,

    /// Waiting for the coordinator's verdict.
    Reply,
}

/// Why a submitted solution was not turned into a block.
///
/// Every variant except [`SubmitWorkError::EventPublishFailed`] leaves the
/// candidate and the current epoch untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum SubmitWorkError {
    #[error("no block is ready for mining")]
    WorkUnavailable,

    #[error("solution is for stale work: previous block {submitted:x}, expected {expected:x}")]
    StaleWork { submitted: Digest, expected: Digest },

    #[error("commitment {0} is unknown in the current mining epoch")]
    UnknownCommitment(BlockCommitment),

    #[error("chain rejected the block: {0}")]
    ChainRejected(#[from] ChainError),

    #[error("block is valid but does not extend the best chain")]
    Orphan,

    /// The block is committed; only the announcement failed.
    #[error("block committed but publishing the mined-block event failed: {0}")]
    EventPublishFailed(#[source] EventBusError),

    #[error("timed out after {after:?} during {stage}")]
    Timeout { stage: SubmitStage, after: Duration },

    #[error("submission was cancelled by the caller")]
    Cancelled,

    #[error("the work coordinator has stopped")]
    CoordinatorStopped,
}

impl SubmitWorkError {
    /// True when the submitted block made it into the chain despite the error.
    pub fn block_committed(&self) -> bool {
        matches!(self, Self::EventPublishFailed(_))
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StopPoolError {
    #[error("channel send error stopping the mining pool.  error: {0}")]
    SendError(#[from] tokio::sync::watch::error::SendError<()>),

    #[error("join error while waiting for the mining pool to stop.  error: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}
