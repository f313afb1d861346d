use tokio::sync::mpsc;
use tokio::sync::oneshot;

use crate::application::mining_pool::errors::SubmitWorkError;
use crate::protocol::consensus::block::block_header::BlockHeader;

/// Verdict on a submission, sent back from the work loop.
pub(crate) type SubmitWorkReply = Result<(), SubmitWorkError>;

/// A miner's solution travelling to the work loop.
#[derive(Debug)]
pub(crate) struct SubmitWorkRequest {
    pub header: BlockHeader,
    pub reply: oneshot::Sender<SubmitWorkReply>,
}

impl SubmitWorkRequest {
    pub fn new(header: BlockHeader) -> (Self, oneshot::Receiver<SubmitWorkReply>) {
        let (reply, rx) = oneshot::channel();
        (Self { header, reply }, rx)
    }

    /// True when the caller stopped waiting for the verdict, either by
    /// timing out, by being cancelled or by being dropped.
    pub fn is_abandoned(&self) -> bool {
        self.reply.is_closed()
    }
}

pub(crate) type SubmitWorkSender = mpsc::Sender<SubmitWorkRequest>;
pub(crate) type SubmitWorkReceiver = mpsc::Receiver<SubmitWorkRequest>;

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::protocol::consensus::block::Block;

    #[test]
    fn dropping_receiver_abandons_request() {
        let (request, rx) = SubmitWorkRequest::new(*Block::genesis().header());
        assert!(!request.is_abandoned());
        drop(rx);
        assert!(request.is_abandoned());
    }
}
