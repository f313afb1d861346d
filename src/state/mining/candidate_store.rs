use serde::Deserialize;
use serde::Serialize;

use super::commitment_history::CommitmentHistory;
use crate::application::mining_pool::errors::SubmitWorkError;
use crate::protocol::consensus::block::block_header::BlockHeader;
use crate::protocol::consensus::block::block_height::BlockHeight;
use crate::protocol::consensus::block::Block;

/// Counters describing the work coordinator's activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiningPoolStats {
    pub epoch: u64,

    /// Height of the current candidate, if any.
    pub height: Option<BlockHeight>,

    pub history_len: usize,
    pub generated: u64,
    pub generation_failures: u64,
    pub accepted_submissions: u64,
    pub rejected_submissions: u64,
}

/// The block currently being mined together with the commitment history of
/// the current epoch.
///
/// Only the work loop mutates this. Readers go through the shared lock that
/// wraps it and never observe a half-installed candidate because
/// [`CandidateStore::install`] replaces candidate and history entry under one
/// write lock.
#[derive(Debug, Default, Clone)]
pub struct CandidateStore {
    candidate: Option<Block>,
    history: CommitmentHistory,
    epoch: u64,
    stats: MiningPoolStats,
}

impl CandidateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn candidate(&self) -> Option<&Block> {
        self.candidate.as_ref()
    }

    pub fn history(&self) -> &CommitmentHistory {
        &self.history
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Copy of the current candidate's header, the work unit handed to
    /// miners. The caller stamps the timestamp.
    pub fn work(&self) -> Option<BlockHeader> {
        self.candidate.as_ref().map(|block| *block.header())
    }

    /// Discard the commitment history and begin a new epoch. The current
    /// candidate, if any, stays in place until the next install.
    pub fn start_epoch(&mut self) {
        self.history = CommitmentHistory::new();
        self.epoch += 1;
    }

    /// Make `block` the current candidate and record its transaction set in
    /// the current epoch's history.
    pub fn install(&mut self, block: Block) {
        self.history
            .record(block.header().commitment, block.transactions().to_vec());
        self.candidate = Some(block);
        self.stats.generated += 1;
    }

    pub fn record_generation_failure(&mut self) {
        self.stats.generation_failures += 1;
    }

    pub fn record_submission(&mut self, accepted: bool) {
        if accepted {
            self.stats.accepted_submissions += 1;
        } else {
            self.stats.rejected_submissions += 1;
        }
    }

    pub fn stats(&self) -> MiningPoolStats {
        MiningPoolStats {
            epoch: self.epoch,
            height: self.candidate.as_ref().map(Block::height),
            history_len: self.history.len(),
            ..self.stats
        }
    }

    /// Check a miner's solution against the current candidate and build the
    /// full block it designates.
    ///
    /// Checks run in a fixed order: a candidate must exist, the solution must
    /// build on the candidate's previous block, and its commitment must be
    /// known in the current epoch. The result is a copy; the stored candidate
    /// is left as it was.
    pub fn assemble_solution(&self, solution: &BlockHeader) -> Result<Block, SubmitWorkError> {
        let candidate = self
            .candidate
            .as_ref()
            .ok_or(SubmitWorkError::WorkUnavailable)?;

        let expected = candidate.header().prev_block_digest;
        if solution.prev_block_digest != expected {
            return Err(SubmitWorkError::StaleWork {
                submitted: solution.prev_block_digest,
                expected,
            });
        }

        let transactions = self
            .history
            .resolve(&solution.commitment)
            .ok_or(SubmitWorkError::UnknownCommitment(solution.commitment))?;

        let mut block = candidate.clone();
        block.set_transactions(transactions.to_vec());
        block.set_header_solution(solution);

        Ok(block)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use assert2::assert;
    use assert2::let_assert;
    use proptest::prelude::*;
    use test_strategy::proptest;

    use super::*;
    use crate::protocol::consensus::block::block_commitment::BlockCommitment;
    use crate::protocol::consensus::block::block_header::Nonce;
    use crate::protocol::consensus::digest::Digest;
    use crate::protocol::consensus::timestamp::Timestamp;
    use crate::tests::shared::candidate_on;

    #[test]
    fn empty_store_has_no_work() {
        let store = CandidateStore::new();
        assert!(store.work().is_none());
        let_assert!(
            Err(SubmitWorkError::WorkUnavailable) =
                store.assemble_solution(Block::genesis().header())
        );
    }

    #[test]
    fn install_records_commitment() {
        let mut store = CandidateStore::new();
        let block = candidate_on(&Block::genesis(), 2);
        store.install(block.clone());

        assert!(store.work() == Some(*block.header()));
        assert!(store.history().contains(&block.header().commitment));
        assert!(store.stats().generated == 1);
    }

    #[test]
    fn start_epoch_forgets_previous_commitments() {
        let mut store = CandidateStore::new();
        let old = candidate_on(&Block::genesis(), 1);
        store.install(old.clone());

        store.start_epoch();
        assert!(store.history().is_empty());
        assert!(store.candidate() == Some(&old));

        let new = candidate_on(&Block::genesis(), 3);
        store.install(new.clone());

        assert!(store.epoch() == 1);
        assert!(store.history().len() == 1);
        assert!(!store.history().contains(&old.header().commitment));
        assert!(store.history().contains(&new.header().commitment));
    }

    #[test]
    fn stale_previous_digest_is_rejected_first() {
        let mut store = CandidateStore::new();
        store.install(candidate_on(&Block::genesis(), 1));

        let mut solution = store.work().unwrap();
        solution.prev_block_digest = Digest::hash(b"elsewhere");
        solution.commitment = BlockCommitment::new(Digest::hash(b"unknown"));

        let_assert!(
            Err(SubmitWorkError::StaleWork { submitted, expected }) =
                store.assemble_solution(&solution)
        );
        assert!(submitted == Digest::hash(b"elsewhere"));
        assert!(expected == Block::genesis().hash());
    }

    #[test]
    fn unknown_commitment_is_rejected() {
        let mut store = CandidateStore::new();
        store.install(candidate_on(&Block::genesis(), 1));

        let mut solution = store.work().unwrap();
        let unknown = BlockCommitment::new(Digest::hash(b"unknown"));
        solution.commitment = unknown;

        let_assert!(
            Err(SubmitWorkError::UnknownCommitment(k)) = store.assemble_solution(&solution)
        );
        assert!(k == unknown);
    }

    #[test]
    fn assembly_uses_historic_transactions_without_touching_candidate() {
        let mut store = CandidateStore::new();
        let first = candidate_on(&Block::genesis(), 1);
        let second = candidate_on(&Block::genesis(), 4);
        store.install(first.clone());
        store.install(second.clone());

        // Solution found for the earlier template of the same epoch.
        let mut solution = *first.header();
        solution.nonce = Nonce(7);
        solution.timestamp = Timestamp::seconds(first.header().timestamp.to_seconds() + 30);

        let_assert!(Ok(block) = store.assemble_solution(&solution));
        assert!(block.transactions() == first.transactions());
        assert!(block.header().nonce == Nonce(7));
        assert!(block.has_matching_commitment());
        assert!(store.candidate() == Some(&second));
    }

    #[proptest]
    fn installs_within_epoch_accumulate(#[strategy(1usize..10)] installs: usize) {
        let mut store = CandidateStore::new();
        store.start_epoch();
        let mut commitments = vec![];
        for i in 0..installs {
            let block = candidate_on(&Block::genesis(), i);
            commitments.push(block.header().commitment);
            store.install(block);
        }

        for commitment in &commitments {
            prop_assert!(store.history().contains(commitment));
        }
        prop_assert_eq!(installs as u64, store.stats().generated);
        prop_assert_eq!(1, store.epoch());
    }
}
