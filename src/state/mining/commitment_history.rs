use std::collections::HashMap;

use crate::protocol::consensus::block::block_commitment::BlockCommitment;
use crate::protocol::consensus::transaction::Transaction;

/// The transaction sets handed out to miners during the current epoch, keyed
/// by the commitment miners echo back.
///
/// There is no per-entry expiry. The owner drops the whole history when an
/// epoch ends (see [`CandidateStore::start_epoch`](super::candidate_store::CandidateStore::start_epoch)).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CommitmentHistory {
    entries: HashMap<BlockCommitment, Vec<Transaction>>,
}

impl CommitmentHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember which transactions `commitment` designates. Recording the same
    /// commitment again replaces the earlier entry.
    pub fn record(&mut self, commitment: BlockCommitment, transactions: Vec<Transaction>) {
        self.entries.insert(commitment, transactions);
    }

    pub fn resolve(&self, commitment: &BlockCommitment) -> Option<&[Transaction]> {
        self.entries.get(commitment).map(Vec::as_slice)
    }

    pub fn contains(&self, commitment: &BlockCommitment) -> bool {
        self.entries.contains_key(commitment)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
