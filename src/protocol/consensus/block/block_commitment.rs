use std::fmt::Display;

use serde::Deserialize;
use serde::Serialize;

use crate::protocol::consensus::digest::Digest;
use crate::protocol::consensus::transaction::Transaction;

/// Fixed-size summary of a block's transaction set: the merkle root over the
/// transaction ids.
///
/// Miners echo the commitment back when submitting a solution, which lets
/// the work coordinator look up the transaction set the solution was found
/// for.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct BlockCommitment(Digest);

impl BlockCommitment {
    pub const fn new(digest: Digest) -> Self {
        Self(digest)
    }

    pub fn digest(&self) -> Digest {
        self.0
    }

    /// Merkle root of the transaction ids. An odd node at any level is paired
    /// with itself. The empty set commits to the all-zero digest.
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let mut level: Vec<Digest> = transactions.iter().map(Transaction::id).collect();
        if level.is_empty() {
            return Self(Digest::default());
        }

        while level.len() > 1 {
            level = level
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => Digest::hash_pair(left, right),
                    [single] => Digest::hash_pair(single, single),
                    _ => unreachable!("chunks(2) yields one or two elements"),
                })
                .collect();
        }

        Self(level[0])
    }
}

impl Display for BlockCommitment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Digest> for BlockCommitment {
    fn from(digest: Digest) -> Self {
        Self(digest)
    }
}
