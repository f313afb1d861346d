pub mod block_commitment;
pub mod block_header;
pub mod block_height;

use block_commitment::BlockCommitment;
use block_header::BlockHeader;
use block_header::Nonce;
use block_header::BLOCK_HEADER_VERSION;
use block_height::BlockHeight;
use serde::Deserialize;
use serde::Serialize;

use super::digest::Digest;
use super::timestamp::Timestamp;
use super::transaction::Transaction;

/// A block: a header and the ordered transactions it commits to.
///
/// The candidate handed out to miners is a `Block` whose header carries a
/// placeholder nonce. A miner's solution only touches the header fields it is
/// allowed to choose; see [`Block::set_header_solution`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    header: BlockHeader,
    transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        Self {
            header,
            transactions,
        }
    }

    /// The genesis block shared by all regtest chains.
    pub fn genesis() -> Self {
        let transactions = vec![Transaction::coinbase(
            BlockHeight::genesis(),
            Digest::default(),
        )];
        let header = BlockHeader {
            version: BLOCK_HEADER_VERSION,
            height: BlockHeight::genesis(),
            prev_block_digest: Digest::default(),
            // 2024-01-01T00:00:00Z
            timestamp: Timestamp::seconds(1_704_067_200),
            nonce: Nonce::default(),
            bits: 0,
            commitment: BlockCommitment::from_transactions(&transactions),
        };

        Self::new(header, transactions)
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn hash(&self) -> Digest {
        self.header.hash()
    }

    pub fn height(&self) -> BlockHeight {
        self.header.height
    }

    /// Overwrite the miner-controlled header fields with those of a
    /// submitted solution: commitment, nonce and timestamp. Version, height,
    /// bits and previous-block digest stay as issued.
    pub fn set_header_solution(&mut self, solution: &BlockHeader) {
        self.header.commitment = solution.commitment;
        self.header.nonce = solution.nonce;
        self.header.timestamp = solution.timestamp;
    }

    pub fn set_transactions(&mut self, transactions: Vec<Transaction>) {
        self.transactions = transactions;
    }

    /// Whether the header's commitment matches the block's transactions.
    pub fn has_matching_commitment(&self) -> bool {
        self.header.commitment == BlockCommitment::from_transactions(&self.transactions)
    }
}
