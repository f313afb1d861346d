use std::fmt::Display;

use serde::Deserialize;
use serde::Serialize;
use sha3::Digest as _;
use sha3::Sha3_256;

use super::block_commitment::BlockCommitment;
use super::block_height::BlockHeight;
use crate::protocol::consensus::digest::Digest;
use crate::protocol::consensus::timestamp::Timestamp;

pub const BLOCK_HEADER_VERSION: u64 = 1;

/// Opaque, miner-controlled value varied while searching for a proof-of-work.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Nonce(pub u64);

impl Display for Nonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// The unit of work exchanged with miners.
///
/// Miners receive a header from `get_work`, vary `nonce` (and possibly
/// `timestamp`) and echo the header back through `submit_work`. The
/// `commitment` tells the coordinator which transaction set the solution
/// applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: u64,
    pub height: BlockHeight,
    pub prev_block_digest: Digest,

    /// Seconds since unix epoch
    pub timestamp: Timestamp,

    pub nonce: Nonce,

    /// Compact difficulty target. Not interpreted by the work coordinator.
    pub bits: u64,

    pub commitment: BlockCommitment,
}

impl Display for BlockHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let string = format!(
            "Height: {}\n\
            Timestamp: {}\n\
            Prev. Digest: {:x}\n\
            Commitment: {}\n\
            Nonce: {}\n\
            Bits: {:#x}\n\
            Version: {}\n",
            self.height,
            self.timestamp.standard_format(),
            self.prev_block_digest,
            self.commitment,
            self.nonce,
            self.bits,
            self.version,
        );

        write!(f, "{}", string)
    }
}

impl BlockHeader {
    /// The block hash. Covers every header field, so a different nonce or
    /// timestamp yields a different hash.
    pub fn hash(&self) -> Digest {
        let mut hasher = Sha3_256::new();
        hasher.update(self.version.to_le_bytes());
        hasher.update(self.height.value().to_le_bytes());
        hasher.update(self.prev_block_digest.as_bytes());
        hasher.update(self.timestamp.to_seconds().to_le_bytes());
        hasher.update(self.nonce.0.to_le_bytes());
        hasher.update(self.bits.to_le_bytes());
        hasher.update(self.commitment.digest().as_bytes());
        Digest::new(hasher.finalize().into())
    }
}
