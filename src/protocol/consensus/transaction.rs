use serde::Deserialize;
use serde::Serialize;

use super::block::block_height::BlockHeight;
use super::digest::Digest;

/// A transaction as seen by the work coordinator: an opaque payload with an
/// identifier. Transaction semantics (inputs, outputs, fees, validity) belong
/// to the chain and mempool.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transaction {
    pub kind: TransactionKind,
    pub payload: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum TransactionKind {
    /// Pays the block reward to the miner. Always the first transaction of a
    /// block.
    Coinbase,
    Transfer,
}

impl Transaction {
    pub fn transfer(payload: Vec<u8>) -> Self {
        Self {
            kind: TransactionKind::Transfer,
            payload,
        }
    }

    /// A coinbase paying to `recipient`. Embeds the height so that coinbases
    /// of different blocks never share an id.
    pub fn coinbase(height: BlockHeight, recipient: Digest) -> Self {
        let mut payload = Vec::with_capacity(8 + Digest::BYTES);
        payload.extend_from_slice(&height.value().to_le_bytes());
        payload.extend_from_slice(recipient.as_bytes());

        Self {
            kind: TransactionKind::Coinbase,
            payload,
        }
    }

    pub fn is_coinbase(&self) -> bool {
        self.kind == TransactionKind::Coinbase
    }

    pub fn id(&self) -> Digest {
        let mut preimage = Vec::with_capacity(1 + self.payload.len());
        preimage.push(match self.kind {
            TransactionKind::Coinbase => 0u8,
            TransactionKind::Transfer => 1u8,
        });
        preimage.extend_from_slice(&self.payload);
        Digest::hash(&preimage)
    }
}
