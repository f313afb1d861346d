use anyhow::ensure;

use crate::application::collaborators::WalletManager;
use crate::protocol::consensus::block::block_height::BlockHeight;
use crate::protocol::consensus::digest::Digest;
use crate::protocol::consensus::transaction::Transaction;

/// Pays every block reward to one fixed recipient.
#[derive(Debug, Clone, Copy)]
pub struct RegtestWallet {
    reward_recipient: Digest,
}

impl RegtestWallet {
    pub fn new(reward_recipient: Digest) -> Self {
        Self { reward_recipient }
    }

    pub fn reward_recipient(&self) -> Digest {
        self.reward_recipient
    }
}

impl Default for RegtestWallet {
    fn default() -> Self {
        Self::new(Digest::hash(b"regtest wallet"))
    }
}

impl WalletManager for RegtestWallet {
    fn coinbase_transaction(&self, height: BlockHeight) -> anyhow::Result<Transaction> {
        ensure!(!height.is_genesis(), "genesis block has a fixed coinbase");
        Ok(Transaction::coinbase(height, self.reward_recipient))
    }
}
