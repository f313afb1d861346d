use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::PoisonError;

use rand::Rng;

use crate::application::collaborators::Mempool;
use crate::protocol::consensus::transaction::Transaction;

/// First-in first-out transaction pool.
#[derive(Debug, Default)]
pub struct RegtestMempool {
    transactions: Mutex<VecDeque<Transaction>>,
}

impl RegtestMempool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, transaction: Transaction) {
        self.queue().push_back(transaction);
    }

    /// Insert `count` transfers with random payloads.
    pub fn fill_random(&self, count: usize) {
        let mut rng = rand::rng();
        let mut queue = self.queue();
        for _ in 0..count {
            let payload: [u8; 32] = rng.random();
            queue.push_back(Transaction::transfer(payload.to_vec()));
        }
    }

    /// Remove every transaction that is part of `included`.
    pub fn remove_included(&self, included: &[Transaction]) {
        self.queue().retain(|tx| !included.contains(tx));
    }

    pub fn len(&self) -> usize {
        self.queue().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue().is_empty()
    }

    fn queue(&self) -> std::sync::MutexGuard<'_, VecDeque<Transaction>> {
        self.transactions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Mempool for RegtestMempool {
    fn transactions_for_block(&self, max: usize) -> Vec<Transaction> {
        self.queue().iter().take(max).cloned().collect()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn block_selection_is_fifo_and_bounded() {
        let mempool = RegtestMempool::new();
        for i in 0u8..5 {
            mempool.insert(Transaction::transfer(vec![i]));
        }

        let selected = mempool.transactions_for_block(3);
        assert_eq!(
            vec![
                Transaction::transfer(vec![0]),
                Transaction::transfer(vec![1]),
                Transaction::transfer(vec![2])
            ],
            selected
        );
        assert_eq!(5, mempool.len());
    }

    #[test]
    fn included_transactions_are_removed() {
        let mempool = RegtestMempool::new();
        mempool.fill_random(4);
        let selected = mempool.transactions_for_block(2);

        mempool.remove_included(&selected);

        assert_eq!(2, mempool.len());
        assert!(mempool
            .transactions_for_block(10)
            .iter()
            .all(|tx| !selected.contains(tx)));
    }
}
