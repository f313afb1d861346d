pub mod candidate_store;
pub mod commitment_history;
