pub mod block;
pub mod digest;
pub mod timestamp;
pub mod transaction;
