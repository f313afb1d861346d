pub mod collaborators;
pub mod config;
pub mod locks;
pub mod loops;
pub mod mining_pool;
pub mod regtest;
