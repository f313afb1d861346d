pub mod cli_args;
pub mod mining_pool_config;
