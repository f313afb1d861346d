#![allow(dead_code)]

pub mod gated_chain;
pub mod logging;
pub mod pool_node;
