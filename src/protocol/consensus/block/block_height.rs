use std::fmt::Display;

use serde::Deserialize;
use serde::Serialize;

/// The distance, in number of blocks, to the genesis block.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct BlockHeight(u64);

impl BlockHeight {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }

    pub const fn genesis() -> Self {
        Self(0)
    }

    pub fn is_genesis(&self) -> bool {
        self.0 == 0
    }

    /// # Panics
    ///
    /// Panics on overflow, which would take longer than the age of the
    /// universe to reach.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl From<u64> for BlockHeight {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<BlockHeight> for u64 {
    fn from(value: BlockHeight) -> Self {
        value.0
    }
}

impl Display for BlockHeight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
