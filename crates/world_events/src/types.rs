//! Block and block-position value types shared by the world event tables.

use std::fmt;

/// Number of distinct block types, and therefore the number of slots in
/// every per-type hook table.
pub const BLOCK_TYPE_COUNT: usize = 256;

/// Identifies one block position in one dimension of the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlockId {
    /// X coordinate
    pub x: i32,
    /// Y coordinate (height)
    pub y: u8,
    /// Z coordinate
    pub z: i32,
    /// Dimension the block lives in
    pub dimension: i8,
}

impl BlockId {
    /// Creates a block position in the given dimension.
    pub const fn new(x: i32, y: u8, z: i32, dimension: i8) -> Self {
        Self { x, y, z, dimension }
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}) in dimension {}", self.x, self.y, self.z, self.dimension)
    }
}

/// The value stored at a block position.
///
/// The block type selects which per-type hooks run when the block is
/// replaced or placed; metadata travels along untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Block {
    block_type: u8,
    metadata: u8,
}

impl Block {
    /// Air: block type zero with no metadata.
    pub const AIR: Block = Block::new(0);

    /// Creates a block of the given type with zeroed metadata.
    pub const fn new(block_type: u8) -> Self {
        Self {
            block_type,
            metadata: 0,
        }
    }

    /// Creates a block of the given type carrying `metadata`.
    pub const fn with_metadata(block_type: u8, metadata: u8) -> Self {
        Self {
            block_type,
            metadata,
        }
    }

    /// The block type, used to index hook tables.
    pub const fn block_type(&self) -> u8 {
        self.block_type
    }

    pub const fn metadata(&self) -> u8 {
        self.metadata
    }

    /// Hook-table slot for this block's type. Always below [`BLOCK_TYPE_COUNT`].
    pub(crate) fn slot(&self) -> usize {
        usize::from(self.block_type)
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block_type, self.metadata)
    }
}
