//! Chunk entity, coordinates, and voxel content buffers.
#![forbid(unsafe_code)]

mod coord;
mod state;

use std::sync::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};

pub use coord::{ChunkCoord, GridBox};
pub use state::ChunkState;

pub const CHUNK_SIZE_X: usize = 16;
pub const CHUNK_SIZE_Y: usize = 128;
pub const CHUNK_SIZE_Z: usize = 16;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Block {
    pub id: u16,
}

impl Block {
    pub const AIR: Block = Block { id: 0 };
}

/// Dense voxel content for one chunk column. Opaque to the streaming core;
/// only the generator's passes interpret it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoxelBuf {
    pub sx: usize,
    pub sy: usize,
    pub sz: usize,
    pub blocks: Vec<Block>,
}

impl VoxelBuf {
    pub fn new(sx: usize, sy: usize, sz: usize) -> Self {
        Self {
            sx,
            sy,
            sz,
            blocks: vec![Block::AIR; sx * sy * sz],
        }
    }

    pub fn column_sized() -> Self {
        Self::new(CHUNK_SIZE_X, CHUNK_SIZE_Y, CHUNK_SIZE_Z)
    }

    pub fn from_blocks(sx: usize, sy: usize, sz: usize, blocks: Vec<Block>) -> Self {
        let mut b = blocks;
        let expect = sx * sy * sz;
        if b.len() != expect {
            b.resize(expect, Block::AIR);
        }
        Self { sx, sy, sz, blocks: b }
    }

    #[inline]
    pub fn idx(&self, x: usize, y: usize, z: usize) -> usize {
        (y * self.sz + z) * self.sx + x
    }

    #[inline]
    pub fn get_local(&self, x: usize, y: usize, z: usize) -> Block {
        self.blocks[self.idx(x, y, z)]
    }

    #[inline]
    pub fn set_local(&mut self, x: usize, y: usize, z: usize, b: Block) {
        let idx = self.idx(x, y, z);
        self.blocks[idx] = b;
    }

    #[inline]
    pub fn has_non_air(&self) -> bool {
        self.blocks.iter().any(|b| *b != Block::AIR)
    }
}

/// One resident chunk. Shared as `Arc<Chunk>` between the control thread and
/// stage workers: state reads go through the atomic, content mutation locks
/// the buffer.
pub struct Chunk {
    coord: ChunkCoord,
    state: AtomicU8,
    voxels: Mutex<VoxelBuf>,
}

impl Chunk {
    pub fn new(coord: ChunkCoord, voxels: VoxelBuf) -> Self {
        Self {
            coord,
            state: AtomicU8::new(ChunkState::AdjacencyGenerationPending as u8),
            voxels: Mutex::new(voxels),
        }
    }

    #[inline]
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    #[inline]
    pub fn state(&self) -> ChunkState {
        ChunkState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set_state(&self, state: ChunkState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Advance `from -> to` exactly once; false if some other thread already
    /// moved the chunk past `from`.
    pub fn try_advance(&self, from: ChunkState, to: ChunkState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Copy of the content, for persistence (copy-then-dispose eviction).
    pub fn snapshot(&self) -> VoxelBuf {
        self.voxels.lock().unwrap().clone()
    }

    pub fn with_voxels<R>(&self, f: impl FnOnce(&mut VoxelBuf) -> R) -> R {
        let mut guard = self.voxels.lock().unwrap();
        f(&mut guard)
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("coord", &self.coord)
            .field("state", &self.state())
            .finish()
    }
}
