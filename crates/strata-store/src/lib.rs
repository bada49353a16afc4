//! Durable backing store contract for evicted chunks.
#![forbid(unsafe_code)]

use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashMap;
use strata_chunk::{ChunkCoord, VoxelBuf};

/// Far store consumed by the streaming core. `put` is a durable upsert and
/// fire-and-forget from the caller's perspective; `fetch` blocks the calling
/// worker thread.
pub trait ChunkStore: Send + Sync {
    fn contains(&self, coord: ChunkCoord) -> bool;
    fn fetch(&self, coord: ChunkCoord) -> Option<VoxelBuf>;
    fn put(&self, coord: ChunkCoord, voxels: VoxelBuf);
    /// Aggregate stored extent, in chunks.
    fn size(&self) -> f32;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MemoryStoreStats {
    pub puts: u64,
    pub fetches: u64,
    pub entries: usize,
}

/// In-memory `ChunkStore` used by tests and the demo binary.
pub struct MemoryStore {
    entries: RwLock<HashMap<ChunkCoord, VoxelBuf>>,
    puts: AtomicU64,
    fetches: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            puts: AtomicU64::new(0),
            fetches: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> MemoryStoreStats {
        MemoryStoreStats {
            puts: self.puts.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            entries: self.entries.read().map(|m| m.len()).unwrap_or(0),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkStore for MemoryStore {
    fn contains(&self, coord: ChunkCoord) -> bool {
        self.entries.read().unwrap().contains_key(&coord)
    }

    fn fetch(&self, coord: ChunkCoord) -> Option<VoxelBuf> {
        let found = self.entries.read().unwrap().get(&coord).cloned();
        if found.is_some() {
            self.fetches.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    fn put(&self, coord: ChunkCoord, voxels: VoxelBuf) {
        self.entries.write().unwrap().insert(coord, voxels);
        self.puts.fetch_add(1, Ordering::Relaxed);
    }

    fn size(&self) -> f32 {
        self.entries.read().unwrap().len() as f32
    }
}
