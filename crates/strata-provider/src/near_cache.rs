use std::sync::{Arc, RwLock};

use hashbrown::HashMap;
use strata_chunk::{Chunk, ChunkCoord};

/// The in-memory working set. Stage workers insert on fetch/generate, the
/// control thread evicts; each slot has a single writer at a time, so a
/// read-write locked map is all the coordination needed.
pub struct NearCache {
    chunks: RwLock<HashMap<ChunkCoord, Arc<Chunk>>>,
    capacity: usize,
}

impl NearCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            chunks: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.chunks.read().unwrap().contains_key(&coord)
    }

    pub fn get(&self, coord: ChunkCoord) -> Option<Arc<Chunk>> {
        self.chunks.read().unwrap().get(&coord).cloned()
    }

    pub fn insert(&self, chunk: Arc<Chunk>) {
        self.chunks.write().unwrap().insert(chunk.coord(), chunk);
    }

    pub fn remove(&self, coord: ChunkCoord) -> Option<Arc<Chunk>> {
        self.chunks.write().unwrap().remove(&coord)
    }

    pub fn len(&self) -> usize {
        self.chunks.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Soft bound; the sweep runs only when this reports true.
    pub fn over_capacity(&self) -> bool {
        self.len() > self.capacity
    }

    pub fn coords(&self) -> Vec<ChunkCoord> {
        self.chunks.read().unwrap().keys().copied().collect()
    }

    pub fn drain_all(&self) -> Vec<Arc<Chunk>> {
        self.chunks.write().unwrap().drain().map(|(_, c)| c).collect()
    }
}
