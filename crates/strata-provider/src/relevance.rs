use std::sync::RwLock;

use strata_chunk::ChunkCoord;

/// Relevance of a position given the live region centers: distance to the
/// nearest one, lower is better. Positions with no region in play rank last.
pub fn relevance_score(coord: ChunkCoord, centers: &[ChunkCoord]) -> i32 {
    centers
        .iter()
        .map(|c| coord.grid_distance(*c))
        .min()
        .unwrap_or(i32::MAX)
}

/// Snapshot of region centers, refreshed by the control thread each tick and
/// read by stage workers at dequeue time. Re-evaluating against the snapshot
/// on every dequeue keeps priorities live without a shared comparator.
pub struct RelevanceSnapshot {
    centers: RwLock<Vec<ChunkCoord>>,
}

impl RelevanceSnapshot {
    pub fn new() -> Self {
        Self {
            centers: RwLock::new(Vec::new()),
        }
    }

    pub fn refresh(&self, centers: Vec<ChunkCoord>) {
        *self.centers.write().unwrap() = centers;
    }

    pub fn score(&self, coord: ChunkCoord) -> i32 {
        relevance_score(coord, &self.centers.read().unwrap())
    }
}

impl Default for RelevanceSnapshot {
    fn default() -> Self {
        Self::new()
    }
}
