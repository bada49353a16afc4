//! Generator contract consumed by the streaming pipeline, plus a noise-based
//! reference implementation.
#![forbid(unsafe_code)]

pub mod worldgen;

use std::sync::Arc;

use strata_chunk::{Chunk, ChunkCoord, VoxelBuf};

pub use worldgen::{NoiseGenerator, WorldGenConfig, load_worldgen_config};

/// Content producer for the pipeline stages. All passes are synchronous and
/// invoked only from stage workers; implementations must be shareable across
/// the per-stage pools.
pub trait ChunkGenerator: Send + Sync {
    /// Initial content for a column.
    fn generate(&self, coord: ChunkCoord) -> VoxelBuf;

    /// Second pass across chunk borders. All 8 ring neighbors are resident
    /// when this is called.
    fn decorate(&self, chunk: &Chunk, neighbors: &[Arc<Chunk>]);

    /// Lighting confined to the chunk itself.
    fn light_internally(&self, chunk: &Chunk);

    /// Light exchange with the resident ring neighbors.
    fn propagate_light(&self, chunk: &Chunk, neighbors: &[Arc<Chunk>]);
}
