use std::error::Error;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use fastnoise_lite::{FastNoiseLite, NoiseType};
use serde::Deserialize;

use strata_chunk::{Block, Chunk, ChunkCoord, VoxelBuf};

use crate::ChunkGenerator;

pub const BLOCK_STONE: Block = Block { id: 1 };
pub const BLOCK_GRASS: Block = Block { id: 2 };
pub const BLOCK_FLOWER: Block = Block { id: 3 };

#[derive(Clone, Debug, Deserialize)]
pub struct WorldGenConfig {
    #[serde(default = "default_seed")]
    pub seed: i32,
    #[serde(default = "default_height_frequency")]
    pub height_frequency: f32,
    #[serde(default = "default_base_height")]
    pub base_height: i32,
    #[serde(default = "default_height_amplitude")]
    pub height_amplitude: f32,
    #[serde(default = "default_flower_threshold")]
    pub flower_threshold: f32,
}

fn default_seed() -> i32 {
    1337
}
fn default_height_frequency() -> f32 {
    0.01
}
fn default_base_height() -> i32 {
    48
}
fn default_height_amplitude() -> f32 {
    24.0
}
fn default_flower_threshold() -> f32 {
    0.75
}

impl Default for WorldGenConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            height_frequency: default_height_frequency(),
            base_height: default_base_height(),
            height_amplitude: default_height_amplitude(),
            flower_threshold: default_flower_threshold(),
        }
    }
}

pub fn load_worldgen_config(path: &Path) -> Result<WorldGenConfig, Box<dyn Error>> {
    let s = fs::read_to_string(path)?;
    let cfg: WorldGenConfig = toml::from_str(&s)?;
    Ok(cfg)
}

/// Heightmap terrain over OpenSimplex noise. Decoration plants flowers on
/// grass where a second noise channel spikes; the lighting passes are content
/// no-ops here since `VoxelBuf` carries no light channel.
pub struct NoiseGenerator {
    cfg: WorldGenConfig,
    terrain: FastNoiseLite,
    flora: FastNoiseLite,
}

impl NoiseGenerator {
    pub fn new(cfg: WorldGenConfig) -> Self {
        let mut terrain = FastNoiseLite::with_seed(cfg.seed);
        terrain.set_noise_type(Some(NoiseType::OpenSimplex2));
        terrain.set_frequency(Some(cfg.height_frequency));
        let mut flora = FastNoiseLite::with_seed(cfg.seed ^ 0x5EED);
        flora.set_noise_type(Some(NoiseType::OpenSimplex2));
        flora.set_frequency(Some(0.2));
        Self { cfg, terrain, flora }
    }

    fn surface_height(&self, wx: i32, wz: i32, sy: usize) -> usize {
        let n = self.terrain.get_noise_2d(wx as f32, wz as f32);
        let h = self.cfg.base_height as f32 + n * self.cfg.height_amplitude;
        (h.max(1.0) as usize).min(sy - 2)
    }
}

impl ChunkGenerator for NoiseGenerator {
    fn generate(&self, coord: ChunkCoord) -> VoxelBuf {
        let mut buf = VoxelBuf::column_sized();
        let base_x = coord.cx * buf.sx as i32;
        let base_z = coord.cz * buf.sz as i32;
        for z in 0..buf.sz {
            for x in 0..buf.sx {
                let h = self.surface_height(base_x + x as i32, base_z + z as i32, buf.sy);
                for y in 0..h {
                    buf.set_local(x, y, z, BLOCK_STONE);
                }
                buf.set_local(x, h, z, BLOCK_GRASS);
            }
        }
        buf
    }

    fn decorate(&self, chunk: &Chunk, _neighbors: &[Arc<Chunk>]) {
        let coord = chunk.coord();
        chunk.with_voxels(|buf| {
            let base_x = coord.cx * buf.sx as i32;
            let base_z = coord.cz * buf.sz as i32;
            for z in 0..buf.sz {
                for x in 0..buf.sx {
                    let n = self
                        .flora
                        .get_noise_2d((base_x + x as i32) as f32, (base_z + z as i32) as f32);
                    if n < self.cfg.flower_threshold {
                        continue;
                    }
                    for y in (0..buf.sy - 1).rev() {
                        if buf.get_local(x, y, z) == BLOCK_GRASS {
                            buf.set_local(x, y + 1, z, BLOCK_FLOWER);
                            break;
                        }
                    }
                }
            }
        });
        log::trace!("decorated {:?}", coord);
    }

    fn light_internally(&self, chunk: &Chunk) {
        log::trace!("internal lighting for {:?}", chunk.coord());
    }

    fn propagate_light(&self, chunk: &Chunk, neighbors: &[Arc<Chunk>]) {
        log::trace!(
            "propagated light for {:?} across {} neighbors",
            chunk.coord(),
            neighbors.len()
        );
    }
}
