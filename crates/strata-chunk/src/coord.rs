use serde::{Deserialize, Serialize};
use strata_geom::Vec3;

use crate::{CHUNK_SIZE_X, CHUNK_SIZE_Z};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub cx: i32,
    pub cy: i32,
    pub cz: i32,
}

impl ChunkCoord {
    #[inline]
    pub const fn new(cx: i32, cy: i32, cz: i32) -> Self {
        Self { cx, cy, cz }
    }

    #[inline]
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            cx: self.cx + dx,
            cy: self.cy + dy,
            cz: self.cz + dz,
        }
    }

    /// Manhattan distance on the chunk grid.
    #[inline]
    pub fn grid_distance(self, other: ChunkCoord) -> i32 {
        (self.cx - other.cx).abs() + (self.cy - other.cy).abs() + (self.cz - other.cz).abs()
    }

    /// Chunk column containing a world-space position. Streamed chunks are
    /// full-height columns, so `cy` is always 0.
    pub fn from_world(pos: Vec3) -> Self {
        Self {
            cx: (pos.x / CHUNK_SIZE_X as f32).floor() as i32,
            cy: 0,
            cz: (pos.z / CHUNK_SIZE_Z as f32).floor() as i32,
        }
    }
}

impl From<(i32, i32, i32)> for ChunkCoord {
    fn from(value: (i32, i32, i32)) -> Self {
        Self::new(value.0, value.1, value.2)
    }
}

/// Inclusive axis-aligned box of chunk coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridBox {
    min: ChunkCoord,
    max: ChunkCoord,
}

impl GridBox {
    pub const EMPTY: GridBox = GridBox {
        min: ChunkCoord::new(0, 0, 0),
        max: ChunkCoord::new(-1, -1, -1),
    };

    pub fn from_center_extents(center: ChunkCoord, ex: i32, ey: i32, ez: i32) -> Self {
        Self {
            min: center.offset(-ex, -ey, -ez),
            max: center.offset(ex, ey, ez),
        }
    }

    /// Expand horizontally by `n` chunks on every side; the y extent is left alone.
    pub fn expand(self, n: i32) -> Self {
        Self {
            min: self.min.offset(-n, 0, -n),
            max: self.max.offset(n, 0, n),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.cx > self.max.cx || self.min.cy > self.max.cy || self.min.cz > self.max.cz
    }

    #[inline]
    pub fn contains(&self, c: ChunkCoord) -> bool {
        c.cx >= self.min.cx
            && c.cx <= self.max.cx
            && c.cy >= self.min.cy
            && c.cy <= self.max.cy
            && c.cz >= self.min.cz
            && c.cz <= self.max.cz
    }

    pub fn iter(self) -> impl Iterator<Item = ChunkCoord> {
        let GridBox { min, max } = self;
        (min.cy..=max.cy).flat_map(move |cy| {
            (min.cx..=max.cx)
                .flat_map(move |cx| (min.cz..=max.cz).map(move |cz| ChunkCoord::new(cx, cy, cz)))
        })
    }
}
