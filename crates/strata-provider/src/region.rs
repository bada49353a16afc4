use std::sync::Arc;

use strata_chunk::{ChunkCoord, GridBox};
use strata_geom::Vec3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ViewerId(pub u64);

/// Tracked entity anchoring a region of interest. The position capability is
/// optional: a viewer without one quiesces its region instead of erroring.
pub trait Viewer: Send + Sync {
    fn id(&self) -> ViewerId;
    fn position(&self) -> Option<Vec3>;
}

/// One tracked point of interest: a viewer plus a view distance in chunks.
/// Identity is the viewer, not the position; re-adding a viewer replaces its
/// region wholesale.
pub struct CacheRegion {
    viewer: Arc<dyn Viewer>,
    distance: i32,
    center: ChunkCoord,
    dirty: bool,
}

impl CacheRegion {
    pub fn new(viewer: Arc<dyn Viewer>, distance: i32) -> Self {
        let (center, dirty) = match viewer.position() {
            Some(pos) => (ChunkCoord::from_world(pos), true),
            None => (ChunkCoord::default(), false),
        };
        Self {
            viewer,
            distance,
            center,
            dirty,
        }
    }

    pub fn viewer_id(&self) -> ViewerId {
        self.viewer.id()
    }

    /// Recompute the center from the viewer's live position. Dormant viewers
    /// clear the dirty flag; a moved center sets it.
    pub fn update(&mut self) {
        match self.viewer.position() {
            None => self.dirty = false,
            Some(pos) => {
                let center = ChunkCoord::from_world(pos);
                if center != self.center {
                    self.center = center;
                    self.dirty = true;
                }
            }
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_up_to_date(&mut self) {
        self.dirty = false;
    }

    /// Center for relevance ranking; None while dormant.
    pub fn center(&self) -> Option<ChunkCoord> {
        self.viewer.position().map(|_| self.center)
    }

    /// View area in chunk coordinates; empty while dormant.
    pub fn grid_box(&self) -> GridBox {
        match self.viewer.position() {
            Some(pos) => {
                GridBox::from_center_extents(ChunkCoord::from_world(pos), self.distance, 0, self.distance)
            }
            None => GridBox::EMPTY,
        }
    }
}
