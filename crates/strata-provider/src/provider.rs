use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, unbounded};
use rayon::{ThreadPool, ThreadPoolBuilder};
use strata_chunk::{Chunk, ChunkCoord, ChunkState, GridBox};
use strata_store::ChunkStore;
use strata_world::ChunkGenerator;

use crate::config::ProviderConfig;
use crate::near_cache::NearCache;
use crate::phase::{ChunkPhase, PhaseError, PhaseOp};
use crate::region::{CacheRegion, Viewer, ViewerId};
use crate::relevance::RelevanceSnapshot;

/// Notification emitted when a chunk reaches `Complete`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkEvent {
    Completed(ChunkCoord),
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ProviderStats {
    pub resident: usize,
    pub regions: usize,
    pub fetch_backlog: usize,
    pub generate_backlog: usize,
    pub decorate_backlog: usize,
    pub internal_light_backlog: usize,
    pub propagate_backlog: usize,
}

/// Everything the asynchronous review tasks and the control loop both touch.
struct Pipeline {
    near: Arc<NearCache>,
    store: Arc<dyn ChunkStore>,
    fetch: ChunkPhase,
    generate: ChunkPhase,
    decorate: ChunkPhase,
    internal_light: ChunkPhase,
    propagate_light: ChunkPhase,
    event_tx: Sender<ChunkEvent>,
}

impl Pipeline {
    /// Review one area: request absent chunks, advance present ones. Safe to
    /// run concurrently with itself; every enqueue in here is idempotent.
    fn review_area(&self, area: GridBox) {
        for pos in area.iter() {
            if self.near.contains(pos) {
                self.check_state(pos);
            } else if self.store.contains(pos) {
                if !self.fetch.processing(pos) {
                    self.fetch.queue(pos);
                }
            } else if !self.generate.processing(pos) {
                self.generate.queue(pos);
            }
        }
    }

    /// Advance a chunk if its 3x3 ring allows it. Missing or lagging
    /// neighbors mean "not yet", never an error; the check reruns whenever a
    /// neighborhood member arrives or advances.
    fn check_state(&self, pos: ChunkCoord) {
        let Some(chunk) = self.near.get(pos) else {
            return;
        };
        let state = chunk.state();
        let phase = match state {
            ChunkState::AdjacencyGenerationPending => &self.decorate,
            ChunkState::InternalLightGenerationPending => &self.internal_light,
            ChunkState::LightPropagationPending => &self.propagate_light,
            ChunkState::FullLightConnectivityPending => {
                if self.neighbors_ready(pos, state)
                    && chunk.try_advance(state, ChunkState::Complete)
                {
                    log::debug!("chunk {:?} complete", pos);
                    let _ = self.event_tx.send(ChunkEvent::Completed(pos));
                }
                return;
            }
            ChunkState::Complete => return,
        };
        if phase.processing(pos) {
            return;
        }
        if self.neighbors_ready(pos, state) {
            log::debug!("queueing {:?} for {}", pos, phase.name());
            phase.queue(pos);
        }
    }

    /// All 8 horizontal ring neighbors resident with state >= `min_state`.
    fn neighbors_ready(&self, pos: ChunkCoord, min_state: ChunkState) -> bool {
        for adj in neighborhood(pos).iter() {
            if adj == pos {
                continue;
            }
            match self.near.get(adj) {
                None => return false,
                Some(chunk) if chunk.state() < min_state => return false,
                Some(_) => {}
            }
        }
        true
    }

    fn any_processing(&self, pos: ChunkCoord) -> bool {
        self.phases().iter().any(|p| p.processing(pos))
    }

    fn phases(&self) -> [&ChunkPhase; 5] {
        [
            &self.fetch,
            &self.generate,
            &self.decorate,
            &self.internal_light,
            &self.propagate_light,
        ]
    }
}

/// The 3x3 horizontal neighborhood around a position, the position included.
fn neighborhood(pos: ChunkCoord) -> GridBox {
    GridBox::from_center_extents(pos, 1, 0, 1)
}

/// The 8 ring neighbors of `pos`, if all of them are resident.
fn ring_chunks(near: &NearCache, pos: ChunkCoord) -> Option<Vec<Arc<Chunk>>> {
    let mut out = Vec::with_capacity(8);
    for adj in neighborhood(pos).iter() {
        if adj == pos {
            continue;
        }
        out.push(near.get(adj)?);
    }
    Some(out)
}

fn advance_op(
    near: Arc<NearCache>,
    from: ChunkState,
    wants_neighbors: bool,
    pass: impl Fn(&Chunk, &[Arc<Chunk>]) + Send + Sync + 'static,
) -> PhaseOp {
    Arc::new(move |coord| {
        let chunk = near
            .get(coord)
            .ok_or_else(|| PhaseError::new("chunk evicted before stage ran"))?;
        let neighbors = if wants_neighbors {
            ring_chunks(&near, coord)
                .ok_or_else(|| PhaseError::new("ring neighbor evicted before stage ran"))?
        } else {
            Vec::new()
        };
        pass(&chunk, &neighbors);
        if let Some(next) = from.next() {
            chunk.set_state(next);
        }
        Ok(())
    })
}

/// The streaming chunk provider: decides which chunks must exist near the
/// tracked viewers, drives them through the stage pipeline, and spills the
/// rest to the far store.
pub struct ChunkProvider {
    pipeline: Arc<Pipeline>,
    relevance: Arc<RelevanceSnapshot>,
    regions: Vec<CacheRegion>,
    reviewer: ThreadPool,
    event_rx: Receiver<ChunkEvent>,
    keep_margin: i32,
    poll_budget: usize,
}

impl ChunkProvider {
    pub fn new(
        store: Arc<dyn ChunkStore>,
        generator: Arc<dyn ChunkGenerator>,
        config: ProviderConfig,
    ) -> Self {
        let relevance = Arc::new(RelevanceSnapshot::new());
        let near = Arc::new(NearCache::new(config.cache_capacity));
        let (event_tx, event_rx) = unbounded();

        let fetch_op: PhaseOp = {
            let near = Arc::clone(&near);
            let store = Arc::clone(&store);
            Arc::new(move |coord| {
                let voxels = store
                    .fetch(coord)
                    .ok_or_else(|| PhaseError::new("far store lost the chunk"))?;
                near.insert(Arc::new(Chunk::new(coord, voxels)));
                Ok(())
            })
        };
        let generate_op: PhaseOp = {
            let near = Arc::clone(&near);
            let generator = Arc::clone(&generator);
            Arc::new(move |coord| {
                let voxels = generator.generate(coord);
                near.insert(Arc::new(Chunk::new(coord, voxels)));
                Ok(())
            })
        };
        let decorate_op = {
            let generator = Arc::clone(&generator);
            advance_op(
                Arc::clone(&near),
                ChunkState::AdjacencyGenerationPending,
                true,
                move |chunk, neighbors| generator.decorate(chunk, neighbors),
            )
        };
        let internal_light_op = {
            let generator = Arc::clone(&generator);
            advance_op(
                Arc::clone(&near),
                ChunkState::InternalLightGenerationPending,
                false,
                move |chunk, _| generator.light_internally(chunk),
            )
        };
        let propagate_op = {
            let generator = Arc::clone(&generator);
            advance_op(
                Arc::clone(&near),
                ChunkState::LightPropagationPending,
                true,
                move |chunk, neighbors| generator.propagate_light(chunk, neighbors),
            )
        };

        let pipeline = Arc::new(Pipeline {
            near,
            store,
            fetch: ChunkPhase::new(
                "strata-fetch",
                config.fetch_workers,
                Arc::clone(&relevance),
                fetch_op,
            ),
            generate: ChunkPhase::new(
                "strata-generate",
                config.generate_workers,
                Arc::clone(&relevance),
                generate_op,
            ),
            decorate: ChunkPhase::new(
                "strata-decorate",
                config.decorate_workers,
                Arc::clone(&relevance),
                decorate_op,
            ),
            internal_light: ChunkPhase::new(
                "strata-light",
                config.internal_light_workers,
                Arc::clone(&relevance),
                internal_light_op,
            ),
            propagate_light: ChunkPhase::new(
                "strata-propagate",
                config.propagate_workers,
                Arc::clone(&relevance),
                propagate_op,
            ),
            event_tx,
        });

        let reviewer = ThreadPoolBuilder::new()
            .num_threads(config.review_workers.max(1))
            .thread_name(|i| format!("strata-review-{i}"))
            .build()
            .expect("review pool");

        Self {
            pipeline,
            relevance,
            regions: Vec::new(),
            reviewer,
            event_rx,
            keep_margin: config.keep_margin,
            poll_budget: config.poll_budget.max(1),
        }
    }

    /// Track a viewer. Replaces any prior region for the same viewer and
    /// immediately reviews the new view area.
    pub fn add_region_viewer(&mut self, viewer: Arc<dyn Viewer>, distance: i32) {
        let region = CacheRegion::new(viewer, distance);
        self.regions.retain(|r| r.viewer_id() != region.viewer_id());
        let area = region.grid_box().expand(1);
        self.regions.push(region);
        self.refresh_relevance();
        self.pipeline.review_area(area);
    }

    /// Stop tracking a viewer. Its chunks stay resident until the sweep
    /// reclaims them.
    pub fn remove_region_viewer(&mut self, id: ViewerId) {
        self.regions.retain(|r| r.viewer_id() != id);
    }

    /// One control tick: advance regions, drain stage results, sweep the
    /// cache. Never blocks on stage work.
    pub fn update(&mut self) {
        for region in &mut self.regions {
            region.update();
        }
        self.refresh_relevance();

        for region in &mut self.regions {
            if region.is_dirty() {
                region.set_up_to_date();
                let area = region.grid_box().expand(1);
                let pipeline = Arc::clone(&self.pipeline);
                self.reviewer.spawn(move || pipeline.review_area(area));
            }
        }

        for phase in self.pipeline.phases() {
            for _ in 0..self.poll_budget {
                let Some(pos) = phase.poll() else {
                    break;
                };
                log::debug!("{} finished {:?}", phase.name(), pos);
                // A finished chunk can unblock any chunk in its ring, so the
                // whole neighborhood gets rechecked, not just `pos`.
                for p in neighborhood(pos).iter() {
                    self.pipeline.check_state(p);
                }
            }
        }

        self.sweep();
    }

    pub fn is_chunk_available(&self, coord: ChunkCoord) -> bool {
        self.pipeline.near.contains(coord)
    }

    pub fn get_chunk(&self, coord: ChunkCoord) -> Option<Arc<Chunk>> {
        self.pipeline.near.get(coord)
    }

    /// Aggregate stored extent; delegates to the far store.
    pub fn size(&self) -> f32 {
        self.pipeline.store.size()
    }

    pub fn drain_events(&self) -> Vec<ChunkEvent> {
        self.event_rx.try_iter().collect()
    }

    pub fn stats(&self) -> ProviderStats {
        ProviderStats {
            resident: self.pipeline.near.len(),
            regions: self.regions.len(),
            fetch_backlog: self.pipeline.fetch.backlog(),
            generate_backlog: self.pipeline.generate.backlog(),
            decorate_backlog: self.pipeline.decorate.backlog(),
            internal_light_backlog: self.pipeline.internal_light.backlog(),
            propagate_backlog: self.pipeline.propagate_light.backlog(),
        }
    }

    /// Stop all stages and spill every resident chunk to the far store.
    /// In-flight stage work is abandoned.
    pub fn dispose(self) {
        for phase in self.pipeline.phases() {
            phase.dispose();
        }
        let spilled = {
            let chunks = self.pipeline.near.drain_all();
            let count = chunks.len();
            for chunk in chunks {
                self.pipeline.store.put(chunk.coord(), chunk.snapshot());
            }
            count
        };
        log::info!("provider disposed, {spilled} chunks spilled to far store");
    }

    fn refresh_relevance(&self) {
        self.relevance
            .refresh(self.regions.iter().filter_map(|r| r.center()).collect());
    }

    /// Evict everything outside every region's keep area that no stage is
    /// touching. Runs only under capacity pressure; eviction is best-effort,
    /// never a rejection of new chunks.
    fn sweep(&self) {
        let near = &self.pipeline.near;
        if !near.over_capacity() {
            return;
        }
        log::info!("compacting near cache ({} resident)", near.len());
        for pos in near.coords() {
            let keep = self
                .regions
                .iter()
                .any(|r| r.grid_box().expand(self.keep_margin).contains(pos))
                || self.pipeline.any_processing(pos);
            if keep {
                continue;
            }
            if let Some(chunk) = near.remove(pos) {
                self.pipeline.store.put(pos, chunk.snapshot());
            }
        }
    }
}
