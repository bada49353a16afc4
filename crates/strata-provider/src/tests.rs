use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use strata_chunk::{Block, Chunk, ChunkCoord, ChunkState, GridBox, VoxelBuf};
use strata_geom::Vec3;
use strata_store::{ChunkStore, MemoryStore};
use strata_world::ChunkGenerator;

use crate::config::ProviderConfig;
use crate::phase::{ChunkPhase, PhaseError};
use crate::provider::{ChunkEvent, ChunkProvider};
use crate::region::{Viewer, ViewerId};
use crate::relevance::RelevanceSnapshot;

struct TestViewer {
    id: ViewerId,
    pos: Mutex<Option<Vec3>>,
}

impl TestViewer {
    fn new(id: u64, pos: Option<Vec3>) -> Arc<Self> {
        Arc::new(Self {
            id: ViewerId(id),
            pos: Mutex::new(pos),
        })
    }

    fn move_to(&self, pos: Vec3) {
        *self.pos.lock().unwrap() = Some(pos);
    }
}

impl Viewer for TestViewer {
    fn id(&self) -> ViewerId {
        self.id
    }
    fn position(&self) -> Option<Vec3> {
        *self.pos.lock().unwrap()
    }
}

/// Deterministic coordinate-tagged content; all passes leave content alone so
/// round-trip comparisons can use fresh `generate` output as the expectation.
struct TaggedGenerator;

impl TaggedGenerator {
    fn content(coord: ChunkCoord) -> VoxelBuf {
        let mut buf = VoxelBuf::new(2, 2, 2);
        let id = (coord.cx.rem_euclid(101) * 31 + coord.cz.rem_euclid(29) + 1) as u16;
        buf.set_local(0, 0, 0, Block { id });
        buf
    }
}

impl ChunkGenerator for TaggedGenerator {
    fn generate(&self, coord: ChunkCoord) -> VoxelBuf {
        Self::content(coord)
    }
    fn decorate(&self, _chunk: &Chunk, _neighbors: &[Arc<Chunk>]) {}
    fn light_internally(&self, _chunk: &Chunk) {}
    fn propagate_light(&self, _chunk: &Chunk, _neighbors: &[Arc<Chunk>]) {}
}

fn test_config() -> ProviderConfig {
    ProviderConfig {
        fetch_workers: 2,
        generate_workers: 2,
        decorate_workers: 2,
        internal_light_workers: 2,
        propagate_workers: 2,
        review_workers: 1,
        cache_capacity: 4096,
        keep_margin: 4,
        poll_budget: 1,
    }
}

fn new_provider(store: Arc<MemoryStore>, config: ProviderConfig) -> ChunkProvider {
    ChunkProvider::new(store, Arc::new(TaggedGenerator), config)
}

fn tick_until(
    provider: &mut ChunkProvider,
    deadline: Duration,
    mut cond: impl FnMut(&ChunkProvider) -> bool,
) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        provider.update();
        if cond(provider) {
            return true;
        }
        thread::sleep(Duration::from_micros(500));
    }
    false
}

fn state_of(provider: &ChunkProvider, coord: ChunkCoord) -> Option<ChunkState> {
    provider.get_chunk(coord).map(|c| c.state())
}

const DEADLINE: Duration = Duration::from_secs(60);

#[test]
fn queue_is_idempotent() {
    let runs = Arc::new(AtomicUsize::new(0));
    let op = {
        let runs = Arc::clone(&runs);
        Arc::new(move |_coord: ChunkCoord| {
            runs.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(30));
            Ok(())
        }) as crate::phase::PhaseOp
    };
    let phase = ChunkPhase::new("test-phase", 2, Arc::new(RelevanceSnapshot::new()), op);
    let coord = ChunkCoord::new(1, 0, 1);

    phase.queue(coord);
    phase.queue(coord);
    assert!(phase.processing(coord));

    let start = Instant::now();
    while !phase.has_result() && start.elapsed() < DEADLINE {
        thread::sleep(Duration::from_millis(1));
    }
    thread::sleep(Duration::from_millis(100));

    assert_eq!(phase.poll(), Some(coord));
    assert_eq!(phase.poll(), None);
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    // After an intervening poll the position is admissible again.
    phase.queue(coord);
    let start = Instant::now();
    while phase.poll().is_none() {
        assert!(start.elapsed() < DEADLINE, "re-queued position never ran");
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[test]
fn failed_op_leaves_position_requeueable() {
    let runs = Arc::new(AtomicUsize::new(0));
    let op = {
        let runs = Arc::clone(&runs);
        Arc::new(move |_coord: ChunkCoord| {
            if runs.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(PhaseError::new("transient collaborator failure"))
            } else {
                Ok(())
            }
        }) as crate::phase::PhaseOp
    };
    let phase = ChunkPhase::new("test-flaky", 1, Arc::new(RelevanceSnapshot::new()), op);
    let coord = ChunkCoord::new(0, 0, 0);

    phase.queue(coord);
    let start = Instant::now();
    while phase.processing(coord) {
        assert!(start.elapsed() < DEADLINE);
        thread::sleep(Duration::from_millis(1));
    }
    // The failure produced no result and released the position.
    assert_eq!(phase.poll(), None);

    phase.queue(coord);
    let start = Instant::now();
    while phase.poll().is_none() {
        assert!(start.elapsed() < DEADLINE, "retry never completed");
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[test]
fn region_replace_not_merge() {
    let store = Arc::new(MemoryStore::new());
    let mut provider = new_provider(Arc::clone(&store), test_config());
    let viewer = TestViewer::new(1, Some(Vec3::new(8.0, 0.0, 8.0)));

    provider.add_region_viewer(viewer.clone(), 1);
    provider.add_region_viewer(viewer.clone(), 2);
    assert_eq!(provider.stats().regions, 1);

    // The latest view distance wins: distance 2 reviews out to radius 3.
    assert!(tick_until(&mut provider, DEADLINE, |p| {
        p.is_chunk_available(ChunkCoord::new(3, 0, 0))
    }));
    assert!(!provider.is_chunk_available(ChunkCoord::new(4, 0, 0)));
    provider.dispose();
}

#[test]
fn dormant_viewer_contributes_nothing() {
    let store = Arc::new(MemoryStore::new());
    let mut provider = new_provider(Arc::clone(&store), test_config());
    provider.add_region_viewer(TestViewer::new(9, None), 2);

    for _ in 0..50 {
        provider.update();
    }
    let stats = provider.stats();
    assert_eq!(stats.regions, 1);
    assert_eq!(stats.resident, 0);
    assert_eq!(stats.generate_backlog, 0);
    assert_eq!(stats.fetch_backlog, 0);
    provider.dispose();
}

#[test]
fn scenario_view_distance_two_generates_and_gates() {
    let store = Arc::new(MemoryStore::new());
    let mut provider = new_provider(Arc::clone(&store), test_config());
    provider.add_region_viewer(TestViewer::new(1, Some(Vec3::new(8.0, 0.0, 8.0))), 2);

    // Empty far store: the whole reviewed box arrives via Generate.
    let review_box = GridBox::from_center_extents(ChunkCoord::new(0, 0, 0), 2, 0, 2).expand(1);
    assert!(tick_until(&mut provider, DEADLINE, |p| {
        review_box.iter().all(|c| p.is_chunk_available(c))
    }));
    assert_eq!(store.stats().fetches, 0);
    assert!(!provider.is_chunk_available(ChunkCoord::new(4, 0, 0)));

    // Gating wavefront: the center of the 7x7 box sits 4 rings from the
    // nearest absent chunk, so it tops out one state short of Complete.
    assert!(tick_until(&mut provider, DEADLINE, |p| {
        state_of(p, ChunkCoord::new(0, 0, 0)) == Some(ChunkState::FullLightConnectivityPending)
    }));
    for _ in 0..200 {
        provider.update();
    }
    assert_eq!(
        state_of(&provider, ChunkCoord::new(0, 0, 0)),
        Some(ChunkState::FullLightConnectivityPending)
    );
    assert_eq!(
        state_of(&provider, ChunkCoord::new(3, 0, 3)),
        Some(ChunkState::AdjacencyGenerationPending)
    );
    assert!(provider.drain_events().is_empty());
    provider.dispose();
}

#[test]
fn wavefront_completes_deep_interior() {
    let store = Arc::new(MemoryStore::new());
    let mut provider = new_provider(Arc::clone(&store), test_config());
    provider.add_region_viewer(TestViewer::new(1, Some(Vec3::new(8.0, 0.0, 8.0))), 3);

    // View distance 3 reviews a 9x9 box; its center is 5 rings deep and is
    // the one chunk that can reach Complete.
    let center = ChunkCoord::new(0, 0, 0);
    assert!(tick_until(&mut provider, DEADLINE, |p| {
        state_of(p, center) == Some(ChunkState::Complete)
    }));

    assert!(provider
        .drain_events()
        .contains(&ChunkEvent::Completed(center)));

    // Neighbor-gated monotonicity: a chunk N rings from the edge of the
    // populated area can be at most N - 1 states in.
    assert_eq!(
        state_of(&provider, ChunkCoord::new(4, 0, 4)),
        Some(ChunkState::AdjacencyGenerationPending)
    );
    assert_eq!(
        state_of(&provider, ChunkCoord::new(0, 0, 4)),
        Some(ChunkState::AdjacencyGenerationPending)
    );
    assert!(
        state_of(&provider, ChunkCoord::new(3, 0, 3)).unwrap()
            <= ChunkState::InternalLightGenerationPending
    );
    assert!(
        state_of(&provider, ChunkCoord::new(2, 0, 0)).unwrap()
            <= ChunkState::LightPropagationPending
    );
    provider.dispose();
}

#[test]
fn eviction_respects_keep_area_and_round_trips_content() {
    let store = Arc::new(MemoryStore::new());
    let mut config = test_config();
    config.cache_capacity = 4;
    config.keep_margin = 0;
    let mut provider = new_provider(Arc::clone(&store), config);

    let viewer = TestViewer::new(1, Some(Vec3::new(8.0, 0.0, 8.0)));
    provider.add_region_viewer(viewer.clone(), 1);

    // Radius-2 review box overflows the capacity of 4, so the sweep must
    // evict everything outside the radius-1 keep area while the keep area
    // itself stays resident.
    let far_corner = ChunkCoord::new(2, 0, 2);
    let keep_area = GridBox::from_center_extents(ChunkCoord::new(0, 0, 0), 1, 0, 1);
    assert!(tick_until(&mut provider, DEADLINE, |p| {
        store.contains(far_corner)
            && !p.is_chunk_available(far_corner)
            && keep_area.iter().all(|pos| p.is_chunk_available(pos))
    }));
    provider.update();
    for pos in keep_area.iter() {
        assert!(provider.is_chunk_available(pos), "evicted kept chunk {pos:?}");
    }

    // Evicted content survived the store boundary unchanged.
    assert_eq!(store.fetch(far_corner), Some(TaggedGenerator::content(far_corner)));

    // Walk the viewer over the evicted chunk: it must come back via Fetch
    // with the same content.
    viewer.move_to(Vec3::new(2.0 * 16.0 + 8.0, 0.0, 2.0 * 16.0 + 8.0));
    assert!(tick_until(&mut provider, DEADLINE, |p| {
        p.is_chunk_available(far_corner)
    }));
    assert!(store.stats().fetches > 0);
    let resident = provider.get_chunk(far_corner).unwrap();
    assert_eq!(resident.snapshot(), TaggedGenerator::content(far_corner));
    provider.dispose();
}

#[test]
fn dispose_spills_resident_chunks() {
    let store = Arc::new(MemoryStore::new());
    let mut provider = new_provider(Arc::clone(&store), test_config());
    provider.add_region_viewer(TestViewer::new(1, Some(Vec3::new(8.0, 0.0, 8.0))), 1);

    let origin = ChunkCoord::new(0, 0, 0);
    assert!(tick_until(&mut provider, DEADLINE, |p| {
        p.is_chunk_available(origin)
    }));
    provider.dispose();

    assert!(store.contains(origin));
    assert_eq!(store.fetch(origin), Some(TaggedGenerator::content(origin)));
}

#[test]
fn size_delegates_to_far_store() {
    let store = Arc::new(MemoryStore::new());
    store.put(ChunkCoord::new(5, 0, 5), VoxelBuf::new(1, 1, 1));
    let provider = new_provider(Arc::clone(&store), test_config());
    assert_eq!(provider.size(), 1.0);
    provider.dispose();
}
