//! Demo driver: a scripted viewer orbiting the origin while the provider
//! streams chunks in and out around it.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use clap::Parser;
use strata_chunk::ChunkCoord;
use strata_geom::Vec3;
use strata_provider::{ChunkProvider, ProviderConfig, Viewer, ViewerId, load_provider_config};
use strata_store::MemoryStore;
use strata_world::{NoiseGenerator, WorldGenConfig, load_worldgen_config};

#[derive(Parser, Debug)]
#[command(name = "strata", about = "Streaming chunk provider demo")]
struct Args {
    /// Control ticks to run.
    #[arg(long, default_value_t = 600)]
    ticks: u32,

    /// View distance of the scripted viewer, in chunks.
    #[arg(long, default_value_t = 3)]
    view_distance: i32,

    /// Orbit radius of the scripted viewer, in blocks.
    #[arg(long, default_value_t = 160.0)]
    orbit_radius: f32,

    /// Optional provider config (toml).
    #[arg(long)]
    provider_config: Option<PathBuf>,

    /// Optional worldgen config (toml).
    #[arg(long)]
    worldgen_config: Option<PathBuf>,
}

struct OrbitViewer {
    pos: Mutex<Option<Vec3>>,
}

impl OrbitViewer {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            pos: Mutex::new(Some(Vec3::ZERO)),
        })
    }

    fn move_to(&self, pos: Vec3) {
        *self.pos.lock().unwrap() = Some(pos);
    }
}

impl Viewer for OrbitViewer {
    fn id(&self) -> ViewerId {
        ViewerId(1)
    }
    fn position(&self) -> Option<Vec3> {
        *self.pos.lock().unwrap()
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let worldgen = match &args.worldgen_config {
        Some(path) => match load_worldgen_config(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                log::error!("failed to load worldgen config: {err}");
                std::process::exit(1);
            }
        },
        None => WorldGenConfig::default(),
    };
    let provider_cfg = match &args.provider_config {
        Some(path) => match load_provider_config(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                log::error!("failed to load provider config: {err}");
                std::process::exit(1);
            }
        },
        None => ProviderConfig::default(),
    };

    let store = Arc::new(MemoryStore::new());
    let generator = Arc::new(NoiseGenerator::new(worldgen));
    let mut provider = ChunkProvider::new(store.clone(), generator, provider_cfg);

    let viewer = OrbitViewer::new();
    provider.add_region_viewer(viewer.clone(), args.view_distance);

    let mut completed: u64 = 0;
    for tick in 0..args.ticks {
        let angle = tick as f32 * 0.01;
        let pos = Vec3::new(
            angle.cos() * args.orbit_radius,
            64.0,
            angle.sin() * args.orbit_radius,
        );
        viewer.move_to(pos);

        provider.update();
        completed += provider.drain_events().len() as u64;

        if tick % 60 == 0 {
            let stats = provider.stats();
            log::info!(
                "tick {tick}: viewer at {:?}, {} resident, backlogs g={} d={} l={} p={}, {completed} complete",
                ChunkCoord::from_world(pos),
                stats.resident,
                stats.generate_backlog,
                stats.decorate_backlog,
                stats.internal_light_backlog,
                stats.propagate_backlog,
            );
        }
        thread::sleep(Duration::from_millis(5));
    }

    provider.dispose();
    log::info!(
        "done: {completed} chunks completed, {} chunks in far store",
        store.stats().entries
    );
}
