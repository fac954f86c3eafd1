//! Headless terrain streaming demo
//!
//! Usage: endless-terrain [config.toml] [--png height.png]
//!
//! Walks an observer east across the terrain, ticking the streamer once per
//! step, then logs what was generated.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use glam::Vec2;
use parking_lot::Mutex;

use endless_terrain::{ChunkCoord, ChunkStreamer, HeightGrid, MeshData, RenderSink, TerrainConfig};

const WALK_TICKS: usize = 240;
const WALK_SPEED: f32 = 6.0;
const TICK_INTERVAL: Duration = Duration::from_millis(16);
const SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Default)]
struct SinkTally {
    heights: usize,
    meshes_shown: usize,
    triangles_shown: usize,
    visibility_flips: usize,
    evicted: usize,
}

/// Counts what a renderer would have uploaded
struct TallySink {
    tally: Arc<Mutex<SinkTally>>,
}

impl RenderSink for TallySink {
    fn height_ready(&mut self, _coord: ChunkCoord, _grid: &HeightGrid) {
        self.tally.lock().heights += 1;
    }

    fn mesh_displayed(&mut self, coord: ChunkCoord, mesh: &MeshData) {
        log::trace!("[Demo] ({}, {}) shows LOD {}", coord.x, coord.y, mesh.lod);
        let mut tally = self.tally.lock();
        tally.meshes_shown += 1;
        tally.triangles_shown += mesh.triangle_count();
    }

    fn visibility_changed(&mut self, _coord: ChunkCoord, _visible: bool) {
        self.tally.lock().visibility_flips += 1;
    }

    fn chunk_evicted(&mut self, _coord: ChunkCoord) {
        self.tally.lock().evicted += 1;
    }
}

struct Args {
    config: Option<PathBuf>,
    png: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args { config: None, png: None };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--png" => {
                let path = iter.next().context("--png needs an output path")?;
                args.png = Some(PathBuf::from(path));
            }
            flag if flag.starts_with("--") => bail!("unknown flag {}", flag),
            path => args.config = Some(PathBuf::from(path)),
        }
    }
    Ok(args)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args()?;
    let config = match &args.config {
        Some(path) => TerrainConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => TerrainConfig::default(),
    };
    let settings = config.validate().context("Invalid terrain config")?;

    if let Some(path) = &args.png {
        settings
            .generate_height_grid(Vec2::ZERO)
            .save_png(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("[Demo] Wrote origin height map to {}", path.display());
    }

    let tally = Arc::new(Mutex::new(SinkTally::default()));
    let sink = TallySink { tally: Arc::clone(&tally) };
    let mut streamer = ChunkStreamer::new(settings, Box::new(sink)).context("Failed to start streamer")?;

    let started = Instant::now();
    let mut observer = Vec2::ZERO;
    for step in 0..WALK_TICKS {
        let report = streamer.tick(observer);
        if report.recomputed {
            log::debug!(
                "[Demo] Step {}: window moved, {} visible, {} in flight",
                step,
                report.visible_chunks,
                report.pending
            );
        }
        observer.x += WALK_SPEED;
        thread::sleep(TICK_INTERVAL);
    }

    let deadline = Instant::now() + SETTLE_TIMEOUT;
    while !streamer.is_idle() {
        if Instant::now() > deadline {
            let queue = streamer.queue_stats();
            log::warn!("[Demo] Gave up waiting for {} computations", queue.submitted - queue.delivered);
            break;
        }
        streamer.tick(observer);
        thread::sleep(TICK_INTERVAL);
    }

    let stats = streamer.stats();
    let queue = streamer.queue_stats();
    let tally = tally.lock();
    log::info!(
        "[Demo] {:.1}s: {} chunks created, {} evicted, {} window recomputes",
        started.elapsed().as_secs_f32(),
        stats.chunks_created,
        stats.chunks_evicted,
        stats.window_recomputes
    );
    log::info!(
        "[Demo] Delivered {} heights ({} to the sink) and {} meshes ({} failures), {} meshes shown ({} triangles)",
        stats.heights_delivered,
        tally.heights,
        stats.meshes_delivered,
        stats.height_failures + stats.mesh_failures,
        tally.meshes_shown,
        tally.triangles_shown
    );
    log::info!(
        "[Demo] Pool ran {} jobs, {} rejected into backlog; {} visibility changes, {} sink evictions",
        queue.pool.completed,
        queue.pool.rejected,
        tally.visibility_flips,
        tally.evicted
    );
    Ok(())
}
