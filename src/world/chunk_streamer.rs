//! Chunk streaming around a moving observer
//!
//! `ChunkStreamer::tick` is the only entry point. Each tick it:
//! 1. Delivers every finished height/mesh computation to its chunk
//! 2. Recomputes the tile window if the observer moved far enough
//!
//! All chunk state lives in `StreamingContext`, which completion handlers
//! receive by `&mut`. Workers only ever see immutable snapshots.

use std::sync::Arc;

use glam::Vec2;
use rustc_hash::FxHashMap;

use super::chunk::{Chunk, LodSwitch};
use super::position::ChunkCoord;
use crate::config::TerrainSettings;
use crate::error::{ComputeError, TerrainError, TerrainResult};
use crate::renderer::{MeshData, RenderSink};
use crate::thread_pool::{AsyncComputeQueue, QueueStats};
use crate::world::generation::HeightGrid;

/// Observer position as seen by the streamer
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ObserverState {
    pub position: Vec2,
    /// Position at the last window recompute; `None` until the first tick
    pub last_recomputed: Option<Vec2>,
}

impl ObserverState {
    pub fn needs_recompute(&self, threshold_squared: f32) -> bool {
        match self.last_recomputed {
            Some(last) => (self.position - last).length_squared() > threshold_squared,
            None => true,
        }
    }
}

/// Running totals for a streaming session
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StreamerStats {
    pub chunks_created: u64,
    pub chunks_evicted: u64,
    pub window_recomputes: u64,
    pub heights_delivered: u64,
    pub meshes_delivered: u64,
    pub height_failures: u64,
    pub mesh_failures: u64,
    /// Results that arrived for chunks no longer in the index
    pub discarded_results: u64,
}

/// What happened during one tick
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Completion handlers run
    pub delivered: usize,
    pub recomputed: bool,
    pub visible_chunks: usize,
    /// Computations still in flight
    pub pending: u64,
}

/// Everything the streamer mutates. Owned by `ChunkStreamer`, lent to
/// completion handlers during `drain`.
pub struct StreamingContext {
    settings: Arc<TerrainSettings>,
    chunks: FxHashMap<ChunkCoord, Chunk>,
    observer: ObserverState,
    window_center: Option<ChunkCoord>,
    visible_last_update: Vec<ChunkCoord>,
    sink: Box<dyn RenderSink>,
    stats: StreamerStats,
    next_epoch: u64,
}

type Queue = AsyncComputeQueue<StreamingContext>;

impl StreamingContext {
    fn new(settings: Arc<TerrainSettings>, sink: Box<dyn RenderSink>) -> Self {
        Self {
            settings,
            chunks: FxHashMap::default(),
            observer: ObserverState::default(),
            window_center: None,
            visible_last_update: Vec::new(),
            sink,
            stats: StreamerStats::default(),
            next_epoch: 1,
        }
    }

    fn update_visible_chunks(&mut self, queue: &mut Queue) {
        // Hide last tick's set first so nothing stays visible with stale state
        for coord in std::mem::take(&mut self.visible_last_update) {
            if let Some(chunk) = self.chunks.get_mut(&coord) {
                if chunk.set_visible(false) {
                    self.sink.visibility_changed(coord, false);
                }
            }
        }

        let center = ChunkCoord::from_world_pos(self.observer.position, self.settings.chunk_size());
        let radius = self.settings.chunks_visible_in_distance();
        self.window_center = Some(center);

        let mut created = 0;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let coord = center.offset(dx, dy);
                if self.chunks.contains_key(&coord) {
                    self.update_chunk(coord, queue);
                } else {
                    self.create_chunk(coord, queue);
                    created += 1;
                }
            }
        }

        log::info!(
            "[ChunkStreamer] Window centred on ({}, {}): {} new chunks, {} visible, {} indexed",
            center.x,
            center.y,
            created,
            self.visible_last_update.len(),
            self.chunks.len()
        );

        self.evict_hidden_chunks(center, radius);
    }

    fn create_chunk(&mut self, coord: ChunkCoord, queue: &mut Queue) {
        let epoch = self.next_epoch;
        self.next_epoch += 1;

        let mut chunk = Chunk::new(coord, self.settings.chunk_size(), self.settings.lods.len())
            .with_epoch(epoch);
        chunk.request_height();

        let settings = Arc::clone(&self.settings);
        let center = chunk.center();
        queue.submit(
            "height",
            move || settings.generate_height_grid(center),
            move |ctx: &mut StreamingContext, queue, result| {
                ctx.on_height_ready(queue, coord, epoch, result)
            },
        );

        log::debug!("[ChunkStreamer] Created chunk ({}, {})", coord.x, coord.y);
        self.chunks.insert(coord, chunk);
        self.stats.chunks_created += 1;
    }

    /// Recompute visibility and LOD for one chunk. Chunks without a height
    /// grid have nothing to show and are left alone.
    fn update_chunk(&mut self, coord: ChunkCoord, queue: &mut Queue) {
        let observer = self.observer.position;
        let max_view_distance = self.settings.max_view_distance();

        let Some(chunk) = self.chunks.get_mut(&coord) else {
            return;
        };
        let Some(grid) = chunk.height_grid().cloned() else {
            return;
        };

        let distance = chunk.distance_to(observer);
        let visible = distance <= max_view_distance;
        if visible {
            let lod_index = self.settings.lods.select(distance);
            match chunk.switch_lod(lod_index) {
                LodSwitch::Switched(mesh) => {
                    log::debug!(
                        "[ChunkStreamer] Chunk ({}, {}) now shows LOD index {}",
                        coord.x,
                        coord.y,
                        lod_index
                    );
                    self.sink.mesh_displayed(coord, &mesh);
                }
                LodSwitch::Requested => {
                    request_mesh(queue, Arc::clone(&self.settings), coord, chunk.epoch(), grid, lod_index);
                }
                LodSwitch::Unchanged | LodSwitch::Waiting => {}
            }

            if !self.visible_last_update.contains(&coord) {
                self.visible_last_update.push(coord);
            }
        } else {
            self.visible_last_update.retain(|c| *c != coord);
        }

        if chunk.set_visible(visible) {
            self.sink.visibility_changed(coord, visible);
        }
    }

    /// True when `coord` still holds the chunk instance a result was computed for
    fn is_live(&self, coord: ChunkCoord, epoch: u64) -> bool {
        self.chunks.get(&coord).is_some_and(|chunk| chunk.epoch() == epoch)
    }

    fn discard(&mut self, coord: ChunkCoord, what: &str) {
        self.stats.discarded_results += 1;
        log::warn!(
            "[ChunkStreamer] Discarding {} result for evicted chunk ({}, {})",
            what,
            coord.x,
            coord.y
        );
    }

    fn on_height_ready(
        &mut self,
        queue: &mut Queue,
        coord: ChunkCoord,
        epoch: u64,
        result: Result<HeightGrid, ComputeError>,
    ) {
        if !self.is_live(coord, epoch) {
            self.discard(coord, "height");
            return;
        }
        let Some(chunk) = self.chunks.get_mut(&coord) else {
            return;
        };

        match result {
            Ok(grid) => {
                chunk.set_height(Ok(grid));
                self.stats.heights_delivered += 1;
                if let Some(grid) = chunk.height_grid() {
                    self.sink.height_ready(coord, grid);
                }
                self.update_chunk(coord, queue);
            }
            Err(e) => {
                log::error!("[ChunkStreamer] Height for chunk ({}, {}) failed: {}", coord.x, coord.y, e);
                chunk.set_height(Err(e.to_string()));
                self.stats.height_failures += 1;
            }
        }
    }

    fn on_mesh_ready(
        &mut self,
        queue: &mut Queue,
        coord: ChunkCoord,
        epoch: u64,
        lod_index: usize,
        result: Result<TerrainResult<MeshData>, ComputeError>,
    ) {
        if !self.is_live(coord, epoch) {
            self.discard(coord, "mesh");
            return;
        }
        let Some(chunk) = self.chunks.get_mut(&coord) else {
            return;
        };

        match result.map_err(TerrainError::from).and_then(|mesh| mesh) {
            Ok(mesh) => {
                chunk.set_mesh(lod_index, Ok(mesh));
                self.stats.meshes_delivered += 1;
            }
            Err(e) => {
                log::error!(
                    "[ChunkStreamer] Mesh LOD index {} for chunk ({}, {}) failed: {}",
                    lod_index,
                    coord.x,
                    coord.y,
                    e
                );
                chunk.set_mesh(lod_index, Err(e.to_string()));
                self.stats.mesh_failures += 1;
            }
        }

        // Display it if it is still the wanted LOD
        self.update_chunk(coord, queue);
    }

    /// Drop hidden chunks outside the window, farthest first, until the index
    /// fits `max_chunks`
    fn evict_hidden_chunks(&mut self, center: ChunkCoord, radius: i32) {
        let Some(max_chunks) = self.settings.max_chunks else {
            return;
        };
        if self.chunks.len() <= max_chunks {
            return;
        }

        let observer = self.observer.position;
        let mut candidates: Vec<(f32, ChunkCoord)> = self
            .chunks
            .values()
            .filter(|chunk| {
                let coord = chunk.coord();
                !chunk.is_visible()
                    && ((coord.x - center.x).abs() > radius || (coord.y - center.y).abs() > radius)
            })
            .map(|chunk| (chunk.bounds().sqr_distance(observer), chunk.coord()))
            .collect();
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

        let excess = self.chunks.len() - max_chunks;
        let mut evicted = 0;
        for (_, coord) in candidates.into_iter().take(excess) {
            self.chunks.remove(&coord);
            self.sink.chunk_evicted(coord);
            evicted += 1;
        }
        self.stats.chunks_evicted += evicted;

        if evicted > 0 {
            log::info!(
                "[ChunkStreamer] Evicted {} hidden chunks ({} remain, cap {})",
                evicted,
                self.chunks.len(),
                max_chunks
            );
        }
        if self.chunks.len() > max_chunks {
            log::debug!(
                "[ChunkStreamer] {} chunks in range exceed cap {}",
                self.chunks.len(),
                max_chunks
            );
        }
    }
}

fn request_mesh(
    queue: &mut Queue,
    settings: Arc<TerrainSettings>,
    coord: ChunkCoord,
    epoch: u64,
    grid: Arc<HeightGrid>,
    lod_index: usize,
) {
    let Some(level) = settings.lods.get(lod_index).copied() else {
        return;
    };
    queue.submit(
        "mesh",
        move || settings.build_mesh(&grid, level.lod),
        move |ctx: &mut StreamingContext, queue, result| {
            ctx.on_mesh_ready(queue, coord, epoch, lod_index, result)
        },
    );
}

/// Streams terrain tiles around an observer
pub struct ChunkStreamer {
    context: StreamingContext,
    queue: Queue,
}

impl ChunkStreamer {
    pub fn new(settings: TerrainSettings, sink: Box<dyn RenderSink>) -> TerrainResult<Self> {
        let settings = Arc::new(settings);
        let queue = AsyncComputeQueue::new(settings.workers.clone())?;

        log::info!(
            "[ChunkStreamer] Tile resolution {}, {} LOD levels, view distance {}",
            settings.tile_resolution,
            settings.lods.len(),
            settings.max_view_distance()
        );

        Ok(Self {
            context: StreamingContext::new(settings, sink),
            queue,
        })
    }

    /// Advance one control-loop step with the observer at `observer`
    pub fn tick(&mut self, observer: Vec2) -> TickReport {
        self.context.observer.position = observer;

        let delivered = self.queue.drain(&mut self.context);

        let threshold_squared = self.context.settings.move_threshold_squared();
        let recomputed = self.context.observer.needs_recompute(threshold_squared);
        if recomputed {
            self.context.observer.last_recomputed = Some(observer);
            self.context.stats.window_recomputes += 1;
            self.context.update_visible_chunks(&mut self.queue);
        }

        TickReport {
            delivered,
            recomputed,
            visible_chunks: self.context.visible_last_update.len(),
            pending: self.queue.pending(),
        }
    }

    pub fn settings(&self) -> &Arc<TerrainSettings> {
        &self.context.settings
    }

    pub fn observer(&self) -> ObserverState {
        self.context.observer
    }

    /// Tile the window was last centred on
    pub fn window_center(&self) -> Option<ChunkCoord> {
        self.context.window_center
    }

    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.context.chunks.get(&coord)
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.context.chunks.values()
    }

    pub fn chunk_count(&self) -> usize {
        self.context.chunks.len()
    }

    /// Chunks currently visible
    pub fn visible_chunks(&self) -> &[ChunkCoord] {
        &self.context.visible_last_update
    }

    pub fn stats(&self) -> StreamerStats {
        self.context.stats.clone()
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    /// No computation in flight
    pub fn is_idle(&self) -> bool {
        self.queue.is_idle()
    }

    pub fn sink(&self) -> &dyn RenderSink {
        self.context.sink.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TerrainConfig;
    use crate::renderer::NullSink;
    use crate::world::chunk::ChunkState;
    use crate::world::LodLevel;
    use std::thread;
    use std::time::{Duration, Instant};

    fn small_settings() -> TerrainSettings {
        let mut config = TerrainConfig::default();
        config.mesh.tile_resolution = 9;
        config.streaming.lods = vec![LodLevel::new(0, 10.0), LodLevel::new(1, 20.0)];
        config.workers.threads = Some(2);
        config.validate().expect("valid test config")
    }

    fn tick_until_idle(streamer: &mut ChunkStreamer, observer: Vec2) {
        let deadline = Instant::now() + Duration::from_secs(20);
        loop {
            streamer.tick(observer);
            if streamer.is_idle() {
                streamer.tick(observer);
                if streamer.is_idle() {
                    return;
                }
            }
            assert!(Instant::now() < deadline, "streamer did not settle");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_observer_recompute_threshold() {
        let mut observer = ObserverState::default();
        assert!(observer.needs_recompute(625.0));

        observer.last_recomputed = Some(Vec2::ZERO);
        observer.position = Vec2::new(10.0, 0.0);
        assert!(!observer.needs_recompute(625.0));
        observer.position = Vec2::new(25.0, 0.0);
        assert!(!observer.needs_recompute(625.0));
        observer.position = Vec2::new(26.0, 0.0);
        assert!(observer.needs_recompute(625.0));
    }

    #[test]
    fn test_window_recentres_past_threshold() {
        let mut streamer = ChunkStreamer::new(small_settings(), Box::new(NullSink)).expect("streamer");

        let first = streamer.tick(Vec2::ZERO);
        assert!(first.recomputed);
        assert_eq!(streamer.window_center(), Some(ChunkCoord::new(0, 0)));
        // radius ceil(20 / 8) = 3
        assert_eq!(streamer.chunk_count(), 49);

        let short = streamer.tick(Vec2::new(10.0, 0.0));
        assert!(!short.recomputed);
        assert_eq!(streamer.window_center(), Some(ChunkCoord::new(0, 0)));

        let far = streamer.tick(Vec2::new(26.0, 0.0));
        assert!(far.recomputed);
        assert_eq!(streamer.window_center(), Some(ChunkCoord::new(3, 0)));
        assert_eq!(streamer.stats().window_recomputes, 2);
        assert_eq!(streamer.chunk_count(), 49 + 3 * 7);
    }

    #[test]
    fn test_chunks_reach_displayed_state() {
        let mut streamer = ChunkStreamer::new(small_settings(), Box::new(NullSink)).expect("streamer");
        tick_until_idle(&mut streamer, Vec2::ZERO);

        let origin = streamer.chunk(ChunkCoord::new(0, 0)).expect("origin chunk");
        assert_eq!(origin.state(), ChunkState::Displayed(0));
        assert!(origin.is_visible());

        // Nearest edge of (2, 0) is 12 away: coarser level
        let near = streamer.chunk(ChunkCoord::new(2, 0)).expect("chunk");
        assert_eq!(near.state(), ChunkState::Displayed(1));

        // Nearest edge of (3, 0) is 20 away: still in range
        assert!(streamer.chunk(ChunkCoord::new(3, 0)).expect("chunk").is_visible());
        // Corner (3, 3) is ~28 away: hidden, but its height is cached
        let corner = streamer.chunk(ChunkCoord::new(3, 3)).expect("chunk");
        assert!(!corner.is_visible());
        assert_eq!(corner.state(), ChunkState::HeightReady);

        let stats = streamer.stats();
        assert_eq!(stats.heights_delivered, 49);
        assert_eq!(stats.height_failures + stats.mesh_failures, 0);
        assert_eq!(streamer.visible_chunks().len(), streamer.chunks().filter(|c| c.is_visible()).count());
    }

    #[test]
    fn test_visible_list_has_no_duplicates() {
        let mut streamer = ChunkStreamer::new(small_settings(), Box::new(NullSink)).expect("streamer");
        tick_until_idle(&mut streamer, Vec2::ZERO);
        // Second recompute over the same tiles
        tick_until_idle(&mut streamer, Vec2::new(0.0, 30.0));
        tick_until_idle(&mut streamer, Vec2::ZERO);

        let mut visible = streamer.visible_chunks().to_vec();
        let total = visible.len();
        visible.sort_by_key(|c| (c.x, c.y));
        visible.dedup();
        assert_eq!(visible.len(), total);
        assert_eq!(streamer.stats().chunks_evicted, 0);
    }

    #[test]
    fn test_chunk_hidden_by_late_result_leaves_visible_list() {
        // Slow meshes so most of them land after the observer has moved
        let settings = small_settings().with_height_curve(|t: f32| {
            thread::sleep(Duration::from_micros(500));
            t
        });
        let mut streamer = ChunkStreamer::new(settings, Box::new(NullSink)).expect("streamer");

        let deadline = Instant::now() + Duration::from_secs(20);
        while streamer.stats().heights_delivered < 49 {
            assert!(Instant::now() < deadline, "heights did not arrive");
            streamer.tick(Vec2::ZERO);
            thread::sleep(Duration::from_millis(1));
        }
        let listed_before = streamer.visible_chunks().len();

        // Under the move threshold: only completion handlers touch visibility
        let moved = Vec2::new(-20.0, 0.0);
        tick_until_idle(&mut streamer, moved);
        assert_eq!(streamer.stats().window_recomputes, 1);

        let visible: Vec<ChunkCoord> = streamer.visible_chunks().to_vec();
        assert!(visible.len() < listed_before);
        for coord in &visible {
            assert!(streamer.chunk(*coord).expect("indexed").is_visible(), "{:?}", coord);
        }
        assert_eq!(visible.len(), streamer.chunks().filter(|c| c.is_visible()).count());
    }

    #[test]
    fn test_backlog_bounded_by_outstanding_requests() {
        let mut config = TerrainConfig::default();
        config.mesh.tile_resolution = 9;
        config.streaming.lods = vec![LodLevel::new(0, 10.0), LodLevel::new(1, 20.0)];
        config.workers.threads = Some(1);
        config.workers.queue_capacity = Some(1);
        let mut streamer =
            ChunkStreamer::new(config.validate().expect("valid"), Box::new(NullSink)).expect("streamer");

        let lod_count = streamer.settings().lods.len();
        let deadline = Instant::now() + Duration::from_secs(20);
        for step in 0..40 {
            streamer.tick(Vec2::new(step as f32 * 4.0, 0.0));
            let stats = streamer.queue_stats();
            assert!(stats.backlog <= streamer.chunk_count() * (1 + lod_count));
            assert!(Instant::now() < deadline);
        }
        tick_until_idle(&mut streamer, Vec2::new(160.0, 0.0));

        let stats = streamer.queue_stats();
        assert_eq!(stats.backlog, 0);
        assert!(stats.backlog_peak > 0);
        assert!(stats.backlog_peak <= streamer.chunk_count() * (1 + lod_count));
    }
}
