//! Tile pool with LRU eviction and asynchronous rendering
//!
//! The pool owns every tile of every zoom level. It is driven from a single
//! thread (the one that draws): lookups, allocation, eviction and
//! invalidation all take `&mut self`. Worker threads only see the render
//! jobs, each holding the [`TileCell`] it fills in.

use crate::cell::{TileCell, TileState};
use crate::config::PoolConfig;
use crate::job::{self, RenderJob, SharedListener, TilePoolListener};
use crate::lru::{LruArena, SlotId};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tileview_render::{
    tile_content_rect, Bitmap, Rect, TileGrid, TileKey, TileRenderer, ZoomLevel,
};
use tileview_scheduler::{JobId, RenderScheduler, Submission, WorkerPool, WorkerPoolConfig};

/// Statistics about pool usage
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    /// Number of tiles currently resident
    pub tile_count: usize,

    /// Maximum number of resident tiles
    pub tile_limit: usize,

    /// Lookups answered with a rendered bitmap
    pub hits: u64,

    /// Lookups that had to wait for, or start, a render
    pub misses: u64,

    /// Tiles dropped from the LRU tail
    pub evictions: u64,

    /// Tiles soft-deleted by `invalidate_region`
    pub invalidations: u64,

    /// Failed renders found on lookup
    pub failures: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Calculate resident tile utilization (0.0 to 1.0)
    pub fn utilization(&self) -> f64 {
        if self.tile_limit == 0 {
            0.0
        } else {
            self.tile_count as f64 / self.tile_limit as f64
        }
    }
}

/// A resident tile
#[derive(Debug)]
struct Tile {
    key: TileKey,
    cell: Arc<TileCell>,
    job: Option<JobId>,
}

/// Slot ids of one zoom level, row-major
#[derive(Debug)]
struct LevelGrid {
    grid: TileGrid,
    slots: Vec<Option<SlotId>>,
}

impl LevelGrid {
    fn new(grid: TileGrid) -> Self {
        Self {
            grid,
            slots: vec![None; grid.cell_count()],
        }
    }

    fn slot(&self, key: &TileKey) -> Option<SlotId> {
        let index = self.grid.index_of(key.x, key.y)?;
        self.slots.get(index).copied().flatten()
    }

    fn set(&mut self, key: &TileKey, slot: Option<SlotId>) {
        if let Some(index) = self.grid.index_of(key.x, key.y) {
            if let Some(entry) = self.slots.get_mut(index) {
                *entry = slot;
            }
        }
    }
}

#[derive(Debug)]
struct Placeholder {
    cell: Arc<TileCell>,
    job: Option<JobId>,
    // Previous bitmap, shown while a refreshed placeholder renders
    stale: Option<Arc<Bitmap>>,
}

struct Runtime {
    scheduler: Arc<RenderScheduler<RenderJob>>,
    workers: WorkerPool<RenderJob>,
}

/// Tile cache feeding a background render queue
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use tileview_cache::{PoolConfig, TilePool};
/// use tileview_render::{Bitmap, RenderResult, Rgba, TileRegion, TileRenderer, ZoomLevel};
///
/// let renderer: Arc<dyn TileRenderer> =
///     Arc::new(|buffer: &mut Bitmap, _region: &TileRegion| -> RenderResult<()> {
///         buffer.fill(Rgba::BLACK);
///         Ok(())
///     });
///
/// let mut pool = TilePool::new(PoolConfig::new(8));
/// pool.configure(Some(renderer), true);
///
/// // First request starts a render and returns nothing yet
/// assert!(pool.get_tile(ZoomLevel::NATIVE, 0, 0, 1024.0, 1024.0).is_none());
/// ```
pub struct TilePool {
    config: PoolConfig,
    runtime: Option<Runtime>,
    tiles: LruArena<Tile>,
    grids: HashMap<ZoomLevel, LevelGrid>,
    content_size: Option<(f32, f32)>,
    placeholder: Option<Placeholder>,
    listener: SharedListener,
    stats: CacheStats,
}

impl TilePool {
    /// Create an idle pool; nothing renders until [`configure`](Self::configure)
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            runtime: None,
            tiles: LruArena::new(),
            grids: HashMap::new(),
            content_size: None,
            placeholder: None,
            listener: Arc::new(RwLock::new(None)),
            stats: CacheStats::default(),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Register the receiver of tile events
    ///
    /// Takes effect for jobs already in flight.
    pub fn set_listener(&self, listener: impl TilePoolListener + 'static) {
        let listener: Arc<dyn TilePoolListener> = Arc::new(listener);
        *self.listener.write().unwrap_or_else(PoisonError::into_inner) = Some(listener);
    }

    pub fn clear_listener(&self) {
        *self.listener.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Install a renderer, or stop rendering with `None`
    ///
    /// The previous workers are told to stop without waiting for them; queued
    /// jobs are dropped and whatever is still running is discarded when it
    /// finishes. Every tile and the placeholder are released. A renderer
    /// that is not `concurrency_safe` gets a single worker.
    pub fn configure(&mut self, renderer: Option<Arc<dyn TileRenderer>>, concurrency_safe: bool) {
        self.drop_all_tiles();
        self.stop_runtime();
        self.content_size = None;

        let Some(renderer) = renderer else {
            log::debug!("tile pool stopped");
            return;
        };

        let scheduler = Arc::new(RenderScheduler::new(self.queue_capacity()));
        let executor = job::executor(renderer, self.config.background, self.listener.clone());
        let worker_config = WorkerPoolConfig::for_renderer(concurrency_safe)
            .with_poll_interval(self.config.poll_interval);
        let workers = WorkerPool::new(scheduler.clone(), executor, worker_config);

        log::debug!(
            "tile pool configured: {} worker(s), {} queued task(s), {} resident tile(s)",
            workers.num_workers(),
            self.config.max_tasks,
            self.config.resident_ceiling()
        );
        self.runtime = Some(Runtime { scheduler, workers });
    }

    /// Whether a renderer is installed
    pub fn is_configured(&self) -> bool {
        self.runtime.is_some()
    }

    /// Set the render queue capacity
    ///
    /// The resident ceiling follows at twice the capacity. Shrinking drops
    /// queued jobs from the back of the queue and tiles from the LRU tail.
    pub fn set_capacity(&mut self, max_tasks: usize) {
        if max_tasks == self.config.max_tasks {
            return;
        }
        log::debug!("tile pool capacity {} -> {}", self.config.max_tasks, max_tasks);
        self.config.max_tasks = max_tasks;

        let capacity = self.queue_capacity();
        let evicted = match &self.runtime {
            Some(runtime) => runtime.scheduler.set_capacity(capacity),
            None => Vec::new(),
        };
        self.release_evicted(evicted);
        self.evict_over_ceiling();
    }

    pub fn capacity(&self) -> usize {
        self.config.max_tasks
    }

    /// Look up a tile, starting its render if needed
    ///
    /// Returns the bitmap once rendered. Returns `None` while the tile
    /// renders, when the index lies outside the grid, when no renderer is
    /// installed or when the capacity is zero. Every lookup makes the tile
    /// the most recently used one.
    pub fn get_tile(
        &mut self,
        zoom_level: ZoomLevel,
        x: i64,
        y: i64,
        content_width: f32,
        content_height: f32,
    ) -> Option<Arc<Bitmap>> {
        if self.runtime.is_none() || self.config.max_tasks == 0 {
            return None;
        }
        self.sync_content_size(content_width, content_height);

        let grid = TileGrid::for_content(content_width, content_height, zoom_level);
        if !grid.contains(x, y) {
            return None;
        }
        let key = TileKey::new(zoom_level, x as u32, y as u32);

        let existing = self
            .grids
            .entry(zoom_level)
            .or_insert_with(|| LevelGrid::new(grid))
            .slot(&key);

        match existing {
            Some(slot) => self.lookup(slot, key, content_width, content_height),
            None => {
                self.stats.misses += 1;
                self.allocate(key, content_width, content_height);
                None
            }
        }
    }

    /// Low resolution preview of the whole content
    ///
    /// Rendered once at `content / placeholder_divisor`. Returns `None` until
    /// the first render completes. After an invalidation the previous
    /// preview keeps being returned until its replacement is ready.
    pub fn get_placeholder(
        &mut self,
        content_width: f32,
        content_height: f32,
    ) -> Option<Arc<Bitmap>> {
        if self.runtime.is_none() || content_width <= 0.0 || content_height <= 0.0 {
            return None;
        }
        self.sync_content_size(content_width, content_height);

        if let Some(placeholder) = self.placeholder.as_mut() {
            match placeholder.cell.state() {
                TileState::Rendered => {
                    placeholder.stale = None;
                    return placeholder.cell.bitmap();
                }
                TileState::Rendering => return placeholder.stale.clone(),
                TileState::Deleted | TileState::Failed => {}
            }
        }

        let stale = self.placeholder.take().and_then(|placeholder| placeholder.stale);
        let (width, height) = self.config.placeholder_size(content_width, content_height);
        let cell = Arc::new(TileCell::new());
        self.placeholder = Some(Placeholder {
            cell: cell.clone(),
            job: None,
            stale: stale.clone(),
        });

        let job = self.submit(RenderJob::Placeholder {
            cell: cell.clone(),
            width,
            height,
            content_width,
            content_height,
        });
        if let Some(placeholder) = self.placeholder.as_mut() {
            if Arc::ptr_eq(&placeholder.cell, &cell) {
                placeholder.job = job;
            }
        }

        stale
    }

    /// Soft-delete every tile overlapping `rect`
    ///
    /// `rect` is in unscaled content coordinates. Tiles that only touch its
    /// edge are kept. Deleted tiles drop their bitmap and render again on
    /// their next lookup. The placeholder is refreshed too. Returns the
    /// number of tiles invalidated.
    pub fn invalidate_region(&mut self, rect: Rect) -> usize {
        let overlapping: Vec<SlotId> = self
            .tiles
            .iter()
            .filter(|(_, tile)| {
                !tile.cell.is_deleted() && tile_content_rect(&tile.key).intersects(&rect)
            })
            .map(|(slot, _)| slot)
            .collect();

        for slot in &overlapping {
            let job = match self.tiles.get(*slot) {
                Some(tile) => {
                    let running = tile.cell.state() == TileState::Rendering;
                    tile.cell.mark_deleted();
                    if running {
                        tile.job
                    } else {
                        None
                    }
                }
                None => None,
            };
            if let Some(job) = job {
                self.cancel_job(job);
            }
        }

        let content = self
            .content_size
            .map(|(width, height)| Rect::from_xywh(0.0, 0.0, width, height));
        let touches_content = content.map_or(false, |content| content.intersects(&rect));
        if touches_content {
            self.refresh_placeholder();
        }

        self.stats.invalidations += overlapping.len() as u64;
        log::debug!("invalidated {} tile(s)", overlapping.len());
        overlapping.len()
    }

    /// State of a resident tile
    pub fn tile_state(&self, key: TileKey) -> Option<TileState> {
        let slot = self.grids.get(&key.zoom_level)?.slot(&key)?;
        self.tiles.get(slot).map(|tile| tile.cell.state())
    }

    pub fn resident_tiles(&self) -> usize {
        self.tiles.len()
    }

    /// Jobs waiting for a worker
    pub fn pending_jobs(&self) -> usize {
        self.runtime
            .as_ref()
            .map_or(0, |runtime| runtime.scheduler.pending_jobs())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            tile_count: self.tiles.len(),
            tile_limit: self.config.resident_ceiling(),
            ..self.stats
        }
    }

    // The placeholder needs a queue slot even when tiles are disabled
    fn queue_capacity(&self) -> usize {
        self.config.max_tasks.max(1)
    }

    fn lookup(
        &mut self,
        slot: SlotId,
        key: TileKey,
        content_width: f32,
        content_height: f32,
    ) -> Option<Arc<Bitmap>> {
        self.tiles.touch(slot);
        let state = self.tiles.get(slot)?.cell.state();

        match state {
            TileState::Rendered => {
                self.stats.hits += 1;
                self.tiles.get(slot)?.cell.bitmap()
            }
            TileState::Rendering => {
                self.stats.misses += 1;
                None
            }
            TileState::Deleted | TileState::Failed => {
                self.stats.misses += 1;
                if state == TileState::Failed {
                    self.stats.failures += 1;
                }

                // Never reuse a cell: a worker may still hold the old one
                let cell = Arc::new(TileCell::new());
                if let Some(tile) = self.tiles.get_mut(slot) {
                    tile.cell = cell.clone();
                    tile.job = None;
                }
                self.submit_tile(slot, key, cell, content_width, content_height);
                None
            }
        }
    }

    fn allocate(&mut self, key: TileKey, content_width: f32, content_height: f32) {
        let cell = Arc::new(TileCell::new());
        let slot = self.tiles.insert(Tile {
            key,
            cell: cell.clone(),
            job: None,
        });
        if let Some(level) = self.grids.get_mut(&key.zoom_level) {
            level.set(&key, Some(slot));
        }

        self.evict_over_ceiling();
        self.submit_tile(slot, key, cell, content_width, content_height);
    }

    fn submit_tile(
        &mut self,
        slot: SlotId,
        key: TileKey,
        cell: Arc<TileCell>,
        content_width: f32,
        content_height: f32,
    ) {
        let job = self.submit(RenderJob::Tile {
            key,
            cell: cell.clone(),
            content_width,
            content_height,
        });
        if let Some(tile) = self.tiles.get_mut(slot) {
            if Arc::ptr_eq(&tile.cell, &cell) {
                tile.job = job;
            }
        }
    }

    fn submit(&mut self, job: RenderJob) -> Option<JobId> {
        let Some(runtime) = self.runtime.as_ref() else {
            job.cell().mark_deleted();
            return None;
        };

        let submission = runtime.scheduler.submit(job);
        match submission {
            Submission::Queued { id, evicted, .. } => {
                self.release_evicted(evicted);
                Some(id)
            }
            Submission::Rejected(job) => {
                job.cell().mark_deleted();
                None
            }
        }
    }

    /// Clean up after jobs the scheduler pushed out of its queue
    ///
    /// The cell is deleted; if the grid still points at it the slot is freed
    /// so the next lookup starts over.
    fn release_evicted(&mut self, jobs: Vec<RenderJob>) {
        for job in jobs {
            job.cell().mark_deleted();

            if let RenderJob::Tile { key, cell, .. } = job {
                log::trace!("render of tile {} evicted from queue", key);
                let Some(slot) = self.grids.get(&key.zoom_level).and_then(|level| level.slot(&key))
                else {
                    continue;
                };
                let same_cell = self
                    .tiles
                    .get(slot)
                    .map_or(false, |tile| Arc::ptr_eq(&tile.cell, &cell));
                if same_cell {
                    self.tiles.remove(slot);
                    if let Some(level) = self.grids.get_mut(&key.zoom_level) {
                        level.set(&key, None);
                    }
                }
            }
        }
    }

    fn evict_over_ceiling(&mut self) {
        let ceiling = self.config.resident_ceiling();
        while self.tiles.len() > ceiling {
            let Some((_, tile)) = self.tiles.pop_oldest() else {
                break;
            };
            if let Some(level) = self.grids.get_mut(&tile.key.zoom_level) {
                level.set(&tile.key, None);
            }
            self.release_tile(tile);
            self.stats.evictions += 1;
        }
    }

    /// Delete a tile that already left the arena, cancelling its queued job
    fn release_tile(&self, tile: Tile) {
        if tile.cell.state() == TileState::Rendering {
            if let Some(job) = tile.job {
                self.cancel_job(job);
            }
        }
        tile.cell.mark_deleted();
    }

    fn cancel_job(&self, job: JobId) {
        if let Some(runtime) = &self.runtime {
            runtime.scheduler.cancel_job(job);
        }
    }

    fn refresh_placeholder(&mut self) {
        let Some(placeholder) = self.placeholder.as_mut() else {
            return;
        };
        if placeholder.cell.is_deleted() {
            return;
        }

        if let Some(bitmap) = placeholder.cell.bitmap() {
            placeholder.stale = Some(bitmap);
        }
        let running = placeholder.cell.state() == TileState::Rendering;
        placeholder.cell.mark_deleted();
        let job = if running { placeholder.job.take() } else { None };

        if let Some(job) = job {
            self.cancel_job(job);
        }
    }

    /// Tile grids depend on the content size, so a new size starts over
    fn sync_content_size(&mut self, content_width: f32, content_height: f32) {
        match self.content_size {
            Some((width, height)) if width == content_width && height == content_height => {}
            Some((width, height)) => {
                log::debug!(
                    "content size {}x{} -> {}x{}, dropping tiles",
                    width,
                    height,
                    content_width,
                    content_height
                );
                self.drop_all_tiles();
                self.content_size = Some((content_width, content_height));
            }
            None => self.content_size = Some((content_width, content_height)),
        }
    }

    fn drop_all_tiles(&mut self) {
        while let Some((_, tile)) = self.tiles.pop_oldest() {
            self.release_tile(tile);
        }
        self.tiles.clear();
        self.grids.clear();

        if let Some(placeholder) = self.placeholder.take() {
            if let Some(job) = placeholder.job {
                self.cancel_job(job);
            }
            placeholder.cell.mark_deleted();
        }
    }

    fn stop_runtime(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            for job in runtime.workers.shutdown() {
                job.cell().mark_deleted();
            }
        }
    }
}

impl Drop for TilePool {
    fn drop(&mut self) {
        self.drop_all_tiles();
        self.stop_runtime();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::TileEvent;
    use rand::Rng;
    use serial_test::serial;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::thread;
    use std::time::{Duration, Instant};
    use tileview_render::{RenderError, RenderResult, Rgba, TileRegion};

    const LEVEL: ZoomLevel = ZoomLevel::NATIVE;

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        condition()
    }

    fn counting_renderer(calls: Arc<AtomicUsize>) -> Arc<dyn TileRenderer> {
        Arc::new(move |buffer: &mut Bitmap, _: &TileRegion| -> RenderResult<()> {
            calls.fetch_add(1, Ordering::SeqCst);
            buffer.fill(Rgba::BLACK);
            Ok(())
        })
    }

    /// Blocks every render until the gate opens
    fn gated_renderer(gate: Arc<AtomicBool>, calls: Arc<AtomicUsize>) -> Arc<dyn TileRenderer> {
        Arc::new(move |buffer: &mut Bitmap, _: &TileRegion| -> RenderResult<()> {
            calls.fetch_add(1, Ordering::SeqCst);
            while !gate.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(1));
            }
            buffer.fill(Rgba::BLACK);
            Ok(())
        })
    }

    fn pool_with(renderer: Arc<dyn TileRenderer>, max_tasks: usize) -> TilePool {
        let config = PoolConfig::new(max_tasks).with_poll_interval(Duration::from_millis(5));
        let mut pool = TilePool::new(config);
        pool.configure(Some(renderer), false);
        pool
    }

    fn wait_for_tile(pool: &mut TilePool, x: i64, y: i64, size: f32) -> Option<Arc<Bitmap>> {
        let mut found = None;
        wait_until(|| {
            found = pool.get_tile(LEVEL, x, y, size, size);
            found.is_some()
        });
        found
    }

    #[test]
    fn test_unconfigured_pool_returns_nothing() {
        let mut pool = TilePool::new(PoolConfig::default());
        assert!(!pool.is_configured());
        assert!(pool.get_tile(LEVEL, 0, 0, 1024.0, 1024.0).is_none());
        assert!(pool.get_placeholder(1024.0, 1024.0).is_none());
        assert_eq!(pool.resident_tiles(), 0);
    }

    #[test]
    #[serial]
    fn test_first_request_renders_tile() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pool = pool_with(counting_renderer(calls.clone()), 8);

        // 1024x1024 at level 10 is a 4x4 grid; (0,0) starts out rendering
        assert!(pool.get_tile(LEVEL, 0, 0, 1024.0, 1024.0).is_none());
        let key = TileKey::new(LEVEL, 0, 0);
        assert!(matches!(
            pool.tile_state(key),
            Some(TileState::Rendering) | Some(TileState::Rendered)
        ));

        let bitmap = wait_for_tile(&mut pool, 0, 0, 1024.0).expect("tile should render");
        assert_eq!(bitmap.width(), 256);
        assert_eq!(bitmap.height(), 256);
        assert_eq!(bitmap.pixel(10, 10), Some(Rgba::BLACK));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(pool.stats().hits >= 1);
    }

    #[test]
    #[serial]
    fn test_out_of_grid_requests_are_ignored() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pool = pool_with(counting_renderer(calls.clone()), 8);

        for (x, y) in [(4, 0), (0, 4), (-1, 0), (0, -1), (100, 100)] {
            assert!(pool.get_tile(LEVEL, x, y, 1024.0, 1024.0).is_none());
        }
        assert_eq!(pool.resident_tiles(), 0);

        thread::sleep(Duration::from_millis(20));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    #[serial]
    fn test_at_most_one_render_in_flight() {
        let gate = Arc::new(AtomicBool::new(false));
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pool = pool_with(gated_renderer(gate.clone(), calls.clone()), 8);

        for _ in 0..5 {
            assert!(pool.get_tile(LEVEL, 1, 1, 1024.0, 1024.0).is_none());
        }
        assert_eq!(pool.resident_tiles(), 1);

        gate.store(true, Ordering::SeqCst);
        assert!(wait_for_tile(&mut pool, 1, 1, 1024.0).is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[serial]
    fn test_resident_tiles_stay_bounded() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pool = pool_with(counting_renderer(calls), 3);
        let mut rng = rand::thread_rng();

        // 2048x2048 is an 8x8 grid at level 10
        for _ in 0..300 {
            let x = rng.gen_range(0..8);
            let y = rng.gen_range(0..8);
            pool.get_tile(LEVEL, x, y, 2048.0, 2048.0);
            assert!(pool.resident_tiles() <= 6);
        }

        let stats = pool.stats();
        assert_eq!(stats.tile_limit, 6);
        assert!(stats.evictions > 0);
    }

    #[test]
    #[serial]
    fn test_least_recently_used_tile_is_evicted() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pool = pool_with(counting_renderer(calls), 2);

        // Ceiling of 4 tiles
        for x in 0..4 {
            assert!(wait_for_tile(&mut pool, x, 0, 2048.0).is_some());
        }

        // Touch (0,0), so (1,0) becomes the oldest
        assert!(pool.get_tile(LEVEL, 0, 0, 2048.0, 2048.0).is_some());
        pool.get_tile(LEVEL, 4, 0, 2048.0, 2048.0);

        assert_eq!(pool.resident_tiles(), 4);
        assert_eq!(pool.tile_state(TileKey::new(LEVEL, 1, 0)), None);
        assert_eq!(
            pool.tile_state(TileKey::new(LEVEL, 0, 0)),
            Some(TileState::Rendered)
        );
        assert_eq!(pool.stats().evictions, 1);
    }

    #[test]
    #[serial]
    fn test_eviction_while_rendering_discards_result() {
        let gate = Arc::new(AtomicBool::new(false));
        let calls = Arc::new(AtomicUsize::new(0));
        // One worker, one queued task, two resident tiles
        let mut pool = pool_with(gated_renderer(gate.clone(), calls.clone()), 1);

        let first = TileKey::new(LEVEL, 0, 0);
        let second = TileKey::new(LEVEL, 1, 0);
        let third = TileKey::new(LEVEL, 2, 0);

        pool.get_tile(LEVEL, 0, 0, 1024.0, 1024.0);
        assert!(wait_until(|| calls.load(Ordering::SeqCst) == 1));

        // (1,0) waits in the queue, then (2,0) pushes (0,0) off the LRU tail
        // and (1,0) out of the queue
        pool.get_tile(LEVEL, 1, 0, 1024.0, 1024.0);
        pool.get_tile(LEVEL, 2, 0, 1024.0, 1024.0);

        assert_eq!(pool.tile_state(first), None);
        assert_eq!(pool.tile_state(second), None);
        assert_eq!(pool.tile_state(third), Some(TileState::Rendering));

        gate.store(true, Ordering::SeqCst);
        assert!(wait_until(|| pool.tile_state(third) == Some(TileState::Rendered)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // The finished render of (0,0) went nowhere; asking again starts over
        assert!(pool.get_tile(LEVEL, 0, 0, 1024.0, 1024.0).is_none());
        assert!(wait_for_tile(&mut pool, 0, 0, 1024.0).is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    #[serial]
    fn test_invalidate_region_rerenders_only_overlapping_tiles() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pool = pool_with(counting_renderer(calls.clone()), 8);

        let mut bitmaps = HashMap::new();
        for y in 0..4 {
            for x in 0..4 {
                let bitmap = wait_for_tile(&mut pool, x, y, 1024.0).expect("tile should render");
                bitmaps.insert((x, y), bitmap);
            }
        }
        assert_eq!(calls.load(Ordering::SeqCst), 16);

        // Exactly the area of tile (1,1); neighbours only touch its edges
        let invalidated = pool.invalidate_region(Rect::new(256.0, 256.0, 512.0, 512.0));
        assert_eq!(invalidated, 1);
        assert_eq!(
            pool.tile_state(TileKey::new(LEVEL, 1, 1)),
            Some(TileState::Deleted)
        );

        for ((x, y), bitmap) in &bitmaps {
            if (*x, *y) == (1, 1) {
                continue;
            }
            let current = pool.get_tile(LEVEL, *x, *y, 1024.0, 1024.0).unwrap();
            assert!(Arc::ptr_eq(&current, bitmap));
        }

        assert!(pool.get_tile(LEVEL, 1, 1, 1024.0, 1024.0).is_none());
        let refreshed = wait_for_tile(&mut pool, 1, 1, 1024.0).unwrap();
        assert!(!Arc::ptr_eq(&refreshed, &bitmaps[&(1, 1)]));
        assert_eq!(calls.load(Ordering::SeqCst), 17);
        assert_eq!(pool.stats().invalidations, 1);
    }

    #[test]
    #[serial]
    fn test_failed_render_is_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let renderer: Arc<dyn TileRenderer> =
            Arc::new(move |buffer: &mut Bitmap, _: &TileRegion| -> RenderResult<()> {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(RenderError::failed("source not ready"));
                }
                buffer.fill(Rgba::BLACK);
                Ok(())
            });
        let mut pool = pool_with(renderer, 4);
        let key = TileKey::new(LEVEL, 0, 0);

        assert!(pool.get_tile(LEVEL, 0, 0, 512.0, 512.0).is_none());
        assert!(wait_until(|| pool.tile_state(key) == Some(TileState::Failed)));

        assert!(wait_for_tile(&mut pool, 0, 0, 512.0).is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(pool.stats().failures, 1);
    }

    #[test]
    #[serial]
    fn test_panicking_render_is_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let renderer: Arc<dyn TileRenderer> =
            Arc::new(move |_: &mut Bitmap, _: &TileRegion| -> RenderResult<()> {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("decoder crashed");
                }
                Ok(())
            });
        let mut pool = pool_with(renderer, 4);
        let key = TileKey::new(LEVEL, 0, 0);

        pool.get_tile(LEVEL, 0, 0, 512.0, 512.0);
        assert!(wait_until(|| pool.tile_state(key) == Some(TileState::Failed)));
        assert!(wait_for_tile(&mut pool, 0, 0, 512.0).is_some());
    }

    #[test]
    #[serial]
    fn test_zero_capacity_only_renders_placeholder() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pool = pool_with(counting_renderer(calls.clone()), 0);

        for _ in 0..3 {
            assert!(pool.get_tile(LEVEL, 0, 0, 1024.0, 1024.0).is_none());
        }
        assert_eq!(pool.resident_tiles(), 0);

        let mut placeholder = None;
        assert!(wait_until(|| {
            placeholder = pool.get_placeholder(1024.0, 1024.0);
            placeholder.is_some()
        }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[serial]
    fn test_placeholder_renders_once() {
        let regions = Arc::new(Mutex::new(Vec::new()));
        let seen = regions.clone();
        let renderer: Arc<dyn TileRenderer> =
            Arc::new(move |_: &mut Bitmap, region: &TileRegion| -> RenderResult<()> {
                seen.lock().unwrap().push(*region);
                Ok(())
            });
        let mut pool = pool_with(renderer, 4);

        let mut placeholder = None;
        assert!(wait_until(|| {
            placeholder = pool.get_placeholder(1024.0, 600.0);
            placeholder.is_some()
        }));
        let placeholder = placeholder.unwrap();
        assert_eq!((placeholder.width(), placeholder.height()), (512, 300));

        let again = pool.get_placeholder(1024.0, 600.0).unwrap();
        assert!(Arc::ptr_eq(&placeholder, &again));
        assert_eq!(*regions.lock().unwrap(), vec![TileRegion::full(1024.0, 600.0)]);
    }

    #[test]
    #[serial]
    fn test_invalidation_refreshes_placeholder() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pool = pool_with(counting_renderer(calls.clone()), 4);

        let mut first = None;
        assert!(wait_until(|| {
            first = pool.get_placeholder(512.0, 512.0);
            first.is_some()
        }));
        let first = first.unwrap();

        pool.invalidate_region(Rect::new(0.0, 0.0, 10.0, 10.0));

        // The old preview stays visible while the new one renders
        let during = pool.get_placeholder(512.0, 512.0).unwrap();
        assert!(Arc::ptr_eq(&during, &first));

        assert!(wait_until(|| {
            pool.get_placeholder(512.0, 512.0)
                .map_or(false, |current| !Arc::ptr_eq(&current, &first))
        }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    #[serial]
    fn test_content_size_change_drops_tiles() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pool = pool_with(counting_renderer(calls), 8);

        assert!(wait_for_tile(&mut pool, 0, 0, 1024.0).is_some());
        assert!(pool.get_tile(LEVEL, 0, 0, 2048.0, 2048.0).is_none());
        assert_eq!(pool.resident_tiles(), 1);
        assert!(wait_for_tile(&mut pool, 0, 0, 2048.0).is_some());
    }

    #[test]
    #[serial]
    fn test_listener_receives_rendered_tiles() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pool = pool_with(counting_renderer(calls), 8);

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        pool.set_listener(move |event: TileEvent| sink.lock().unwrap().push(event));

        assert!(wait_for_tile(&mut pool, 2, 3, 1024.0).is_some());
        assert!(wait_until(|| !events.lock().unwrap().is_empty()));
        assert_eq!(
            events.lock().unwrap()[0],
            TileEvent::Rendered(TileKey::new(LEVEL, 2, 3))
        );
    }

    #[test]
    #[serial]
    fn test_shrinking_capacity_evicts_tiles() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pool = pool_with(counting_renderer(calls), 4);

        for x in 0..4 {
            assert!(wait_for_tile(&mut pool, x, 0, 2048.0).is_some());
        }
        pool.set_capacity(1);
        assert_eq!(pool.capacity(), 1);
        assert_eq!(pool.resident_tiles(), 2);

        // The two most recent tiles survive
        assert_eq!(pool.tile_state(TileKey::new(LEVEL, 3, 0)), Some(TileState::Rendered));
        assert_eq!(pool.tile_state(TileKey::new(LEVEL, 0, 0)), None);
    }

    #[test]
    #[serial]
    fn test_configure_none_stops_rendering() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pool = pool_with(counting_renderer(calls), 4);
        assert!(wait_for_tile(&mut pool, 0, 0, 1024.0).is_some());

        pool.configure(None, false);
        assert!(!pool.is_configured());
        assert_eq!(pool.resident_tiles(), 0);
        assert!(pool.get_tile(LEVEL, 0, 0, 1024.0, 1024.0).is_none());
    }

    #[test]
    fn test_cache_stats_rates() {
        let stats = CacheStats {
            tile_count: 3,
            tile_limit: 12,
            hits: 3,
            misses: 1,
            ..CacheStats::default()
        };
        assert_eq!(stats.hit_rate(), 0.75);
        assert_eq!(stats.utilization(), 0.25);
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }
}
