//! TerrainEngine – active-region paging, damage application, and chunk
//! placement against the physics / entity / occluder collaborators.
//!
//! ## Concurrency
//!
//! * Each chunk has its own mutex; one writer at a time per chunk.  A
//!   placement task holds it for the whole placement, so damage against a
//!   chunk still generating simply waits.
//! * The physics mutex is only taken to swap prebuilt fixtures in or out,
//!   never during geometry work.
//! * A new placement of a chunk with one still in flight chains after the
//!   earlier task's `JoinHandle` instead of running alongside it.
//! * A placement that starts after its chunk left the active set sees
//!   `active == false` under the chunk lock and does nothing.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, trace, warn};
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::cache::{ChunkCache, SharedChunk};
use crate::chunk::{Chunk, ChunkState, PhysicsHandle, RenderMesh};
use crate::config;
use crate::error::Result;
use crate::generator::ChunkGenerator;
use crate::heightmap::TerrainSource;
use crate::polygon::Polygons;
use crate::save::{SavedChunk, WorldSave};
use crate::types::{ChunkId, Point, TerrainConfig, TerrainStats, Vec2};
use crate::world::{CollisionTag, World};

// ---------------------------------------------------------------------------
// Active set
// ---------------------------------------------------------------------------

/// The square of chunk ids currently wanted in the world.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveSet {
    center: Option<ChunkId>,
    ids: BTreeSet<ChunkId>,
}

impl ActiveSet {
    /// `(2 * radius + 1)²` ids centred on `center`.
    pub fn around(center: ChunkId, radius: i32) -> Self {
        let mut ids = BTreeSet::new();
        for dx in -radius..=radius {
            for dy in -radius..=radius {
                ids.insert(ChunkId::new(
                    center.x.saturating_add(dx),
                    center.y.saturating_add(dy),
                ));
            }
        }
        Self {
            center: Some(center),
            ids,
        }
    }

    pub fn center(&self) -> Option<ChunkId> {
        self.center
    }

    pub fn contains(&self, id: ChunkId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ChunkId> + '_ {
        self.ids.iter().copied()
    }
}

// ---------------------------------------------------------------------------
// Update result
// ---------------------------------------------------------------------------

/// Changes produced by a single [`TerrainEngine::set_active_area`] call.
#[derive(Debug, Clone, Default)]
pub struct AreaUpdate {
    pub center: ChunkId,
    /// Chunks that entered the active set (placed now or queued).
    pub placed: Vec<ChunkId>,
    /// Chunks that left the active set and were unplaced.
    pub unplaced: Vec<ChunkId>,
    /// Unplaced chunks without damage that were dropped from the cache.
    pub evicted: Vec<ChunkId>,
}

impl AreaUpdate {
    pub fn is_empty(&self) -> bool {
        self.placed.is_empty() && self.unplaced.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

/// Everything a placement needs; shared with background tasks.
struct Placer {
    generator: ChunkGenerator,
    world: World,
}

impl Placer {
    fn place_if_active(&self, chunk: &SharedChunk) {
        let mut chunk = chunk.lock();
        if !chunk.is_active() || chunk.is_evicted() {
            debug!("Skipping placement of inactive chunk {}", chunk.id());
            return;
        }
        self.place(&mut chunk);
    }

    /// Generated → Placed, or refresh of an already placed chunk.
    fn place(&self, chunk: &mut Chunk) {
        let id = chunk.id();
        let first_placement = chunk.state() != ChunkState::Placed;

        // Geometry first, outside the physics lock.
        chunk.rebuild(&self.generator);
        let loops: Vec<Vec<Point>> = chunk.derived().contours.clone();
        let hulls: Vec<Vec<Point>> = chunk
            .derived()
            .shapes()
            .into_iter()
            .map(|s| s.outer.clone())
            .collect();

        {
            let mut physics = self.world.physics.lock();
            let fixtures = loops
                .iter()
                .map(|c| physics.create_static_loop_fixture(c, CollisionTag::Terrain))
                .collect();
            if let Some(old) = chunk.replace_physics(PhysicsHandle { fixtures }) {
                for fixture in old.fixtures {
                    if let Err(e) = physics.destroy_fixture(fixture) {
                        warn!("Failed to destroy fixture of chunk {}: {}", id, e);
                    }
                }
            }
        }

        {
            let mut occluders = self.world.occluders.lock();
            let handles = hulls.into_iter().map(|h| occluders.add_occluder(h)).collect();
            for old in chunk.replace_occluders(handles) {
                if let Err(e) = occluders.remove_occluder(old) {
                    warn!("Failed to remove occluder of chunk {}: {}", id, e);
                }
            }
        }

        if first_placement {
            let plan = self
                .generator
                .spawn_plan(id, chunk.derived(), chunk.is_surface());
            if !plan.is_empty() {
                let mut entities = self.world.entities.lock();
                let spawned = plan
                    .iter()
                    .filter_map(|req| entities.spawn(req.asset, req.position, req.rotation))
                    .collect();
                chunk.set_spawned(spawned);
            }
        }

        chunk.set_state(ChunkState::Placed);
        debug!(
            "Placed chunk {} ({} fixtures, {} triangles)",
            id,
            loops.len(),
            chunk.foreground_triangles().len()
        );
    }

    /// Placed → Generated.  No-op for chunks that are not placed.
    fn unplace(&self, chunk: &mut Chunk) -> bool {
        if chunk.state() != ChunkState::Placed {
            return false;
        }
        let id = chunk.id();

        if let Some(handle) = chunk.take_physics() {
            let mut physics = self.world.physics.lock();
            for fixture in handle.fixtures {
                if let Err(e) = physics.destroy_fixture(fixture) {
                    warn!("Failed to destroy fixture of chunk {}: {}", id, e);
                }
            }
        }

        {
            let mut occluders = self.world.occluders.lock();
            for old in chunk.replace_occluders(Vec::new()) {
                if let Err(e) = occluders.remove_occluder(old) {
                    warn!("Failed to remove occluder of chunk {}: {}", id, e);
                }
            }
        }

        let spawned = chunk.take_spawned();
        if !spawned.is_empty() {
            let mut entities = self.world.entities.lock();
            for entity in spawned {
                entities.despawn(entity);
            }
        }

        chunk.set_state(ChunkState::Generated);
        debug!("Unplaced chunk {}", id);
        true
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct TerrainEngine {
    config: TerrainConfig,
    placer: Arc<Placer>,
    cache: ChunkCache,
    active: RwLock<Arc<ActiveSet>>,
    /// Serialises active-area updates.
    area_lock: Mutex<()>,
    inflight: Mutex<HashMap<ChunkId, JoinHandle<()>>>,
    runtime: Option<Handle>,
    /// Place synchronously on the next area update (set after loading).
    sync_next_update: AtomicBool,
}

impl TerrainEngine {
    /// Create an engine for `seed`.  Background placement uses the ambient
    /// Tokio runtime if there is one and `config.multithreaded` is set.
    pub fn new(seed: u64, config: TerrainConfig, world: World) -> Result<Self> {
        config::validate(&config)?;
        let generator = ChunkGenerator::new(seed, &config);
        Ok(Self {
            config,
            placer: Arc::new(Placer { generator, world }),
            cache: ChunkCache::new(),
            active: RwLock::new(Arc::new(ActiveSet::default())),
            area_lock: Mutex::new(()),
            inflight: Mutex::new(HashMap::new()),
            runtime: Handle::try_current().ok(),
            sync_next_update: AtomicBool::new(false),
        })
    }

    /// Rebuild an engine from a save: damaged chunks are restored `Empty`
    /// with their damage, everything else regenerates on demand.  The first
    /// area update after loading places synchronously.
    pub fn from_save(save: &WorldSave, config: TerrainConfig, world: World) -> Result<Self> {
        let engine = Self::new(save.seed, config, world)?;
        for saved in &save.chunks {
            engine
                .cache
                .insert(Chunk::with_damage(saved.id, saved.damage.clone()));
        }
        engine.sync_next_update.store(true, Ordering::SeqCst);
        info!(
            "Loaded terrain seed={} with {} damaged chunks",
            save.seed,
            save.chunks.len()
        );
        Ok(engine)
    }

    /// Use an explicit runtime for background placement.
    pub fn with_runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn seed(&self) -> u64 {
        self.placer.generator.seed()
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    pub fn cache(&self) -> &ChunkCache {
        &self.cache
    }

    pub fn generator(&self) -> &ChunkGenerator {
        &self.placer.generator
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn height_at(&self, x: f64) -> f64 {
        self.placer.generator.heightmap().height_at(x)
    }

    pub fn normal_at(&self, x: f64) -> Vec2 {
        self.placer.generator.heightmap().normal_at(x)
    }

    pub fn chunk_of(&self, pos: Vec2) -> ChunkId {
        ChunkId::containing(pos, self.config.chunk_size)
    }

    /// Whether `p` is solid ground after caves and damage.
    pub fn is_solid(&self, p: Point) -> bool {
        let id = ChunkId::containing_point(p, self.config.chunk_size);
        let chunk = self.cache.get_or_create(id);
        let solid = chunk.lock().is_solid(p, &self.placer.generator);
        self.cache.evict_if_clean(id);
        solid
    }

    pub fn chunk_state(&self, id: ChunkId) -> Option<ChunkState> {
        self.cache.get(id).map(|c| c.lock().state())
    }

    /// Run `f` against a cached chunk under its lock.
    pub fn inspect<R>(&self, id: ChunkId, f: impl FnOnce(&Chunk) -> R) -> Option<R> {
        let chunk = self.cache.get(id)?;
        let guard = chunk.lock();
        Some(f(&guard))
    }

    /// Snapshot of the active set; never observed half-updated.
    pub fn active_set(&self) -> Arc<ActiveSet> {
        self.active.read().clone()
    }

    pub fn pending_placements(&self) -> usize {
        self.inflight
            .lock()
            .values()
            .filter(|h| !h.is_finished())
            .count()
    }

    /// Background and foreground triangle lists of every placed chunk,
    /// ordered by id.
    pub fn render_meshes(&self) -> Vec<(ChunkId, RenderMesh)> {
        self.cache
            .ids()
            .into_iter()
            .filter_map(|id| {
                self.inspect(id, |c| {
                    (c.state() == ChunkState::Placed).then(|| (id, c.mesh().clone()))
                })
                .flatten()
            })
            .collect()
    }

    pub fn stats(&self) -> TerrainStats {
        TerrainStats {
            cached_chunks: self.cache.len(),
            active_chunks: self.active_set().len(),
            placed_chunks: self.cache.count_in_state(ChunkState::Placed),
            damaged_chunks: self.cache.damaged_count(),
            pending_placements: self.pending_placements(),
        }
    }

    // -----------------------------------------------------------------------
    // Active area
    // -----------------------------------------------------------------------

    /// Page chunks around `center`: place those entering the active square,
    /// unplace (and evict when undamaged) those leaving it.
    pub fn set_active_area(&self, center: Vec2) -> AreaUpdate {
        let _guard = self.area_lock.lock();
        let sync = self.sync_next_update.swap(false, Ordering::SeqCst);

        let center_id = self.chunk_of(center);
        let previous = self.active_set();
        if previous.center() == Some(center_id) {
            return AreaUpdate {
                center: center_id,
                ..Default::default()
            };
        }
        let next = ActiveSet::around(center_id, self.config.active_radius());
        let mut update = AreaUpdate {
            center: center_id,
            ..Default::default()
        };

        for id in previous.iter().filter(|id| !next.contains(*id)) {
            if let Some(chunk) = self.cache.get(id) {
                let mut chunk = chunk.lock();
                chunk.set_active(false);
                self.placer.unplace(&mut chunk);
            }
            update.unplaced.push(id);
            if self.cache.evict_if_clean(id) {
                update.evicted.push(id);
            }
        }

        for id in next.iter().filter(|id| !previous.contains(*id)) {
            let chunk = self.activate(id);
            self.schedule_placement(id, chunk, sync);
            update.placed.push(id);
        }

        *self.active.write() = Arc::new(next);
        trace!(
            "Active area {} (+{} / -{} / evicted {})",
            center_id,
            update.placed.len(),
            update.unplaced.len(),
            update.evicted.len()
        );
        update
    }

    /// Fetch `id` and mark it active.  An inactive chunk can be evicted by
    /// a concurrent query between the lookup and the flag, so a detached
    /// chunk is dropped and looked up again.
    fn activate(&self, id: ChunkId) -> SharedChunk {
        loop {
            let chunk = self.cache.get_or_create(id);
            {
                let mut guard = chunk.lock();
                if guard.is_evicted() {
                    continue;
                }
                guard.set_active(true);
            }
            return chunk;
        }
    }

    fn schedule_placement(&self, id: ChunkId, chunk: SharedChunk, force_sync: bool) {
        let runtime = match &self.runtime {
            Some(handle) if self.config.multithreaded && !force_sync => handle,
            _ => {
                self.placer.place_if_active(&chunk);
                return;
            }
        };

        let mut inflight = self.inflight.lock();
        inflight.retain(|_, h| !h.is_finished());
        let prior = inflight.remove(&id);
        let placer = self.placer.clone();
        let task = runtime.spawn(async move {
            if let Some(prior) = prior {
                let _ = prior.await;
            }
            let result = tokio::task::spawn_blocking(move || placer.place_if_active(&chunk)).await;
            if let Err(e) = result {
                warn!("Placement task for chunk {} failed: {}", id, e);
            }
        });
        inflight.insert(id, task);
    }

    /// Await every in-flight placement, including ones queued meanwhile.
    pub async fn settle(&self) {
        loop {
            let handles: Vec<_> = self.inflight.lock().drain().map(|(_, h)| h).collect();
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!("Placement task failed: {}", e);
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Damage
    // -----------------------------------------------------------------------

    /// Remove `region` from the terrain.  Every chunk the region's bounds
    /// touch is generated if needed, takes the part of the region inside its
    /// rectangle, and is re-placed if active.  Returns the chunks whose
    /// damage changed.
    pub fn apply_damage(&self, region: &Polygons) -> Vec<ChunkId> {
        let Some((min, max)) = region.bounds() else {
            return Vec::new();
        };
        let size = self.config.chunk_size;
        let first = ChunkId::containing_point(min, size);
        // Bounds are half-open: a region ending exactly on a chunk edge does
        // not reach into the next chunk.
        let last = ChunkId::new(
            max.x.saturating_sub(1).div_euclid(size).max(first.x),
            max.y.saturating_sub(1).div_euclid(size).max(first.y),
        );

        let mut affected = Vec::new();
        for cx in first.x..=last.x {
            for cy in first.y..=last.y {
                let id = ChunkId::new(cx, cy);
                let (chunk, changed, active) = loop {
                    let chunk = self.cache.get_or_create(id);
                    let mut guard = chunk.lock();
                    if guard.is_evicted() {
                        // Lost a race with eviction; retry on the fresh entry.
                        continue;
                    }
                    let changed =
                        guard.apply_damage(region, &self.placer.generator, self.config.damage_merge);
                    let active = guard.is_active();
                    drop(guard);
                    break (chunk, changed, active);
                };

                if changed {
                    affected.push(id);
                }
                if active {
                    if changed {
                        self.schedule_placement(id, chunk, false);
                    }
                } else {
                    // Xor can cancel earlier damage, leaving the chunk clean.
                    self.cache.evict_if_clean(id);
                }
            }
        }

        debug!("Damage touched {} chunks", affected.len());
        affected
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Seed plus the damage of every chunk that carries any.
    pub fn snapshot(&self) -> WorldSave {
        WorldSave {
            seed: self.seed(),
            chunks: self
                .cache
                .damaged_chunks()
                .into_iter()
                .map(|(id, damage)| SavedChunk { id, damage })
                .collect(),
        }
    }
}
