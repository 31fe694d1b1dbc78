//! External collaborators the terrain engine drives: the physics sink, the
//! entity factory (with its asset provider), and the light-occluder
//! registry.  In-memory implementations are provided for tools and tests.
//!
//! The engine holds each collaborator behind its own `Mutex`.  The physics
//! mutex is the coarse "physics world mutation" lock: chunk placement only
//! takes it to swap prebuilt fixtures in or out.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::error::{Result, TerrainError};
use crate::types::{Point, Vec2};

// ---------------------------------------------------------------------------
// Physics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct FixtureHandle(pub u64);

/// Collision-filter category attached to every fixture.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum CollisionTag {
    Terrain,
    Prop,
}

pub trait PhysicsSink: Send {
    /// Create a static closed chain along `contour`.
    fn create_static_loop_fixture(&mut self, contour: &[Point], tag: CollisionTag) -> FixtureHandle;

    fn destroy_fixture(&mut self, handle: FixtureHandle) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct StaticFixture {
    pub tag: CollisionTag,
    pub points: Vec<Point>,
}

/// Static collision geometry kept in a map; enough to drive the engine
/// without a physics backend.
pub struct StaticBodies {
    next_id: u64,
    fixtures: HashMap<FixtureHandle, StaticFixture>,
    gravity: Vec2,
}

impl StaticBodies {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            fixtures: HashMap::new(),
            gravity: Vec2::new(0.0, 9.81),
        }
    }

    pub fn get(&self, handle: FixtureHandle) -> Option<&StaticFixture> {
        self.fixtures.get(&handle)
    }

    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }

    pub fn count_tagged(&self, tag: CollisionTag) -> usize {
        self.fixtures.values().filter(|f| f.tag == tag).count()
    }

    pub fn gravity(&self) -> Vec2 {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.gravity = gravity;
    }
}

impl Default for StaticBodies {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsSink for StaticBodies {
    fn create_static_loop_fixture(&mut self, contour: &[Point], tag: CollisionTag) -> FixtureHandle {
        let handle = FixtureHandle(self.next_id);
        self.next_id += 1;
        self.fixtures.insert(
            handle,
            StaticFixture {
                tag,
                points: contour.to_vec(),
            },
        );
        handle
    }

    fn destroy_fixture(&mut self, handle: FixtureHandle) -> Result<()> {
        self.fixtures
            .remove(&handle)
            .map(|_| ())
            .ok_or(TerrainError::UnknownFixture(handle))
    }
}

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

/// Description of a spawnable prop.
#[derive(Debug, Clone)]
pub struct EntityTemplate {
    pub name: String,
    /// Half-size of the prop's footprint.  Copied onto each spawned entity.
    pub half_extents: Vec2,
}

impl EntityTemplate {
    pub fn new(name: impl Into<String>, half_extents: Vec2) -> Self {
        Self {
            name: name.into(),
            half_extents,
        }
    }
}

/// Looks entity templates up by name.  Passed in explicitly so tests can
/// supply their own catalogue.
pub trait AssetProvider: Send + Sync {
    fn template(&self, name: &str) -> Option<EntityTemplate>;
}

pub struct StaticAssets {
    templates: HashMap<String, EntityTemplate>,
}

impl StaticAssets {
    pub fn new() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// Catalogue with the props terrain generation spawns.
    pub fn with_terrain_props() -> Self {
        let mut assets = Self::new();
        assets.insert(EntityTemplate::new("tree", Vec2::new(16.0, 64.0)));
        assets.insert(EntityTemplate::new("landmark", Vec2::new(48.0, 96.0)));
        assets
    }

    pub fn insert(&mut self, template: EntityTemplate) {
        self.templates.insert(template.name.clone(), template);
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl Default for StaticAssets {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetProvider for StaticAssets {
    fn template(&self, name: &str) -> Option<EntityTemplate> {
        self.templates.get(name).cloned()
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// Opaque id of a spawned entity.  Chunks keep these instead of owning the
/// entity, so there is no chunk → entity → world → terrain cycle.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct EntityId(pub u64);

pub trait EntityFactory: Send {
    fn spawn(&mut self, asset: &str, position: Vec2, rotation: f32) -> Option<EntityId>;

    /// Mark an entity for removal.  Removal may be deferred until the
    /// factory's next synchronisation point.
    fn despawn(&mut self, id: EntityId);
}

#[derive(Debug, Clone, Copy)]
pub struct Transform {
    pub position: Vec2,
    pub rotation: f32,
}

#[derive(Debug, Clone)]
pub struct Prop {
    pub asset: String,
    pub half_extents: Vec2,
}

/// Entity storage on a `hecs` world.  Despawns are staged and applied by
/// [`EntityArena::flush`], so iteration elsewhere never sees the set shrink
/// mid-update.
pub struct EntityArena {
    world: hecs::World,
    assets: Arc<dyn AssetProvider>,
    pending_despawn: Vec<hecs::Entity>,
}

impl EntityArena {
    pub fn new(assets: Arc<dyn AssetProvider>) -> Self {
        Self {
            world: hecs::World::new(),
            assets,
            pending_despawn: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.world.len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.world.len() == 0
    }

    pub fn contains(&self, id: EntityId) -> bool {
        to_entity(id).is_some_and(|e| self.world.contains(e))
    }

    pub fn is_pending_removal(&self, id: EntityId) -> bool {
        to_entity(id).is_some_and(|e| self.pending_despawn.contains(&e))
    }

    pub fn position(&self, id: EntityId) -> Option<Vec2> {
        let entity = to_entity(id)?;
        let transform = self.world.get::<&Transform>(entity).ok()?;
        Some(transform.position)
    }

    /// Half-size of the entity's footprint, taken from its template.
    pub fn half_extents(&self, id: EntityId) -> Option<Vec2> {
        let entity = to_entity(id)?;
        let prop = self.world.get::<&Prop>(entity).ok()?;
        Some(prop.half_extents)
    }

    /// Live entities spawned from `asset`, including ones awaiting removal.
    pub fn count_asset(&self, asset: &str) -> usize {
        self.world
            .query::<&Prop>()
            .iter()
            .filter(|(_, prop)| prop.asset == asset)
            .count()
    }

    /// Apply staged removals.  Returns how many entities were removed.
    pub fn flush(&mut self) -> usize {
        let mut removed = 0;
        for entity in self.pending_despawn.drain(..) {
            if self.world.despawn(entity).is_ok() {
                removed += 1;
            }
        }
        removed
    }
}

impl EntityFactory for EntityArena {
    fn spawn(&mut self, asset: &str, position: Vec2, rotation: f32) -> Option<EntityId> {
        let Some(template) = self.assets.template(asset) else {
            warn!("No entity template named '{}'", asset);
            return None;
        };
        let entity = self.world.spawn((
            Transform { position, rotation },
            Prop {
                asset: template.name,
                half_extents: template.half_extents,
            },
        ));
        debug!("Spawned '{}' at {}", asset, position);
        Some(EntityId(entity.to_bits().get()))
    }

    fn despawn(&mut self, id: EntityId) {
        match to_entity(id) {
            Some(entity) if self.world.contains(entity) => {
                if !self.pending_despawn.contains(&entity) {
                    self.pending_despawn.push(entity);
                }
            }
            _ => warn!("Despawn of unknown entity {:?}", id),
        }
    }
}

fn to_entity(id: EntityId) -> Option<hecs::Entity> {
    hecs::Entity::from_bits(id.0)
}

// ---------------------------------------------------------------------------
// Light occluders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct OccluderHandle(pub u64);

pub trait OccluderSink: Send {
    fn add_occluder(&mut self, hull: Vec<Point>) -> OccluderHandle;

    fn remove_occluder(&mut self, handle: OccluderHandle) -> Result<()>;
}

pub struct OccluderList {
    next_id: u64,
    hulls: HashMap<OccluderHandle, Vec<Point>>,
}

impl OccluderList {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            hulls: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.hulls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hulls.is_empty()
    }

    pub fn hulls(&self) -> impl Iterator<Item = &Vec<Point>> {
        self.hulls.values()
    }
}

impl Default for OccluderList {
    fn default() -> Self {
        Self::new()
    }
}

impl OccluderSink for OccluderList {
    fn add_occluder(&mut self, hull: Vec<Point>) -> OccluderHandle {
        let handle = OccluderHandle(self.next_id);
        self.next_id += 1;
        self.hulls.insert(handle, hull);
        handle
    }

    fn remove_occluder(&mut self, handle: OccluderHandle) -> Result<()> {
        self.hulls
            .remove(&handle)
            .map(|_| ())
            .ok_or(TerrainError::UnknownOccluder(handle.0))
    }
}

// ---------------------------------------------------------------------------
// World (collaborator bundle)
// ---------------------------------------------------------------------------

/// The collaborators a [`TerrainEngine`](crate::engine::TerrainEngine)
/// places chunks into.
#[derive(Clone)]
pub struct World {
    pub physics: Arc<Mutex<dyn PhysicsSink>>,
    pub entities: Arc<Mutex<dyn EntityFactory>>,
    pub occluders: Arc<Mutex<dyn OccluderSink>>,
}

impl World {
    pub fn new(
        physics: Arc<Mutex<dyn PhysicsSink>>,
        entities: Arc<Mutex<dyn EntityFactory>>,
        occluders: Arc<Mutex<dyn OccluderSink>>,
    ) -> Self {
        Self {
            physics,
            entities,
            occluders,
        }
    }
}

/// Concrete in-memory collaborators, kept typed so callers can inspect them.
#[derive(Clone)]
pub struct InMemoryWorld {
    pub physics: Arc<Mutex<StaticBodies>>,
    pub entities: Arc<Mutex<EntityArena>>,
    pub occluders: Arc<Mutex<OccluderList>>,
}

impl InMemoryWorld {
    pub fn new(assets: Arc<dyn AssetProvider>) -> Self {
        Self {
            physics: Arc::new(Mutex::new(StaticBodies::new())),
            entities: Arc::new(Mutex::new(EntityArena::new(assets))),
            occluders: Arc::new(Mutex::new(OccluderList::new())),
        }
    }

    pub fn with_terrain_props() -> Self {
        Self::new(Arc::new(StaticAssets::with_terrain_props()))
    }

    pub fn world(&self) -> World {
        World::new(
            self.physics.clone(),
            self.entities.clone(),
            self.occluders.clone(),
        )
    }
}
