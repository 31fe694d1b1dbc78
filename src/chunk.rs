//! A single terrain chunk: generated shape, accumulated damage, and the
//! render/physics products derived from them.
//!
//! ```text
//!   Empty ──generate──▶ Generated ──place──▶ Placed
//!                          ▲                    │
//!                          └──────unplace───────┘
//! ```
//!
//! Only `damage` is irreplaceable; everything else can be rebuilt from the
//! seed.  All mutation happens behind the chunk's own mutex (see
//! [`ChunkCache`](crate::cache::ChunkCache)).

use log::debug;

use crate::generator::{ChunkGenerator, Decoration, GeneratedGeometry};
use crate::polygon::{self, Polygons, Triangle};
use crate::types::{ChunkId, DamageMerge, Point};
use crate::world::{EntityId, FixtureHandle, OccluderHandle};

pub const GROUND_COLOR: [f32; 4] = [0.45, 0.32, 0.20, 1.0];
pub const WALL_COLOR: [f32; 4] = [0.22, 0.16, 0.10, 1.0];

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ChunkState {
    Empty,
    Generated,
    Placed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColoredVertex {
    pub position: [f32; 2],
    pub color: [f32; 4],
}

/// Vertex-colour triangle lists, three vertices per triangle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderMesh {
    /// Undamaged silhouette, drawn behind the ground as a cave wall.
    pub background: Vec<ColoredVertex>,
    pub foreground: Vec<ColoredVertex>,
}

impl RenderMesh {
    fn from_triangles(background: &[Triangle], foreground: &[Triangle]) -> Self {
        Self {
            background: to_vertices(background, WALL_COLOR),
            foreground: to_vertices(foreground, GROUND_COLOR),
        }
    }
}

fn to_vertices(triangles: &[Triangle], color: [f32; 4]) -> Vec<ColoredVertex> {
    triangles
        .iter()
        .flat_map(|t| t.vertices)
        .map(|p| ColoredVertex {
            position: [p.x as f32, p.y as f32],
            color,
        })
        .collect()
}

/// Fixtures currently owned by a placed chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhysicsHandle {
    pub fixtures: Vec<FixtureHandle>,
}

pub struct Chunk {
    id: ChunkId,
    state: ChunkState,
    generated: Option<GeneratedGeometry>,
    damage: Polygons,
    derived: Polygons,
    recalculate: bool,
    foreground: Vec<Triangle>,
    background: Vec<Triangle>,
    mesh: RenderMesh,
    decorations: Vec<Decoration>,
    spawned: Vec<EntityId>,
    physics: Option<PhysicsHandle>,
    occluders: Vec<OccluderHandle>,
    /// Member of the engine's current active set.
    active: bool,
    /// Removed from the cache; further writes must go to a fresh chunk.
    evicted: bool,
}

impl Chunk {
    pub fn new(id: ChunkId) -> Self {
        Self {
            id,
            state: ChunkState::Empty,
            generated: None,
            damage: Polygons::empty(),
            derived: Polygons::empty(),
            recalculate: true,
            foreground: Vec::new(),
            background: Vec::new(),
            mesh: RenderMesh::default(),
            decorations: Vec::new(),
            spawned: Vec::new(),
            physics: None,
            occluders: Vec::new(),
            active: false,
            evicted: false,
        }
    }

    /// Chunk restored from a save: still `Empty`, damage already known.
    pub fn with_damage(id: ChunkId, damage: Polygons) -> Self {
        Self {
            damage,
            ..Self::new(id)
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn id(&self) -> ChunkId {
        self.id
    }

    pub fn state(&self) -> ChunkState {
        self.state
    }

    pub fn damage(&self) -> &Polygons {
        &self.damage
    }

    /// Persist only chunks carrying damage; everything else regenerates.
    pub fn should_save(&self) -> bool {
        !self.damage.is_empty()
    }

    pub fn base_geometry(&self) -> Option<&Polygons> {
        self.generated.as_ref().map(|g| &g.base)
    }

    pub fn cavities(&self) -> Option<&Polygons> {
        self.generated.as_ref().map(|g| &g.cavities)
    }

    /// Generated solid before damage, i.e. `base − cavities`.
    pub fn solid(&self) -> Option<&Polygons> {
        self.generated.as_ref().map(|g| &g.solid)
    }

    pub fn is_surface(&self) -> bool {
        self.generated.as_ref().is_some_and(|g| g.is_surface)
    }

    /// Derived geometry as of the last rebuild.
    pub fn derived(&self) -> &Polygons {
        &self.derived
    }

    pub fn needs_rebuild(&self) -> bool {
        self.recalculate
    }

    pub fn foreground_triangles(&self) -> &[Triangle] {
        &self.foreground
    }

    pub fn background_triangles(&self) -> &[Triangle] {
        &self.background
    }

    pub fn mesh(&self) -> &RenderMesh {
        &self.mesh
    }

    pub fn decorations(&self) -> &[Decoration] {
        &self.decorations
    }

    pub fn spawned_entities(&self) -> &[EntityId] {
        &self.spawned
    }

    pub fn physics(&self) -> Option<&PhysicsHandle> {
        self.physics.as_ref()
    }

    pub fn occluders(&self) -> &[OccluderHandle] {
        &self.occluders
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn is_evicted(&self) -> bool {
        self.evicted
    }

    /// No damage, not wanted, not placed: safe to drop and regenerate later.
    pub fn can_evict(&self) -> bool {
        self.damage.is_empty() && !self.active && self.state != ChunkState::Placed
    }

    pub(crate) fn mark_evicted(&mut self) {
        self.evicted = true;
    }

    // -----------------------------------------------------------------------
    // Generation & damage
    // -----------------------------------------------------------------------

    /// Empty → Generated.  No-op once generated.
    pub fn ensure_generated(&mut self, generator: &ChunkGenerator) {
        if self.generated.is_some() {
            return;
        }
        self.generated = Some(generator.generate(self.id));
        self.state = ChunkState::Generated;
        self.recalculate = true;
        debug!("Generated chunk {}", self.id);
    }

    /// Merge `region` (clipped to this chunk) into the accumulated damage.
    /// Generates first if needed, so damage is never applied to missing
    /// geometry.  Returns whether the chunk's damage changed.
    pub fn apply_damage(
        &mut self,
        region: &Polygons,
        generator: &ChunkGenerator,
        merge: DamageMerge,
    ) -> bool {
        self.ensure_generated(generator);

        let rect = Polygons::new(vec![self.id.bounds(generator.chunk_size()).outline()]);
        let local = polygon::intersection(region, &rect);
        if local.is_empty() {
            return false;
        }

        self.damage = match merge {
            DamageMerge::Union => polygon::union(&self.damage, &local),
            DamageMerge::Xor => polygon::xor(&self.damage, &local),
        };
        self.recalculate = true;
        debug!(
            "Damaged chunk {} ({} damage contours)",
            self.id,
            self.damage.contours.len()
        );
        true
    }

    /// Whether `p` is solid ground, honouring damage not yet rebuilt.
    pub fn is_solid(&mut self, p: Point, generator: &ChunkGenerator) -> bool {
        self.ensure_generated(generator);
        if !self.recalculate {
            return self.derived.contains(p);
        }
        self.solid().is_some_and(|s| s.contains(p)) && !self.damage.contains(p)
    }

    /// Recompute derived geometry, meshes and decorations if dirty.
    /// Returns whether anything was rebuilt.
    pub fn rebuild(&mut self, generator: &ChunkGenerator) -> bool {
        self.ensure_generated(generator);
        if !self.recalculate {
            return false;
        }
        let Some(generated) = self.generated.as_ref() else {
            return false;
        };

        self.derived = polygon::difference(&generated.solid, &self.damage);
        self.background = polygon::triangulate(&generated.solid);
        self.foreground = polygon::triangulate(&self.derived);
        self.mesh = RenderMesh::from_triangles(&self.background, &self.foreground);
        self.decorations = generator.decorations(self.id, &self.derived, generated.is_surface);
        self.recalculate = false;
        true
    }

    // -----------------------------------------------------------------------
    // Placement bookkeeping (driven by the engine)
    // -----------------------------------------------------------------------

    /// Swap in a new fixture set, returning the one it replaces.
    pub(crate) fn replace_physics(&mut self, handle: PhysicsHandle) -> Option<PhysicsHandle> {
        self.physics.replace(handle)
    }

    pub(crate) fn take_physics(&mut self) -> Option<PhysicsHandle> {
        self.physics.take()
    }

    pub(crate) fn replace_occluders(&mut self, handles: Vec<OccluderHandle>) -> Vec<OccluderHandle> {
        std::mem::replace(&mut self.occluders, handles)
    }

    pub(crate) fn take_spawned(&mut self) -> Vec<EntityId> {
        std::mem::take(&mut self.spawned)
    }

    pub(crate) fn set_spawned(&mut self, ids: Vec<EntityId>) {
        self.spawned = ids;
    }

    pub(crate) fn set_state(&mut self, state: ChunkState) {
        self.state = state;
    }

    pub fn foreground_area(&self) -> f64 {
        polygon::triangles_area(&self.foreground)
    }
}
