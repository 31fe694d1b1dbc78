//! Seed-driven chunk generation: base ground polygon, cave cavities,
//! grass decorations and the prop spawn plan.  Everything here is a pure
//! function of `(seed, chunk id, config)`.

use crate::heightmap::{HeightMap, TerrainSource};
use crate::noise_field::{derive_seed, position_unit, NoiseField};
use crate::polygon::{self, Polygons};
use crate::types::{ChunkId, Point, TerrainConfig, Vec2};

const CAVE_SALT: u64 = 0xCA7E;
const GRASS_SALT: u64 = 0x6A55;
const TREE_SALT: u64 = 0x7EE5;

/// Maximum grass blade tilt added on top of the surface normal (radians).
const GRASS_JITTER: f64 = 0.2;

pub const TREE_ASSET: &str = "tree";
pub const LANDMARK_ASSET: &str = "landmark";

/// Output of [`ChunkGenerator::generate`].
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedGeometry {
    /// Ground below the surface, clipped to the chunk rectangle.
    pub base: Polygons,
    pub cavities: Polygons,
    /// `base − cavities`.
    pub solid: Polygons,
    /// The surface crosses this chunk's vertical span at its centre column.
    pub is_surface: bool,
}

/// A grass blade anchored on the surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decoration {
    pub position: Vec2,
    pub rotation: f32,
}

/// A prop the chunk wants spawned when it is placed.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnRequest {
    pub asset: &'static str,
    pub position: Vec2,
    pub rotation: f32,
}

pub struct ChunkGenerator {
    config: TerrainConfig,
    heightmap: HeightMap,
    caves: NoiseField,
}

impl ChunkGenerator {
    pub fn new(seed: u64, config: &TerrainConfig) -> Self {
        Self {
            config: config.clone(),
            heightmap: HeightMap::new(seed, config),
            caves: NoiseField::new(derive_seed(seed, CAVE_SALT)),
        }
    }

    pub fn seed(&self) -> u64 {
        self.heightmap.seed()
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    pub fn heightmap(&self) -> &HeightMap {
        &self.heightmap
    }

    pub fn chunk_size(&self) -> i32 {
        self.config.chunk_size
    }

    // -----------------------------------------------------------------------
    // Geometry
    // -----------------------------------------------------------------------

    pub fn generate(&self, id: ChunkId) -> GeneratedGeometry {
        let bounds = id.bounds(self.config.chunk_size);
        let (shallowest, deepest) = self.heightmap.height_range();

        let base = if (bounds.bottom as f64) <= shallowest.floor() {
            Polygons::empty()
        } else if (bounds.top as f64) >= deepest.ceil() {
            Polygons::rect(bounds.left, bounds.top, bounds.right, bounds.bottom)
        } else {
            self.surface_polygon(id)
        };

        let cavities = if base.is_empty() {
            Polygons::empty()
        } else {
            self.cavities(id)
        };
        let solid = polygon::difference(&base, &cavities);

        let mid = self.surface_y(bounds.left + self.config.chunk_size / 2);
        let is_surface = mid >= bounds.top && mid < bounds.bottom;

        GeneratedGeometry {
            base,
            cavities,
            solid,
            is_surface,
        }
    }

    /// Column polygon under the sampled surface, intersected with the chunk.
    fn surface_polygon(&self, id: ChunkId) -> Polygons {
        let bounds = id.bounds(self.config.chunk_size);
        let step = self.config.surface_step;

        let mut outline = Vec::with_capacity((self.config.chunk_size / step) as usize + 4);
        let mut x = bounds.left;
        while x < bounds.right {
            outline.push(Point::new(x, self.surface_y(x).clamp(bounds.top, bounds.bottom)));
            x += step;
        }
        outline.push(Point::new(
            bounds.right,
            self.surface_y(bounds.right).clamp(bounds.top, bounds.bottom),
        ));
        outline.push(Point::new(bounds.right, bounds.bottom));
        outline.push(Point::new(bounds.left, bounds.bottom));

        let column = Polygons::new(vec![outline]);
        let rect = Polygons::rect(bounds.left, bounds.top, bounds.right, bounds.bottom);
        polygon::intersection(&column, &rect)
    }

    /// Cave cells on a world-aligned grid, so neighbouring chunks agree on
    /// every shared edge.
    fn cavities(&self, id: ChunkId) -> Polygons {
        let bounds = id.bounds(self.config.chunk_size);
        let cell = self.config.cave_cell;
        let half = cell as f64 * 0.5;

        let mut cells = Vec::new();
        let mut cy = bounds.top.div_euclid(cell) * cell;
        while cy < bounds.bottom {
            let mut cx = bounds.left.div_euclid(cell) * cell;
            while cx < bounds.right {
                let centre_x = cx as f64 + half;
                let centre_y = cy as f64 + half;
                let deep_enough =
                    centre_y >= self.heightmap.height_at(centre_x) + self.config.cave_min_depth;
                if deep_enough && self.cave_density(centre_x, centre_y) > self.config.cave_threshold
                {
                    cells.push(vec![
                        Point::new(cx, cy),
                        Point::new(cx + cell, cy),
                        Point::new(cx + cell, cy + cell),
                        Point::new(cx, cy + cell),
                    ]);
                }
                cx += cell;
            }
            cy += cell;
        }

        if cells.is_empty() {
            return Polygons::empty();
        }
        let rect = Polygons::rect(bounds.left, bounds.top, bounds.right, bounds.bottom);
        polygon::intersection(&polygon::sanitize(&Polygons::new(cells)), &rect)
    }

    pub fn cave_density(&self, x: f64, y: f64) -> f64 {
        self.caves
            .evaluate(x / self.config.cave_divisor, y / self.config.cave_divisor)
    }

    /// Surface depth at `x`, snapped to the integer grid.
    pub fn surface_y(&self, x: i32) -> i32 {
        self.heightmap.height_at(x as f64).round() as i32
    }

    // -----------------------------------------------------------------------
    // Decorations & props
    // -----------------------------------------------------------------------

    /// Grass blades along the intact part of the surface.
    pub fn decorations(&self, id: ChunkId, derived: &Polygons, is_surface: bool) -> Vec<Decoration> {
        if !is_surface {
            return Vec::new();
        }
        let bounds = id.bounds(self.config.chunk_size);
        let spacing = self.config.grass_spacing;
        let seed = self.seed();

        let mut blades = Vec::new();
        let mut x = bounds.left.div_euclid(spacing) * spacing;
        if x < bounds.left {
            x += spacing;
        }
        while x < bounds.right {
            if let Some(anchor) = self.intact_surface(x, derived) {
                let normal = self.heightmap.normal_at(x as f64);
                let tilt = (position_unit(seed, GRASS_SALT, x as i64) - 0.5) * 2.0 * GRASS_JITTER;
                let rotation = (normal.x as f64).atan2(-(normal.y as f64)) + tilt;
                blades.push(Decoration {
                    position: anchor,
                    rotation: rotation as f32,
                });
            }
            x += spacing;
        }
        blades
    }

    /// Props to spawn on first placement: seeded trees on the surface and the
    /// landmark in chunk `(0, 0)`.
    pub fn spawn_plan(&self, id: ChunkId, derived: &Polygons, is_surface: bool) -> Vec<SpawnRequest> {
        let mut plan = Vec::new();
        let size = self.config.chunk_size;
        let bounds = id.bounds(size);

        if id == ChunkId::new(0, 0) {
            let x = size / 2;
            let y = self.surface_y(x);
            plan.push(SpawnRequest {
                asset: LANDMARK_ASSET,
                position: Vec2::new(x as f32, y as f32),
                rotation: 0.0,
            });
        }

        if !is_surface {
            return plan;
        }

        let spacing = self.config.tree_spacing;
        let seed = self.seed();
        let mut slot = bounds.left.div_euclid(spacing) * spacing;
        if slot < bounds.left {
            slot += spacing;
        }
        while slot < bounds.right {
            let x = slot + spacing / 2;
            let roll = position_unit(seed, TREE_SALT, x as i64);
            if x < bounds.right && roll < self.config.tree_chance {
                if let Some(anchor) = self.intact_surface(x, derived) {
                    plan.push(SpawnRequest {
                        asset: TREE_ASSET,
                        position: anchor,
                        rotation: 0.0,
                    });
                }
            }
            slot += spacing;
        }
        plan
    }

    /// Surface point at column `x` if it lies in this geometry and the ground
    /// just beneath it has not been carved away.
    fn intact_surface(&self, x: i32, derived: &Polygons) -> Option<Vec2> {
        let y = self.surface_y(x);
        let below = Point::new(x, y + 4);
        derived
            .contains(below)
            .then(|| Vec2::new(x as f32, y as f32))
    }
}
