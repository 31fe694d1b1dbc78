//! Core terrain types shared across all modules.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Basic math
// ---------------------------------------------------------------------------

/// World-space position.  `y` grows downward (screen convention), so the
/// ground lies at larger `y` than the sky.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0)
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Unit vector in the same direction; the zero vector stays zero.
    pub fn normalized(self) -> Self {
        let len = self.length();
        if len <= f32::EPSILON {
            return Self::zero();
        }
        Self::new(self.x / len, self.y / len)
    }
}

impl std::fmt::Display for Vec2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

/// Integer grid point.  All polygon geometry lives on this grid so that
/// repeated boolean operations cannot drift.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<Point> for Vec2 {
    fn from(p: Point) -> Self {
        Vec2::new(p.x as f32, p.y as f32)
    }
}

// ---------------------------------------------------------------------------
// Spatial chunking
// ---------------------------------------------------------------------------

/// Chunk grid coordinate.  Chunk `(x, y)` covers the half-open rectangle
/// `[x*size, (x+1)*size) × [y*size, (y+1)*size)`.
#[derive(
    Debug, Clone, Copy, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize,
)]
pub struct ChunkId {
    pub x: i32,
    pub y: i32,
}

impl ChunkId {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Pack into a single key: high 32 bits carry `x`, low 32 bits carry `y`.
    pub fn pack(self) -> u64 {
        ((self.x as u32 as u64) << 32) | (self.y as u32 as u64)
    }

    pub fn unpack(packed: u64) -> Self {
        Self {
            x: (packed >> 32) as u32 as i32,
            y: packed as u32 as i32,
        }
    }

    /// Largest chunk index an observer position maps to.  Keeps every
    /// chunk rectangle, plus an active radius around it, well inside `i32`.
    pub fn max_index(chunk_size: i32) -> i32 {
        i32::MAX / 2 / chunk_size.max(1)
    }

    /// Chunk owning a world position.  Floors toward negative infinity, so
    /// `x = -1` lands in chunk `-1`, not `0`.  Positions beyond
    /// [`max_index`](Self::max_index) clamp to the outermost chunk.
    pub fn containing(pos: Vec2, chunk_size: i32) -> Self {
        let size = chunk_size as f32;
        let limit = Self::max_index(chunk_size);
        Self {
            x: ((pos.x / size).floor() as i32).clamp(-limit, limit),
            y: ((pos.y / size).floor() as i32).clamp(-limit, limit),
        }
    }

    /// Chunk owning an integer grid point.
    pub fn containing_point(p: Point, chunk_size: i32) -> Self {
        Self {
            x: p.x.div_euclid(chunk_size),
            y: p.y.div_euclid(chunk_size),
        }
    }

    pub fn bounds(self, chunk_size: i32) -> ChunkBounds {
        let left = self.x.saturating_mul(chunk_size);
        let top = self.y.saturating_mul(chunk_size);
        ChunkBounds {
            left,
            top,
            right: left.saturating_add(chunk_size),
            bottom: top.saturating_add(chunk_size),
        }
    }
}

impl std::fmt::Display for ChunkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{},{}]", self.x, self.y)
    }
}

/// Half-open rectangle `[left, right) × [top, bottom)`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ChunkBounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl ChunkBounds {
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.left && p.x < self.right && p.y >= self.top && p.y < self.bottom
    }

    /// Clockwise (in screen space) outline of the rectangle.
    pub fn outline(&self) -> Vec<Point> {
        vec![
            Point::new(self.left, self.top),
            Point::new(self.right, self.top),
            Point::new(self.right, self.bottom),
            Point::new(self.left, self.bottom),
        ]
    }
}

// ---------------------------------------------------------------------------
// Stats & config
// ---------------------------------------------------------------------------

/// How new damage combines with the damage a chunk already carries.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DamageMerge {
    /// Monotonic removal: damaged area only ever grows.
    #[default]
    Union,
    /// Symmetric difference: damaging an already damaged region refills it.
    Xor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainStats {
    pub cached_chunks: usize,
    pub active_chunks: usize,
    pub placed_chunks: usize,
    pub damaged_chunks: usize,
    pub pending_placements: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Side length of a square chunk in world units.
    pub chunk_size: i32,
    /// Chunks per side of the active square around the observer (odd).
    pub active_chunks: i32,
    /// Horizontal spacing between surface samples of the base polygon.
    pub surface_step: i32,
    /// Mean surface depth.
    pub base_height: f64,
    /// Peak-to-peak amplitude of the low-frequency octave.
    pub base_step: f64,
    pub low_freq_divisor: f64,
    pub high_freq_divisor: f64,
    /// Amplitude of the high-frequency surface detail.
    pub detail_amplitude: f64,
    /// Noise-space row sampled by the detail octave.
    pub detail_offset: f64,
    /// Cave grid cell size in world units.
    pub cave_cell: i32,
    pub cave_divisor: f64,
    /// Cave density above which a cell is hollow.
    pub cave_threshold: f64,
    /// Minimum depth below the surface before caves may appear.
    pub cave_min_depth: f64,
    pub grass_spacing: i32,
    pub tree_spacing: i32,
    /// Chance for each tree slot to hold a tree.
    pub tree_chance: f64,
    pub damage_merge: DamageMerge,
    /// Place chunks on background tasks when a runtime is available.
    pub multithreaded: bool,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            active_chunks: 3,
            surface_step: 8,
            base_height: 256.0,
            base_step: 256.0,
            low_freq_divisor: 1024.0,
            high_freq_divisor: 64.0,
            detail_amplitude: 12.0,
            detail_offset: 100.0,
            cave_cell: 32,
            cave_divisor: 160.0,
            cave_threshold: 0.72,
            cave_min_depth: 96.0,
            grass_spacing: 12,
            tree_spacing: 96,
            tree_chance: 0.35,
            damage_merge: DamageMerge::Union,
            multithreaded: true,
        }
    }
}

impl TerrainConfig {
    /// Half-width of the active square, in chunks.
    pub fn active_radius(&self) -> i32 {
        self.active_chunks / 2
    }
}
