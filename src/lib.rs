//! Ground Engine
//!
//! Destructible, chunked 2D terrain: seeded generation, polygon damage,
//! triangulated render/physics geometry, and chunk streaming around an
//! observer.
//!
//! ## Architecture
//!
//! ```text
//! TerrainEngine  (engine.rs)     ← active-area paging, damage, placement
//!   ├── ChunkCache  (cache.rs)   ← packed id → Arc<Mutex<Chunk>>
//!   │     └── Chunk  (chunk.rs)  ← Empty → Generated → Placed
//!   ├── ChunkGenerator  (generator.rs)
//!   │     ├── HeightMap  (heightmap.rs)
//!   │     └── NoiseField (noise_field.rs)
//!   └── World  (world.rs)        ← physics / entities / occluders
//!
//! polygon.rs  ← clipping + triangulation on the integer grid
//! save.rs     ← seed + per-chunk damage
//! ```
//!
//! Chunk placement can run on Tokio blocking tasks; the physics world is
//! only locked to swap prebuilt fixtures.

pub mod cache;
pub mod chunk;
pub mod config;
pub mod engine;
pub mod error;
pub mod generator;
pub mod heightmap;
pub mod noise_field;
pub mod polygon;
pub mod save;
pub mod types;
pub mod world;

pub use cache::ChunkCache;
pub use chunk::{Chunk, ChunkState, RenderMesh};
pub use engine::{ActiveSet, AreaUpdate, TerrainEngine};
pub use error::{Result, TerrainError};
pub use generator::ChunkGenerator;
pub use heightmap::{HeightMap, TerrainSource};
pub use polygon::Polygons;
pub use save::{SavedChunk, WorldSave};
pub use types::{ChunkId, DamageMerge, Point, TerrainConfig, TerrainStats, Vec2};
pub use world::{InMemoryWorld, World};
