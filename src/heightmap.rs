//! Surface height field: the `TerrainSource` trait and the two-octave
//! `HeightMap` built on [`NoiseField`].

use crate::noise_field::NoiseField;
use crate::types::{TerrainConfig, Vec2};

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Anything that can report the ground surface of a side-on world.
pub trait TerrainSource: Send + Sync {
    /// Depth of the surface at column `x` (larger is lower on screen).
    fn height_at(&self, x: f64) -> f64;

    /// Unit surface normal at `x`, pointing out of the ground.
    fn normal_at(&self, x: f64) -> Vec2;
}

// ---------------------------------------------------------------------------
// Heightmap
// ---------------------------------------------------------------------------

/// Finite-difference half-width used for normals.
const NORMAL_EPSILON: f64 = 0.5;

pub struct HeightMap {
    noise: NoiseField,
    base_height: f64,
    base_step: f64,
    low_freq_divisor: f64,
    high_freq_divisor: f64,
    detail_amplitude: f64,
    detail_offset: f64,
}

impl HeightMap {
    pub fn new(seed: u64, config: &TerrainConfig) -> Self {
        Self {
            noise: NoiseField::new(seed),
            base_height: config.base_height,
            base_step: config.base_step,
            low_freq_divisor: config.low_freq_divisor,
            high_freq_divisor: config.high_freq_divisor,
            detail_amplitude: config.detail_amplitude,
            detail_offset: config.detail_offset,
        }
    }

    pub fn seed(&self) -> u64 {
        self.noise.seed()
    }

    /// Lowest and highest surface depth this map can produce.
    pub fn height_range(&self) -> (f64, f64) {
        let low = self.base_height - 0.5 * self.base_step.abs() - self.detail_amplitude.abs();
        let high = self.base_height + 0.5 * self.base_step.abs() + self.detail_amplitude.abs();
        (low, high)
    }
}

impl TerrainSource for HeightMap {
    fn height_at(&self, x: f64) -> f64 {
        let macro_shape = (self.noise.evaluate(x / self.low_freq_divisor, 0.0) - 0.5) * self.base_step;
        let detail = self.detail_amplitude
            * self
                .noise
                .evaluate(x / self.high_freq_divisor, self.detail_offset);
        self.base_height + macro_shape + detail
    }

    fn normal_at(&self, x: f64) -> Vec2 {
        let eps = NORMAL_EPSILON;
        let dh = self.height_at(x + eps) - self.height_at(x - eps);
        Vec2::new(dh as f32, (-2.0 * eps) as f32).normalized()
    }
}
