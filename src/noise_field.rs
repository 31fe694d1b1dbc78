//! Seeded 2D noise sampling and deterministic per-position randomness.

use noise::{NoiseFn, OpenSimplex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Deterministic OpenSimplex field remapped to `[0, 1]`.
///
/// The permutation tables are built once from the seed; sampling is
/// stateless and safe to share across threads.
pub struct NoiseField {
    seed: u64,
    inner: OpenSimplex,
}

impl NoiseField {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            inner: OpenSimplex::new(fold_seed(seed)),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Sample at any real `(x, y)`; continuous across integer boundaries.
    pub fn evaluate(&self, x: f64, y: f64) -> f64 {
        let raw = self.inner.get([x, y]);
        ((raw + 1.0) * 0.5).clamp(0.0, 1.0)
    }
}

/// The noise crate seeds with 32 bits; mix both halves so high seed bits
/// still change the world.
fn fold_seed(seed: u64) -> u32 {
    ((seed >> 32) as u32) ^ (seed as u32)
}

/// Derive an independent seed for a secondary field (caves, props).
pub fn derive_seed(seed: u64, salt: u64) -> u64 {
    seed ^ salt.wrapping_mul(0x9E37_79B9_7F4A_7C15).rotate_left(17)
}

/// RNG seeded from the world seed and an integer position.  Same inputs,
/// same sequence, on every thread.
pub fn position_rng(seed: u64, salt: u64, x: i64) -> StdRng {
    let mixed = derive_seed(seed, salt) ^ (x as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    StdRng::seed_from_u64(mixed)
}

/// Uniform `[0, 1)` value for `(seed, salt, x)`.
pub fn position_unit(seed: u64, salt: u64, x: i64) -> f64 {
    position_rng(seed, salt, x).gen::<f64>()
}
