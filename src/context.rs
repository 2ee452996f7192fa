//! Per-iteration data handed to statement templates.

use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Exp1, StandardNormal};
use serde::Serialize;
use thiserror::Error;

/// Fields visible to a template while one statement is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IterationContext {
    /// 1-based iteration index.
    #[serde(rename = "Iter")]
    pub iter: u64,
}

impl IterationContext {
    pub fn new(iter: u64) -> Self {
        Self { iter }
    }
}

/// `RandInt63n` was called with a bound that is not positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid argument to RandInt63n: bound must be positive, got {0}")]
pub struct InvalidBound(pub i64);

/// Pseudorandom source behind the template's random functions.
///
/// Each worker owns one, so statements never depend on how workers interleave.
#[derive(Debug, Clone)]
pub struct Generator {
    rng: ChaCha8Rng,
}

impl Generator {
    /// Deterministic generator.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Generator seeded from the thread-local entropy source.
    pub fn from_entropy() -> Self {
        Self::from_seed(rand::random())
    }

    /// Restart the sequence from `seed`.
    pub fn seed(&mut self, seed: i64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed as u64);
    }

    /// Non-negative 63-bit integer.
    pub fn int63(&mut self) -> i64 {
        (self.rng.gen::<u64>() >> 1) as i64
    }

    /// Integer in `[0, n)`.
    pub fn int63n(&mut self, n: i64) -> Result<i64, InvalidBound> {
        if n <= 0 {
            return Err(InvalidBound(n));
        }
        Ok(self.rng.gen_range(0..n))
    }

    /// `f32` in `[0, 1)`.
    pub fn float32(&mut self) -> f32 {
        self.rng.gen()
    }

    /// `f64` in `[0, 1)`.
    pub fn float64(&mut self) -> f64 {
        self.rng.gen()
    }

    /// Exponentially distributed with rate 1.
    pub fn exp_float64(&mut self) -> f64 {
        Exp1.sample(&mut self.rng)
    }

    /// Standard normal distribution.
    pub fn norm_float64(&mut self) -> f64 {
        StandardNormal.sample(&mut self.rng)
    }
}
