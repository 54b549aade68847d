//! # Random Source
//!
//! Every probability decision in the engine (exclusive roll, weighted pick,
//! raid trigger, enemy choice) draws from one [`RandomSource`]. Production uses
//! ChaCha20; tests script the exact sequence and assert which branch ran.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Source of uniform draws in `[0, 1)`.
pub trait RandomSource: Send {
    /// Next uniform value in `[0, 1)`.
    fn next_unit(&mut self) -> f64;

    /// Uniform index in `0..len`. Returns 0 when `len` is 0.
    fn next_index(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let idx = (self.next_unit() * len as f64) as usize;
        idx.min(len - 1)
    }
}

/// ChaCha20-backed production source.
pub struct ChaChaSource {
    rng: ChaCha20Rng,
}

impl ChaChaSource {
    /// Seeds from OS entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self {
            rng: ChaCha20Rng::from_entropy(),
        }
    }

    /// Fixed seed, for reproducible simulations.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for ChaChaSource {
    fn next_unit(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

impl std::fmt::Debug for ChaChaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose the stream state.
        f.debug_struct("ChaChaSource").field("rng", &"[REDACTED]").finish()
    }
}

/// Replays a fixed sequence of draws, cycling when exhausted.
#[derive(Clone, Debug)]
pub struct ScriptedSource {
    values: Vec<f64>,
    cursor: usize,
}

impl ScriptedSource {
    /// Creates a source that yields `values` in order, then starts over.
    ///
    /// Values are clamped into `[0, 1)`. An empty script behaves like `[0.0]`.
    #[must_use]
    pub fn new(values: impl Into<Vec<f64>>) -> Self {
        let mut values: Vec<f64> = values
            .into()
            .into_iter()
            .map(|v| v.clamp(0.0, 1.0 - f64::EPSILON))
            .collect();
        if values.is_empty() {
            values.push(0.0);
        }
        Self { values, cursor: 0 }
    }

    /// A source that always yields the same value.
    #[must_use]
    pub fn constant(value: f64) -> Self {
        Self::new(vec![value])
    }

    /// Number of draws taken so far.
    #[must_use]
    pub const fn draws(&self) -> usize {
        self.cursor
    }
}

impl RandomSource for ScriptedSource {
    fn next_unit(&mut self) -> f64 {
        let value = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        value
    }
}
