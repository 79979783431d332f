//! RNG module - cross-platform deterministic random stream
//!
//! Every participant in a match (server and each client) must draw the same
//! values from the same seed, so this is a fixed 48-bit linear congruential
//! generator rather than a library RNG:
//!
//! - state update: `state = (state * 0x5DEECE66D + 0xB) mod 2^48`
//! - reseed: `state = (seed ^ 0x5DEECE66D) mod 2^48`
//! - bounded draw: `(next(32) & 0x7fffffff) % bound`
//!
//! [`RandomSequence`] precomputes a stream once per match so boards can index
//! into it in O(1); the stream wraps and is treated as infinite.

use serde::{Deserialize, Serialize};

const MULTIPLIER: u64 = 0x5_DEEC_E66D;
const INCREMENT: u64 = 0xB;
const MASK: u64 = (1 << 48) - 1;

/// Seeded 48-bit LCG with exact state save/restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RandomGenerator {
    state: u64,
}

impl RandomGenerator {
    pub fn new(seed: u64) -> Self {
        let mut rng = Self { state: 0 };
        rng.reseed(seed);
        rng
    }

    /// Reset internal state from a seed (scrambled with the multiplier)
    pub fn reseed(&mut self, seed: u64) {
        self.state = (seed ^ MULTIPLIER) & MASK;
    }

    /// Advance and return the top `bits` bits of the new state.
    fn next(&mut self, bits: u32) -> i32 {
        self.state = self
            .state
            .wrapping_mul(MULTIPLIER)
            .wrapping_add(INCREMENT)
            & MASK;
        (self.state >> (48 - bits)) as u32 as i32
    }

    /// Draw a value in `[0, bound)`. A zero bound yields 0.
    pub fn next_bounded(&mut self, bound: u32) -> u32 {
        let raw = (self.next(32) & 0x7fff_ffff) as u32;
        if bound == 0 {
            return 0;
        }
        raw % bound
    }

    /// Dump the raw 48-bit state
    pub fn state(&self) -> u64 {
        self.state
    }

    /// Restore a previously dumped state (no scrambling applied)
    pub fn set_state(&mut self, state: u64) {
        self.state = state & MASK;
    }

    pub fn from_state(state: u64) -> Self {
        Self { state: state & MASK }
    }

    /// Fisher-Yates shuffle driven by this stream
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        for i in (1..slice.len()).rev() {
            let j = self.next_bounded((i + 1) as u32) as usize;
            slice.swap(i, j);
        }
    }
}

/// Precomputed periodic stream of bounded values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomSequence {
    seed: u64,
    bound: u32,
    values: Vec<u32>,
}

impl RandomSequence {
    /// Draw `length` values in `[0, bound)` from a fresh generator seeded with `seed`.
    pub fn materialize(seed: u64, length: usize, bound: u32) -> Self {
        let mut rng = RandomGenerator::new(seed);
        let values = (0..length.max(1)).map(|_| rng.next_bounded(bound)).collect();
        Self {
            seed,
            bound,
            values,
        }
    }

    /// Value at `index`, wrapping modulo the length
    #[inline]
    pub fn get_at(&self, index: usize) -> u32 {
        self.values[index % self.values.len()]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn bound(&self) -> u32 {
        self.bound
    }

    pub fn values(&self) -> &[u32] {
        &self.values
    }
}
