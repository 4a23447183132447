//! Deterministic random number generation for search and training.
//!
//! ## Key Features
//!
//! - **Deterministic**: Same seed produces identical sequence
//! - **Forkable**: Independent streams for the background trainer
//! - **Exploration noise**: Dirichlet samples for root-node priors
//!
//! ```
//! use mcts_policy::core::GameRng;
//!
//! let mut rng = GameRng::new(42);
//! let mut trainer_rng = rng.fork();
//!
//! let noise = rng.dirichlet(0.3, 4);
//! assert!((noise.iter().sum::<f64>() - 1.0).abs() < 1e-9);
//! let _ = trainer_rng.gen_range_usize(0..10);
//! ```

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Gamma};
use tracing::warn;

/// Deterministic RNG used by policy managers and the trainer.
///
/// Uses ChaCha8 for speed while keeping high-quality randomness.
#[derive(Clone, Debug)]
pub struct GameRng {
    inner: ChaCha8Rng,
    seed: u64,
    fork_counter: u64,
}

impl GameRng {
    /// Create a new RNG with the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
            seed,
            fork_counter: 0,
        }
    }

    /// Fork this RNG to create an independent branch.
    ///
    /// Each fork produces a different but deterministic sequence.
    #[must_use]
    pub fn fork(&mut self) -> Self {
        self.fork_counter += 1;
        let fork_seed = self.seed.wrapping_add(self.fork_counter.wrapping_mul(0x9E37_79B9_7F4A_7C15));
        Self {
            inner: ChaCha8Rng::seed_from_u64(fork_seed),
            seed: fork_seed,
            fork_counter: 0,
        }
    }

    /// The seed this stream was created from.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Generate a random usize in the given range.
    pub fn gen_range_usize(&mut self, range: std::ops::Range<usize>) -> usize {
        self.inner.gen_range(range)
    }

    /// Uniform float in `[0, 1)`.
    pub fn gen_unit(&mut self) -> f64 {
        self.inner.gen::<f64>()
    }

    /// Choose a random element from a slice.
    #[must_use]
    pub fn choose<'a, T>(&mut self, slice: &'a [T]) -> Option<&'a T> {
        use rand::seq::SliceRandom;
        slice.choose(&mut self.inner)
    }

    /// Choose a random index with weighted probability.
    ///
    /// Weights do not need to sum to 1.0. Returns `None` if weights are
    /// empty, all zero, or not finite.
    pub fn choose_weighted(&mut self, weights: &[f64]) -> Option<usize> {
        let total: f64 = weights.iter().sum();
        if weights.is_empty() || !total.is_finite() || total <= 0.0 {
            return None;
        }

        let mut threshold = self.inner.gen::<f64>() * total;

        for (i, &weight) in weights.iter().enumerate() {
            threshold -= weight;
            if threshold < 0.0 {
                return Some(i);
            }
        }

        // Floating point edge case - return last non-zero weight
        weights.iter().rposition(|&w| w > 0.0)
    }

    /// Sample a symmetric Dirichlet distribution of dimension `n`.
    ///
    /// Built from normalized Gamma(alpha, 1) variates. Small alphas can
    /// underflow every variate to zero; the result then falls back to the
    /// uniform distribution so it always sums to 1.
    pub fn dirichlet(&mut self, alpha: f64, n: usize) -> Vec<f64> {
        if n == 0 {
            return Vec::new();
        }

        let uniform = || vec![1.0 / n as f64; n];
        let gamma = match Gamma::new(alpha, 1.0) {
            Ok(gamma) => gamma,
            Err(err) => {
                warn!(alpha, %err, "invalid dirichlet alpha, using uniform noise");
                return uniform();
            }
        };

        let mut samples: Vec<f64> = (0..n).map(|_| gamma.sample(&mut self.inner)).collect();
        let sum: f64 = samples.iter().sum();
        if !sum.is_finite() || sum <= 0.0 {
            warn!(alpha, n, "dirichlet samples underflowed, using uniform noise");
            return uniform();
        }

        for s in &mut samples {
            *s /= sum;
        }
        samples
    }
}
