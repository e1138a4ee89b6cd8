//! Random-sampling policy for tiered candidate selection.
//!
//! The tiered selector draws candidates from each tier's pool in random
//! order. Keeping the draw behind a trait lets production use a thread-local
//! RNG while tests pin a seed and get deterministic tier output.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::domain::product::ProductId;

pub trait Sampler: Send + Sync {
    /// Draw up to `count` ids from `pool` without replacement, in random
    /// order. Fewer than `count` are returned when the pool is short.
    fn draw(&self, pool: Vec<ProductId>, count: usize) -> Vec<ProductId>;
}

/// Production sampler backed by the thread-local RNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadRngSampler;

impl Sampler for ThreadRngSampler {
    fn draw(&self, mut pool: Vec<ProductId>, count: usize) -> Vec<ProductId> {
        let mut rng = rand::thread_rng();
        pool.shuffle(&mut rng);
        pool.truncate(count);
        pool
    }
}

/// Deterministic sampler for tests: a fixed seed yields a fixed draw order.
#[derive(Debug)]
pub struct SeededSampler {
    rng: Mutex<StdRng>,
}

impl SeededSampler {
    pub fn new(seed: u64) -> Self {
        Self { rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }
}

impl Sampler for SeededSampler {
    fn draw(&self, mut pool: Vec<ProductId>, count: usize) -> Vec<ProductId> {
        let mut rng = self.rng.lock().expect("sampler rng lock");
        pool.shuffle(&mut *rng);
        pool.truncate(count);
        pool
    }
}

/// Pass-through sampler: preserves pool order. Used in tests that assert on
/// exact candidate identity rather than sampling behavior.
#[derive(Clone, Copy, Debug, Default)]
pub struct OrderedSampler;

impl Sampler for OrderedSampler {
    fn draw(&self, mut pool: Vec<ProductId>, count: usize) -> Vec<ProductId> {
        pool.truncate(count);
        pool
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::product::ProductId;

    use super::{OrderedSampler, Sampler, SeededSampler};

    fn pool(ids: &[u64]) -> Vec<ProductId> {
        ids.iter().copied().map(ProductId).collect()
    }

    #[test]
    fn seeded_sampler_is_reproducible() {
        let first = SeededSampler::new(42).draw(pool(&[1, 2, 3, 4, 5, 6]), 3);
        let second = SeededSampler::new(42).draw(pool(&[1, 2, 3, 4, 5, 6]), 3);
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn draw_never_exceeds_pool() {
        let drawn = SeededSampler::new(7).draw(pool(&[1, 2]), 10);
        assert_eq!(drawn.len(), 2);
    }

    #[test]
    fn draw_is_without_replacement() {
        let mut drawn = SeededSampler::new(9).draw(pool(&[1, 2, 3, 4, 5]), 5);
        drawn.sort();
        assert_eq!(drawn, pool(&[1, 2, 3, 4, 5]));
    }

    #[test]
    fn ordered_sampler_preserves_pool_order() {
        let drawn = OrderedSampler.draw(pool(&[9, 4, 7]), 2);
        assert_eq!(drawn, pool(&[9, 4]));
    }
}
