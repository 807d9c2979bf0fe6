//! Randomness source shared by the scheduler, the message provider and the
//! commit emitter.

use rand::Rng;
use rand::distr::Alphanumeric;

/// The random operations the rest of the crate needs.
///
/// Implemented for every [`rand::Rng`], so a seeded `StdRng` gives fully
/// reproducible runs and `StdRng::from_os_rng()` gives fresh ones.
pub trait Randomness {
    /// Uniform integer in `min..=max`.
    fn uniform_int(&mut self, min: u32, max: u32) -> u32;

    /// `k` distinct elements of `items`, in sample order.
    ///
    /// `k` is clamped to `items.len()`.
    fn sample_without_replacement<T: Clone>(&mut self, items: &[T], k: usize) -> Vec<T>;

    /// Uniform real in `[0, 1)`.
    fn uniform_real(&mut self) -> f64;

    /// Random alphanumeric token of `len` characters.
    fn token(&mut self, len: usize) -> String;
}

impl<R: Rng> Randomness for R {
    fn uniform_int(&mut self, min: u32, max: u32) -> u32 {
        self.random_range(min..=max)
    }

    fn sample_without_replacement<T: Clone>(&mut self, items: &[T], k: usize) -> Vec<T> {
        let k = k.min(items.len());
        rand::seq::index::sample(self, items.len(), k)
            .into_iter()
            .map(|i| items[i].clone())
            .collect()
    }

    fn uniform_real(&mut self) -> f64 {
        self.random::<f64>()
    }

    fn token(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| char::from(self.sample(Alphanumeric)))
            .collect()
    }
}
