//! Random draws behind a seam so outcomes can be pinned in tests.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use rand::Rng;

/// Source of uniform draws.
pub trait OutcomeSource: Send + Sync {
    /// Uniform index in `0..upper`. `upper` is never zero.
    fn pick(&self, upper: usize) -> usize;
}

/// Thread-local CSPRNG, the production source.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngSource;

impl OutcomeSource for ThreadRngSource {
    fn pick(&self, upper: usize) -> usize {
        rand::rng().random_range(0..upper)
    }
}

/// Replays a fixed sequence of draws, cycling when exhausted.
///
/// Every value is reduced modulo `upper`.
#[derive(Debug, Clone)]
pub struct FixedSource {
    draws: Arc<[usize]>,
    next: Arc<AtomicUsize>,
}

impl FixedSource {
    pub fn new(draws: impl Into<Vec<usize>>) -> Self {
        let mut draws = draws.into();
        if draws.is_empty() {
            draws.push(0);
        }
        Self {
            draws: draws.into(),
            next: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn always(draw: usize) -> Self {
        Self::new(vec![draw])
    }
}

impl OutcomeSource for FixedSource {
    fn pick(&self, upper: usize) -> usize {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.draws.len();
        self.draws[idx] % upper.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_rng_source_stays_in_range() {
        let source = ThreadRngSource;
        for _ in 0..1_000 {
            assert!(source.pick(8) < 8);
        }
    }

    #[test]
    fn test_fixed_source_cycles() {
        let source = FixedSource::new(vec![3, 9]);
        assert_eq!(source.pick(8), 3);
        assert_eq!(source.pick(8), 1);
        assert_eq!(source.pick(8), 3);
        assert_eq!(FixedSource::new(Vec::new()).pick(5), 0);
    }
}
