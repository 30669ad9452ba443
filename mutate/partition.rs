//! Reproducible train/holdout partitions.
//!
//! Every iteration derives its own seed from its index through a
//! `SeedSchedule`; no random stream is shared between iterations, so a given
//! iteration always sees the same partition no matter how, or in which order,
//! the iterations are executed.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// A pure mapping from a 1-based iteration index to a random seed.
pub trait SeedSchedule: Sync {
    fn seed_for(&self, iteration: usize) -> u64;
}

impl<F> SeedSchedule for F
where
    F: Fn(usize) -> u64 + Sync,
{
    fn seed_for(&self, iteration: usize) -> u64 {
        self(iteration)
    }
}

/// Seeds `offset + iteration`. An offset of 0 seeds iteration `i` with `i`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetSeeds {
    pub offset: u64,
}

impl SeedSchedule for OffsetSeeds {
    fn seed_for(&self, iteration: usize) -> u64 {
        self.offset.wrapping_add(iteration as u64)
    }
}

/// Number of training rows for a split ratio, `round(split_ratio * n_rows)`.
pub fn training_size(n_rows: usize, split_ratio: f64) -> usize {
    (split_ratio * n_rows as f64).round() as usize
}

/// Row indices of one train/holdout split. The two sets are disjoint and
/// together cover `0..n_rows` exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub train: Vec<usize>,
    pub holdout: Vec<usize>,
}

impl Partition {
    /// Shuffles `0..n_rows` with a ChaCha8 stream seeded from `seed` and takes
    /// the first `n_train` indices for training.
    pub fn draw(n_rows: usize, n_train: usize, seed: u64) -> Self {
        debug_assert!(n_train <= n_rows);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut indices: Vec<usize> = (0..n_rows).collect();
        indices.shuffle(&mut rng);
        let holdout = indices.split_off(n_train);
        Self {
            train: indices,
            holdout,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.train.len() + self.holdout.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_covers_every_row_exactly_once() {
        for seed in 0..20 {
            let partition = Partition::draw(1000, 900, seed);
            assert_eq!(partition.train.len(), 900);
            assert_eq!(partition.holdout.len(), 100);
            assert_eq!(partition.n_rows(), 1000);

            let mut seen = vec![false; 1000];
            for &row in partition.train.iter().chain(partition.holdout.iter()) {
                assert!(!seen[row], "row {row} drawn twice for seed {seed}");
                seen[row] = true;
            }
            assert!(seen.iter().all(|&s| s));
        }
    }

    #[test]
    fn same_seed_gives_same_partition() {
        assert_eq!(Partition::draw(50, 40, 7), Partition::draw(50, 40, 7));
        assert_ne!(Partition::draw(50, 40, 7), Partition::draw(50, 40, 8));
    }

    #[test]
    fn training_size_rounds_to_nearest_row() {
        assert_eq!(training_size(1000, 0.9), 900);
        assert_eq!(training_size(10, 0.8), 8);
        assert_eq!(training_size(5, 0.5), 3);
        assert_eq!(training_size(4, 0.99), 4);
    }

    #[test]
    fn closures_and_offsets_are_seed_schedules() {
        let doubled = |i: usize| 2 * i as u64;
        assert_eq!(doubled.seed_for(3), 6);
        assert_eq!(OffsetSeeds::default().seed_for(5), 5);
        assert_eq!(OffsetSeeds { offset: 100 }.seed_for(1), 101);
    }
}
