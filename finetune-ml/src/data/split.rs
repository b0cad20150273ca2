//! Seeded train/validation partitioning.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Fraction of items held out for validation.
pub const VALID_PCT: f64 = 0.2;

/// Item indices of each side of a split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub valid: Vec<usize>,
}

/// Shuffles item indices with a seeded RNG and holds out the first
/// `floor(valid_pct * n)` of them for validation.
#[derive(Debug, Clone, Copy)]
pub struct RandomSplitter {
    pub valid_pct: f64,
    pub seed: u64,
}

impl RandomSplitter {
    pub fn new(seed: u64) -> Self {
        Self {
            valid_pct: VALID_PCT,
            seed,
        }
    }

    pub fn split(&self, n_items: usize) -> Split {
        let mut indices: Vec<usize> = (0..n_items).collect();
        let mut rng = StdRng::seed_from_u64(self.seed);
        indices.shuffle(&mut rng);

        let cut = ((self.valid_pct * n_items as f64).floor() as usize).min(n_items);
        let train = indices.split_off(cut);
        Split {
            train,
            valid: indices,
        }
    }
}
