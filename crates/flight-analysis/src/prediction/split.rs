use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

pub fn test_size(n: usize, test_ratio: f64) -> usize {
    // The epsilon keeps products like 0.3 * 100 from rounding up to 31.
    let raw = (n as f64 * test_ratio - 1e-9).ceil();
    (raw.max(0.0) as usize).min(n)
}

/// Shuffles `0..n` with a seeded generator; the first `test_size` indices of
/// the permutation form the test partition, the rest the training partition.
pub fn train_test_split(n: usize, test_ratio: f64, seed: u64) -> SplitIndices {
    let mut permutation: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    permutation.shuffle(&mut rng);
    let train = permutation.split_off(test_size(n, test_ratio));
    SplitIndices {
        train,
        test: permutation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn seventy_thirty_sizes() {
        assert_eq!(test_size(10, 0.3), 3);
        assert_eq!(test_size(100, 0.3), 30);
        assert_eq!(test_size(7, 0.3), 3);
        assert_eq!(test_size(1, 0.3), 1);
        assert_eq!(test_size(0, 0.3), 0);
    }

    #[test]
    fn partitions_are_disjoint_and_cover_every_row() {
        let split = train_test_split(50, 0.3, 42);
        assert_eq!(split.test.len(), 15);
        assert_eq!(split.train.len(), 35);
        let all: BTreeSet<usize> = split.train.iter().chain(split.test.iter()).copied().collect();
        assert_eq!(all.len(), 50);
        assert_eq!(all.into_iter().max(), Some(49));
    }

    #[test]
    fn same_seed_reproduces_split() {
        assert_eq!(train_test_split(40, 0.3, 42), train_test_split(40, 0.3, 42));
        assert_ne!(train_test_split(40, 0.3, 42), train_test_split(40, 0.3, 7));
    }
}
