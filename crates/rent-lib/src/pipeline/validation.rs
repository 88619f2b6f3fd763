//! Holdout splitting, k-fold partitioning and R² scoring

use crate::error::{PipelineError, Result};
use ndarray::ArrayView1;
use rand::seq::SliceRandom;
use rand::Rng;

/// Shuffle row indices and split off `ceil(n * test_fraction)` of them as holdout
///
/// Returns `(train, test)` index lists.
pub fn train_test_split<R: Rng + ?Sized>(
    n_rows: usize,
    test_fraction: f64,
    rng: &mut R,
) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n_rows).collect();
    indices.shuffle(rng);
    let n_test = ((n_rows as f64) * test_fraction).ceil() as usize;
    let n_test = n_test.min(n_rows);
    let train = indices.split_off(n_test);
    (train, indices)
}

/// One cross-validation partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Contiguous, unshuffled k-fold partitioning
///
/// The first `n % k` folds hold one extra row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KFold {
    n_splits: usize,
}

impl KFold {
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits }
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    pub fn split(&self, n_rows: usize) -> Result<Vec<Fold>> {
        if self.n_splits < 2 {
            return Err(PipelineError::InvalidValue {
                column: "cv_folds".to_string(),
                reason: format!("at least 2 folds required, got {}", self.n_splits),
            });
        }
        if n_rows < self.n_splits {
            return Err(PipelineError::InsufficientData {
                rows: n_rows,
                required: self.n_splits,
            });
        }

        let base = n_rows / self.n_splits;
        let extra = n_rows % self.n_splits;
        let mut folds = Vec::with_capacity(self.n_splits);
        let mut start = 0;
        for k in 0..self.n_splits {
            let size = base + usize::from(k < extra);
            let end = start + size;
            folds.push(Fold {
                train: (0..start).chain(end..n_rows).collect(),
                test: (start..end).collect(),
            });
            start = end;
        }
        Ok(folds)
    }
}

/// Coefficient of determination, `1 - SS_res / SS_tot`
///
/// Fewer than two rows score NaN. A constant target scores 1.0 when
/// predicted exactly and 0.0 otherwise.
pub fn r2_score(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> f64 {
    if y_true.len() < 2 || y_true.len() != y_pred.len() {
        return f64::NAN;
    }
    let mean = y_true.sum() / y_true.len() as f64;
    let ss_tot: f64 = y_true.iter().map(|y| (y - mean).powi(2)).sum();
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(y, p)| (y - p).powi(2))
        .sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_split_sizes_round_holdout_up() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let (train, test) = train_test_split(11, 0.2, &mut rng);
        assert_eq!(test.len(), 3);
        assert_eq!(train.len(), 8);

        let mut all: Vec<usize> = train.iter().chain(&test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..11).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_is_deterministic_per_seed() {
        let a = train_test_split(50, 0.2, &mut ChaCha8Rng::seed_from_u64(42));
        let b = train_test_split(50, 0.2, &mut ChaCha8Rng::seed_from_u64(42));
        let c = train_test_split(50, 0.2, &mut ChaCha8Rng::seed_from_u64(43));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_kfold_is_contiguous() {
        let folds = KFold::new(5).split(12).unwrap();
        let sizes: Vec<usize> = folds.iter().map(|f| f.test.len()).collect();
        assert_eq!(sizes, vec![3, 3, 2, 2, 2]);
        assert_eq!(folds[0].test, vec![0, 1, 2]);
        assert_eq!(folds[1].train[..3], [0, 1, 2]);
        for fold in &folds {
            assert_eq!(fold.train.len() + fold.test.len(), 12);
        }
    }

    #[test]
    fn test_kfold_needs_a_row_per_fold() {
        let err = KFold::new(5).split(4).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InsufficientData { rows: 4, required: 5 }
        ));
        assert!(KFold::new(1).split(10).is_err());
    }

    #[test]
    fn test_r2_score() {
        let y = array![1.0, 2.0, 3.0, 4.0];
        assert_eq!(r2_score(y.view(), y.view()), 1.0);

        let mean = array![2.5, 2.5, 2.5, 2.5];
        assert_eq!(r2_score(y.view(), mean.view()), 0.0);

        let off = array![2.0, 2.0, 3.0, 5.0];
        assert!((r2_score(y.view(), off.view()) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_r2_degenerate_cases() {
        let constant = array![3.0, 3.0, 3.0];
        assert_eq!(r2_score(constant.view(), constant.view()), 1.0);
        assert_eq!(r2_score(constant.view(), array![3.0, 3.0, 4.0].view()), 0.0);
        assert!(r2_score(array![1.0].view(), array![1.0].view()).is_nan());
    }
}
