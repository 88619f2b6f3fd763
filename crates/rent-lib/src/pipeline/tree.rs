//! Regression tree (CART with squared-error splits)

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Regression tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

impl TreeNode {
    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn n_leaves(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

/// Best split found for a node
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    root: Option<TreeNode>,
    params: TreeParams,
    n_features: usize,
}

impl RegressionTree {
    pub fn new(params: TreeParams) -> Self {
        Self {
            root: None,
            params,
            n_features: 0,
        }
    }

    /// Fit on the rows named by `sample`; repeated indices act as bootstrap weights
    ///
    /// `importances` accumulates the squared-error reduction per feature.
    pub fn fit(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        sample: &[usize],
        importances: &mut [f64],
    ) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(PipelineError::InvalidValue {
                column: "target".to_string(),
                reason: format!("{} feature rows but {} targets", x.nrows(), y.len()),
            });
        }
        if sample.is_empty() {
            return Err(PipelineError::InsufficientData { rows: 0, required: 1 });
        }
        self.n_features = x.ncols();
        let mut sample = sample.to_vec();
        self.root = Some(self.build(x, y, &mut sample, 0, importances));
        Ok(())
    }

    fn build(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        sample: &mut [usize],
        depth: usize,
        importances: &mut [f64],
    ) -> TreeNode {
        let n_samples = sample.len();
        let sum: f64 = sample.iter().map(|&i| y[i]).sum();
        let value = sum / n_samples as f64;

        let first = y[sample[0]];
        let is_pure = sample.iter().all(|&i| y[i] == first);
        let should_stop = is_pure
            || n_samples < self.params.min_samples_split
            || n_samples < 2 * self.params.min_samples_leaf
            || self.params.max_depth.map_or(false, |d| depth >= d);
        if should_stop {
            return TreeNode::Leaf { value, n_samples };
        }

        let Some(best) = self.best_split(x, y, sample, sum) else {
            return TreeNode::Leaf { value, n_samples };
        };
        importances[best.feature_idx] += best.gain;

        // Partition in place: rows going left first
        let mut mid = 0;
        for i in 0..n_samples {
            if x[[sample[i], best.feature_idx]] <= best.threshold {
                sample.swap(i, mid);
                mid += 1;
            }
        }
        let (left, right) = sample.split_at_mut(mid);

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left: Box::new(self.build(x, y, left, depth + 1, importances)),
            right: Box::new(self.build(x, y, right, depth + 1, importances)),
            n_samples,
        }
    }

    /// Scan every feature for the threshold with the largest squared-error reduction
    ///
    /// Ties keep the lowest feature index, then the lowest threshold.
    fn best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        sample: &[usize],
        total_sum: f64,
    ) -> Option<SplitCandidate> {
        let n = sample.len();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let parent_score = total_sum * total_sum / n as f64;
        let mut best: Option<SplitCandidate> = None;
        let mut order = sample.to_vec();

        for feature_idx in 0..self.n_features {
            order.sort_by(|&a, &b| x[[a, feature_idx]].total_cmp(&x[[b, feature_idx]]));

            let mut left_sum = 0.0;
            for pos in 0..n - 1 {
                left_sum += y[order[pos]];
                let n_left = pos + 1;
                let n_right = n - n_left;
                let current = x[[order[pos], feature_idx]];
                let next = x[[order[pos + 1], feature_idx]];
                if current == next || n_left < min_leaf || n_right < min_leaf {
                    continue;
                }

                let right_sum = total_sum - left_sum;
                let score = left_sum * left_sum / n_left as f64
                    + right_sum * right_sum / n_right as f64;
                let gain = score - parent_score;
                if gain <= 0.0 || best.as_ref().map_or(false, |b| gain <= b.gain) {
                    continue;
                }

                let mut threshold = current + (next - current) / 2.0;
                if threshold >= next {
                    threshold = current;
                }
                best = Some(SplitCandidate {
                    feature_idx,
                    threshold,
                    gain,
                });
            }
        }
        best
    }

    /// Predict one row; an unfitted tree predicts 0
    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = match &self.root {
            Some(root) => root,
            None => return 0.0,
        };
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if row[*feature_idx] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.root.is_some()
    }

    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::depth)
    }

    pub fn n_leaves(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::n_leaves)
    }
}
