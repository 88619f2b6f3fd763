//! Random forest regressor
//!
//! Bagged regression trees averaged at prediction time. Every tree draws its
//! bootstrap sample from its own ChaCha8 stream seeded with
//! `seed + tree_index`, so a fit is reproducible regardless of how rayon
//! schedules the trees.

use super::tree::{RegressionTree, TreeParams};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Forest hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub bootstrap: bool,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            bootstrap: true,
        }
    }
}

impl ForestParams {
    pub fn new(n_estimators: usize, max_depth: usize) -> Self {
        Self {
            n_estimators,
            max_depth: Some(max_depth),
            ..Self::default()
        }
    }

    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
        }
    }
}

impl fmt::Display for ForestParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max_depth {
            Some(depth) => write!(f, "n_estimators={}, max_depth={}", self.n_estimators, depth),
            None => write!(f, "n_estimators={}, max_depth=None", self.n_estimators),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    params: ForestParams,
    seed: u64,
    trees: Vec<RegressionTree>,
    n_features: usize,
    feature_importances: Vec<f64>,
}

impl RandomForestRegressor {
    pub fn new(params: ForestParams, seed: u64) -> Self {
        Self {
            params,
            seed,
            trees: Vec::new(),
            n_features: 0,
            feature_importances: Vec::new(),
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(PipelineError::InvalidValue {
                column: "target".to_string(),
                reason: format!("{} feature rows but {} targets", n_samples, y.len()),
            });
        }
        if n_samples == 0 {
            return Err(PipelineError::InsufficientData { rows: 0, required: 1 });
        }
        if let Some(bad) = x.iter().chain(y.iter()).find(|v| !v.is_finite()) {
            return Err(PipelineError::InvalidValue {
                column: "*".to_string(),
                reason: format!("training data contains non-finite value {}", bad),
            });
        }
        if self.params.n_estimators == 0 {
            return Err(PipelineError::InvalidValue {
                column: "n_estimators".to_string(),
                reason: "forest needs at least one tree".to_string(),
            });
        }

        let n_features = x.ncols();
        let tree_params = self.params.tree_params();
        let bootstrap = self.params.bootstrap;
        let base_seed = self.seed;

        let fitted: Vec<(RegressionTree, Vec<f64>)> = (0..self.params.n_estimators)
            .into_par_iter()
            .map(|tree_idx| -> Result<(RegressionTree, Vec<f64>)> {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));
                let sample: Vec<usize> = if bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };
                let mut tree = RegressionTree::new(tree_params);
                let mut importances = vec![0.0; n_features];
                tree.fit(x, y, &sample, &mut importances)?;
                Ok((tree, importances))
            })
            .collect::<Result<_>>()?;

        let mut totals = vec![0.0; n_features];
        let mut trees = Vec::with_capacity(fitted.len());
        for (tree, importances) in fitted {
            for (total, value) in totals.iter_mut().zip(importances) {
                *total += value;
            }
            trees.push(tree);
        }
        let sum: f64 = totals.iter().sum();
        if sum > 0.0 {
            totals.iter_mut().for_each(|v| *v /= sum);
        }

        self.trees = trees;
        self.n_features = n_features;
        self.feature_importances = totals;
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.check_input(x.ncols())?;
        Ok(x.rows().into_iter().map(|row| self.average(row)).collect())
    }

    /// Predict a single feature vector
    pub fn predict_one(&self, features: &[f64]) -> Result<f64> {
        self.check_input(features.len())?;
        Ok(self.average(ArrayView1::from(features)))
    }

    fn check_input(&self, n_features: usize) -> Result<()> {
        if self.trees.is_empty() {
            return Err(PipelineError::ModelNotLoaded);
        }
        if n_features != self.n_features {
            return Err(PipelineError::FeatureCountMismatch {
                expected: self.n_features,
                actual: n_features,
            });
        }
        Ok(())
    }

    fn average(&self, row: ArrayView1<f64>) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.predict_row(row)).sum();
        total / self.trees.len() as f64
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Normalized squared-error reduction per feature
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }
}
