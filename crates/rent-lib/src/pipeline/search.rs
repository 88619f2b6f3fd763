//! Exhaustive hyperparameter search scored by k-fold R²

use super::forest::{ForestParams, RandomForestRegressor};
use super::validation::{r2_score, KFold};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// Candidate values for each searched hyperparameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub n_estimators: Vec<usize>,
    pub max_depth: Vec<usize>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            n_estimators: vec![100, 200, 300],
            max_depth: vec![3, 6, 9, 12],
        }
    }
}

impl ParamGrid {
    /// All combinations, `n_estimators` varying slowest
    pub fn candidates(&self) -> Vec<ForestParams> {
        self.n_estimators
            .iter()
            .flat_map(|&n| self.max_depth.iter().map(move |&d| ForestParams::new(n, d)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.n_estimators.len() * self.max_depth.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cross-validated score of one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub params: ForestParams,
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
}

impl CandidateScore {
    /// Higher mean wins; NaN loses to everything
    fn beats(&self, other: &CandidateScore) -> bool {
        match (self.mean_score.is_nan(), other.mean_score.is_nan()) {
            (true, _) => false,
            (false, true) => true,
            (false, false) => self.mean_score.total_cmp(&other.mean_score) == Ordering::Greater,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub best: CandidateScore,
    /// Every candidate in grid order
    pub candidates: Vec<CandidateScore>,
}

pub struct GridSearch {
    grid: ParamGrid,
    cv: KFold,
}

impl GridSearch {
    pub fn new(grid: ParamGrid, folds: usize) -> Self {
        Self {
            grid,
            cv: KFold::new(folds),
        }
    }

    /// Score every candidate; forests share `seed` so candidates differ only by parameters
    pub fn run(&self, x: &Array2<f64>, y: &Array1<f64>, seed: u64) -> Result<SearchResult> {
        if self.grid.is_empty() {
            return Err(PipelineError::InvalidValue {
                column: "param_grid".to_string(),
                reason: "grid has no candidates".to_string(),
            });
        }
        let folds = self.cv.split(x.nrows())?;

        let mut candidates = Vec::with_capacity(self.grid.len());
        let mut best: Option<usize> = None;
        for params in self.grid.candidates() {
            let mut fold_scores = Vec::with_capacity(folds.len());
            for fold in &folds {
                let mut forest = RandomForestRegressor::new(params, seed);
                forest.fit(&x.select(Axis(0), &fold.train), &y.select(Axis(0), &fold.train))?;
                let predicted = forest.predict(&x.select(Axis(0), &fold.test))?;
                let actual = y.select(Axis(0), &fold.test);
                fold_scores.push(r2_score(actual.view(), predicted.view()));
            }
            let mean_score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
            debug!(params = %params, mean_r2 = mean_score, "Scored candidate");

            let score = CandidateScore {
                params,
                fold_scores,
                mean_score,
            };
            if best.map_or(true, |b| score.beats(&candidates[b])) {
                best = Some(candidates.len());
            }
            candidates.push(score);
        }

        let best = candidates[best.unwrap_or(0)].clone();
        Ok(SearchResult { best, candidates })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(n: usize, mean: f64) -> CandidateScore {
        CandidateScore {
            params: ForestParams::new(n, 3),
            fold_scores: vec![mean],
            mean_score: mean,
        }
    }

    #[test]
    fn test_default_grid_order() {
        let candidates = ParamGrid::default().candidates();
        assert_eq!(candidates.len(), 12);
        assert_eq!(candidates[0], ForestParams::new(100, 3));
        assert_eq!(candidates[1], ForestParams::new(100, 6));
        assert_eq!(candidates[4], ForestParams::new(200, 3));
        assert_eq!(candidates[11], ForestParams::new(300, 12));
    }

    #[test]
    fn test_nan_ranks_lowest_and_ties_keep_first() {
        assert!(score(1, 0.1).beats(&score(2, f64::NAN)));
        assert!(!score(1, f64::NAN).beats(&score(2, -5.0)));
        assert!(!score(1, 0.5).beats(&score(2, 0.5)));
        assert!(score(1, 0.6).beats(&score(2, 0.5)));
    }

    #[test]
    fn test_search_picks_best_candidate() {
        let n = 40;
        let x = Array2::from_shape_fn((n, 2), |(i, j)| if j == 0 { i as f64 } else { (i % 3) as f64 });
        let y = Array1::from_shape_fn(n, |i| (i as f64).powi(2));
        let grid = ParamGrid {
            n_estimators: vec![5],
            max_depth: vec![1, 6],
        };

        let result = GridSearch::new(grid, 5).run(&x, &y, 42).unwrap();
        assert_eq!(result.candidates.len(), 2);
        assert!(result.candidates.iter().all(|c| c.fold_scores.len() == 5));
        let expected = if result.candidates[1].beats(&result.candidates[0]) { 1 } else { 0 };
        assert_eq!(result.best, result.candidates[expected]);
    }

    #[test]
    fn test_search_needs_a_row_per_fold() {
        let x = Array2::zeros((3, 2));
        let y = Array1::zeros(3);
        let err = GridSearch::new(ParamGrid::default(), 5).run(&x, &y, 0).unwrap_err();
        assert!(matches!(err, PipelineError::InsufficientData { rows: 3, required: 5 }));
    }

    #[test]
    fn test_empty_grid_is_rejected() {
        let grid = ParamGrid {
            n_estimators: vec![],
            max_depth: vec![3],
        };
        let x = Array2::zeros((10, 1));
        let y = Array1::zeros(10);
        assert!(GridSearch::new(grid, 5).run(&x, &y, 0).is_err());
    }
}
