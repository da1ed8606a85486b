//! Tabular classifiers over dense `f64` feature rows.
//!
//! All classifiers are fitted once from `(rows, class indices)` and are
//! read-only afterwards, so a fitted model can be shared across request
//! handlers behind an `Arc` without locking.

mod forest;
mod naive_bayes;
mod svm;

pub use forest::{DecisionTree, ForestParams, RandomForest};
pub use naive_bayes::GaussianNb;
pub use svm::{LinearSvm, SvmParams};

use crate::error::MlError;

/// A fitted multi-class classifier.
pub trait Classifier: Send + Sync {
    /// Short identifier used in logs and vote breakdowns.
    fn name(&self) -> &str;

    fn n_classes(&self) -> usize;

    fn n_features(&self) -> usize;

    /// Per-class scores that sum to one.
    fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>, MlError>;

    /// Most likely class index; ties go to the smallest index.
    fn predict(&self, x: &[f64]) -> Result<usize, MlError> {
        Ok(argmax(&self.predict_proba(x)?))
    }
}

/// Index of the first maximum. NaNs never win; an empty slice yields 0.
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (i, &v) in values.iter().enumerate() {
        if v > best_value {
            best = i;
            best_value = v;
        }
    }
    best
}

pub(crate) fn check_width(model: &str, expected: usize, x: &[f64]) -> Result<(), MlError> {
    if x.len() != expected {
        return Err(MlError::invalid_input(format!(
            "{model} expects {expected} features, got {}",
            x.len()
        )));
    }
    Ok(())
}

/// Validate a training set before fitting.
pub(crate) fn check_training_set(
    x: &[Vec<f64>],
    y: &[usize],
    n_classes: usize,
) -> Result<usize, MlError> {
    if x.is_empty() {
        return Err(MlError::training("training set is empty"));
    }
    if x.len() != y.len() {
        return Err(MlError::training(format!(
            "{} rows but {} targets",
            x.len(),
            y.len()
        )));
    }
    if n_classes == 0 {
        return Err(MlError::training("n_classes must be at least 1"));
    }
    if let Some(&bad) = y.iter().find(|&&c| c >= n_classes) {
        return Err(MlError::training(format!(
            "target {bad} out of range for {n_classes} classes"
        )));
    }
    let width = x[0].len();
    if width == 0 {
        return Err(MlError::training("rows have no features"));
    }
    if x.iter().any(|r| r.len() != width) {
        return Err(MlError::training("rows have differing widths"));
    }
    Ok(width)
}

/// Numerically stable softmax.
pub(crate) fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return vec![1.0 / scores.len() as f64; scores.len()];
    }
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
