//! Linear support vector machine, one-vs-rest, trained with Pegasos SGD.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::{Classifier, check_training_set, check_width, softmax};
use crate::error::MlError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SvmParams {
    /// Full passes over the training set per binary problem.
    pub epochs: usize,
    /// L2 regularisation strength.
    pub lambda: f64,
    pub seed: u64,
}

impl Default for SvmParams {
    fn default() -> Self {
        Self {
            epochs: 200,
            lambda: 0.01,
            seed: 42,
        }
    }
}

/// One hinge-loss hyperplane per class. The last weight of each row is the bias.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearSvm {
    weights: Vec<Vec<f64>>,
    n_features: usize,
}

impl LinearSvm {
    pub fn fit(
        x: &[Vec<f64>],
        y: &[usize],
        n_classes: usize,
        params: &SvmParams,
    ) -> Result<Self, MlError> {
        let d = check_training_set(x, y, n_classes)?;
        if params.epochs == 0 {
            return Err(MlError::training("svm epochs must be at least 1"));
        }
        if !(params.lambda > 0.0) {
            return Err(MlError::training("svm lambda must be positive"));
        }

        let weights = (0..n_classes)
            .map(|class| {
                let targets: Vec<f64> = y
                    .iter()
                    .map(|&c| if c == class { 1.0 } else { -1.0 })
                    .collect();
                let seed = params.seed.wrapping_add(class as u64);
                pegasos(x, &targets, d, params.epochs, params.lambda, seed)
            })
            .collect();

        Ok(Self {
            weights,
            n_features: d,
        })
    }

    /// Signed distance-like score for every class.
    pub fn decision_function(&self, x: &[f64]) -> Result<Vec<f64>, MlError> {
        check_width(self.name(), self.n_features, x)?;
        Ok(self.weights.iter().map(|w| score(w, x)).collect())
    }
}

fn score(w: &[f64], x: &[f64]) -> f64 {
    let (bias, coef) = w.split_last().map_or((0.0, w), |(b, c)| (*b, c));
    coef.iter().zip(x).map(|(a, b)| a * b).sum::<f64>() + bias
}

/// Binary Pegasos over rows augmented with a constant bias feature.
fn pegasos(
    x: &[Vec<f64>],
    targets: &[f64],
    d: usize,
    epochs: usize,
    lambda: f64,
    seed: u64,
) -> Vec<f64> {
    let mut w = vec![0.0; d + 1];
    let mut rng = StdRng::seed_from_u64(seed);
    let mut order: Vec<usize> = (0..x.len()).collect();
    let radius = 1.0 / lambda.sqrt();
    let mut t = 0usize;

    for _ in 0..epochs {
        order.shuffle(&mut rng);
        for &i in &order {
            t += 1;
            let eta = 1.0 / (lambda * t as f64);
            let margin = targets[i] * score(&w, &x[i]);
            let decay = 1.0 - eta * lambda;
            w.iter_mut().for_each(|wj| *wj *= decay);
            if margin < 1.0 {
                let step = eta * targets[i];
                for (wj, xj) in w.iter_mut().zip(&x[i]) {
                    *wj += step * xj;
                }
                w[d] += step;
            }
            let norm = w.iter().map(|v| v * v).sum::<f64>().sqrt();
            if norm > radius {
                let shrink = radius / norm;
                w.iter_mut().for_each(|wj| *wj *= shrink);
            }
        }
    }
    w
}

impl Classifier for LinearSvm {
    fn name(&self) -> &str {
        "linear_svm"
    }

    fn n_classes(&self) -> usize {
        self.weights.len()
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>, MlError> {
        Ok(softmax(&self.decision_function(x)?))
    }
}
