//! Gaussian naive Bayes.

use serde::{Deserialize, Serialize};

use super::{Classifier, check_training_set, check_width, softmax};
use crate::error::MlError;

/// Portion of the largest feature variance added to every variance.
const VAR_SMOOTHING: f64 = 1e-9;

/// Per-class independent normal likelihoods with empirical class priors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianNb {
    /// `log P(class)`; `-inf` for classes absent from training.
    log_priors: Vec<f64>,
    means: Vec<Vec<f64>>,
    variances: Vec<Vec<f64>>,
    n_features: usize,
}

impl GaussianNb {
    pub fn fit(x: &[Vec<f64>], y: &[usize], n_classes: usize) -> Result<Self, MlError> {
        let d = check_training_set(x, y, n_classes)?;
        let n = x.len() as f64;

        let mut counts = vec![0usize; n_classes];
        let mut means = vec![vec![0.0; d]; n_classes];
        for (row, &c) in x.iter().zip(y) {
            counts[c] += 1;
            for (m, v) in means[c].iter_mut().zip(row) {
                *m += v;
            }
        }
        for (c, mean) in means.iter_mut().enumerate() {
            if counts[c] > 0 {
                mean.iter_mut().for_each(|m| *m /= counts[c] as f64);
            }
        }

        let mut variances = vec![vec![0.0; d]; n_classes];
        for (row, &c) in x.iter().zip(y) {
            for j in 0..d {
                let diff = row[j] - means[c][j];
                variances[c][j] += diff * diff;
            }
        }
        for (c, var) in variances.iter_mut().enumerate() {
            if counts[c] > 0 {
                var.iter_mut().for_each(|v| *v /= counts[c] as f64);
            }
        }

        let epsilon = (VAR_SMOOTHING * max_feature_variance(x, d)).max(VAR_SMOOTHING);
        variances
            .iter_mut()
            .flatten()
            .for_each(|v| *v += epsilon);

        let log_priors = counts
            .iter()
            .map(|&k| {
                if k == 0 {
                    f64::NEG_INFINITY
                } else {
                    (k as f64 / n).ln()
                }
            })
            .collect();

        Ok(Self {
            log_priors,
            means,
            variances,
            n_features: d,
        })
    }

    fn joint_log_likelihood(&self, x: &[f64]) -> Vec<f64> {
        self.log_priors
            .iter()
            .enumerate()
            .map(|(c, &prior)| {
                if prior == f64::NEG_INFINITY {
                    return prior;
                }
                let ll: f64 = x
                    .iter()
                    .zip(&self.means[c])
                    .zip(&self.variances[c])
                    .map(|((xi, mu), var)| {
                        -0.5 * (2.0 * std::f64::consts::PI * var).ln()
                            - (xi - mu).powi(2) / (2.0 * var)
                    })
                    .sum();
                prior + ll
            })
            .collect()
    }
}

fn max_feature_variance(x: &[Vec<f64>], d: usize) -> f64 {
    let n = x.len() as f64;
    (0..d)
        .map(|j| {
            let mean = x.iter().map(|r| r[j]).sum::<f64>() / n;
            x.iter().map(|r| (r[j] - mean).powi(2)).sum::<f64>() / n
        })
        .fold(0.0, f64::max)
}

impl Classifier for GaussianNb {
    fn name(&self) -> &str {
        "gaussian_nb"
    }

    fn n_classes(&self) -> usize {
        self.log_priors.len()
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>, MlError> {
        check_width(self.name(), self.n_features, x)?;
        Ok(softmax(&self.joint_log_likelihood(x)))
    }
}
