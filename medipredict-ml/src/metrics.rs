//! Classification metrics for held-out evaluation.

use serde::{Deserialize, Serialize};

/// Fraction of positions where `predicted` equals `truth`. `0.0` when empty.
pub fn accuracy(truth: &[usize], predicted: &[usize]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let hits = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
    hits as f64 / truth.len() as f64
}

/// Accuracy plus macro-averaged precision, recall and F1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub samples: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    /// `confusion_matrix[truth][predicted]`.
    pub confusion_matrix: Vec<Vec<usize>>,
}

impl ClassificationMetrics {
    /// Classes that never occur in either slice are left out of the macro averages.
    pub fn compute(truth: &[usize], predicted: &[usize], n_classes: usize) -> Self {
        let mut confusion = vec![vec![0usize; n_classes]; n_classes];
        for (&t, &p) in truth.iter().zip(predicted) {
            if t < n_classes && p < n_classes {
                confusion[t][p] += 1;
            }
        }

        let mut precision = Vec::new();
        let mut recall = Vec::new();
        let mut f1 = Vec::new();
        for c in 0..n_classes {
            let tp = confusion[c][c] as f64;
            let actual: usize = confusion[c].iter().sum();
            let guessed: usize = confusion.iter().map(|row| row[c]).sum();
            if actual == 0 && guessed == 0 {
                continue;
            }
            let p = if guessed == 0 { 0.0 } else { tp / guessed as f64 };
            let r = if actual == 0 { 0.0 } else { tp / actual as f64 };
            precision.push(p);
            recall.push(r);
            f1.push(if p + r == 0.0 { 0.0 } else { 2.0 * p * r / (p + r) });
        }

        Self {
            samples: truth.len(),
            accuracy: accuracy(truth, predicted),
            precision: mean(&precision),
            recall: mean(&recall),
            f1_score: mean(&f1),
            confusion_matrix: confusion,
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
