//! Offline training of the habit model (`medipredict train`).

use medipredict_core::config::ModelsConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::artifacts::ModelArtifacts;
use crate::classifiers::{Classifier, ForestParams, RandomForest};
use crate::codec::LabelCodec;
use crate::dataset::Dataset;
use crate::error::MlError;
use crate::habits::{HABIT_FEATURES, HABIT_LABEL};
use crate::metrics::ClassificationMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingSettings {
    /// Share of rows held out for evaluation.
    pub test_fraction: f64,
    /// Seed for the split; the forest has its own in `forest.seed`.
    pub seed: u64,
    pub forest: ForestParams,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
            forest: ForestParams::default(),
        }
    }
}

impl From<&ModelsConfig> for TrainingSettings {
    fn from(config: &ModelsConfig) -> Self {
        Self {
            test_fraction: config.test_fraction,
            seed: config.seed,
            forest: ForestParams {
                n_estimators: config.n_estimators,
                max_depth: config.max_depth,
                min_samples_split: 2,
                seed: config.seed,
            },
        }
    }
}

/// Summary of one training run, stored in the artifact manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub dataset_rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub classes: Vec<String>,
    pub seed: u64,
    pub n_estimators: usize,
    /// Scores on the held-out partition.
    pub holdout: ClassificationMetrics,
}

pub fn load_habit_dataset(path: &Path) -> Result<Dataset, MlError> {
    Dataset::from_csv_columns(path, &HABIT_FEATURES, HABIT_LABEL)
}

/// Fit the codec on every label, split, fit the forest on the training
/// partition and score it on the rest.
pub fn train_habit_model(
    dataset: &Dataset,
    settings: &TrainingSettings,
) -> Result<ModelArtifacts, MlError> {
    let codec = LabelCodec::fit(&dataset.labels)?;
    let (train, test) = dataset.train_test_split(settings.test_fraction, settings.seed)?;

    let y_train = codec.encode_all(&train.labels)?;
    let model = RandomForest::fit(&train.features, &y_train, codec.len(), &settings.forest)?;

    let y_test = codec.encode_all(&test.labels)?;
    let predicted = test
        .features
        .iter()
        .map(|row| model.predict(row))
        .collect::<Result<Vec<_>, _>>()?;
    let holdout = ClassificationMetrics::compute(&y_test, &predicted, codec.len());

    info!(
        train_rows = train.len(),
        test_rows = test.len(),
        classes = codec.len(),
        accuracy = holdout.accuracy,
        "Habit model trained"
    );

    let report = TrainingReport {
        dataset_rows: dataset.len(),
        train_rows: train.len(),
        test_rows: test.len(),
        classes: codec.classes().to_vec(),
        seed: settings.seed,
        n_estimators: settings.forest.n_estimators,
        holdout,
    };
    Ok(ModelArtifacts {
        model,
        codec,
        report: Some(report),
    })
}

/// Load `dataset_path`, train, and write the artifacts into `output_dir`.
pub fn run_training(
    dataset_path: &Path,
    output_dir: &Path,
    settings: &TrainingSettings,
) -> Result<TrainingReport, MlError> {
    let dataset = load_habit_dataset(dataset_path)?;
    let artifacts = train_habit_model(&dataset, settings)?;
    artifacts.save(output_dir)?;
    artifacts
        .report
        .ok_or_else(|| MlError::training("training produced no report"))
}
