//! # medipredict-ml: prediction models for MediPredict
//!
//! Two prediction paths share the same building blocks:
//!
//! - **Disease path**: five symptom checkboxes are encoded into a binary
//!   vector and run through three independently trained classifiers
//!   (linear SVM, Gaussian naive Bayes, random forest). The members vote and
//!   the winning class index is decoded through a shared [`LabelCodec`].
//! - **Habit path**: six lifestyle answers feed one random forest trained
//!   offline by [`trainer`], plus threshold rules evaluated on the raw answers.

pub mod artifacts;
pub mod classifiers;
pub mod codec;
pub mod dataset;
pub mod encoder;
pub mod ensemble;
pub mod error;
pub mod habits;
pub mod metrics;
pub mod trainer;

pub use artifacts::{ArtifactManifest, ModelArtifacts};
pub use classifiers::{Classifier, ForestParams, GaussianNb, LinearSvm, RandomForest, SvmParams};
pub use codec::LabelCodec;
pub use dataset::Dataset;
pub use encoder::{HabitAnswers, encode_symptoms};
pub use ensemble::{
    DiseaseEnsemble, DiseasePrediction, EnsembleEvaluation, EnsembleSettings, MemberVote,
    majority_vote,
};
pub use error::MlError;
pub use habits::{HabitAdvice, HabitAdvisor, recommendations};
pub use metrics::ClassificationMetrics;
pub use trainer::{TrainingReport, TrainingSettings, run_training, train_habit_model};
