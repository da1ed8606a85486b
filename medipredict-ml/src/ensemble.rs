//! Disease prediction by plurality vote over three classifiers.

use medipredict_core::config::ModelsConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::classifiers::{
    Classifier, ForestParams, GaussianNb, LinearSvm, RandomForest, SvmParams,
};
use crate::codec::LabelCodec;
use crate::dataset::Dataset;
use crate::error::MlError;
use crate::metrics::{ClassificationMetrics, accuracy};

/// Plurality winner of `votes`.
///
/// Counts each class index and returns the first index with the highest
/// count, so a full tie resolves to the smallest index. `None` when there
/// are no votes.
pub fn majority_vote(votes: &[usize]) -> Option<usize> {
    let max = *votes.iter().max()?;
    let mut counts = vec![0usize; max + 1];
    for &v in votes {
        counts[v] += 1;
    }
    let mut best = 0;
    for (i, &c) in counts.iter().enumerate() {
        if c > counts[best] {
            best = i;
        }
    }
    Some(best)
}

/// Hyperparameters for the ensemble members.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EnsembleSettings {
    pub svm: SvmParams,
    pub forest: ForestParams,
}

impl From<&ModelsConfig> for EnsembleSettings {
    fn from(config: &ModelsConfig) -> Self {
        Self {
            svm: SvmParams {
                epochs: config.svm_epochs,
                lambda: config.svm_lambda,
                seed: config.seed,
            },
            forest: ForestParams {
                n_estimators: config.n_estimators,
                max_depth: config.max_depth,
                min_samples_split: 2,
                seed: config.seed,
            },
        }
    }
}

/// One member's ballot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberVote {
    pub member: String,
    pub class_index: usize,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiseasePrediction {
    pub label: String,
    pub class_index: usize,
    pub votes: Vec<MemberVote>,
    /// All members agreed.
    pub unanimous: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberAccuracy {
    pub member: String,
    pub accuracy: f64,
}

/// Held-out scores for the vote and for every member on its own.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnsembleEvaluation {
    pub ensemble: ClassificationMetrics,
    pub members: Vec<MemberAccuracy>,
}

/// Classifiers sharing one label codec and one feature layout.
pub struct DiseaseEnsemble {
    codec: LabelCodec,
    members: Vec<Box<dyn Classifier>>,
}

impl fmt::Debug for DiseaseEnsemble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiseaseEnsemble")
            .field("classes", &self.codec.len())
            .field("members", &self.member_names())
            .finish()
    }
}

impl DiseaseEnsemble {
    /// Fit the codec on the training labels, then the SVM, naive Bayes and
    /// random forest members on the encoded targets.
    pub fn train(train: &Dataset, settings: &EnsembleSettings) -> Result<Self, MlError> {
        let codec = LabelCodec::fit(&train.labels)?;
        let y = codec.encode_all(&train.labels)?;
        let n_classes = codec.len();
        let x = &train.features;

        let svm = LinearSvm::fit(x, &y, n_classes, &settings.svm)?;
        debug!("Fitted linear SVM");
        let nb = GaussianNb::fit(x, &y, n_classes)?;
        debug!("Fitted Gaussian naive Bayes");
        let forest = RandomForest::fit(x, &y, n_classes, &settings.forest)?;

        info!(
            rows = train.len(),
            features = train.n_features(),
            classes = n_classes,
            "Disease ensemble trained"
        );
        Self::from_parts(codec, vec![Box::new(svm), Box::new(nb), Box::new(forest)])
    }

    /// Assemble an ensemble from already fitted members.
    pub fn from_parts(
        codec: LabelCodec,
        members: Vec<Box<dyn Classifier>>,
    ) -> Result<Self, MlError> {
        codec.validate()?;
        let Some(first) = members.first() else {
            return Err(MlError::model("ensemble needs at least one member"));
        };
        let n_features = first.n_features();
        for m in &members {
            if m.n_classes() != codec.len() {
                return Err(MlError::ArtifactMismatch(format!(
                    "{} predicts {} classes but the codec has {}",
                    m.name(),
                    m.n_classes(),
                    codec.len()
                )));
            }
            if m.n_features() != n_features {
                return Err(MlError::ArtifactMismatch(format!(
                    "{} expects {} features, {} expects {n_features}",
                    m.name(),
                    m.n_features(),
                    first.name()
                )));
            }
        }
        Ok(Self { codec, members })
    }

    pub fn codec(&self) -> &LabelCodec {
        &self.codec
    }

    pub fn member_names(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.name()).collect()
    }

    pub fn n_features(&self) -> usize {
        self.members.first().map_or(0, |m| m.n_features())
    }

    fn vote_indices(&self, x: &[f64]) -> Result<(Vec<usize>, usize), MlError> {
        let indices = self
            .members
            .iter()
            .map(|m| m.predict(x))
            .collect::<Result<Vec<_>, _>>()?;
        let winner =
            majority_vote(&indices).ok_or_else(|| MlError::model("ensemble has no members"))?;
        Ok((indices, winner))
    }

    pub fn predict(&self, x: &[f64]) -> Result<DiseasePrediction, MlError> {
        let (indices, winner) = self.vote_indices(x)?;
        let votes = self
            .members
            .iter()
            .zip(&indices)
            .map(|(m, &i)| {
                Ok(MemberVote {
                    member: m.name().to_string(),
                    class_index: i,
                    label: self.codec.decode(i)?.to_string(),
                })
            })
            .collect::<Result<Vec<_>, MlError>>()?;
        let label = self.codec.decode(winner)?.to_string();
        debug!(label = %label, votes = ?indices, "Disease prediction");
        Ok(DiseasePrediction {
            label,
            class_index: winner,
            unanimous: indices.iter().all(|&i| i == winner),
            votes,
        })
    }

    /// Score on a held-out set. Labels the codec has never seen are an error.
    pub fn evaluate(&self, test: &Dataset) -> Result<EnsembleEvaluation, MlError> {
        if test.n_features() != self.n_features() {
            return Err(MlError::dataset(format!(
                "held-out set has {} features, ensemble expects {}",
                test.n_features(),
                self.n_features()
            )));
        }
        let truth = self.codec.encode_all(&test.labels)?;

        let mut voted = Vec::with_capacity(test.len());
        let mut per_member = vec![Vec::with_capacity(test.len()); self.members.len()];
        for row in &test.features {
            let (indices, winner) = self.vote_indices(row)?;
            for (preds, i) in per_member.iter_mut().zip(indices) {
                preds.push(i);
            }
            voted.push(winner);
        }

        let members = self
            .members
            .iter()
            .zip(&per_member)
            .map(|(m, preds)| MemberAccuracy {
                member: m.name().to_string(),
                accuracy: accuracy(&truth, preds),
            })
            .collect();
        Ok(EnsembleEvaluation {
            ensemble: ClassificationMetrics::compute(&truth, &voted, self.codec.len()),
            members,
        })
    }
}
