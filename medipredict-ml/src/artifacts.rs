//! On-disk habit model artifacts.
//!
//! `medipredict train` writes three files into the artifact directory:
//!
//! - `habit_model.json`: the fitted random forest
//! - `habit_label_codec.json`: the tip label codec
//! - `habit_manifest.json`: content hashes and training metadata
//!
//! Every file is written atomically. When a manifest is present, loading
//! verifies that the model and codec bytes still match its hashes, so a
//! model from one run is never paired with a codec from another.

use chrono::{DateTime, Utc};
use medipredict_core::persistence::{atomic_write, atomic_write_json, load_json};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::classifiers::{Classifier, RandomForest};
use crate::codec::LabelCodec;
use crate::error::MlError;
use crate::trainer::TrainingReport;

pub const MODEL_FILE: &str = "habit_model.json";
pub const CODEC_FILE: &str = "habit_label_codec.json";
pub const MANIFEST_FILE: &str = "habit_manifest.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub model_sha256: String,
    pub codec_sha256: String,
    pub n_classes: usize,
    pub n_features: usize,
    pub trained_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<TrainingReport>,
}

/// A habit model together with the codec that decodes its output.
#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    pub model: RandomForest,
    pub codec: LabelCodec,
    pub report: Option<TrainingReport>,
}

impl ModelArtifacts {
    pub fn model_path(dir: &Path) -> PathBuf {
        dir.join(MODEL_FILE)
    }

    pub fn codec_path(dir: &Path) -> PathBuf {
        dir.join(CODEC_FILE)
    }

    pub fn manifest_path(dir: &Path) -> PathBuf {
        dir.join(MANIFEST_FILE)
    }

    /// Whether both required artifact files are present in `dir`.
    pub fn exist(dir: &Path) -> bool {
        Self::model_path(dir).exists() && Self::codec_path(dir).exists()
    }

    pub fn save(&self, dir: &Path) -> Result<ArtifactManifest, MlError> {
        let model_bytes = serde_json::to_vec_pretty(&self.model)?;
        let codec_bytes = serde_json::to_vec_pretty(&self.codec)?;

        atomic_write(&Self::model_path(dir), &model_bytes)?;
        atomic_write(&Self::codec_path(dir), &codec_bytes)?;

        let manifest = ArtifactManifest {
            model_sha256: sha256_hex(&model_bytes),
            codec_sha256: sha256_hex(&codec_bytes),
            n_classes: self.model.n_classes(),
            n_features: self.model.n_features(),
            trained_at: Utc::now(),
            report: self.report.clone(),
        };
        atomic_write_json(&Self::manifest_path(dir), &manifest)?;

        info!(
            dir = %dir.display(),
            classes = manifest.n_classes,
            "Saved habit model artifacts"
        );
        Ok(manifest)
    }

    pub fn load(dir: &Path) -> Result<Self, MlError> {
        let model_bytes = read_required(&Self::model_path(dir))?;
        let codec_bytes = read_required(&Self::codec_path(dir))?;

        let manifest: Option<ArtifactManifest> = load_json(&Self::manifest_path(dir))?;
        match &manifest {
            Some(m) => {
                if sha256_hex(&model_bytes) != m.model_sha256 {
                    return Err(MlError::ArtifactMismatch(format!(
                        "{MODEL_FILE} does not match the manifest hash"
                    )));
                }
                if sha256_hex(&codec_bytes) != m.codec_sha256 {
                    return Err(MlError::ArtifactMismatch(format!(
                        "{CODEC_FILE} does not match the manifest hash"
                    )));
                }
            }
            None => warn!(dir = %dir.display(), "No artifact manifest, skipping hash check"),
        }

        let model: RandomForest = serde_json::from_slice(&model_bytes)?;
        model.validate()?;
        let codec: LabelCodec = serde_json::from_slice(&codec_bytes)?;
        codec.validate()?;
        if model.n_classes() != codec.len() {
            return Err(MlError::ArtifactMismatch(format!(
                "model predicts {} classes but the codec has {}",
                model.n_classes(),
                codec.len()
            )));
        }

        Ok(Self {
            model,
            codec,
            report: manifest.and_then(|m| m.report),
        })
    }
}

fn read_required(path: &Path) -> Result<Vec<u8>, MlError> {
    if !path.exists() {
        return Err(MlError::ArtifactMissing(path.to_path_buf()));
    }
    Ok(std::fs::read(path)?)
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
