//! Label codec: string labels ↔ dense class indices.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::MlError;

/// Bidirectional mapping between labels and class indices.
///
/// Classes are the distinct training labels in ascending order, so index `i`
/// always names the `i`-th smallest label. The mapping never changes after
/// [`LabelCodec::fit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCodec {
    classes: Vec<String>,
}

impl LabelCodec {
    pub fn fit<I, S>(labels: I) -> Result<Self, MlError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let distinct: BTreeSet<String> = labels
            .into_iter()
            .map(|l| l.as_ref().to_string())
            .collect();
        if distinct.is_empty() {
            return Err(MlError::training("cannot fit a label codec without labels"));
        }
        Ok(Self {
            classes: distinct.into_iter().collect(),
        })
    }

    pub fn encode(&self, label: &str) -> Result<usize, MlError> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(label))
            .map_err(|_| MlError::UnknownLabel(label.to_string()))
    }

    pub fn encode_all<S: AsRef<str>>(&self, labels: &[S]) -> Result<Vec<usize>, MlError> {
        labels.iter().map(|l| self.encode(l.as_ref())).collect()
    }

    pub fn decode(&self, index: usize) -> Result<&str, MlError> {
        self.classes
            .get(index)
            .map(String::as_str)
            .ok_or(MlError::UnknownClass {
                index,
                n_classes: self.classes.len(),
            })
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Reject codecs that were not produced by `fit` (e.g. hand-edited files).
    pub fn validate(&self) -> Result<(), MlError> {
        if self.classes.is_empty() {
            return Err(MlError::model("label codec has no classes"));
        }
        if self.classes.windows(2).any(|w| w[0] >= w[1]) {
            return Err(MlError::model("label codec classes are not sorted and distinct"));
        }
        Ok(())
    }
}
