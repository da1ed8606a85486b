//! Lifestyle quiz: one random forest tip plus fixed threshold rules.

use serde::Serialize;
use std::path::Path;
use tracing::debug;

use crate::artifacts::ModelArtifacts;
use crate::classifiers::{Classifier, RandomForest};
use crate::codec::LabelCodec;
use crate::encoder::HabitAnswers;
use crate::error::MlError;

/// Training columns, in the order [`HabitAnswers::to_features`] produces them.
pub const HABIT_FEATURES: [&str; 6] = [
    "water_intake",
    "exercise",
    "working_hours",
    "sleep",
    "diet",
    "stress",
];

/// Label column of the lifestyle dataset.
pub const HABIT_LABEL: &str = "tips";

/// Shown with every quiz result, in this order.
pub const DETAILED_FEEDBACK: [&str; 4] = [
    "Drinking enough water is crucial for maintaining bodily functions, including temperature regulation and joint lubrication.",
    "Regular exercise can help prevent chronic diseases, improve mood, and enhance overall health.",
    "Adequate sleep is essential for cognitive function, mood regulation, and physical health.",
    "Managing stress is important for mental health, and can help improve your overall well-being.",
];

const WATER_INCREASE: &str = "You're drinking less than the recommended amount of water. Consider increasing your daily intake by 0.5 liters to stay hydrated.";
const EXERCISE_INCREASE: &str = "You\u{2019}re doing less exercise than recommended. Aim to increase your activity level by 1 hour per week.";
const SLEEP_INCREASE: &str = "You're getting less sleep than recommended. Try to increase your sleep duration gradually.";
const STRESS_HIGH: &str = "Your stress levels are high. Implement stress management techniques like meditation or yoga.";
const EXERCISE_GOAL: &str = "Set a goal to gradually increase your exercise to at least 2 hours per week over the next month.";
const WATER_GOAL: &str = "Try to aim for 2 liters of water per day. Gradually increase your intake to reach this goal.";
const SLEEP_GOAL: &str = "Aim to increase your sleep to at least 7 hours per night over the next two weeks.";

/// Threshold rules on the raw answers, evaluated in a fixed order.
///
/// Independent of the model. Diet answers never trigger a message.
pub fn recommendations(answers: &HabitAnswers) -> Vec<&'static str> {
    let rules: [(bool, &'static str); 7] = [
        (answers.water < 1.5, WATER_INCREASE),
        (answers.exercise < 2.5, EXERCISE_INCREASE),
        (answers.sleep < 7.0, SLEEP_INCREASE),
        (answers.stress > 7, STRESS_HIGH),
        (answers.exercise < 2.0, EXERCISE_GOAL),
        (answers.water < 2.0, WATER_GOAL),
        (answers.sleep < 7.0, SLEEP_GOAL),
    ];
    rules
        .into_iter()
        .filter_map(|(fires, message)| fires.then_some(message))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HabitAdvice {
    /// Decoded model output.
    pub tip: String,
    pub recommendations: Vec<&'static str>,
    pub detailed_feedback: Vec<&'static str>,
}

/// Fitted quiz model and its label codec.
#[derive(Debug, Clone)]
pub struct HabitAdvisor {
    model: RandomForest,
    codec: LabelCodec,
}

impl HabitAdvisor {
    pub fn new(model: RandomForest, codec: LabelCodec) -> Result<Self, MlError> {
        codec.validate()?;
        model.validate()?;
        if model.n_classes() != codec.len() {
            return Err(MlError::ArtifactMismatch(format!(
                "model predicts {} classes but the codec has {}",
                model.n_classes(),
                codec.len()
            )));
        }
        if model.n_features() != HABIT_FEATURES.len() {
            return Err(MlError::ArtifactMismatch(format!(
                "model expects {} features, the quiz provides {}",
                model.n_features(),
                HABIT_FEATURES.len()
            )));
        }
        Ok(Self { model, codec })
    }

    /// Load the artifacts written by `medipredict train`.
    pub fn from_artifacts(dir: &Path) -> Result<Self, MlError> {
        let artifacts = ModelArtifacts::load(dir)?;
        Self::new(artifacts.model, artifacts.codec)
    }

    pub fn codec(&self) -> &LabelCodec {
        &self.codec
    }

    pub fn advise(&self, answers: &HabitAnswers) -> Result<HabitAdvice, MlError> {
        let index = self.model.predict(&answers.to_features())?;
        let tip = self.codec.decode(index)?.to_string();
        let recommendations = recommendations(answers);
        debug!(tip = %tip, rules = recommendations.len(), "Habit advice");
        Ok(HabitAdvice {
            tip,
            recommendations,
            detailed_feedback: DETAILED_FEEDBACK.to_vec(),
        })
    }
}
