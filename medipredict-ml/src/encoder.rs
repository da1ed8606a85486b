//! Form fields → feature vectors, in the column order the models were trained on.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::MlError;

/// Checkbox names on the symptom form, in training-column order.
pub const SYMPTOM_FIELDS: [&str; 5] = ["symptom1", "symptom2", "symptom3", "symptom4", "symptom5"];

/// Binary symptom vector: 1.0 for every checkbox submitted with a non-empty value.
///
/// Unknown fields are ignored.
pub fn encode_symptoms(form: &HashMap<String, String>) -> Vec<f64> {
    SYMPTOM_FIELDS
        .iter()
        .map(|name| match form.get(*name) {
            Some(v) if !v.is_empty() => 1.0,
            _ => 0.0,
        })
        .collect()
}

/// Answers to the lifestyle quiz.
///
/// No range checks: negative hours are passed through to the model as-is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HabitAnswers {
    /// Litres of water per day.
    pub water: f64,
    /// Hours of exercise per week.
    pub exercise: f64,
    /// Hours spent sitting per day.
    pub sitting: f64,
    /// Hours of sleep per night.
    pub sleep: f64,
    /// Servings of fruit and vegetables per day.
    pub diet: f64,
    /// Self-rated stress, 1–10.
    pub stress: i64,
}

impl HabitAnswers {
    /// Parse the quiz form. Missing or non-numeric fields are `InvalidInput`.
    pub fn from_form(form: &HashMap<String, String>) -> Result<Self, MlError> {
        Ok(Self {
            water: float_field(form, "water")?,
            exercise: float_field(form, "exercise")?,
            sitting: float_field(form, "sitting")?,
            sleep: float_field(form, "sleep")?,
            diet: float_field(form, "diet")?,
            stress: int_field(form, "stress")?,
        })
    }

    /// `[water, exercise, sitting, sleep, diet, stress]`, matching the
    /// `water_intake, exercise, working_hours, sleep, diet, stress` columns.
    pub fn to_features(&self) -> Vec<f64> {
        vec![
            self.water,
            self.exercise,
            self.sitting,
            self.sleep,
            self.diet,
            self.stress as f64,
        ]
    }
}

fn raw_field<'a>(form: &'a HashMap<String, String>, name: &str) -> Result<&'a str, MlError> {
    form.get(name)
        .map(|v| v.trim())
        .ok_or_else(|| MlError::invalid_input(format!("field '{name}' is missing")))
}

fn float_field(form: &HashMap<String, String>, name: &str) -> Result<f64, MlError> {
    let raw = raw_field(form, name)?;
    raw.parse()
        .map_err(|_| MlError::invalid_input(format!("field '{name}' is not a number: '{raw}'")))
}

fn int_field(form: &HashMap<String, String>, name: &str) -> Result<i64, MlError> {
    let raw = raw_field(form, name)?;
    raw.parse().map_err(|_| {
        MlError::invalid_input(format!("field '{name}' is not a whole number: '{raw}'"))
    })
}
