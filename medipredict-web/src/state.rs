//! Shared application state, built once at startup.

use chrono::{DateTime, Utc};
use medipredict_core::{AccountStore, AppConfig, ClinicDirectory, SessionManager};
use medipredict_ml::{Dataset, DiseaseEnsemble, EnsembleSettings, HabitAdvisor, MlError};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::WebError;
use crate::templates::Templates;

/// Shared reference handed to every handler.
pub type SharedState = Arc<AppState>;

/// Everything a request handler may touch. Models are immutable after
/// construction; only the session table is mutated.
#[derive(Debug)]
pub struct AppState {
    pub config: AppConfig,
    pub ensemble: Arc<DiseaseEnsemble>,
    /// Checkbox captions, one per ensemble feature.
    pub symptom_labels: Vec<String>,
    /// `None` until `medipredict train` has produced artifacts.
    pub advisor: Option<Arc<HabitAdvisor>>,
    pub accounts: Arc<AccountStore>,
    pub clinics: ClinicDirectory,
    pub sessions: Mutex<SessionManager>,
    pub templates: Templates,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Assemble state from already constructed parts.
    pub fn new(
        config: AppConfig,
        ensemble: DiseaseEnsemble,
        symptom_labels: Vec<String>,
        advisor: Option<HabitAdvisor>,
        accounts: AccountStore,
        clinics: ClinicDirectory,
    ) -> Result<Self, WebError> {
        let expected = medipredict_ml::encoder::SYMPTOM_FIELDS.len();
        if ensemble.n_features() != expected {
            return Err(WebError::Startup(format!(
                "disease models use {} features but the symptom form has {expected}",
                ensemble.n_features()
            )));
        }
        Ok(Self {
            config,
            ensemble: Arc::new(ensemble),
            symptom_labels,
            advisor: advisor.map(Arc::new),
            accounts: Arc::new(accounts),
            clinics,
            sessions: Mutex::new(SessionManager::new()),
            templates: Templates::new()?,
            started_at: Utc::now(),
        })
    }

    /// Train the disease ensemble, load the habit model, open the account
    /// database and read the clinic directory, as configured.
    pub fn from_config(config: AppConfig) -> Result<Self, WebError> {
        let train = Dataset::from_csv_positional(&config.data.disease_train)?;
        let ensemble = DiseaseEnsemble::train(&train, &EnsembleSettings::from(&config.models))?;

        if let Some(test_path) = &config.data.disease_test {
            if test_path.exists() {
                let test = Dataset::from_csv_positional(test_path)?;
                let eval = ensemble.evaluate(&test)?;
                for member in &eval.members {
                    info!(member = %member.member, accuracy = member.accuracy, "Held-out member accuracy");
                }
                info!(
                    samples = eval.ensemble.samples,
                    accuracy = eval.ensemble.accuracy,
                    "Held-out ensemble accuracy"
                );
            } else {
                warn!(path = %test_path.display(), "Held-out disease set not found, skipping evaluation");
            }
        }

        let advisor = match HabitAdvisor::from_artifacts(&config.models.artifact_dir) {
            Ok(advisor) => {
                info!(dir = %config.models.artifact_dir.display(), "Habit model loaded");
                Some(advisor)
            }
            Err(MlError::ArtifactMissing(path)) => {
                warn!(
                    missing = %path.display(),
                    "Habit model not trained; the quiz is unavailable until `medipredict train` is run"
                );
                None
            }
            Err(e) => return Err(e.into()),
        };

        let accounts = AccountStore::open(
            &config.accounts.database_path,
            config.security.password_iterations,
        )?;

        let clinics = match &config.data.clinics_file {
            Some(path) => ClinicDirectory::load(path)?,
            None => ClinicDirectory::builtin()?,
        };

        let symptom_labels = train.feature_names.iter().map(|n| humanize(n)).collect();
        Self::new(config, ensemble, symptom_labels, advisor, accounts, clinics)
    }
}

/// `skin_rash` → `Skin rash`.
pub(crate) fn humanize(column: &str) -> String {
    let spaced = column.replace('_', " ");
    let mut chars = spaced.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
