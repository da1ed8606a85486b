//! Configuration system for MediPredict.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from `~/.config/medipredict/config.toml` and/or `medipredict.toml`
//! in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Name of the workspace-local configuration file.
pub const WORKSPACE_CONFIG_FILE: &str = "medipredict.toml";

/// Prefix for environment overrides (`MEDIPREDICT_SERVER__PORT=8080`).
pub const ENV_PREFIX: &str = "MEDIPREDICT_";

/// Top-level configuration for the MediPredict application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub accounts: AccountsConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

/// Locations of the static datasets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Disease training set; last column is the prognosis label.
    pub disease_train: PathBuf,
    /// Optional held-out disease set, evaluated at startup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disease_test: Option<PathBuf>,
    /// Lifestyle dataset used by `medipredict train`.
    pub habits_dataset: PathBuf,
    /// Clinic directory TOML; the built-in directory is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinics_file: Option<PathBuf>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            disease_train: PathBuf::from("data/train.csv"),
            disease_test: Some(PathBuf::from("data/test.csv")),
            habits_dataset: PathBuf::from("data/health_practices.csv"),
            clinics_file: None,
        }
    }
}

/// Model training and artifact settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Directory holding the persisted habit model and label codec.
    pub artifact_dir: PathBuf,
    /// Seed for data splits, bootstrap sampling and SGD shuffling.
    pub seed: u64,
    /// Fraction of the habit dataset held out during training.
    pub test_fraction: f64,
    /// Trees per random forest.
    pub n_estimators: usize,
    /// Maximum tree depth (unbounded when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
    /// Passes over the training set for the linear SVM.
    pub svm_epochs: usize,
    /// L2 regularisation strength for the linear SVM.
    pub svm_lambda: f64,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("models"),
            seed: 42,
            test_fraction: 0.2,
            n_estimators: 100,
            max_depth: None,
            svm_epochs: 200,
            svm_lambda: 0.01,
        }
    }
}

/// Account storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountsConfig {
    /// SQLite database file.
    pub database_path: PathBuf,
    /// Require a signed-in user for `/disease`, `/quiz` and `/clinic`.
    pub require_login: bool,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("medipredict.db"),
            require_login: false,
        }
    }
}

/// Password hashing and session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// PBKDF2 iteration count for new password hashes.
    pub password_iterations: u32,
    /// Idle session lifetime in seconds (0 = never expire).
    pub session_ttl_secs: u64,
    /// Name of the session cookie.
    pub cookie_name: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            password_iterations: 100_000,
            session_ttl_secs: 86_400,
            cookie_name: "medipredict_session".to_string(),
        }
    }
}

impl AppConfig {
    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(invalid("server.port must be non-zero"));
        }
        if !(self.models.test_fraction > 0.0 && self.models.test_fraction < 1.0) {
            return Err(invalid("models.test_fraction must be between 0 and 1"));
        }
        if self.models.n_estimators == 0 {
            return Err(invalid("models.n_estimators must be at least 1"));
        }
        if self.models.svm_epochs == 0 {
            return Err(invalid("models.svm_epochs must be at least 1"));
        }
        if self.models.svm_lambda <= 0.0 {
            return Err(invalid("models.svm_lambda must be positive"));
        }
        if self.security.password_iterations == 0 {
            return Err(invalid("security.password_iterations must be at least 1"));
        }
        if self.security.cookie_name.trim().is_empty() {
            return Err(invalid("security.cookie_name must not be empty"));
        }
        Ok(())
    }

    /// Rebase every relative path onto `workspace`.
    pub fn resolve_paths(&mut self, workspace: &Path) {
        let rebase = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = workspace.join(&*p);
            }
        };
        rebase(&mut self.data.disease_train);
        if let Some(p) = self.data.disease_test.as_mut() {
            rebase(p);
        }
        rebase(&mut self.data.habits_dataset);
        if let Some(p) = self.data.clinics_file.as_mut() {
            rebase(p);
        }
        rebase(&mut self.models.artifact_dir);
        rebase(&mut self.accounts.database_path);
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Invalid {
        message: message.to_string(),
    }
}

fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "medipredict", "medipredict")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `MEDIPREDICT_`)
/// 2. An explicit config file (`--config`), which must exist
/// 3. Workspace-local config (`medipredict.toml`)
/// 4. User config (`~/.config/medipredict/config.toml`)
/// 5. Built-in defaults
///
/// Command-line flags are applied by the binary on top of the result.
pub fn load_config(
    workspace: Option<&Path>,
    config_file: Option<&Path>,
) -> Result<AppConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(WORKSPACE_CONFIG_FILE);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(path) = config_file {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        figment = figment.merge(Toml::file(path));
    }

    // MEDIPREDICT_SERVER__PORT, MEDIPREDICT_ACCOUNTS__REQUIRE_LOGIN, ...
    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: AppConfig = figment.extract().map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })?;
    config.validate()?;
    Ok(config)
}
