//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use medipredict_core::AppConfig;
use medipredict_core::config::WORKSPACE_CONFIG_FILE;
use medipredict_ml::TrainingSettings;
use medipredict_web::AppState;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    config_file: Option<&Path>,
) -> anyhow::Result<()> {
    match command {
        Commands::Serve {
            host,
            port,
            require_login,
        } => {
            let config = serve_config(workspace, config_file, host, port, require_login)?;
            handle_serve(config).await
        }
        Commands::Train {
            dataset,
            output_dir,
            seed,
            n_estimators,
        } => {
            let mut config = effective_config(workspace, config_file)?;
            if let Some(dataset) = dataset {
                config.data.habits_dataset = absolute(workspace, dataset);
            }
            if let Some(dir) = output_dir {
                config.models.artifact_dir = absolute(workspace, dir);
            }
            if let Some(seed) = seed {
                config.models.seed = seed;
            }
            if let Some(n) = n_estimators {
                config.models.n_estimators = n;
            }
            handle_train(config).await
        }
        Commands::Config { action } => handle_config(action, workspace, config_file),
    }
}

/// Effective configuration for `serve`: flags replace only the keys they name.
fn serve_config(
    workspace: &Path,
    config_file: Option<&Path>,
    host: Option<String>,
    port: Option<u16>,
    require_login: bool,
) -> anyhow::Result<AppConfig> {
    let mut config = effective_config(workspace, config_file)?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if require_login {
        config.accounts.require_login = true;
    }
    Ok(config)
}

/// Layered configuration with every relative path rebased onto `workspace`.
fn effective_config(workspace: &Path, config_file: Option<&Path>) -> anyhow::Result<AppConfig> {
    let mut config = medipredict_core::load_config(Some(workspace), config_file)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    config.resolve_paths(workspace);
    Ok(config)
}

fn absolute(workspace: &Path, path: PathBuf) -> PathBuf {
    if path.is_relative() {
        workspace.join(path)
    } else {
        path
    }
}

async fn handle_serve(config: AppConfig) -> anyhow::Result<()> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    // Training the disease ensemble is CPU-bound.
    let state = tokio::task::spawn_blocking(move || AppState::from_config(config)).await??;
    medipredict_web::run(Arc::new(state)).await?;
    Ok(())
}

async fn handle_train(config: AppConfig) -> anyhow::Result<()> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    let settings = TrainingSettings::from(&config.models);
    let dataset = config.data.habits_dataset.clone();
    let output = config.models.artifact_dir.clone();
    info!(dataset = %dataset.display(), output = %output.display(), "Training habit model");

    let report = tokio::task::spawn_blocking(move || {
        medipredict_ml::run_training(&dataset, &output, &settings)
    })
    .await??;

    println!(
        "Trained on {} rows ({} train / {} test), {} classes.",
        report.dataset_rows,
        report.train_rows,
        report.test_rows,
        report.classes.len()
    );
    println!(
        "Held-out accuracy: {:.2}%  macro F1: {:.3}",
        report.holdout.accuracy * 100.0,
        report.holdout.f1_score
    );
    println!(
        "Artifacts written to: {}",
        config.models.artifact_dir.display()
    );
    Ok(())
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    config_file: Option<&Path>,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = workspace.join(WORKSPACE_CONFIG_FILE);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }
            let toml_str = AppConfig::default().to_toml_string()?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = medipredict_core::load_config(Some(workspace), config_file)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            println!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}
