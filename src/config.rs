use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cli::{Cli, Provider};

pub const APP_NAME: &str = "chatterm";
pub const DEFAULT_HISTORY_CAPACITY: usize = 10_000;
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
pub const MARKER_FILE_NAME: &str = "AGENTS.md";

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub profile: String,
    pub config_path: PathBuf,
    pub provider: Provider,
    pub model: Option<String>,
    pub ollama_host: String,
    pub history_enabled: bool,
    pub history_dir: PathBuf,
    pub legacy_history_path: PathBuf,
    pub history_capacity: usize,
    pub request_timeout_secs: u64,
    pub models_timeout_secs: u64,
    pub analysis_timeout_secs: u64,
    pub interrupt_window_ms: u64,
    pub marker_path: PathBuf,
    pub telemetry_enabled: bool,
    pub telemetry_path: PathBuf,
    pub log_filter: String,
    pub log_path: PathBuf,
}

impl RuntimeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn models_timeout(&self) -> Duration {
        Duration::from_secs(self.models_timeout_secs)
    }

    pub fn analysis_timeout(&self) -> Duration {
        Duration::from_secs(self.analysis_timeout_secs)
    }

    pub fn interrupt_window(&self) -> Duration {
        Duration::from_millis(self.interrupt_window_ms)
    }

    pub fn history_path(&self) -> PathBuf {
        self.history_dir.join("history")
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfilesFile {
    #[serde(default)]
    pub profiles: HashMap<String, ProfileConfig>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    pub provider: Option<Provider>,
    pub model: Option<String>,
    pub ollama_host: Option<String>,
    pub history_enabled: Option<bool>,
    pub history_capacity: Option<usize>,
    pub request_timeout_secs: Option<u64>,
    pub analysis_timeout_secs: Option<u64>,
    pub interrupt_window_ms: Option<u64>,
    pub marker_path: Option<String>,
    pub telemetry_enabled: Option<bool>,
    pub telemetry_path: Option<String>,
}

/// `$HOME/.chatterm`, or a relative `.chatterm` when HOME is unset.
pub fn default_app_dir() -> PathBuf {
    match std::env::var("HOME") {
        Ok(home) if !home.trim().is_empty() => PathBuf::from(home).join(format!(".{APP_NAME}")),
        _ => PathBuf::from(format!(".{APP_NAME}")),
    }
}

pub fn default_legacy_history_path() -> PathBuf {
    match std::env::var("HOME") {
        Ok(home) if !home.trim().is_empty() => {
            PathBuf::from(home).join(format!(".{APP_NAME}_history"))
        }
        _ => PathBuf::from(format!(".{APP_NAME}_history")),
    }
}

pub fn config_path_for(cli: &Cli, app_dir: &Path) -> PathBuf {
    cli.config_path
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(|| app_dir.join("config.toml"))
}

pub fn load_profiles(path: &Path) -> Result<ProfilesFile> {
    if !path.exists() {
        return Ok(ProfilesFile::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read profile config file at '{}'", path.display()))?;
    toml::from_str::<ProfilesFile>(&content).with_context(|| {
        format!(
            "invalid profile configuration in '{}'. Check provider values and field names.",
            path.display()
        )
    })
}

pub fn resolve_runtime_config(
    cli: &Cli,
    profiles: &ProfilesFile,
    app_dir: &Path,
) -> Result<RuntimeConfig> {
    let selected = cli.profile.trim();
    if selected.is_empty() {
        return Err(anyhow::anyhow!(
            "profile name cannot be empty. Set --profile <name>."
        ));
    }

    let config_path = config_path_for(cli, app_dir);

    let profile = if selected == "default" && !profiles.profiles.contains_key("default") {
        ProfileConfig::default()
    } else {
        profiles.profiles.get(selected).cloned().ok_or_else(|| {
            let mut names = profiles.profiles.keys().cloned().collect::<Vec<String>>();
            names.sort();
            if names.is_empty() {
                anyhow::anyhow!(
                    "profile '{}' not found in '{}'. No profiles are defined yet.",
                    selected,
                    config_path.display()
                )
            } else {
                anyhow::anyhow!(
                    "profile '{}' not found in '{}'. Available profiles: {}",
                    selected,
                    config_path.display(),
                    names.join(", ")
                )
            }
        })?
    };

    let provider = if cli.provider != Provider::Auto {
        cli.provider
    } else {
        profile.provider.unwrap_or(Provider::Auto)
    };

    let history_dir = cli
        .history_dir
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(|| app_dir.to_path_buf());

    Ok(RuntimeConfig {
        profile: selected.to_string(),
        config_path,
        provider,
        model: cli
            .model
            .clone()
            .or(profile.model)
            .map(|model| model.trim().to_string())
            .filter(|model| !model.is_empty()),
        ollama_host: cli
            .ollama_host
            .clone()
            .or(profile.ollama_host)
            .unwrap_or_else(|| DEFAULT_OLLAMA_HOST.to_string())
            .trim_end_matches('/')
            .to_string(),
        history_enabled: !cli.no_history && profile.history_enabled.unwrap_or(true),
        history_dir,
        legacy_history_path: default_legacy_history_path(),
        history_capacity: cli
            .history_capacity
            .or(profile.history_capacity)
            .unwrap_or(DEFAULT_HISTORY_CAPACITY)
            .max(1),
        request_timeout_secs: cli
            .request_timeout_secs
            .or(profile.request_timeout_secs)
            .unwrap_or(120)
            .max(1),
        models_timeout_secs: 10,
        analysis_timeout_secs: cli
            .analysis_timeout_secs
            .or(profile.analysis_timeout_secs)
            .unwrap_or(300)
            .max(1),
        interrupt_window_ms: cli
            .interrupt_window_ms
            .or(profile.interrupt_window_ms)
            .unwrap_or(500)
            .max(50),
        marker_path: profile
            .marker_path
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(MARKER_FILE_NAME)),
        telemetry_enabled: cli
            .telemetry_enabled
            .or(profile.telemetry_enabled)
            .unwrap_or(false),
        telemetry_path: cli
            .telemetry_path
            .clone()
            .or(profile.telemetry_path)
            .map(PathBuf::from)
            .unwrap_or_else(|| app_dir.join("telemetry").join("events.jsonl")),
        log_filter: cli.log_filter.trim().to_string(),
        log_path: app_dir.join(format!("{APP_NAME}.log")),
    })
}
