use anyhow::{Context, Result};
use dirs::{config_dir, data_dir};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "gradle-shell";
const CONFIG_FILE: &str = "config.json";
const HISTORY_FILE: &str = "history.txt";

/// Default engine program, looked up on `PATH`.
pub const DEFAULT_ENGINE: &str = "gradle-engine";

/// Overrides `engine`; split on whitespace into program and arguments.
pub const ENGINE_ENV: &str = "GRADLE_SHELL_ENGINE";
/// Overrides `installation`.
pub const INSTALLATION_ENV: &str = "GRADLE_SHELL_INSTALLATION";

/// Whether to ask the engine for coloured output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    /// Colour when stdout is a terminal.
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    pub fn enabled(self, is_terminal: bool) -> bool {
        match self {
            Self::Auto => is_terminal,
            Self::Always => true,
            Self::Never => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Engine program followed by its arguments.
    pub engine: Vec<String>,
    /// Build tool installation for the engine to use instead of its default.
    pub installation: Option<PathBuf>,
    /// Runtime (JVM) arguments for every build.
    pub jvm_arguments: Vec<String>,
    pub color: ColorMode,
    /// Persist line history across sessions.
    pub history: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            engine: vec![DEFAULT_ENGINE.to_string()],
            installation: None,
            jvm_arguments: Vec::new(),
            color: ColorMode::Auto,
            history: true,
        }
    }
}

impl ShellConfig {
    /// Load configuration from the user's config directory, then apply
    /// environment overrides.
    /// Falls back to defaults if the file doesn't exist or fails to parse.
    pub fn load() -> Self {
        let mut config = match get_config_path().and_then(|path| Self::load_from(&path)) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config, using defaults: {:#}", e);
                Self::default()
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(config)
    }

    /// Apply `GRADLE_SHELL_*` overrides read through `var`.
    pub fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(engine) = var(ENGINE_ENV) {
            let engine: Vec<String> = engine.split_whitespace().map(str::to_string).collect();
            if !engine.is_empty() {
                self.engine = engine;
            }
        }
        if let Some(installation) = var(INSTALLATION_ENV).filter(|s| !s.is_empty()) {
            self.installation = Some(PathBuf::from(installation));
        }
    }

    /// Where line history is kept, if it is kept at all.
    pub fn history_path(&self) -> Option<PathBuf> {
        if !self.history {
            return None;
        }
        data_dir().map(|dir| dir.join(APP_NAME).join(HISTORY_FILE))
    }
}

fn get_config_path() -> Result<PathBuf> {
    let mut path =
        config_dir().ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    path.push(APP_NAME);
    path.push(CONFIG_FILE);
    Ok(path)
}
