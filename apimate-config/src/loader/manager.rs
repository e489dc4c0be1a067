use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::constants::{CONFIG_FILE_NAME, CONFIG_PATH_ENV};
use crate::loader::config::ApimateConfig;
use crate::loader::layers::{ConfigLayerEntry, ConfigLayerSource, ConfigLayerStack};

/// Configuration manager for loading and validating configurations
#[derive(Debug, Clone)]
pub struct ConfigManager {
    pub(crate) config: ApimateConfig,
    config_path: Option<PathBuf>,
    pub(crate) layer_stack: ConfigLayerStack,
}

impl ConfigManager {
    /// Load configuration from the default locations: `APIMATE_CONFIG_PATH`
    /// when set, otherwise the user config plus `apimate.toml` in the current
    /// directory.
    pub fn load() -> Result<Self> {
        if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
            let trimmed = config_path.trim();
            if !trimmed.is_empty() {
                return Self::load_from_file(trimmed).with_context(|| {
                    format!("Failed to load configuration from {CONFIG_PATH_ENV}={trimmed}")
                });
            }
        }

        let cwd = std::env::current_dir().context("Failed to resolve current directory")?;
        Self::load_from_dir(cwd)
    }

    /// Load the user config (if present) and `apimate.toml` from `dir` (if
    /// present). Falls back to defaults when neither exists.
    pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir_config = dir.as_ref().join(CONFIG_FILE_NAME);
        let file = dir_config.exists().then_some(dir_config);
        Self::load_layers(user_config_path().as_deref(), file.as_deref())
    }

    /// Load configuration from a specific file, layered over the user config.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_layers(user_config_path().as_deref(), Some(path.as_ref()))
    }

    pub(crate) fn load_layers(user: Option<&Path>, file: Option<&Path>) -> Result<Self> {
        let mut layer_stack = ConfigLayerStack::default();

        if let Some(user) = user
            && user.exists()
        {
            match load_toml_from_file(user) {
                Ok(toml) => layer_stack.push(ConfigLayerEntry::new(
                    ConfigLayerSource::User {
                        file: user.to_path_buf(),
                    },
                    toml,
                )),
                Err(err) => tracing::warn!(
                    path = %user.display(),
                    error = %err,
                    "ignoring unreadable user configuration"
                ),
            }
        }

        if let Some(file) = file {
            let toml = load_toml_from_file(file)?;
            layer_stack.push(ConfigLayerEntry::new(
                ConfigLayerSource::File {
                    file: file.to_path_buf(),
                },
                toml,
            ));
        }

        if layer_stack.layers().is_empty() {
            let config = ApimateConfig::default();
            config
                .validate()
                .context("Default configuration failed validation")?;
            return Ok(Self {
                config,
                config_path: None,
                layer_stack,
            });
        }

        let config = Self::evaluate(&layer_stack)?;
        let config_path = layer_stack.top_file().cloned();
        tracing::debug!(
            layers = layer_stack.layers().len(),
            path = ?config_path,
            "configuration loaded"
        );

        Ok(Self {
            config,
            config_path,
            layer_stack,
        })
    }

    pub(crate) fn evaluate(layer_stack: &ConfigLayerStack) -> Result<ApimateConfig> {
        let config: ApimateConfig = layer_stack
            .effective_config()
            .try_into()
            .context("Failed to deserialize effective configuration")?;
        config
            .validate()
            .context("Configuration failed validation")?;
        Ok(config)
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &ApimateConfig {
        &self.config
    }

    /// Get the configuration file path (if loaded from file)
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Directory scripts run in when `scripts.working_dir` is unset.
    pub fn base_dir(&self) -> Option<&Path> {
        self.config_path.as_deref().and_then(Path::parent)
    }

    pub fn layer_stack(&self) -> &ConfigLayerStack {
        &self.layer_stack
    }

    /// Persist configuration to a specific path
    pub fn save_config_to_path(path: impl AsRef<Path>, config: &ApimateConfig) -> Result<()> {
        let path = path.as_ref();
        let content =
            toml::to_string_pretty(config).context("Failed to serialize configuration")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }
}

fn load_toml_from_file(path: &Path) -> Result<toml::Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

fn user_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".apimate").join(CONFIG_FILE_NAME))
}
