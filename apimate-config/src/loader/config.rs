use anyhow::{Result, bail};
use hashbrown::HashSet;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::core::entries::default_entries;
use crate::core::{
    AuditConfig, EntryConfig, FixedValuesConfig, GateConfig, NotificationsConfig, ScriptsConfig,
    SettingsConfig,
};

/// Main configuration structure for apimate
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ApimateConfig {
    /// Permission gate settings
    #[serde(default)]
    pub gate: GateConfig,

    /// Transient notification settings
    #[serde(default)]
    pub notifications: NotificationsConfig,

    /// Permission audit log
    #[serde(default)]
    pub audit: AuditConfig,

    /// Persisted settings location
    #[serde(default)]
    pub settings: SettingsConfig,

    /// Scripts backing the prepare-resource action
    #[serde(default)]
    pub scripts: ScriptsConfig,

    /// Predetermined values written by fixed-value actions
    #[serde(default)]
    pub fixed_values: FixedValuesConfig,

    /// Declarative configuration list, in display order
    #[serde(default = "default_entries")]
    pub entries: Vec<EntryConfig>,
}

impl Default for ApimateConfig {
    fn default() -> Self {
        Self {
            gate: GateConfig::default(),
            notifications: NotificationsConfig::default(),
            audit: AuditConfig::default(),
            settings: SettingsConfig::default(),
            scripts: ScriptsConfig::default(),
            fixed_values: FixedValuesConfig::default(),
            entries: default_entries(),
        }
    }
}

impl ApimateConfig {
    /// Parse a configuration from TOML text, applying defaults for anything
    /// left out.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.gate.inbox_capacity == 0 {
            bail!("gate.inbox_capacity must be greater than zero");
        }

        let mut seen = HashSet::with_capacity(self.entries.len());
        for entry in &self.entries {
            if entry.key.trim().is_empty() {
                bail!("configuration entry `{}` has an empty key", entry.label);
            }
            if !seen.insert(entry.key.as_str()) {
                bail!("duplicate configuration entry key `{}`", entry.key);
            }
        }

        if self.audit.enabled && self.audit.directory.trim().is_empty() {
            bail!("audit.directory must be set when audit.enabled is true");
        }

        Ok(())
    }

    pub fn entry(&self, key: &str) -> Option<&EntryConfig> {
        self.entries.iter().find(|entry| entry.key == key)
    }

    pub fn settings_path(&self) -> PathBuf {
        expand_home(&self.settings.path)
    }

    pub fn audit_directory(&self) -> PathBuf {
        expand_home(&self.audit.directory)
    }
}

/// Expand a leading `~` to the user's home directory. Paths without one, or
/// hosts without a home directory, are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    if path == "~"
        && let Some(home) = dirs::home_dir()
    {
        return home;
    }
    PathBuf::from(path)
}
