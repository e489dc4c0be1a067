use std::sync::Arc;

use apimate_config::constants::keys;
use apimate_config::{ApimateConfig, SettingsRepository};
use tracing::info;

use crate::action::{ConfigurationAction, EffectSummary, Privilege};
use crate::error::ActionError;

/// Writes a predetermined value under one settings key.
///
/// The value is stored as given; it is not checked for existence or
/// reachability.
pub struct FixedValueAction {
    label: String,
    key: String,
    value: String,
    settings: Arc<dyn SettingsRepository>,
}

impl FixedValueAction {
    pub fn new(
        label: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
        settings: Arc<dyn SettingsRepository>,
    ) -> Self {
        Self {
            label: label.into(),
            key: key.into(),
            value: value.into(),
            settings,
        }
    }

    /// The DAT directory action described by `config`.
    pub fn dat_directory(config: &ApimateConfig, settings: Arc<dyn SettingsRepository>) -> Self {
        let label = config
            .entry(keys::ANDROID_DATA_DIR)
            .map_or("DAT directory", |entry| entry.label.as_str());
        Self::new(
            label,
            keys::ANDROID_DATA_DIR,
            &config.fixed_values.dat_directory,
            settings,
        )
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl ConfigurationAction for FixedValueAction {
    fn name(&self) -> &str {
        &self.label
    }

    fn privilege(&self) -> Privilege {
        Privilege::Elevated
    }

    fn execute(&self) -> Result<EffectSummary, ActionError> {
        self.settings
            .set(&self.key, &self.value)
            .map_err(|source| ActionError::Settings {
                key: self.key.clone(),
                source,
            })?;
        info!(key = %self.key, value = %self.value, "fixed value stored");

        Ok(EffectSummary::new(format!("{} set:\n{}", self.label, self.value))
            .with_value(&self.value))
    }
}
