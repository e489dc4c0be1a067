//! The declarative configuration list a hosting surface displays.
//!
//! An entry's summary is always derived from its persisted value at read
//! time, so it cannot drift from what the settings repository holds.

use std::fmt;
use std::sync::Arc;

use apimate_config::constants::{APP_NAME, keys};
use apimate_config::{ApimateConfig, SettingsRepository};

use crate::action::ConfigurationAction;
use crate::error::SurfaceError;

/// Where an entry's summary line comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummarySource {
    /// No summary line.
    None,
    /// The value stored under the entry key, or the not-set placeholder.
    Persisted,
    /// Fixed text, for display-only entries.
    Static(String),
}

pub struct ConfigurationEntry {
    key: String,
    label: String,
    source: SummarySource,
    action: Option<Arc<dyn ConfigurationAction>>,
    enabled: bool,
}

impl ConfigurationEntry {
    pub fn new(key: impl Into<String>, label: impl Into<String>, source: SummarySource) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            source,
            action: None,
            enabled: true,
        }
    }

    pub fn persisted(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(key, label, SummarySource::Persisted)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn source(&self) -> &SummarySource {
        &self.source
    }

    pub fn action(&self) -> Option<&Arc<dyn ConfigurationAction>> {
        self.action.as_ref()
    }

    pub fn is_bound(&self) -> bool {
        self.action.is_some()
    }

    /// Disabled entries are shown but cannot be triggered.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl fmt::Debug for ConfigurationEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationEntry")
            .field("key", &self.key)
            .field("label", &self.label)
            .field("source", &self.source)
            .field("bound", &self.is_bound())
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Snapshot of one row as it should be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRow {
    pub key: String,
    pub label: String,
    pub summary: Option<String>,
    pub bound: bool,
    pub enabled: bool,
}

pub struct EntryList {
    entries: Vec<ConfigurationEntry>,
    settings: Arc<dyn SettingsRepository>,
    not_set: String,
}

impl EntryList {
    pub fn new(settings: Arc<dyn SettingsRepository>, not_set: impl Into<String>) -> Self {
        Self {
            entries: Vec::new(),
            settings,
            not_set: not_set.into(),
        }
    }

    /// Build the list described by `config.entries`, with nothing bound.
    pub fn from_config(
        config: &ApimateConfig,
        settings: Arc<dyn SettingsRepository>,
    ) -> Result<Self, SurfaceError> {
        let mut list = Self::new(settings, config.settings.not_set_summary.clone());
        for entry in &config.entries {
            let source = match entry.key.as_str() {
                keys::VERSION => SummarySource::Static(version_summary()),
                keys::PREPARE | keys::OPEN_DEFAULT | keys::SHOW_LOG => SummarySource::None,
                _ => SummarySource::Persisted,
            };
            list.push(ConfigurationEntry::new(&entry.key, &entry.label, source))?;
        }
        Ok(list)
    }

    pub fn push(&mut self, entry: ConfigurationEntry) -> Result<(), SurfaceError> {
        if self.get(entry.key()).is_some() {
            return Err(SurfaceError::DuplicateEntry(entry.key));
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Attach the action run when `key` is triggered, replacing any previous
    /// binding.
    pub fn bind(
        &mut self,
        key: &str,
        action: Arc<dyn ConfigurationAction>,
    ) -> Result<(), SurfaceError> {
        self.get_mut(key)?.action = Some(action);
        Ok(())
    }

    /// Keep `key` on screen but refuse to trigger it.
    pub fn disable(&mut self, key: &str) -> Result<(), SurfaceError> {
        self.get_mut(key)?.enabled = false;
        Ok(())
    }

    /// Replace where the summary line of `key` comes from.
    pub fn set_source(&mut self, key: &str, source: SummarySource) -> Result<(), SurfaceError> {
        self.get_mut(key)?.source = source;
        Ok(())
    }

    fn get_mut(&mut self, key: &str) -> Result<&mut ConfigurationEntry, SurfaceError> {
        self.entries
            .iter_mut()
            .find(|entry| entry.key == key)
            .ok_or_else(|| SurfaceError::UnknownEntry(key.to_string()))
    }

    pub fn get(&self, key: &str) -> Option<&ConfigurationEntry> {
        self.entries.iter().find(|entry| entry.key == key)
    }

    pub fn action_for(&self, key: &str) -> Result<Arc<dyn ConfigurationAction>, SurfaceError> {
        let entry = self
            .get(key)
            .ok_or_else(|| SurfaceError::UnknownEntry(key.to_string()))?;
        if !entry.enabled {
            return Err(SurfaceError::Disabled(key.to_string()));
        }
        entry
            .action
            .clone()
            .ok_or_else(|| SurfaceError::NotBound(key.to_string()))
    }

    /// Persisted value for a [`SummarySource::Persisted`] entry.
    pub fn current_value(&self, key: &str) -> Option<String> {
        match self.get(key)?.source {
            SummarySource::Persisted => self.settings.get(key),
            SummarySource::None | SummarySource::Static(_) => None,
        }
    }

    pub fn summary(&self, key: &str) -> Option<String> {
        let entry = self.get(key)?;
        match &entry.source {
            SummarySource::None => None,
            SummarySource::Static(text) => Some(text.clone()),
            SummarySource::Persisted => Some(
                self.settings
                    .get(key)
                    .unwrap_or_else(|| self.not_set.clone()),
            ),
        }
    }

    pub fn rows(&self) -> Vec<EntryRow> {
        self.entries
            .iter()
            .map(|entry| EntryRow {
                key: entry.key.clone(),
                label: entry.label.clone(),
                summary: self.summary(&entry.key),
                bound: entry.is_bound(),
                enabled: entry.enabled,
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigurationEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn version_summary() -> String {
    format!("{APP_NAME} {}", env!("CARGO_PKG_VERSION"))
}
