use std::path::PathBuf;

use anyhow::Result;

use crate::loader::layers::{ConfigLayerEntry, ConfigLayerSource};
use crate::loader::manager::ConfigManager;

/// Builder for creating a [`ConfigManager`] with custom overrides.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    user_config: Option<PathBuf>,
    config_file: Option<PathBuf>,
    runtime_overrides: Vec<(String, toml::Value)>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use this file as the user-wide layer instead of `~/.apimate/apimate.toml`.
    pub fn user_config(mut self, path: PathBuf) -> Self {
        self.user_config = Some(path);
        self
    }

    pub fn config_file(mut self, path: PathBuf) -> Self {
        self.config_file = Some(path);
        self
    }

    /// Add a runtime override (e.g. "gate.inbox_capacity", 8).
    pub fn runtime_override(mut self, key: impl Into<String>, value: toml::Value) -> Self {
        self.runtime_overrides.push((key.into(), value));
        self
    }

    /// Add overrides from string pairs. Values are parsed as TOML and fall
    /// back to plain strings.
    pub fn runtime_overrides(mut self, overrides: &[(String, String)]) -> Self {
        for (key, value) in overrides {
            let toml_value = value
                .parse::<toml::Value>()
                .unwrap_or_else(|_| toml::Value::String(value.clone()));
            self.runtime_overrides.push((key.clone(), toml_value));
        }
        self
    }

    pub fn build(self) -> Result<ConfigManager> {
        let mut manager = ConfigManager::load_layers(
            self.user_config.as_deref(),
            self.config_file.as_deref(),
        )?;

        if !self.runtime_overrides.is_empty() {
            let mut runtime_toml = toml::Table::new();
            for (key, value) in self.runtime_overrides {
                insert_dotted_key(&mut runtime_toml, &key, value);
            }

            manager.layer_stack.push(ConfigLayerEntry::new(
                ConfigLayerSource::Runtime,
                toml::Value::Table(runtime_toml),
            ));
            manager.config = ConfigManager::evaluate(&manager.layer_stack)?;
        }

        Ok(manager)
    }
}

fn insert_dotted_key(table: &mut toml::Table, key: &str, value: toml::Value) {
    let mut current = table;
    let mut parts = key.split('.').peekable();
    while let Some(part) = parts.next() {
        if parts.peek().is_none() {
            current.insert(part.to_string(), value);
            return;
        }

        let slot = current
            .entry(part.to_string())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        if !slot.is_table() {
            *slot = toml::Value::Table(toml::Table::new());
        }
        current = match slot.as_table_mut() {
            Some(table) => table,
            None => return,
        };
    }
}
