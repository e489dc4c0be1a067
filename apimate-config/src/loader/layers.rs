use crate::loader::merge_toml_values;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use toml::Value as TomlValue;

/// Source of a configuration layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigLayerSource {
    /// User-wide configuration (e.g. ~/.apimate/apimate.toml)
    User { file: PathBuf },
    /// Configuration file handed to the loader explicitly
    File { file: PathBuf },
    /// Overrides supplied by the host at runtime
    Runtime,
}

/// A single layer of configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigLayerEntry {
    pub source: ConfigLayerSource,
    pub config: TomlValue,
}

impl ConfigLayerEntry {
    pub fn new(source: ConfigLayerSource, config: TomlValue) -> Self {
        Self { source, config }
    }
}

/// Configuration layers, ordered from lowest to highest precedence.
#[derive(Debug, Clone, Default)]
pub struct ConfigLayerStack {
    layers: Vec<ConfigLayerEntry>,
}

impl ConfigLayerStack {
    pub fn push(&mut self, layer: ConfigLayerEntry) {
        self.layers.push(layer);
    }

    /// Merge all layers into a single effective configuration.
    pub fn effective_config(&self) -> TomlValue {
        let mut merged = TomlValue::Table(toml::Table::new());
        for layer in &self.layers {
            merge_toml_values(&mut merged, &layer.config);
        }
        merged
    }

    pub fn layers(&self) -> &[ConfigLayerEntry] {
        &self.layers
    }

    /// File backing the highest-precedence file layer, if any.
    pub fn top_file(&self) -> Option<&PathBuf> {
        self.layers.iter().rev().find_map(|layer| match &layer.source {
            ConfigLayerSource::User { file } | ConfigLayerSource::File { file } => Some(file),
            ConfigLayerSource::Runtime => None,
        })
    }
}
