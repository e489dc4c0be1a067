use serde::{Deserialize, Serialize};

use crate::constants::{defaults, keys};

/// One row of the declarative configuration list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EntryConfig {
    /// Settings key, unique across the list
    pub key: String,

    /// Label shown next to the entry
    pub label: String,
}

impl EntryConfig {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
        }
    }
}

/// The entries shipped with apimate, in display order.
pub fn default_entries() -> Vec<EntryConfig> {
    vec![
        EntryConfig::new(keys::PREPARE, "Prepare DAT directory"),
        EntryConfig::new(keys::OPEN_DEFAULT, "Open by default"),
        EntryConfig::new(keys::SHOW_LOG, "Show log"),
        EntryConfig::new(keys::VERSION, "Version"),
        EntryConfig::new(keys::ANDROID_DATA_DIR, "DAT directory"),
    ]
}

/// Predetermined values written by fixed-value actions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FixedValuesConfig {
    /// Value stored under `android_data_dir` once elevated access is granted
    #[serde(default = "default_dat_directory")]
    pub dat_directory: String,
}

fn default_dat_directory() -> String {
    defaults::DAT_DIRECTORY.to_string()
}

impl Default for FixedValuesConfig {
    fn default() -> Self {
        Self {
            dat_directory: default_dat_directory(),
        }
    }
}
