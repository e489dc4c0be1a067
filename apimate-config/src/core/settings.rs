use serde::{Deserialize, Serialize};

use crate::constants::defaults;

/// Where persisted key/value settings live
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SettingsConfig {
    /// Path of the TOML settings file. `~` expands to the home directory.
    #[serde(default = "default_path")]
    pub path: String,

    /// Summary shown for entries without a persisted value
    #[serde(default = "default_not_set_summary")]
    pub not_set_summary: String,
}

fn default_path() -> String {
    defaults::SETTINGS_FILE.to_string()
}

fn default_not_set_summary() -> String {
    defaults::NOT_SET_SUMMARY.to_string()
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            not_set_summary: default_not_set_summary(),
        }
    }
}
