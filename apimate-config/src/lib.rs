//! Configuration model for apimate.
//!
//! Everything the gate, the notification layer and the configuration
//! actions read at startup lives in `apimate.toml`; defaults are anchored in
//! [`constants`]. The [`settings`] module provides the key/value persistence
//! primitive that configuration actions write through.

pub mod constants;
pub mod core;
pub mod loader;
pub mod settings;

pub use crate::core::{
    AuditConfig, EntryConfig, FixedValuesConfig, GateConfig, NotificationsConfig, ScriptsConfig,
    SettingsConfig,
};
pub use loader::{
    ApimateConfig, ConfigBuilder, ConfigManager, expand_home, layers::ConfigLayerSource,
    merge_toml_values,
};
pub use settings::{FileSettings, MemorySettings, SettingsError, SettingsRepository};
