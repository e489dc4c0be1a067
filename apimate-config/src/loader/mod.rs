pub mod layers;

mod builder;
mod config;
mod manager;
mod merge;

#[cfg(test)]
mod tests;

pub use builder::ConfigBuilder;
pub use config::{ApimateConfig, expand_home};
pub use manager::ConfigManager;
pub use merge::merge_toml_values;
