use serde::{Deserialize, Serialize};

use crate::constants::defaults;

/// Permission gate settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GateConfig {
    /// Capacity of the per-surface decision inbox. It also caps how many
    /// authorization requests a surface keeps outstanding, so every parked
    /// request always has room for its decision.
    #[serde(default = "default_inbox_capacity")]
    pub inbox_capacity: usize,
}

fn default_inbox_capacity() -> usize {
    defaults::INBOX_CAPACITY
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            inbox_capacity: default_inbox_capacity(),
        }
    }
}
