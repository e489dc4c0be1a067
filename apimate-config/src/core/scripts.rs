use serde::{Deserialize, Serialize};

/// Scripts backing the prepare-resource action
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
pub struct ScriptsConfig {
    /// Script run once when the prepare entry is bound, to inspect the
    /// current state. Skipped when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe: Option<String>,

    /// Script run when the prepare entry is triggered. The entry is left
    /// unbound when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prepare: Option<String>,

    /// Working directory for both scripts. Defaults to the directory holding
    /// the configuration file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,

    /// Restrict scripts to these directory roots. Empty means unrestricted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_roots: Vec<String>,
}
