use serde::{Deserialize, Serialize};

use crate::constants::defaults;

/// Permission audit log - records every gate decision as JSON lines.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AuditConfig {
    /// Enable the audit log
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Directory for audit logs (created if not exists)
    /// Defaults to ~/.apimate/audit
    #[serde(default = "default_directory")]
    pub directory: String,

    /// Record callbacks whose token no longer matches a pending request
    #[serde(default = "default_log_stale_callbacks")]
    pub log_stale_callbacks: bool,
}

fn default_enabled() -> bool {
    false
}

fn default_directory() -> String {
    defaults::AUDIT_DIRECTORY.to_string()
}

fn default_log_stale_callbacks() -> bool {
    true
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            directory: default_directory(),
            log_stale_callbacks: default_log_stale_callbacks(),
        }
    }
}
