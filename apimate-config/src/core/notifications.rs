use serde::{Deserialize, Serialize};

/// Transient notification settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NotificationsConfig {
    /// Enable/disable all notifications (overrides other settings)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Show success notifications after an action completes
    #[serde(default = "default_true")]
    pub success_notifications: bool,

    /// Show failure notifications (denied, broker unavailable, action errors)
    #[serde(default = "default_true")]
    pub failure_notifications: bool,

    /// Mirror every delivered notification into the tracing log
    #[serde(default = "default_true")]
    pub log_notifications: bool,
}

fn default_true() -> bool {
    true
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            success_notifications: true,
            failure_notifications: true,
            log_notifications: true,
        }
    }
}
