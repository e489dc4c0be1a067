//! Transient user-facing notifications.
//! Every terminal gate state produces one [`NotificationEvent`]; the
//! [`NotificationManager`] filters it against [`NotificationsConfig`] and
//! forwards the formatted message to whichever [`DisplaySurface`] is
//! attached. Messages raised while nothing is attached are dropped.

use std::sync::Arc;

use apimate_config::NotificationsConfig;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Events that produce a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationEvent {
    /// Action body finished; `message` is its effect summary
    ActionCompleted { action: String, message: String },
    /// Broker not running or unreachable
    BrokerUnavailable { action: String },
    /// User declined the authorization request
    AuthorizationDenied { action: String },
    /// Action body returned an error or panicked
    ActionFailed { action: String, error: String },
    /// Action could not be initialised when its entry was bound
    BindingFailed { action: String, error: String },
}

impl NotificationEvent {
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::ActionCompleted { .. })
    }

    pub fn action(&self) -> &str {
        match self {
            Self::ActionCompleted { action, .. }
            | Self::BrokerUnavailable { action }
            | Self::AuthorizationDenied { action }
            | Self::ActionFailed { action, .. }
            | Self::BindingFailed { action, .. } => action,
        }
    }

    /// Text shown to the user.
    pub fn message(&self) -> String {
        match self {
            Self::ActionCompleted { message, .. } => message.clone(),
            Self::BrokerUnavailable { .. } => "Authorization broker is not running".to_string(),
            Self::AuthorizationDenied { .. } => "Elevated access was denied".to_string(),
            Self::ActionFailed { action, error } => format!("{action} failed: {error}"),
            Self::BindingFailed { action, error } => {
                format!("Failed to initialise {action}: {error}")
            }
        }
    }
}

/// Gate-facing sink for notification events.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: NotificationEvent);
}

/// Where formatted messages end up, e.g. a snackbar or a status line.
pub trait DisplaySurface: Send + Sync {
    fn show(&self, message: &str);
}

pub struct NotificationManager {
    config: RwLock<NotificationsConfig>,
    display: RwLock<Option<Arc<dyn DisplaySurface>>>,
}

impl Default for NotificationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationManager {
    pub fn new() -> Self {
        Self::with_config(NotificationsConfig::default())
    }

    pub fn with_config(config: NotificationsConfig) -> Self {
        Self {
            config: RwLock::new(config),
            display: RwLock::new(None),
        }
    }

    pub fn update_config(&self, config: NotificationsConfig) {
        *self.config.write() = config;
    }

    pub fn attach_display(&self, display: Arc<dyn DisplaySurface>) {
        *self.display.write() = Some(display);
    }

    /// Returns whether a display was attached.
    pub fn detach_display(&self) -> bool {
        self.display.write().take().is_some()
    }

    pub fn has_display(&self) -> bool {
        self.display.read().is_some()
    }

    fn should_deliver(config: &NotificationsConfig, event: &NotificationEvent) -> bool {
        if !config.enabled {
            return false;
        }
        if event.is_failure() {
            config.failure_notifications
        } else {
            config.success_notifications
        }
    }
}

impl NotificationSink for NotificationManager {
    fn notify(&self, event: NotificationEvent) {
        let config = self.config.read().clone();
        if !Self::should_deliver(&config, &event) {
            debug!(action = event.action(), "notification suppressed by config");
            return;
        }

        let message = event.message();
        if config.log_notifications {
            info!(
                action = event.action(),
                failure = event.is_failure(),
                %message,
                "notification"
            );
        }

        let display = self.display.read().clone();
        match display {
            Some(display) => display.show(&message),
            None => debug!(action = event.action(), "no display attached, notification dropped"),
        }
    }
}

/// Records every event it receives.
#[derive(Debug, Default)]
pub struct MemoryNotificationSink {
    events: Mutex<Vec<NotificationEvent>>,
}

impl MemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events.lock().iter().map(NotificationEvent::message).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl NotificationSink for MemoryNotificationSink {
    fn notify(&self, event: NotificationEvent) {
        self.events.lock().push(event);
    }
}

/// Display that keeps every shown message.
#[derive(Debug, Default)]
pub struct MemoryDisplay {
    shown: Mutex<Vec<String>>,
}

impl MemoryDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shown(&self) -> Vec<String> {
        self.shown.lock().clone()
    }
}

impl DisplaySurface for MemoryDisplay {
    fn show(&self, message: &str) {
        self.shown.lock().push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn denied() -> NotificationEvent {
        NotificationEvent::AuthorizationDenied {
            action: "DAT directory".to_string(),
        }
    }

    #[test]
    fn messages_name_the_action() {
        let failed = NotificationEvent::ActionFailed {
            action: "Prepare DAT directory".to_string(),
            error: "prepare script exited with status 2".to_string(),
        };
        assert_eq!(
            failed.message(),
            "Prepare DAT directory failed: prepare script exited with status 2"
        );
        assert!(failed.is_failure());

        let done = NotificationEvent::ActionCompleted {
            action: "DAT directory".to_string(),
            message: "DAT directory set:\n/data".to_string(),
        };
        assert_eq!(done.message(), "DAT directory set:\n/data");
        assert!(!done.is_failure());
    }

    #[test]
    fn manager_drops_messages_without_display() {
        let manager = NotificationManager::new();
        manager.notify(denied());

        let display = Arc::new(MemoryDisplay::new());
        manager.attach_display(display.clone());
        manager.notify(denied());
        assert!(manager.detach_display());
        manager.notify(denied());

        assert_eq!(display.shown(), vec!["Elevated access was denied".to_string()]);
    }

    #[test]
    fn manager_honours_config() {
        let manager = NotificationManager::with_config(NotificationsConfig {
            success_notifications: false,
            ..NotificationsConfig::default()
        });
        let display = Arc::new(MemoryDisplay::new());
        manager.attach_display(display.clone());

        manager.notify(NotificationEvent::ActionCompleted {
            action: "Version".to_string(),
            message: "ok".to_string(),
        });
        manager.notify(denied());
        assert_eq!(display.shown().len(), 1);

        manager.update_config(NotificationsConfig {
            enabled: false,
            ..NotificationsConfig::default()
        });
        manager.notify(denied());
        assert_eq!(display.shown().len(), 1);
    }
}
