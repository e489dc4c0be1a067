//! Assembles a [`HostingSurface`] from an [`ApimateConfig`].
//!
//! The builder binds the shipped actions to their entries: the fixed DAT
//! directory value to `android_data_dir` and, when a prepare script is
//! configured, the prepare action to `prepare`. A failing probe script is
//! reported once through the notification manager and does not stop the
//! surface from attaching.
//!
//! `show_log` reports the audit log when one is enabled. `open_default` runs
//! whatever the host supplies through [`ScreenBuilder::open_default`]. Either
//! entry is disabled when there is nothing for it to do.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use apimate_config::constants::keys;
use apimate_config::{ApimateConfig, ConfigManager, FileSettings, SettingsRepository, expand_home};
use apimate_core::{
    AuditTrail, AuthorizationClient, ConfigurationAction, EntryList, FixedValueAction, HostingSurface,
    NotificationEvent, NotificationManager, NotificationSink, PrepareResourceAction, ShowLogAction,
    SummarySource, SurfaceOptions,
};
use apimate_script_runner::{
    AllowAllPolicy, DirectoryGuardPolicy, ProcessScriptExecutor, ScriptExecutor, ScriptPolicy,
    ScriptRunner,
};
use tracing::{debug, warn};

pub struct ScreenBuilder {
    config: ApimateConfig,
    base_dir: PathBuf,
    client: Arc<dyn AuthorizationClient>,
    settings: Option<Arc<dyn SettingsRepository>>,
    notifications: Arc<NotificationManager>,
    executor: Arc<dyn ScriptExecutor>,
    open_default: Option<Arc<dyn ConfigurationAction>>,
}

impl ScreenBuilder {
    pub fn new(config: ApimateConfig, client: Arc<dyn AuthorizationClient>) -> Self {
        let notifications = Arc::new(NotificationManager::with_config(
            config.notifications.clone(),
        ));
        Self {
            config,
            base_dir: PathBuf::from("."),
            client,
            settings: None,
            notifications,
            executor: Arc::new(ProcessScriptExecutor::new()),
            open_default: None,
        }
    }

    /// Start from a loaded configuration, resolving relative script paths
    /// against the directory of its file.
    pub fn from_manager(manager: &ConfigManager, client: Arc<dyn AuthorizationClient>) -> Self {
        let builder = Self::new(manager.config().clone(), client);
        match manager.base_dir() {
            Some(dir) => builder.base_dir(dir),
            None => builder,
        }
    }

    pub fn base_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.base_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Use `settings` instead of the file named by `[settings].path`.
    pub fn settings(mut self, settings: Arc<dyn SettingsRepository>) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn notifications(mut self, notifications: Arc<NotificationManager>) -> Self {
        self.notifications = notifications;
        self
    }

    pub fn script_executor(mut self, executor: Arc<dyn ScriptExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Action behind `open_default`, typically an unprivileged hand-off to
    /// the platform's default-app settings.
    pub fn open_default(mut self, action: Arc<dyn ConfigurationAction>) -> Self {
        self.open_default = Some(action);
        self
    }

    pub fn build(self) -> Result<HostingSurface> {
        let settings = match self.settings.clone() {
            Some(settings) => settings,
            None => {
                let path = self.config.settings_path();
                let settings = FileSettings::open(&path)
                    .with_context(|| format!("failed to open settings at {}", path.display()))?;
                Arc::new(settings)
            }
        };

        let mut entries = EntryList::from_config(&self.config, Arc::clone(&settings))
            .context("invalid configuration entry list")?;

        if entries.get(keys::ANDROID_DATA_DIR).is_some() {
            entries.bind(
                keys::ANDROID_DATA_DIR,
                Arc::new(FixedValueAction::dat_directory(
                    &self.config,
                    Arc::clone(&settings),
                )),
            )?;
        }

        if entries.get(keys::PREPARE).is_some()
            && let Some(action) =
                PrepareResourceAction::from_config(&self.config, &self.base_dir, self.runner())
        {
            if let Err(err) = action.probe() {
                self.notifications.notify(NotificationEvent::BindingFailed {
                    action: action.name().to_string(),
                    error: err.to_string(),
                });
            }
            entries.bind(keys::PREPARE, Arc::new(action))?;
        }

        let audit = self.open_audit();
        if entries.get(keys::SHOW_LOG).is_some() {
            match &audit {
                Some(trail) => {
                    let action = ShowLogAction::for_audit_trail(&self.config, trail);
                    let path = action.path().display().to_string();
                    entries.set_source(keys::SHOW_LOG, SummarySource::Static(path))?;
                    entries.bind(keys::SHOW_LOG, Arc::new(action))?;
                }
                None => entries.disable(keys::SHOW_LOG)?,
            }
        }

        if entries.get(keys::OPEN_DEFAULT).is_some() {
            match &self.open_default {
                Some(action) => entries.bind(keys::OPEN_DEFAULT, Arc::clone(action))?,
                None => entries.disable(keys::OPEN_DEFAULT)?,
            }
        }

        let mut options = SurfaceOptions::from_config(&self.config.gate);
        if let Some(audit) = audit {
            options = options.with_audit(audit);
        }

        Ok(HostingSurface::attach(
            self.client,
            entries,
            self.notifications,
            options,
        ))
    }

    fn runner(&self) -> Arc<ScriptRunner> {
        let roots = &self.config.scripts.allowed_roots;
        let policy: Arc<dyn ScriptPolicy> = if roots.is_empty() {
            Arc::new(AllowAllPolicy)
        } else {
            Arc::new(DirectoryGuardPolicy::new(
                roots
                    .iter()
                    .map(|root| self.base_dir.join(expand_home(root))),
            ))
        };
        Arc::new(ScriptRunner::new(Arc::clone(&self.executor), policy))
    }

    fn open_audit(&self) -> Option<Arc<AuditTrail>> {
        if !self.config.audit.enabled {
            return None;
        }
        let dir = self.config.audit_directory();
        match AuditTrail::open(&dir) {
            Ok(trail) => {
                debug!(dir = %dir.display(), "audit trail enabled");
                Some(Arc::new(
                    trail.with_stale_callbacks(self.config.audit.log_stale_callbacks),
                ))
            }
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "audit log unavailable, continuing without it");
                None
            }
        }
    }
}
