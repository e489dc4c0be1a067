use std::path::{Path, PathBuf};

use apimate_config::ApimateConfig;
use apimate_config::constants::keys;
use tracing::debug;

use crate::action::{ConfigurationAction, EffectSummary, Privilege};
use crate::audit::AuditTrail;
use crate::error::ActionError;

/// Reports where the permission log lives so the host can open it.
///
/// Needs no elevation; it only looks at the file.
pub struct ShowLogAction {
    label: String,
    path: PathBuf,
}

impl ShowLogAction {
    pub fn new(label: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            path: path.into(),
        }
    }

    /// Points at the file `trail` is writing today.
    pub fn for_audit_trail(config: &ApimateConfig, trail: &AuditTrail) -> Self {
        let label = config
            .entry(keys::SHOW_LOG)
            .map_or("Show log", |entry| entry.label.as_str());
        Self::new(label, trail.log_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigurationAction for ShowLogAction {
    fn name(&self) -> &str {
        &self.label
    }

    fn privilege(&self) -> Privilege {
        Privilege::Unprivileged
    }

    fn execute(&self) -> Result<EffectSummary, ActionError> {
        if !self.path.is_file() {
            return Err(ActionError::Other(format!(
                "no log has been written at {}",
                self.path.display()
            )));
        }
        debug!(path = %self.path.display(), "log file located");
        let path = self.path.display().to_string();
        Ok(EffectSummary::new(format!("Log file:\n{path}")).with_value(path))
    }
}
