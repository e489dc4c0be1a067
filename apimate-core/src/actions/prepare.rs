use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use apimate_config::constants::keys;
use apimate_config::{ApimateConfig, expand_home};
use apimate_script_runner::{ScriptInvocation, ScriptKind, ScriptOutput, ScriptRunner};
use tracing::{debug, info};

use crate::action::{ConfigurationAction, EffectSummary, Privilege};
use crate::error::ActionError;

/// Environment variable carrying the configured DAT directory into scripts.
pub const DAT_DIR_ENV: &str = "APIMATE_DAT_DIR";

/// Runs the prepare script through a [`ScriptRunner`], optionally after a
/// probe script executed once when the entry is bound.
///
/// Overlapping executions are rejected rather than run twice.
pub struct PrepareResourceAction {
    label: String,
    runner: Arc<ScriptRunner>,
    prepare: ScriptInvocation,
    probe: Option<ScriptInvocation>,
    running: AtomicBool,
}

impl PrepareResourceAction {
    pub fn new(label: impl Into<String>, runner: Arc<ScriptRunner>, prepare: ScriptInvocation) -> Self {
        Self {
            label: label.into(),
            runner,
            prepare,
            probe: None,
            running: AtomicBool::new(false),
        }
    }

    pub fn with_probe(mut self, probe: ScriptInvocation) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Build the action from `[scripts]`. Returns `None` when no prepare
    /// script is configured. Relative working directories resolve against
    /// `base_dir`.
    pub fn from_config(
        config: &ApimateConfig,
        base_dir: &Path,
        runner: Arc<ScriptRunner>,
    ) -> Option<Self> {
        let script = config.scripts.prepare.as_ref()?;
        let working_dir = match &config.scripts.working_dir {
            Some(dir) => base_dir.join(expand_home(dir)),
            None => base_dir.to_path_buf(),
        };
        let dat_dir = config.fixed_values.dat_directory.clone();
        let invocation = |script: &str, kind| {
            ScriptInvocation::new(script, kind, working_dir.clone()).with_env(DAT_DIR_ENV, &dat_dir)
        };

        let label = config
            .entry(keys::PREPARE)
            .map_or("Prepare DAT directory", |entry| entry.label.as_str());
        let mut action = Self::new(label, runner, invocation(script, ScriptKind::Prepare));
        if let Some(probe) = &config.scripts.probe {
            action = action.with_probe(invocation(probe, ScriptKind::Probe));
        }
        Some(action)
    }

    /// Run the probe script, if any. Returns its last output line.
    pub fn probe(&self) -> Result<Option<String>, ActionError> {
        let Some(probe) = &self.probe else {
            return Ok(None);
        };
        let output = self
            .runner
            .run_successful(probe)
            .map_err(|err| ActionError::script(&err))?;
        let line = last_stdout_line(&output);
        debug!(action = %self.label, result = ?line, "probe finished");
        Ok(line)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn last_stdout_line(output: &ScriptOutput) -> Option<String> {
    output
        .stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .map(str::to_string)
}

impl ConfigurationAction for PrepareResourceAction {
    fn name(&self) -> &str {
        &self.label
    }

    fn privilege(&self) -> Privilege {
        Privilege::Elevated
    }

    fn execute(&self) -> Result<EffectSummary, ActionError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ActionError::AlreadyRunning(self.label.clone()));
        }
        let _guard = RunningGuard(&self.running);

        let output = self
            .runner
            .run_successful(&self.prepare)
            .map_err(|err| ActionError::script(&err))?;
        info!(action = %self.label, "prepare script finished");

        let message = last_stdout_line(&output).unwrap_or_else(|| format!("{} finished", self.label));
        Ok(EffectSummary::new(message))
    }
}
