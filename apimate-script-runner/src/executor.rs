use anyhow::{Context, Result};
use std::path::PathBuf;

/// Role a script plays for the configuration action that issues it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptKind {
    /// Inspects the current state without changing anything.
    Probe,
    /// Prepares a resource (directory discovery, permission fix-ups).
    Prepare,
}

impl ScriptKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Probe => "probe",
            Self::Prepare => "prepare",
        }
    }
}

/// Describes a script that will be executed by a [`ScriptExecutor`].
#[derive(Debug, Clone)]
pub struct ScriptInvocation {
    pub script: String,
    pub kind: ScriptKind,
    pub working_dir: PathBuf,
    pub env: Vec<(String, String)>,
}

impl ScriptInvocation {
    pub fn new(script: impl Into<String>, kind: ScriptKind, working_dir: PathBuf) -> Self {
        Self {
            script: script.into(),
            kind,
            working_dir,
            env: Vec::new(),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Exit status of a script execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptStatus {
    success: bool,
    code: Option<i32>,
}

impl ScriptStatus {
    pub fn new(success: bool, code: Option<i32>) -> Self {
        Self { success, code }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn code(&self) -> Option<i32> {
        self.code
    }
}

impl From<std::process::ExitStatus> for ScriptStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            success: status.success(),
            code: status.code(),
        }
    }
}

/// Output produced by the executor for a script invocation.
#[derive(Debug, Clone)]
pub struct ScriptOutput {
    pub status: ScriptStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ScriptOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            status: ScriptStatus::new(true, Some(0)),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: ScriptStatus::new(false, Some(code)),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Last non-empty stderr line, falling back to stdout. Used for short
    /// failure messages.
    pub fn diagnostic(&self) -> Option<&str> {
        fn last_line(text: &str) -> Option<&str> {
            text.lines().map(str::trim).filter(|line| !line.is_empty()).last()
        }
        last_line(&self.stderr).or_else(|| last_line(&self.stdout))
    }
}

/// Trait implemented by concrete script execution strategies.
pub trait ScriptExecutor: Send + Sync {
    fn execute(&self, invocation: &ScriptInvocation) -> Result<ScriptOutput>;
}

/// Executes scripts through the system shell via [`std::process::Command`].
#[cfg(feature = "std-process")]
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessScriptExecutor;

#[cfg(feature = "std-process")]
impl ProcessScriptExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(feature = "std-process")]
impl ScriptExecutor for ProcessScriptExecutor {
    fn execute(&self, invocation: &ScriptInvocation) -> Result<ScriptOutput> {
        use std::process::Command;

        let mut cmd = if cfg!(windows) {
            let mut command = Command::new("powershell");
            command
                .arg("-NoProfile")
                .arg("-NonInteractive")
                .arg("-Command")
                .arg(&invocation.script);
            command
        } else {
            let mut command = Command::new("sh");
            command.arg("-c").arg(&invocation.script);
            command
        };

        cmd.current_dir(&invocation.working_dir);
        cmd.envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        let output = cmd.output().with_context(|| {
            format!(
                "failed to execute {} script: {}",
                invocation.kind.as_str(),
                invocation.script
            )
        })?;

        Ok(ScriptOutput {
            status: ScriptStatus::from(output.status),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}
