use std::sync::Arc;

use anyhow::{Result, bail};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::executor::{ScriptExecutor, ScriptInvocation, ScriptOutput};
use crate::policy::ScriptPolicy;

/// Front end that applies a [`ScriptPolicy`] before handing an invocation to
/// the configured [`ScriptExecutor`].
pub struct ScriptRunner {
    executor: Arc<dyn ScriptExecutor>,
    policy: Arc<dyn ScriptPolicy>,
    runs: Mutex<u64>,
}

impl ScriptRunner {
    pub fn new(executor: Arc<dyn ScriptExecutor>, policy: Arc<dyn ScriptPolicy>) -> Self {
        Self {
            executor,
            policy,
            runs: Mutex::new(0),
        }
    }

    /// Number of invocations that reached the executor.
    pub fn runs(&self) -> u64 {
        *self.runs.lock()
    }

    /// Runs the script and returns its output regardless of exit status.
    pub fn run(&self, invocation: &ScriptInvocation) -> Result<ScriptOutput> {
        self.policy.check(invocation)?;
        *self.runs.lock() += 1;

        debug!(
            kind = invocation.kind.as_str(),
            working_dir = %invocation.working_dir.display(),
            "running script"
        );
        let output = self.executor.execute(invocation)?;
        debug!(
            kind = invocation.kind.as_str(),
            code = ?output.status.code(),
            "script finished"
        );
        Ok(output)
    }

    /// Runs the script and fails unless it exits successfully.
    pub fn run_successful(&self, invocation: &ScriptInvocation) -> Result<ScriptOutput> {
        let output = self.run(invocation)?;
        if output.status.success() {
            return Ok(output);
        }

        let detail = output.diagnostic().unwrap_or("no output").to_string();
        warn!(
            kind = invocation.kind.as_str(),
            code = ?output.status.code(),
            %detail,
            "script failed"
        );
        match output.status.code() {
            Some(code) => bail!(
                "{} script exited with status {code}: {detail}",
                invocation.kind.as_str()
            ),
            None => bail!(
                "{} script terminated by signal: {detail}",
                invocation.kind.as_str()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ScriptKind;
    use crate::policy::{AllowAllPolicy, DirectoryGuardPolicy};
    use std::path::PathBuf;

    struct FixedExecutor(ScriptOutput);

    impl ScriptExecutor for FixedExecutor {
        fn execute(&self, _invocation: &ScriptInvocation) -> Result<ScriptOutput> {
            Ok(self.0.clone())
        }
    }

    fn prepare(dir: &str) -> ScriptInvocation {
        ScriptInvocation::new("mkdir -p DAT", ScriptKind::Prepare, PathBuf::from(dir))
    }

    #[test]
    fn run_successful_surfaces_diagnostic() {
        let runner = ScriptRunner::new(
            Arc::new(FixedExecutor(ScriptOutput::failure(1, "permission denied"))),
            Arc::new(AllowAllPolicy),
        );
        let err = runner.run_successful(&prepare("/data")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "prepare script exited with status 1: permission denied"
        );
        assert_eq!(runner.runs(), 1);
    }

    #[test]
    fn policy_rejection_never_reaches_executor() {
        let runner = ScriptRunner::new(
            Arc::new(FixedExecutor(ScriptOutput::success("ok"))),
            Arc::new(DirectoryGuardPolicy::new([PathBuf::from("/data")])),
        );
        assert!(runner.run(&prepare("/elsewhere")).is_err());
        assert_eq!(runner.runs(), 0);

        let output = runner.run_successful(&prepare("/data/dir")).unwrap();
        assert_eq!(output.stdout, "ok");
        assert_eq!(runner.runs(), 1);
    }
}
