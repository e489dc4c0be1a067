use crate::executor::ScriptInvocation;
use anyhow::{Result, bail};
use std::path::PathBuf;

pub trait ScriptPolicy: Send + Sync {
    fn check(&self, invocation: &ScriptInvocation) -> Result<()>;
}

pub struct AllowAllPolicy;

impl ScriptPolicy for AllowAllPolicy {
    fn check(&self, _invocation: &ScriptInvocation) -> Result<()> {
        Ok(())
    }
}

/// Restricts scripts to working directories under a set of roots.
#[derive(Debug, Clone)]
pub struct DirectoryGuardPolicy {
    roots: Vec<PathBuf>,
}

impl DirectoryGuardPolicy {
    pub fn new(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            roots: roots.into_iter().collect(),
        }
    }
}

impl ScriptPolicy for DirectoryGuardPolicy {
    fn check(&self, invocation: &ScriptInvocation) -> Result<()> {
        let dir = &invocation.working_dir;
        if self.roots.iter().any(|root| dir.starts_with(root)) {
            return Ok(());
        }
        bail!(
            "path `{}` is outside the permitted script roots",
            dir.display()
        );
    }
}
