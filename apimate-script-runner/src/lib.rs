//! Script execution subsystem for privileged configuration actions.
//!
//! The crate exposes a trait-based executor so hosts can swap the process
//! strategy (the system shell, or a recording double in tests)
//! while reusing the policy guard and the [`ScriptRunner`] front end.

pub mod executor;
pub mod policy;
pub mod runner;

#[cfg(feature = "std-process")]
pub use executor::ProcessScriptExecutor;
pub use executor::{
    ScriptExecutor, ScriptInvocation, ScriptKind, ScriptOutput, ScriptStatus,
};
pub use policy::{AllowAllPolicy, DirectoryGuardPolicy, ScriptPolicy};
pub use runner::ScriptRunner;
