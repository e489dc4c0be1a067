use std::fmt;

use crate::error::ActionError;

/// Whether an action needs the broker's authorization before it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Privilege {
    Elevated,
    Unprivileged,
}

/// Result of a successful action body, shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectSummary {
    pub message: String,
    /// Value persisted by the action, if it wrote one
    pub value: Option<String>,
}

impl EffectSummary {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            value: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

impl fmt::Display for EffectSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// A unit of work a configuration entry runs when triggered.
///
/// The gate calls [`execute`](Self::execute) at most once per invocation, and
/// only after authorization has been established for elevated actions.
/// Actions that must not apply twice guard against overlapping invocations
/// themselves.
pub trait ConfigurationAction: Send + Sync {
    /// Label used in notifications and logs.
    fn name(&self) -> &str;

    fn privilege(&self) -> Privilege {
        Privilege::Elevated
    }

    fn execute(&self) -> Result<EffectSummary, ActionError>;
}

/// Action built from a closure, handy for hosts with one-off behavior.
pub struct FnAction<F> {
    name: String,
    privilege: Privilege,
    body: F,
}

impl<F> FnAction<F>
where
    F: Fn() -> Result<EffectSummary, ActionError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, privilege: Privilege, body: F) -> Self {
        Self {
            name: name.into(),
            privilege,
            body,
        }
    }
}

impl<F> ConfigurationAction for FnAction<F>
where
    F: Fn() -> Result<EffectSummary, ActionError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn privilege(&self) -> Privilege {
        self.privilege
    }

    fn execute(&self) -> Result<EffectSummary, ActionError> {
        (self.body)()
    }
}
