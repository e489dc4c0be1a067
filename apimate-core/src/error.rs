//! Error taxonomy for the permission gate.
//!
//! Every failure that reaches a terminal gate state is classified into an
//! [`ErrorKind`] so hosts can branch on it without string matching. None of
//! these errors escapes to a hosting surface as a fault: the gate turns each
//! one into a terminal outcome plus exactly one notification.

use apimate_config::SettingsError;
use thiserror::Error;

use crate::broker::RequestToken;

/// Stable classification of gate failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The broker could not be reached, or it became unreachable while a
    /// request was being issued.
    BrokerUnavailable,
    /// The user declined the authorization request.
    AuthorizationDenied,
    /// The action body returned an error or panicked.
    ActionExecutionFailed,
    /// A decision arrived for a token with no pending request.
    UnknownToken,
    /// The hosting surface was torn down before the request could be parked.
    SurfaceDetached,
    /// The surface already holds as many outstanding requests as its decision
    /// inbox can carry.
    PendingLimitReached,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BrokerUnavailable => "broker_unavailable",
            Self::AuthorizationDenied => "authorization_denied",
            Self::ActionExecutionFailed => "action_execution_failed",
            Self::UnknownToken => "unknown_token",
            Self::SurfaceDetached => "surface_detached",
            Self::PendingLimitReached => "pending_limit_reached",
        }
    }
}

/// Terminal failure of a single gate invocation.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("authorization broker is not running")]
    BrokerUnavailable {
        /// Broker-side reason, when the request itself was rejected
        detail: Option<String>,
    },

    #[error("elevated access was denied")]
    AuthorizationDenied,

    #[error("{action} failed: {source}")]
    ActionExecutionFailed {
        action: String,
        #[source]
        source: ActionError,
    },

    #[error("no hosting surface is attached for {action}")]
    SurfaceDetached { action: String },

    #[error("{action} was not requested: {limit} authorization requests are already waiting")]
    PendingLimitReached { action: String, limit: usize },
}

impl GateError {
    pub fn broker_unavailable() -> Self {
        Self::BrokerUnavailable { detail: None }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BrokerUnavailable { .. } => ErrorKind::BrokerUnavailable,
            Self::AuthorizationDenied => ErrorKind::AuthorizationDenied,
            Self::ActionExecutionFailed { .. } => ErrorKind::ActionExecutionFailed,
            Self::SurfaceDetached { .. } => ErrorKind::SurfaceDetached,
            Self::PendingLimitReached { .. } => ErrorKind::PendingLimitReached,
        }
    }
}

/// Failure raised by a configuration action body.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("failed to store {key}: {source}")]
    Settings {
        key: String,
        #[source]
        source: SettingsError,
    },

    #[error("{message}")]
    Script { message: String },

    #[error("action body panicked: {0}")]
    Panicked(String),

    #[error("{0} is already running")]
    AlreadyRunning(String),

    #[error("{0}")]
    Other(String),
}

impl ActionError {
    /// Wrap a script runner error, keeping its full context chain.
    pub fn script(err: &anyhow::Error) -> Self {
        Self::Script {
            message: format!("{err:#}"),
        }
    }
}

/// Host misuse of a hosting surface. Unlike [`GateError`], these are returned
/// to the caller directly because no gate invocation was started.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("no configuration entry named `{0}`")]
    UnknownEntry(String),

    #[error("configuration entry `{0}` has no action bound")]
    NotBound(String),

    #[error("duplicate configuration entry key `{0}`")]
    DuplicateEntry(String),

    #[error("configuration entry `{0}` is disabled")]
    Disabled(String),
}

/// Failure to park a pending request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("pending request registry is closed")]
    Closed,

    #[error("request token {0} is already pending")]
    DuplicateToken(RequestToken),

    #[error("{capacity} requests are already pending")]
    Full { capacity: usize },
}
