//! Pending-request registry.
//!
//! Maps each outstanding [`RequestToken`] to the continuation that resumes
//! its gate invocation. Resolution removes the entry under the lock and runs
//! the continuation after releasing it, so a duplicate or concurrent decision
//! for the same token finds nothing and is discarded. Once closed, the
//! registry rejects new requests and every parked continuation is dropped
//! without running. A registry built with a capacity refuses to park more
//! requests than that at once.

use std::fmt;

use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::broker::{Decision, RequestToken};
use crate::error::RegistryError;

/// Continuation run exactly once with the decision for its token.
pub type Resumable = Box<dyn FnOnce(Decision) + Send>;

pub struct PendingRequest {
    pub token: RequestToken,
    pub action: String,
    pub created_at: DateTime<Utc>,
    resume: Resumable,
}

impl fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRequest")
            .field("token", &self.token)
            .field("action", &self.action)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionOutcome {
    /// The continuation for the token ran.
    Resumed,
    /// No pending request matched; the decision was discarded.
    UnknownToken,
}

#[derive(Default)]
struct RegistryState {
    pending: HashMap<RequestToken, PendingRequest>,
    closed: bool,
}

#[derive(Default)]
pub struct PendingRequestRegistry {
    state: Mutex<RegistryState>,
    capacity: Option<usize>,
}

impl PendingRequestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry that holds at most `capacity` parked requests.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::default(),
            capacity: Some(capacity.max(1)),
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn register(
        &self,
        token: RequestToken,
        action: impl Into<String>,
        resume: Resumable,
    ) -> Result<(), RegistryError> {
        let action = action.into();
        let mut state = self.state.lock();
        if state.closed {
            return Err(RegistryError::Closed);
        }
        if state.pending.contains_key(&token) {
            return Err(RegistryError::DuplicateToken(token));
        }
        if let Some(capacity) = self.capacity
            && state.pending.len() >= capacity
        {
            return Err(RegistryError::Full { capacity });
        }
        trace!(token = token.get(), %action, "request parked");
        state.pending.insert(
            token,
            PendingRequest {
                token,
                action,
                created_at: Utc::now(),
                resume,
            },
        );
        Ok(())
    }

    /// Resume the request parked under `token`, at most once.
    pub fn resolve(&self, token: RequestToken, decision: Decision) -> ResolutionOutcome {
        let entry = self.state.lock().pending.remove(&token);
        match entry {
            Some(request) => {
                debug!(
                    token = token.get(),
                    action = %request.action,
                    ?decision,
                    "resuming pending request"
                );
                (request.resume)(decision);
                ResolutionOutcome::Resumed
            }
            None => {
                debug!(token = token.get(), ?decision, "no pending request for token");
                ResolutionOutcome::UnknownToken
            }
        }
    }

    /// Drop a parked request without running it. Returns whether it existed.
    pub fn discard(&self, token: RequestToken) -> bool {
        let entry = self.state.lock().pending.remove(&token);
        entry.is_some()
    }

    /// Close the registry and drop every parked request. Returns the requests
    /// that were abandoned.
    pub fn close(&self) -> Vec<PendingRequest> {
        let drained = {
            let mut state = self.state.lock();
            state.closed = true;
            std::mem::take(&mut state.pending)
        };
        let mut abandoned: Vec<PendingRequest> = drained.into_values().collect();
        abandoned.sort_by_key(|request| request.token);
        abandoned
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn contains(&self, token: RequestToken) -> bool {
        self.state.lock().pending.contains_key(&token)
    }

    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().pending.is_empty()
    }
}
