//! Boundary to the out-of-process authorization broker.
//!
//! The broker is reached through [`AuthorizationClient`]. Decisions arrive on
//! an arbitrary thread through registered listeners and carry the
//! [`RequestToken`] the gate supplied when it asked.

mod local;

pub use local::LocalBroker;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Correlation token attached to an authorization request.
///
/// Tokens are allocated from a single process-wide counter, so two hosting
/// surfaces sharing one broker never hand out the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Rebuild a token reported by the broker.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the broker currently reports for this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationState {
    /// Never asked, or the broker forgot.
    Unknown,
    /// The broker answered the ping but cannot evaluate authorization.
    Unavailable,
    Denied,
    Granted,
}

/// Outcome of a single authorization request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Granted,
    Denied,
}

impl Decision {
    pub fn from_granted(granted: bool) -> Self {
        if granted { Self::Granted } else { Self::Denied }
    }

    pub fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// Callback invoked by the broker for every decision it delivers.
///
/// Listeners may run on any thread and must not block.
pub type DecisionListener = Arc<dyn Fn(RequestToken, Decision) + Send + Sync>;

/// Identifier of a registered [`DecisionListener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

pub trait AuthorizationClient: Send + Sync {
    /// Liveness probe. Must be cheap and never block on user interaction.
    fn is_broker_reachable(&self) -> bool;

    fn current_authorization_state(&self) -> AuthorizationState;

    /// Ask the broker to prompt the user. The decision arrives later through
    /// every registered listener, tagged with `token`.
    fn request_authorization(&self, token: RequestToken) -> anyhow::Result<()>;

    fn add_decision_listener(&self, listener: DecisionListener) -> SubscriptionId;

    /// Returns `false` when the listener was not registered.
    fn remove_decision_listener(&self, id: SubscriptionId) -> bool;
}

/// A live listener registration.
///
/// Detaching consumes the handle, so a subscription cannot be removed twice.
/// Dropping the handle detaches as well.
pub struct BrokerSubscription {
    client: Arc<dyn AuthorizationClient>,
    id: Option<SubscriptionId>,
}

impl BrokerSubscription {
    pub fn attach(client: Arc<dyn AuthorizationClient>, listener: DecisionListener) -> Self {
        let id = client.add_decision_listener(listener);
        debug!(subscription = id.get(), "decision listener attached");
        Self {
            client,
            id: Some(id),
        }
    }

    pub fn id(&self) -> Option<SubscriptionId> {
        self.id
    }

    pub fn detach(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(id) = self.id.take() {
            let removed = self.client.remove_decision_listener(id);
            debug!(subscription = id.get(), removed, "decision listener detached");
        }
    }
}

impl fmt::Debug for BrokerSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerSubscription")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl Drop for BrokerSubscription {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_unique_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| (0..64).map(|_| RequestToken::next()).collect::<Vec<_>>()))
            .collect();

        let mut all: Vec<RequestToken> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        let total = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), total);
    }

    #[test]
    fn dropping_subscription_removes_listener() {
        let broker = Arc::new(LocalBroker::new());
        let client: Arc<dyn AuthorizationClient> = broker.clone();

        let subscription = BrokerSubscription::attach(client.clone(), Arc::new(|_, _| {}));
        assert_eq!(broker.listener_count(), 1);
        drop(subscription);
        assert_eq!(broker.listener_count(), 0);

        let subscription = BrokerSubscription::attach(client, Arc::new(|_, _| {}));
        assert!(subscription.id().is_some());
        subscription.detach();
        assert_eq!(broker.listener_count(), 0);
    }
}
