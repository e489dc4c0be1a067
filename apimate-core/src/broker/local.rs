use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use anyhow::{Result, bail};
use hashbrown::HashMap;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::{
    AuthorizationClient, AuthorizationState, Decision, DecisionListener, RequestToken,
    SubscriptionId,
};

/// In-process broker for hosts without an external authorization service
/// and for tests.
///
/// Reachability and the reported state are toggled directly. Decisions are
/// delivered with [`LocalBroker::deliver`], or automatically when an auto
/// response is configured. A delivered grant is remembered, so later
/// invocations see [`AuthorizationState::Granted`].
pub struct LocalBroker {
    reachable: AtomicBool,
    state: Mutex<AuthorizationState>,
    listeners: Mutex<HashMap<SubscriptionId, DecisionListener>>,
    next_subscription: AtomicU64,
    requests: Mutex<Vec<RequestToken>>,
    auto_response: Mutex<Option<Decision>>,
}

impl Default for LocalBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalBroker {
    pub fn new() -> Self {
        Self {
            reachable: AtomicBool::new(true),
            state: Mutex::new(AuthorizationState::Unknown),
            listeners: Mutex::new(HashMap::new()),
            next_subscription: AtomicU64::new(1),
            requests: Mutex::new(Vec::new()),
            auto_response: Mutex::new(None),
        }
    }

    /// A reachable broker that already holds a grant.
    pub fn granted() -> Self {
        let broker = Self::new();
        broker.set_state(AuthorizationState::Granted);
        broker
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn set_state(&self, state: AuthorizationState) {
        *self.state.lock() = state;
    }

    /// Answer every future request immediately with `decision`.
    pub fn set_auto_response(&self, decision: Option<Decision>) {
        *self.auto_response.lock() = decision;
    }

    /// Tokens passed to `request_authorization`, oldest first.
    pub fn requested_tokens(&self) -> Vec<RequestToken> {
        self.requests.lock().clone()
    }

    pub fn last_requested(&self) -> Option<RequestToken> {
        self.requests.lock().last().copied()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Deliver a decision to every registered listener and return how many
    /// were called.
    pub fn deliver(&self, token: RequestToken, decision: Decision) -> usize {
        {
            let mut state = self.state.lock();
            match decision {
                Decision::Granted => *state = AuthorizationState::Granted,
                Decision::Denied if *state != AuthorizationState::Granted => {
                    *state = AuthorizationState::Denied;
                }
                Decision::Denied => {}
            }
        }

        // Snapshot so listeners run without the lock held.
        let listeners: Vec<DecisionListener> = self.listeners.lock().values().cloned().collect();
        debug!(
            token = token.get(),
            ?decision,
            listeners = listeners.len(),
            "delivering decision"
        );
        for listener in &listeners {
            listener(token, decision);
        }
        listeners.len()
    }
}

impl AuthorizationClient for LocalBroker {
    fn is_broker_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    fn current_authorization_state(&self) -> AuthorizationState {
        if !self.is_broker_reachable() {
            return AuthorizationState::Unavailable;
        }
        *self.state.lock()
    }

    fn request_authorization(&self, token: RequestToken) -> Result<()> {
        if !self.is_broker_reachable() {
            bail!("local broker is not running");
        }
        self.requests.lock().push(token);
        trace!(token = token.get(), "authorization requested");

        let auto = *self.auto_response.lock();
        if let Some(decision) = auto {
            self.deliver(token, decision);
        }
        Ok(())
    }

    fn add_decision_listener(&self, listener: DecisionListener) -> SubscriptionId {
        let id = SubscriptionId::from_raw(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().insert(id, listener);
        id
    }

    fn remove_decision_listener(&self, id: SubscriptionId) -> bool {
        self.listeners.lock().remove(&id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn unreachable_broker_rejects_requests() {
        let broker = LocalBroker::new();
        broker.set_reachable(false);

        assert!(!broker.is_broker_reachable());
        assert_eq!(
            broker.current_authorization_state(),
            AuthorizationState::Unavailable
        );
        assert!(broker.request_authorization(RequestToken::next()).is_err());
        assert!(broker.requested_tokens().is_empty());
    }

    #[test]
    fn decisions_reach_every_listener_and_grants_stick() {
        let broker = LocalBroker::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for _ in 0..2 {
            let seen = Arc::clone(&seen);
            broker.add_decision_listener(Arc::new(move |token, decision| {
                seen.lock().push((token, decision));
            }));
        }

        let token = RequestToken::next();
        assert_eq!(broker.deliver(token, Decision::Granted), 2);
        assert_eq!(seen.lock().len(), 2);
        assert_eq!(
            broker.current_authorization_state(),
            AuthorizationState::Granted
        );

        broker.deliver(RequestToken::next(), Decision::Denied);
        assert_eq!(
            broker.current_authorization_state(),
            AuthorizationState::Granted
        );
    }

    #[test]
    fn auto_response_answers_inline() {
        let broker = LocalBroker::new();
        broker.set_auto_response(Some(Decision::Denied));
        let answered = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&answered);
        broker.add_decision_listener(Arc::new(move |_, decision| {
            assert_eq!(decision, Decision::Denied);
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let token = RequestToken::next();
        broker.request_authorization(token).unwrap();
        assert_eq!(answered.load(Ordering::SeqCst), 1);
        assert_eq!(broker.last_requested(), Some(token));
        assert_eq!(
            broker.current_authorization_state(),
            AuthorizationState::Denied
        );
    }
}
