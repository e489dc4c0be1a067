//! Hosting surface lifecycle.
//!
//! A [`HostingSurface`] owns everything a screen needs while it is attached:
//! the entry list, a [`PermissionGate`], the registry of parked requests, one
//! broker subscription and a bounded decision inbox. Broker decisions are
//! queued into the inbox from whatever thread the broker calls back on, and
//! applied on the host's side by [`HostingSurface::pump`] or by the task
//! started with [`HostingSurface::spawn_dispatcher`].
//!
//! The inbox only takes decisions for tokens the surface still has parked,
//! once each, and the surface never parks more requests than the inbox can
//! hold. A decision for a parked request therefore always finds room.
//!
//! [`HostingSurface::teardown`] closes the inbox, detaches the subscription
//! and drops every parked request, in that order. Dropping the surface does
//! the same.

use std::sync::Arc;

use apimate_config::GateConfig;
use hashbrown::HashSet;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::audit::{AuditTrail, GateAuditEvent, GateDecision};
use crate::broker::{AuthorizationClient, BrokerSubscription, Decision, RequestToken};
use crate::entries::{EntryList, EntryRow};
use crate::error::SurfaceError;
use crate::gate::{GateRun, PermissionGate};
use crate::notifications::NotificationSink;
use crate::registry::{PendingRequestRegistry, ResolutionOutcome};

type InboxMessage = (RequestToken, Decision);

#[derive(Clone)]
pub struct SurfaceOptions {
    pub inbox_capacity: usize,
    pub audit: Option<Arc<AuditTrail>>,
}

impl Default for SurfaceOptions {
    fn default() -> Self {
        Self::from_config(&GateConfig::default())
    }
}

impl SurfaceOptions {
    pub fn from_config(config: &GateConfig) -> Self {
        Self {
            inbox_capacity: config.inbox_capacity.max(1),
            audit: None,
        }
    }

    pub fn with_audit(mut self, audit: Arc<AuditTrail>) -> Self {
        self.audit = Some(audit);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// A decision for this token is already queued.
    Duplicate,
    /// No request is parked under this token.
    Stale,
    /// Inbox at capacity; the decision was dropped.
    Full,
    /// Surface torn down; the decision was dropped.
    Closed,
}

struct InboxState {
    sender: Option<mpsc::Sender<InboxMessage>>,
    queued: HashSet<RequestToken>,
}

/// Sending half of the decision inbox. Closing is atomic with respect to
/// delivery: once [`close`](Self::close) returns, nothing else is queued.
pub struct DecisionInbox {
    state: Mutex<InboxState>,
    registry: Arc<PendingRequestRegistry>,
}

impl DecisionInbox {
    /// Inbox for decisions about requests parked in `registry`.
    pub fn channel(
        capacity: usize,
        registry: Arc<PendingRequestRegistry>,
    ) -> (Arc<Self>, mpsc::Receiver<InboxMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Arc::new(Self {
                state: Mutex::new(InboxState {
                    sender: Some(tx),
                    queued: HashSet::new(),
                }),
                registry,
            }),
            rx,
        )
    }

    pub fn deliver(&self, token: RequestToken, decision: Decision) -> Delivery {
        let mut state = self.state.lock();
        let Some(sender) = state.sender.as_ref() else {
            debug!(token = token.get(), "decision after teardown ignored");
            return Delivery::Closed;
        };
        if state.queued.contains(&token) {
            debug!(token = token.get(), ?decision, "decision already queued");
            return Delivery::Duplicate;
        }
        if !self.registry.contains(token) {
            debug!(token = token.get(), ?decision, "decision for unknown token ignored");
            return Delivery::Stale;
        }

        match sender.try_send((token, decision)) {
            Ok(()) => {
                state.queued.insert(token);
                Delivery::Queued
            }
            Err(TrySendError::Full(_)) => {
                warn!(token = token.get(), ?decision, "decision inbox full, decision dropped");
                Delivery::Full
            }
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    /// Mark the decision for `token` as applied, after it was resolved.
    pub fn acknowledge(&self, token: RequestToken) {
        self.state.lock().queued.remove(&token);
    }

    /// Returns `false` if the inbox was already closed.
    pub fn close(&self) -> bool {
        let mut state = self.state.lock();
        state.queued.clear();
        state.sender.take().is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().sender.is_none()
    }
}

/// What teardown left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Requests that were still waiting for a decision
    pub abandoned: Vec<RequestToken>,
}

fn dispatch(
    registry: &PendingRequestRegistry,
    audit: Option<&AuditTrail>,
    token: RequestToken,
    decision: Decision,
) -> ResolutionOutcome {
    let outcome = registry.resolve(token, decision);
    if outcome == ResolutionOutcome::UnknownToken
        && let Some(audit) = audit
    {
        audit.record(
            GateAuditEvent::new(GateDecision::StaleCallback)
                .token(token)
                .detail(format!("{decision:?}")),
        );
    }
    outcome
}

pub struct HostingSurface {
    gate: PermissionGate,
    registry: Arc<PendingRequestRegistry>,
    inbox: Arc<DecisionInbox>,
    receiver: Mutex<Option<mpsc::Receiver<InboxMessage>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    subscription: Option<BrokerSubscription>,
    entries: EntryList,
    audit: Option<Arc<AuditTrail>>,
    torn_down: bool,
}

impl HostingSurface {
    /// Attach to the broker. Exactly one subscription is held until teardown.
    pub fn attach(
        client: Arc<dyn AuthorizationClient>,
        entries: EntryList,
        notifier: Arc<dyn NotificationSink>,
        options: SurfaceOptions,
    ) -> Self {
        let registry = Arc::new(PendingRequestRegistry::with_capacity(options.inbox_capacity));
        let (inbox, receiver) = DecisionInbox::channel(options.inbox_capacity, Arc::clone(&registry));

        let mut gate = PermissionGate::new(Arc::clone(&client), Arc::clone(&registry), notifier);
        if let Some(audit) = &options.audit {
            gate = gate.with_audit(Arc::clone(audit));
        }

        let listener_inbox = Arc::clone(&inbox);
        let listener_audit = options.audit.clone();
        let subscription = BrokerSubscription::attach(
            client,
            Arc::new(move |token, decision| {
                if listener_inbox.deliver(token, decision) == Delivery::Stale
                    && let Some(audit) = &listener_audit
                {
                    audit.record(
                        GateAuditEvent::new(GateDecision::StaleCallback)
                            .token(token)
                            .detail(format!("{decision:?}")),
                    );
                }
            }),
        );

        info!(
            entries = entries.len(),
            inbox_capacity = options.inbox_capacity,
            "hosting surface attached"
        );

        Self {
            gate,
            registry,
            inbox,
            receiver: Mutex::new(Some(receiver)),
            dispatcher: Mutex::new(None),
            subscription: Some(subscription),
            entries,
            audit: options.audit,
            torn_down: false,
        }
    }

    pub fn entries(&self) -> &EntryList {
        &self.entries
    }

    pub fn rows(&self) -> Vec<EntryRow> {
        self.entries.rows()
    }

    pub fn pending_requests(&self) -> usize {
        self.registry.len()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Run the action bound to `key` through the gate.
    pub fn trigger(&self, key: &str) -> Result<GateRun, SurfaceError> {
        let action = self.entries.action_for(key)?;
        debug!(key, action = action.name(), "entry triggered");
        Ok(self.gate.run(action))
    }

    /// Apply every queued decision on the calling thread. Returns how many
    /// were taken from the inbox. Does nothing once a dispatcher task owns
    /// the inbox.
    pub fn pump(&self) -> usize {
        let mut receiver = self.receiver.lock();
        let Some(receiver) = receiver.as_mut() else {
            return 0;
        };

        let mut handled = 0;
        while let Ok((token, decision)) = receiver.try_recv() {
            dispatch(&self.registry, self.audit.as_deref(), token, decision);
            self.inbox.acknowledge(token);
            handled += 1;
        }
        handled
    }

    /// Move the inbox onto a tokio task that applies decisions as they
    /// arrive. Returns `false` when called outside a runtime or if the inbox
    /// was already handed off; [`pump`](Self::pump) keeps working then.
    pub fn spawn_dispatcher(&self) -> bool {
        let Ok(runtime) = Handle::try_current() else {
            warn!("no tokio runtime, decisions stay on the pump");
            return false;
        };
        let Some(mut receiver) = self.receiver.lock().take() else {
            return false;
        };
        let registry = Arc::clone(&self.registry);
        let inbox = Arc::clone(&self.inbox);
        let audit = self.audit.clone();

        let handle = runtime.spawn(async move {
            while let Some((token, decision)) = receiver.recv().await {
                let registry = Arc::clone(&registry);
                let audit = audit.clone();
                // Action bodies may block on scripts or disk.
                let result = tokio::task::spawn_blocking(move || {
                    dispatch(&registry, audit.as_deref(), token, decision)
                })
                .await;
                inbox.acknowledge(token);
                if let Err(err) = result {
                    warn!(token = token.get(), error = %err, "decision dispatch failed");
                }
            }
            debug!("decision dispatcher stopped");
        });
        *self.dispatcher.lock() = Some(handle);
        true
    }

    /// Detach from the broker and abandon everything still pending.
    pub fn teardown(mut self) -> TeardownReport {
        self.shutdown()
    }

    fn shutdown(&mut self) -> TeardownReport {
        if self.torn_down {
            return TeardownReport::default();
        }
        self.torn_down = true;

        self.inbox.close();
        if let Some(subscription) = self.subscription.take() {
            subscription.detach();
        }

        let abandoned: Vec<RequestToken> = self
            .registry
            .close()
            .into_iter()
            .map(|request| {
                debug!(token = request.token.get(), action = %request.action, "request abandoned");
                if let Some(audit) = &self.audit {
                    audit.record(
                        GateAuditEvent::new(GateDecision::Abandoned)
                            .action(request.action.clone())
                            .token(request.token),
                    );
                }
                request.token
            })
            .collect();

        self.receiver.lock().take();
        if let Some(handle) = self.dispatcher.lock().take() {
            handle.abort();
        }

        info!(abandoned = abandoned.len(), "hosting surface torn down");
        TeardownReport { abandoned }
    }
}

impl Drop for HostingSurface {
    fn drop(&mut self) {
        self.shutdown();
    }
}
