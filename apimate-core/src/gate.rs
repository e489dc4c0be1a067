//! Permission gate.
//!
//! A [`PermissionGate`] drives one invocation of a [`ConfigurationAction`]
//! through the authorization state machine:
//!
//! ```text
//! Idle -> CheckingAuthorization -> Executing -> Completed | Failed
//!                              \-> AwaitingDecision -> Executing | Failed | Abandoned
//!                              \-> Failed
//! ```
//!
//! When the broker has to ask the user, the invocation is parked in the
//! [`PendingRequestRegistry`] under a fresh [`RequestToken`] and the caller
//! gets a [`PendingGate`] whose completion resolves once the decision is
//! dispatched, or to [`GateOutcome::Abandoned`] if the surface goes away
//! first. Every `Completed` or `Failed` outcome emits exactly one
//! notification.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::action::{ConfigurationAction, EffectSummary, Privilege};
use crate::audit::{AuditTrail, GateAuditEvent, GateDecision};
use crate::broker::{AuthorizationClient, AuthorizationState, Decision, RequestToken};
use crate::error::{ActionError, ErrorKind, GateError, RegistryError};
use crate::notifications::{NotificationEvent, NotificationSink};
use crate::registry::PendingRequestRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    CheckingAuthorization,
    AwaitingDecision,
    Executing,
    Completed,
    Failed(ErrorKind),
    Abandoned,
}

impl GateState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_) | Self::Abandoned)
    }

    fn can_transition_to(self, next: GateState) -> bool {
        use GateState::*;
        matches!(
            (self, next),
            (Idle, CheckingAuthorization)
                | (CheckingAuthorization, Executing | AwaitingDecision | Failed(_))
                | (AwaitingDecision, Executing | Failed(_) | Abandoned)
                | (Executing, Completed | Failed(_))
        )
    }
}

/// Terminal result of a gate invocation.
#[derive(Debug)]
pub enum GateOutcome {
    Completed(EffectSummary),
    Failed(GateError),
    /// The hosting surface was torn down while the decision was outstanding.
    Abandoned,
}

impl GateOutcome {
    pub fn state(&self) -> GateState {
        match self {
            Self::Completed(_) => GateState::Completed,
            Self::Failed(err) => GateState::Failed(err.kind()),
            Self::Abandoned => GateState::Abandoned,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Failed(err) => Some(err.kind()),
            _ => None,
        }
    }
}

/// Handle to an invocation parked until the broker answers.
#[derive(Debug)]
pub struct PendingGate {
    token: RequestToken,
    completion: oneshot::Receiver<GateOutcome>,
}

impl PendingGate {
    pub fn token(&self) -> RequestToken {
        self.token
    }

    /// Wait for the terminal outcome.
    pub async fn outcome(self) -> GateOutcome {
        self.completion.await.unwrap_or(GateOutcome::Abandoned)
    }

    /// Non-blocking poll. `None` while the decision is still outstanding.
    pub fn try_outcome(&mut self) -> Option<GateOutcome> {
        match self.completion.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(GateOutcome::Abandoned),
        }
    }
}

/// What [`PermissionGate::run`] hands back.
#[derive(Debug)]
pub enum GateRun {
    /// The invocation reached a terminal state synchronously.
    Finished(GateOutcome),
    /// The invocation is waiting for a broker decision.
    Pending(PendingGate),
}

impl GateRun {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    pub fn token(&self) -> Option<RequestToken> {
        match self {
            Self::Pending(pending) => Some(pending.token()),
            Self::Finished(_) => None,
        }
    }

    pub fn into_finished(self) -> Option<GateOutcome> {
        match self {
            Self::Finished(outcome) => Some(outcome),
            Self::Pending(_) => None,
        }
    }

    pub fn into_pending(self) -> Option<PendingGate> {
        match self {
            Self::Pending(pending) => Some(pending),
            Self::Finished(_) => None,
        }
    }
}

/// One trip through the state machine.
struct Invocation {
    action: Arc<dyn ConfigurationAction>,
    state: GateState,
    token: Option<RequestToken>,
}

impl Invocation {
    fn new(action: Arc<dyn ConfigurationAction>) -> Self {
        Self {
            action,
            state: GateState::Idle,
            token: None,
        }
    }

    fn parked(action: Arc<dyn ConfigurationAction>, token: RequestToken) -> Self {
        Self {
            action,
            state: GateState::AwaitingDecision,
            token: Some(token),
        }
    }

    fn name(&self) -> &str {
        self.action.name()
    }

    fn advance(&mut self, next: GateState) {
        if !self.state.can_transition_to(next) {
            warn!(
                action = self.name(),
                from = ?self.state,
                to = ?next,
                "unexpected gate transition"
            );
        }
        debug!(action = self.name(), from = ?self.state, to = ?next, "gate transition");
        self.state = next;
    }

    fn audit_event(&self, decision: GateDecision) -> GateAuditEvent {
        let event = GateAuditEvent::new(decision).action(self.name());
        match self.token {
            Some(token) => event.token(token),
            None => event,
        }
    }
}

/// Everything a parked invocation needs to finish on another thread.
#[derive(Clone)]
struct GateContext {
    notifier: Arc<dyn NotificationSink>,
    audit: Option<Arc<AuditTrail>>,
}

impl GateContext {
    fn audit(&self, event: GateAuditEvent) {
        if let Some(audit) = &self.audit {
            audit.record(event);
        }
    }

    fn execute(&self, invocation: &mut Invocation) -> GateOutcome {
        invocation.advance(GateState::Executing);
        match self.invoke_body(invocation.action.as_ref()) {
            Ok(summary) => {
                invocation.advance(GateState::Completed);
                info!(action = invocation.name(), "configuration action completed");
                self.audit(invocation.audit_event(GateDecision::Completed));
                self.notifier.notify(NotificationEvent::ActionCompleted {
                    action: invocation.name().to_string(),
                    message: summary.message.clone(),
                });
                GateOutcome::Completed(summary)
            }
            Err(source) => {
                let action = invocation.name().to_string();
                self.fail(invocation, GateError::ActionExecutionFailed { action, source })
            }
        }
    }

    fn invoke_body(&self, action: &dyn ConfigurationAction) -> Result<EffectSummary, ActionError> {
        match panic::catch_unwind(AssertUnwindSafe(|| action.execute())) {
            Ok(result) => result,
            Err(payload) => Err(ActionError::Panicked(panic_message(payload.as_ref()))),
        }
    }

    fn fail(&self, invocation: &mut Invocation, error: GateError) -> GateOutcome {
        invocation.advance(GateState::Failed(error.kind()));
        warn!(
            action = invocation.name(),
            kind = error.kind().as_str(),
            error = %error,
            "configuration action failed"
        );

        let action = invocation.name().to_string();
        let (decision, detail, event) = match &error {
            GateError::BrokerUnavailable { detail } => (
                GateDecision::BrokerUnavailable,
                detail.clone(),
                NotificationEvent::BrokerUnavailable { action },
            ),
            GateError::AuthorizationDenied => (
                GateDecision::Denied,
                None,
                NotificationEvent::AuthorizationDenied { action },
            ),
            GateError::ActionExecutionFailed { source, .. } => (
                GateDecision::ActionFailed,
                Some(source.to_string()),
                NotificationEvent::ActionFailed {
                    action,
                    error: source.to_string(),
                },
            ),
            GateError::PendingLimitReached { .. } => (
                GateDecision::PendingLimitReached,
                Some(error.to_string()),
                NotificationEvent::ActionFailed {
                    action,
                    error: error.to_string(),
                },
            ),
            GateError::SurfaceDetached { .. } => (
                GateDecision::Abandoned,
                Some(error.to_string()),
                NotificationEvent::ActionFailed {
                    action,
                    error: error.to_string(),
                },
            ),
        };

        let mut audit_event = invocation.audit_event(decision);
        if let Some(detail) = detail {
            audit_event = audit_event.detail(detail);
        }
        self.audit(audit_event);
        self.notifier.notify(event);
        GateOutcome::Failed(error)
    }

    fn resume(
        &self,
        mut invocation: Invocation,
        decision: Decision,
        completion: oneshot::Sender<GateOutcome>,
    ) {
        let outcome = match decision {
            Decision::Granted => {
                self.audit(invocation.audit_event(GateDecision::Granted));
                self.execute(&mut invocation)
            }
            Decision::Denied => self.fail(&mut invocation, GateError::AuthorizationDenied),
        };
        if completion.send(outcome).is_err() {
            debug!(action = invocation.name(), "gate completion receiver dropped");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

pub struct PermissionGate {
    client: Arc<dyn AuthorizationClient>,
    registry: Arc<PendingRequestRegistry>,
    ctx: GateContext,
}

impl PermissionGate {
    pub fn new(
        client: Arc<dyn AuthorizationClient>,
        registry: Arc<PendingRequestRegistry>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            client,
            registry,
            ctx: GateContext {
                notifier,
                audit: None,
            },
        }
    }

    pub fn with_audit(mut self, audit: Arc<AuditTrail>) -> Self {
        self.ctx.audit = Some(audit);
        self
    }

    pub fn registry(&self) -> &Arc<PendingRequestRegistry> {
        &self.registry
    }

    /// Run `action`, asking the broker first when it needs elevation.
    pub fn run(&self, action: Arc<dyn ConfigurationAction>) -> GateRun {
        let mut invocation = Invocation::new(action);
        invocation.advance(GateState::CheckingAuthorization);

        if invocation.action.privilege() == Privilege::Unprivileged {
            self.ctx
                .audit(invocation.audit_event(GateDecision::Unprivileged));
            return GateRun::Finished(self.ctx.execute(&mut invocation));
        }

        if !self.client.is_broker_reachable() {
            return GateRun::Finished(
                self.ctx
                    .fail(&mut invocation, GateError::broker_unavailable()),
            );
        }

        match self.client.current_authorization_state() {
            AuthorizationState::Granted => {
                self.ctx
                    .audit(invocation.audit_event(GateDecision::ImmediateGrant));
                GateRun::Finished(self.ctx.execute(&mut invocation))
            }
            AuthorizationState::Unavailable => GateRun::Finished(
                self.ctx
                    .fail(&mut invocation, GateError::broker_unavailable()),
            ),
            AuthorizationState::Unknown | AuthorizationState::Denied => {
                self.request_decision(invocation)
            }
        }
    }

    fn request_decision(&self, mut invocation: Invocation) -> GateRun {
        let token = RequestToken::next();
        let action = Arc::clone(&invocation.action);
        invocation.token = Some(token);
        invocation.advance(GateState::AwaitingDecision);

        let (completion_tx, completion_rx) = oneshot::channel();
        let ctx = self.ctx.clone();
        let resume = Box::new(move |decision: Decision| ctx.resume(invocation, decision, completion_tx));

        if let Err(err) = self.registry.register(token, action.name(), resume) {
            debug!(token = token.get(), error = %err, "could not park request");
            let name = action.name().to_string();
            let error = match err {
                RegistryError::Full { capacity } => GateError::PendingLimitReached {
                    action: name,
                    limit: capacity,
                },
                RegistryError::Closed | RegistryError::DuplicateToken(_) => {
                    GateError::SurfaceDetached { action: name }
                }
            };
            let mut invocation = Invocation::parked(action, token);
            return GateRun::Finished(self.ctx.fail(&mut invocation, error));
        }

        if let Err(err) = self.client.request_authorization(token) {
            if self.registry.discard(token) {
                let mut invocation = Invocation::parked(action, token);
                return GateRun::Finished(self.ctx.fail(
                    &mut invocation,
                    GateError::BrokerUnavailable {
                        detail: Some(format!("{err:#}")),
                    },
                ));
            }
            // A decision already consumed the entry; its completion is live.
            debug!(token = token.get(), error = %err, "request failed after resolution");
        } else {
            self.ctx.audit(
                GateAuditEvent::new(GateDecision::Requested)
                    .action(action.name())
                    .token(token),
            );
        }

        info!(
            action = action.name(),
            token = token.get(),
            "awaiting authorization decision"
        );
        GateRun::Pending(PendingGate {
            token,
            completion: completion_rx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::FnAction;
    use crate::broker::{DecisionListener, LocalBroker, SubscriptionId};
    use crate::notifications::MemoryNotificationSink;
    use crate::registry::ResolutionOutcome;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Harness {
        broker: Arc<LocalBroker>,
        registry: Arc<PendingRequestRegistry>,
        sink: Arc<MemoryNotificationSink>,
        gate: PermissionGate,
    }

    fn harness(broker: LocalBroker) -> Harness {
        let broker = Arc::new(broker);
        let registry = Arc::new(PendingRequestRegistry::new());
        let sink = Arc::new(MemoryNotificationSink::new());
        let gate = PermissionGate::new(broker.clone(), registry.clone(), sink.clone());
        Harness {
            broker,
            registry,
            sink,
            gate,
        }
    }

    fn counted(privilege: Privilege) -> (Arc<AtomicUsize>, Arc<dyn ConfigurationAction>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let action = FnAction::new("DAT directory", privilege, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(EffectSummary::new("done"))
        });
        (runs, Arc::new(action))
    }

    #[test]
    fn existing_grant_runs_immediately() {
        let h = harness(LocalBroker::granted());
        let (runs, action) = counted(Privilege::Elevated);

        let outcome = h.gate.run(action).into_finished().unwrap();
        assert!(outcome.is_completed());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(h.broker.requested_tokens().is_empty());
        assert_eq!(h.sink.len(), 1);
    }

    #[test]
    fn unreachable_broker_fails_without_running() {
        let broker = LocalBroker::granted();
        broker.set_reachable(false);
        let h = harness(broker);
        let (runs, action) = counted(Privilege::Elevated);

        let outcome = h.gate.run(action).into_finished().unwrap();
        assert_eq!(outcome.error_kind(), Some(ErrorKind::BrokerUnavailable));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(h.registry.is_empty());
        assert_eq!(
            h.sink.events(),
            vec![NotificationEvent::BrokerUnavailable {
                action: "DAT directory".to_string()
            }]
        );
    }

    #[test]
    fn unknown_state_parks_until_granted() {
        let h = harness(LocalBroker::new());
        let (runs, action) = counted(Privilege::Elevated);

        let mut pending = h.gate.run(action).into_pending().unwrap();
        assert_eq!(h.broker.last_requested(), Some(pending.token()));
        assert!(h.registry.contains(pending.token()));
        assert!(pending.try_outcome().is_none());
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        assert_eq!(
            h.registry.resolve(pending.token(), Decision::Granted),
            ResolutionOutcome::Resumed
        );
        assert!(pending.try_outcome().unwrap().is_completed());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(h.sink.len(), 1);
    }

    #[test]
    fn denial_fails_without_running() {
        let h = harness(LocalBroker::new());
        let (runs, action) = counted(Privilege::Elevated);

        let mut pending = h.gate.run(action).into_pending().unwrap();
        h.registry.resolve(pending.token(), Decision::Denied);

        let outcome = pending.try_outcome().unwrap();
        assert_eq!(outcome.error_kind(), Some(ErrorKind::AuthorizationDenied));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(h.sink.len(), 1);
    }

    #[test]
    fn unprivileged_actions_skip_the_broker() {
        let broker = LocalBroker::new();
        broker.set_reachable(false);
        let h = harness(broker);
        let (runs, action) = counted(Privilege::Unprivileged);

        assert!(h.gate.run(action).into_finished().unwrap().is_completed());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_body_is_reported_as_failure() {
        let h = harness(LocalBroker::granted());
        let action = Arc::new(FnAction::new("Explode", Privilege::Elevated, || {
            panic!("storage vanished")
        }));

        let outcome = h.gate.run(action).into_finished().unwrap();
        match outcome {
            GateOutcome::Failed(GateError::ActionExecutionFailed { source, .. }) => {
                assert!(matches!(source, ActionError::Panicked(ref msg) if msg == "storage vanished"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(h.sink.len(), 1);
    }

    #[test]
    fn panic_after_a_parked_grant_still_reaches_failed() {
        let h = harness(LocalBroker::new());
        let action = Arc::new(FnAction::new("Explode", Privilege::Elevated, || {
            panic!("boom")
        }));

        let mut pending = h.gate.run(action).into_pending().unwrap();
        let resolved = panic::catch_unwind(AssertUnwindSafe(|| {
            h.registry.resolve(pending.token(), Decision::Granted)
        }));

        assert_eq!(resolved.ok(), Some(ResolutionOutcome::Resumed));
        assert_eq!(
            pending.try_outcome().and_then(|outcome| outcome.error_kind()),
            Some(ErrorKind::ActionExecutionFailed)
        );
        assert_eq!(
            h.sink.events(),
            vec![NotificationEvent::ActionFailed {
                action: "Explode".to_string(),
                error: "action body panicked: boom".to_string(),
            }]
        );
    }

    #[test]
    fn requests_beyond_the_pending_limit_fail_with_one_notification() {
        let broker = Arc::new(LocalBroker::new());
        let registry = Arc::new(PendingRequestRegistry::with_capacity(1));
        let sink = Arc::new(MemoryNotificationSink::new());
        let gate = PermissionGate::new(broker.clone(), registry.clone(), sink.clone());
        let (runs, action) = counted(Privilege::Elevated);

        let pending = gate.run(Arc::clone(&action)).into_pending().unwrap();
        let outcome = gate.run(action).into_finished().unwrap();

        assert_eq!(outcome.error_kind(), Some(ErrorKind::PendingLimitReached));
        assert_eq!(broker.requested_tokens(), vec![pending.token()]);
        assert_eq!(registry.len(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(
            sink.events(),
            vec![NotificationEvent::ActionFailed {
                action: "DAT directory".to_string(),
                error: "DAT directory was not requested: 1 authorization requests are already waiting"
                    .to_string(),
            }]
        );
    }

    #[test]
    fn closed_registry_rejects_new_requests() {
        let h = harness(LocalBroker::new());
        h.registry.close();
        let (runs, action) = counted(Privilege::Elevated);

        let outcome = h.gate.run(action).into_finished().unwrap();
        assert_eq!(outcome.error_kind(), Some(ErrorKind::SurfaceDetached));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(h.broker.requested_tokens().is_empty());
    }

    #[test]
    fn closing_registry_abandons_pending_invocations() {
        let h = harness(LocalBroker::new());
        let (runs, action) = counted(Privilege::Elevated);

        let mut pending = h.gate.run(action).into_pending().unwrap();
        assert_eq!(h.registry.close().len(), 1);

        assert!(matches!(pending.try_outcome(), Some(GateOutcome::Abandoned)));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(h.sink.is_empty());
    }

    struct RejectingBroker;

    impl AuthorizationClient for RejectingBroker {
        fn is_broker_reachable(&self) -> bool {
            true
        }

        fn current_authorization_state(&self) -> AuthorizationState {
            AuthorizationState::Unknown
        }

        fn request_authorization(&self, _token: RequestToken) -> anyhow::Result<()> {
            anyhow::bail!("binder died")
        }

        fn add_decision_listener(&self, _listener: DecisionListener) -> SubscriptionId {
            SubscriptionId::from_raw(0)
        }

        fn remove_decision_listener(&self, _id: SubscriptionId) -> bool {
            false
        }
    }

    #[test]
    fn rejected_request_is_treated_as_unavailable() {
        let registry = Arc::new(PendingRequestRegistry::new());
        let sink = Arc::new(MemoryNotificationSink::new());
        let gate = PermissionGate::new(Arc::new(RejectingBroker), registry.clone(), sink.clone());
        let (runs, action) = counted(Privilege::Elevated);

        let outcome = gate.run(action).into_finished().unwrap();
        match outcome {
            GateOutcome::Failed(GateError::BrokerUnavailable { detail }) => {
                assert_eq!(detail.as_deref(), Some("binder died"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(registry.is_empty());
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn transitions_follow_the_state_machine() {
        assert!(GateState::Idle.can_transition_to(GateState::CheckingAuthorization));
        assert!(GateState::AwaitingDecision.can_transition_to(GateState::Abandoned));
        assert!(!GateState::Completed.can_transition_to(GateState::Executing));
        assert!(!GateState::Idle.can_transition_to(GateState::Executing));
        assert!(GateState::Failed(ErrorKind::AuthorizationDenied).is_terminal());
    }
}
