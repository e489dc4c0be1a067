//! Permission-gated configuration actions.
//!
//! A hosting surface displays a list of configuration entries. Triggering
//! one runs its [`ConfigurationAction`] through the [`PermissionGate`],
//! which consults the authorization broker and either executes the action,
//! fails it with a user-facing notification, or parks it until the broker
//! delivers a decision for its [`RequestToken`].
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use apimate_config::{ApimateConfig, MemorySettings};
//! use apimate_core::{
//!     EntryList, FixedValueAction, HostingSurface, LocalBroker, NotificationManager,
//!     SurfaceOptions,
//! };
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = ApimateConfig::default();
//! let settings = Arc::new(MemorySettings::new());
//! let mut entries = EntryList::from_config(&config, settings.clone())?;
//! entries.bind(
//!     "android_data_dir",
//!     Arc::new(FixedValueAction::dat_directory(&config, settings)),
//! )?;
//!
//! let surface = HostingSurface::attach(
//!     Arc::new(LocalBroker::granted()),
//!     entries,
//!     Arc::new(NotificationManager::new()),
//!     SurfaceOptions::from_config(&config.gate),
//! );
//! surface.trigger("android_data_dir")?;
//! surface.teardown();
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod actions;
pub mod audit;
pub mod broker;
pub mod entries;
pub mod error;
pub mod gate;
pub mod notifications;
pub mod registry;
pub mod surface;

pub use action::{ConfigurationAction, EffectSummary, FnAction, Privilege};
pub use actions::{FixedValueAction, PrepareResourceAction, ShowLogAction};
pub use audit::{AuditTrail, GateAuditEvent, GateDecision, PermissionAuditLog};
pub use broker::{
    AuthorizationClient, AuthorizationState, BrokerSubscription, Decision, DecisionListener,
    LocalBroker, RequestToken, SubscriptionId,
};
pub use entries::{ConfigurationEntry, EntryList, EntryRow, SummarySource};
pub use error::{ActionError, ErrorKind, GateError, RegistryError, SurfaceError};
pub use gate::{GateOutcome, GateRun, GateState, PendingGate, PermissionGate};
pub use notifications::{
    DisplaySurface, MemoryDisplay, MemoryNotificationSink, NotificationEvent, NotificationManager,
    NotificationSink,
};
pub use registry::{PendingRequest, PendingRequestRegistry, ResolutionOutcome};
pub use surface::{DecisionInbox, Delivery, HostingSurface, SurfaceOptions, TeardownReport};
