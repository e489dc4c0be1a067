//! # apimate
//!
//! Permission-gated configuration actions backed by an out-of-process
//! authorization broker.
//!
//! A settings screen lists configuration entries. Some of them change state
//! that needs elevated access, such as pointing the app at a shared DAT
//! directory or running a script that prepares it. Triggering such an entry
//! runs its action through a permission gate that asks the broker, waits
//! for the user's decision when needed, and reports every outcome as one
//! transient notification.
//!
//! ## Workspace
//!
//! - `apimate-config/` loads `apimate.toml` through layered TOML files and
//!   provides the settings repository actions write through.
//! - `apimate-core/` holds the broker boundary, the pending-request registry,
//!   the gate state machine, the shipped actions, notifications, the audit
//!   log, and the hosting surface lifecycle.
//! - `apimate-script-runner/` executes the prepare and probe scripts behind a
//!   directory policy.
//!
//! ## Quickstart
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use apimate::{ConfigManager, LocalBroker, ScreenBuilder, init_tracing};
//!
//! # fn main() -> anyhow::Result<()> {
//! init_tracing("apimate=info");
//! let manager = ConfigManager::load()?;
//! let surface = ScreenBuilder::from_manager(&manager, Arc::new(LocalBroker::new())).build()?;
//!
//! for row in surface.rows() {
//!     println!("{}: {}", row.label, row.summary.unwrap_or_default());
//! }
//! surface.teardown();
//! # Ok(())
//! # }
//! ```

pub mod logging;
pub mod screen;

pub use apimate_config::{ApimateConfig, ConfigBuilder, ConfigManager, FileSettings, MemorySettings};
pub use apimate_core::*;
pub use logging::init_tracing;
pub use screen::ScreenBuilder;
