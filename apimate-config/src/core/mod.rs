pub mod audit;
pub mod entries;
pub mod gate;
pub mod notifications;
pub mod scripts;
pub mod settings;

pub use audit::AuditConfig;
pub use entries::{EntryConfig, FixedValuesConfig};
pub use gate::GateConfig;
pub use notifications::NotificationsConfig;
pub use scripts::ScriptsConfig;
pub use settings::SettingsConfig;
