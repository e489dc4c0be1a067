//! Concrete configuration actions.

mod fixed_value;
mod prepare;
mod show_log;

pub use fixed_value::FixedValueAction;
pub use prepare::{DAT_DIR_ENV, PrepareResourceAction};
pub use show_log::ShowLogAction;
