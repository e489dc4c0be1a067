//! Well-known keys and default values.

/// Display name used in the version summary.
pub const APP_NAME: &str = "apimate";

/// File name looked up by [`crate::ConfigManager`].
pub const CONFIG_FILE_NAME: &str = "apimate.toml";

/// Environment variable pointing at an explicit configuration file.
pub const CONFIG_PATH_ENV: &str = "APIMATE_CONFIG_PATH";

pub mod keys {
    pub const PREPARE: &str = "prepare";
    pub const OPEN_DEFAULT: &str = "open_default";
    pub const SHOW_LOG: &str = "show_log";
    pub const VERSION: &str = "version";
    pub const ANDROID_DATA_DIR: &str = "android_data_dir";
}

pub mod defaults {
    /// DAT directory written by the fixed-value action.
    pub const DAT_DIRECTORY: &str =
        "/storage/emulated/0/Android/data/jp.co.airfront.android.a2chMate/files/2chMate/DAT";

    pub const NOT_SET_SUMMARY: &str = "Not set";
    pub const INBOX_CAPACITY: usize = 32;
    pub const AUDIT_DIRECTORY: &str = "~/.apimate/audit";
    pub const SETTINGS_FILE: &str = "~/.apimate/settings.toml";
}
