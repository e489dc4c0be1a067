use super::*;

use crate::constants::{defaults, keys};
use crate::loader::layers::ConfigLayerSource;
use pretty_assertions::assert_eq;
use std::fs;

#[test]
fn defaults_cover_the_shipped_entries() {
    let config = ApimateConfig::default();
    config.validate().expect("default config must validate");

    let entry_keys: Vec<&str> = config.entries.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(
        entry_keys,
        vec![
            keys::PREPARE,
            keys::OPEN_DEFAULT,
            keys::SHOW_LOG,
            keys::VERSION,
            keys::ANDROID_DATA_DIR,
        ]
    );
    assert_eq!(config.fixed_values.dat_directory, defaults::DAT_DIRECTORY);
    assert_eq!(config.gate.inbox_capacity, defaults::INBOX_CAPACITY);
    assert!(!config.audit.enabled);
}

#[test]
fn partial_toml_keeps_defaults() {
    let config = ApimateConfig::from_toml_str(
        r#"
        [gate]
        inbox_capacity = 4

        [settings]
        not_set_summary = "Unset"
        "#,
    )
    .expect("partial config parses");

    assert_eq!(config.gate.inbox_capacity, 4);
    assert_eq!(config.settings.not_set_summary, "Unset");
    assert_eq!(config.entries.len(), 5);
}

#[test]
fn duplicate_entry_keys_are_rejected() {
    let err = ApimateConfig::from_toml_str(
        r#"
        [[entries]]
        key = "android_data_dir"
        label = "DAT directory"

        [[entries]]
        key = "android_data_dir"
        label = "Again"
        "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("duplicate configuration entry key"));
}

#[test]
fn zero_inbox_capacity_is_rejected() {
    let err = ApimateConfig::from_toml_str("[gate]\ninbox_capacity = 0").unwrap_err();
    assert!(err.to_string().contains("inbox_capacity"));
}

#[test]
fn file_layer_overrides_user_layer() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let user = dir.path().join("user.toml");
    let file = dir.path().join("apimate.toml");
    fs::write(
        &user,
        "[notifications]\nenabled = false\n[gate]\ninbox_capacity = 2\n",
    )
    .expect("write user config");
    fs::write(&file, "[gate]\ninbox_capacity = 16\n").expect("write file config");

    let manager = ConfigBuilder::new()
        .user_config(user)
        .config_file(file.clone())
        .build()
        .expect("config builds");

    assert_eq!(manager.config().gate.inbox_capacity, 16);
    assert!(!manager.config().notifications.enabled);
    assert_eq!(manager.config_path(), Some(file.as_path()));
    assert_eq!(manager.base_dir(), Some(dir.path()));

    let layers = manager.layer_stack().layers();
    assert_eq!(layers.len(), 2);
    assert!(matches!(layers[0].source, ConfigLayerSource::User { .. }));
    assert!(matches!(layers[1].source, ConfigLayerSource::File { .. }));
}

#[test]
fn runtime_overrides_apply_last() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.path().join("apimate.toml");
    fs::write(&file, "[fixed_values]\ndat_directory = \"/from/file\"\n").expect("write config");

    let manager = ConfigBuilder::new()
        .user_config(dir.path().join("missing.toml"))
        .config_file(file)
        .runtime_override(
            "fixed_values.dat_directory",
            toml::Value::String("/from/runtime".to_string()),
        )
        .runtime_override("gate.inbox_capacity", toml::Value::Integer(8))
        .runtime_overrides(&[("settings.not_set_summary".to_string(), "Unset".to_string())])
        .build()
        .expect("config builds");

    assert_eq!(manager.config().fixed_values.dat_directory, "/from/runtime");
    assert_eq!(manager.config().gate.inbox_capacity, 8);
    assert_eq!(manager.config().settings.not_set_summary, "Unset");
    assert!(matches!(
        manager.layer_stack().layers().last().map(|l| &l.source),
        Some(ConfigLayerSource::Runtime)
    ));
}

#[test]
fn invalid_runtime_override_fails_validation() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let result = ConfigBuilder::new()
        .user_config(dir.path().join("missing.toml"))
        .runtime_override("gate.inbox_capacity", toml::Value::Integer(0))
        .build();
    assert!(result.is_err());
}

#[test]
fn missing_layers_fall_back_to_defaults() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let manager = ConfigBuilder::new()
        .user_config(dir.path().join("missing.toml"))
        .build()
        .expect("defaults load");
    assert_eq!(manager.config(), &ApimateConfig::default());
    assert!(manager.config_path().is_none());
}

#[test]
fn saved_config_round_trips_through_loader() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let path = dir.path().join("apimate.toml");

    let mut config = ApimateConfig::default();
    config.audit.enabled = true;
    config.scripts.prepare = Some("mkdir -p \"$APIMATE_TARGET\"".to_string());
    ConfigManager::save_config_to_path(&path, &config).expect("save");

    let manager = ConfigBuilder::new()
        .user_config(dir.path().join("missing.toml"))
        .config_file(path)
        .build()
        .expect("reload");
    assert_eq!(manager.config(), &config);
}

#[test]
fn expand_home_leaves_plain_paths_alone() {
    assert_eq!(
        expand_home("/var/lib/apimate"),
        std::path::PathBuf::from("/var/lib/apimate")
    );
    if let Some(home) = dirs::home_dir() {
        assert_eq!(expand_home("~/.apimate/audit"), home.join(".apimate/audit"));
    }
}

#[test]
#[serial_test::serial]
fn load_honours_config_path_env() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let path = dir.path().join("custom.toml");
    fs::write(&path, "[gate]\ninbox_capacity = 3\n").expect("write config");

    // SAFETY: serialised with every other test that touches the environment.
    unsafe { std::env::set_var(crate::constants::CONFIG_PATH_ENV, &path) };
    let loaded = ConfigManager::load();
    unsafe { std::env::remove_var(crate::constants::CONFIG_PATH_ENV) };

    let manager = loaded.expect("config loads from env path");
    assert_eq!(manager.config().gate.inbox_capacity, 3);
    assert_eq!(manager.config_path(), Some(path.as_path()));
}
