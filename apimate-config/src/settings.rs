//! Key/value persistence for configuration entries.
//!
//! Both operations are synchronous and locally durable. There is no
//! transactional guarantee across keys.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use hashbrown::HashMap;
use parking_lot::RwLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("failed to write settings to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub trait SettingsRepository: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<(), SettingsError>;
}

/// Process-local settings, mostly for tests and ephemeral hosts.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RwLock<HashMap<String, String>>,
    writes: RwLock<u64>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<K, V>(values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: RwLock::new(
                values
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
            writes: RwLock::new(0),
        }
    }

    /// Number of successful `set` calls.
    pub fn writes(&self) -> u64 {
        *self.writes.read()
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl SettingsRepository for MemorySettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        self.values
            .write()
            .insert(key.to_string(), value.to_string());
        *self.writes.write() += 1;
        Ok(())
    }
}

/// Settings stored as a flat TOML table of strings.
///
/// Every `set` rewrites the whole file through a temporary file in the same
/// directory followed by a rename, so readers never observe a torn file.
#[derive(Debug)]
pub struct FileSettings {
    path: PathBuf,
    values: RwLock<BTreeMap<String, String>>,
}

impl FileSettings {
    /// Open the settings file, starting empty when it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).map_err(|source| SettingsError::Parse {
                path: path.clone(),
                source,
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(SettingsError::Read { path, source }),
        };

        tracing::debug!(path = %path.display(), keys = values.len(), "settings loaded");
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<(), SettingsError> {
        let content = toml::to_string(values)?;
        let write_err = |source| SettingsError::Write {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(write_err)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(write_err)?;
        tmp.write_all(content.as_bytes()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&self.path)
            .map_err(|err| write_err(err.error))?;
        Ok(())
    }
}

impl SettingsRepository for FileSettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        let mut values = self.values.write();
        let previous = values.insert(key.to_string(), value.to_string());
        if let Err(err) = self.persist(&values) {
            match previous {
                Some(previous) => values.insert(key.to_string(), previous),
                None => values.remove(key),
            };
            return Err(err);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;

    #[test]
    fn memory_settings_count_writes() {
        let settings = MemorySettings::with_values([("version", "1")]);
        assert_eq!(settings.get("version").as_deref(), Some("1"));
        assert_eq!(settings.writes(), 0);

        settings.set("android_data_dir", "/data/DAT").unwrap();
        assert_eq!(settings.get("android_data_dir").as_deref(), Some("/data/DAT"));
        assert_eq!(settings.writes(), 1);
        assert_eq!(settings.len(), 2);
    }

    #[test]
    fn file_settings_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.toml");

        let settings = FileSettings::open(&path).unwrap();
        assert!(settings.get("android_data_dir").is_none());
        settings.set("android_data_dir", "/storage/DAT").unwrap();

        let reopened = FileSettings::open(&path).unwrap();
        assert_eq!(
            reopened.get("android_data_dir").as_deref(),
            Some("/storage/DAT")
        );
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "not = [valid").unwrap();

        let err = FileSettings::open(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
    }
}
