//! Persisted service preferences.
//!
//! Two facts survive restarts: whether NFC should come up enabled, and
//! whether this is the very first boot (which triggers a one-time
//! controller factory reset). They are stored as a small JSON document;
//! writes go to a sibling temp file first and are renamed into place so a
//! crash mid-write cannot corrupt the store.

use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// The persisted preference set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    /// Whether the adapter should be enabled at boot.
    #[serde(default = "default_true")]
    pub nfc_on: bool,

    /// Whether the one-time first-boot work is still outstanding.
    #[serde(default = "default_true")]
    pub first_boot: bool,

    /// When this document was last written.
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl Default for Preferences {
    fn default() -> Self {
        Preferences {
            nfc_on: true,
            first_boot: true,
            updated_at: Utc::now(),
        }
    }
}

/// Storage backend for [`Preferences`].
pub trait PreferenceStore: Send + Sync {
    /// Load the current preferences. A missing store yields the defaults.
    fn load(&self) -> Result<Preferences>;

    /// Persist the given preferences.
    fn store(&self, prefs: &Preferences) -> Result<()>;
}

/// JSON-file preference store.
///
/// # Examples
///
/// ```no_run
/// use nearfield_service::prefs::{JsonPreferenceStore, PreferenceStore};
///
/// let store = JsonPreferenceStore::new("/var/lib/nearfield/prefs.json");
/// let mut prefs = store.load()?;
/// prefs.nfc_on = false;
/// store.store(&prefs)?;
/// # Ok::<(), nearfield_service::ServiceError>(())
/// ```
#[derive(Debug)]
pub struct JsonPreferenceStore {
    path: PathBuf,
}

impl JsonPreferenceStore {
    /// Create a store backed by the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonPreferenceStore { path: path.into() }
    }

    /// The file backing this store.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for JsonPreferenceStore {
    fn load(&self) -> Result<Preferences> {
        match std::fs::read(&self.path) {
            Ok(raw) => Ok(serde_json::from_slice(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no preference file, using defaults");
                Ok(Preferences::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, prefs: &Preferences) -> Result<()> {
        let raw = serde_json::to_vec_pretty(prefs)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, raw)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// In-memory preference store for tests and embedders without persistent
/// storage.
#[derive(Debug)]
pub struct MemoryPreferenceStore {
    inner: Mutex<Preferences>,
}

impl MemoryPreferenceStore {
    /// Create a store holding the given initial preferences.
    #[must_use]
    pub fn new(initial: Preferences) -> Self {
        MemoryPreferenceStore {
            inner: Mutex::new(initial),
        }
    }
}

impl Default for MemoryPreferenceStore {
    fn default() -> Self {
        Self::new(Preferences::default())
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn load(&self) -> Result<Preferences> {
        Ok(self.inner.lock().unwrap().clone())
    }

    fn store(&self, prefs: &Preferences) -> Result<()> {
        *self.inner.lock().unwrap() = prefs.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_on_and_first_boot() {
        let prefs = Preferences::default();
        assert!(prefs.nfc_on);
        assert!(prefs.first_boot);
    }

    #[test]
    fn json_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonPreferenceStore::new(dir.path().join("prefs.json"));

        // Missing file loads defaults.
        let mut prefs = store.load().unwrap();
        assert!(prefs.first_boot);

        prefs.nfc_on = false;
        prefs.first_boot = false;
        prefs.updated_at = Utc::now();
        store.store(&prefs).unwrap();

        let reloaded = store.load().unwrap();
        assert!(!reloaded.nfc_on);
        assert!(!reloaded.first_boot);
    }

    #[test]
    fn json_store_tolerates_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, br#"{"nfc_on": false}"#).unwrap();

        let store = JsonPreferenceStore::new(path);
        let prefs = store.load().unwrap();
        assert!(!prefs.nfc_on);
        assert!(prefs.first_boot);
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryPreferenceStore::default();
        let mut prefs = store.load().unwrap();
        prefs.first_boot = false;
        store.store(&prefs).unwrap();
        assert!(!store.load().unwrap().first_boot);
    }
}
