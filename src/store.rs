// Operator state persisted across sessions (keys and thresholds).
// The browser dashboard kept these in localStorage under fixed slot names;
// the console keeps a JSON state file with the same contract.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::models::Thresholds;

const ADMIN_KEY_SLOT: &str = "sorti.admin_key";
const INGEST_KEY_SLOT: &str = "sorti.ingest_key";
const THRESHOLDS_SLOT: &str = "sorti.thresholds";

/// File-backed key/value store. Every setter persists immediately; the
/// secrets never leave this process except as the documented auth headers.
pub struct ClientStore {
    path: PathBuf,
    slots: Mutex<BTreeMap<String, serde_json::Value>>,
}

impl ClientStore {
    /// Load an existing state file or start empty. A corrupt file is
    /// discarded with a warning rather than blocking startup.
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let slots = match std::fs::read_to_string(&path) {
            Ok(s) => match serde_json::from_str(&s) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        path = %path.display(),
                        "state file is corrupt; starting empty"
                    );
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            slots: Mutex::new(slots),
        })
    }

    /// A poisoned lock still holds valid data; the writer never panics
    /// while holding it.
    fn slots(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, serde_json::Value>> {
        self.slots
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn admin_key(&self) -> Option<String> {
        self.get_string(ADMIN_KEY_SLOT)
    }

    pub fn set_admin_key(&self, key: &str) -> anyhow::Result<()> {
        self.put(ADMIN_KEY_SLOT, serde_json::Value::String(key.to_string()))
    }

    pub fn ingest_key(&self) -> Option<String> {
        self.get_string(INGEST_KEY_SLOT)
    }

    pub fn set_ingest_key(&self, key: &str) -> anyhow::Result<()> {
        self.put(INGEST_KEY_SLOT, serde_json::Value::String(key.to_string()))
    }

    /// Stored thresholds, or the defaults when none were saved yet.
    pub fn thresholds(&self) -> Thresholds {
        self.slots()
            .get(THRESHOLDS_SLOT)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    /// Validates before accepting; an invalid pair leaves the stored value
    /// untouched.
    pub fn set_thresholds(&self, warn: f64, critical: f64) -> anyhow::Result<Thresholds> {
        let thresholds = Thresholds::new(warn, critical)?;
        self.put(THRESHOLDS_SLOT, serde_json::to_value(thresholds)?)?;
        Ok(thresholds)
    }

    fn get_string(&self, slot: &str) -> Option<String> {
        self.slots()
            .get(slot)
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }

    fn put(&self, slot: &str, value: serde_json::Value) -> anyhow::Result<()> {
        let mut slots = self.slots();
        slots.insert(slot.to_string(), value);
        let body = serde_json::to_string_pretty(&*slots)?;
        std::fs::write(&self.path, body)?;
        Ok(())
    }
}
