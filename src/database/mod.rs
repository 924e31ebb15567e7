// ==================== JSON RECORD STORE ====================
// One JSON document per key space (users.json, meter_data.json).
// Reads and writes always move the whole document.

use crate::utils::error::AppError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeySpace {
    /// user id -> apartment number
    Users,
    /// user id -> list of readings
    MeterData,
}

impl KeySpace {
    pub const ALL: [KeySpace; 2] = [KeySpace::Users, KeySpace::MeterData];

    pub fn file_name(self) -> &'static str {
        match self {
            KeySpace::Users => "users.json",
            KeySpace::MeterData => "meter_data.json",
        }
    }
}

/// Outcome of an `update` closure: whether the mutated mapping is written back
#[derive(Debug)]
pub enum StoreUpdate<R> {
    Commit(R),
    Discard(R),
}

#[derive(Clone)]
pub struct JsonStore {
    data_dir: PathBuf,
    locks: Arc<HashMap<KeySpace, Mutex<()>>>,
}

impl JsonStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let locks = KeySpace::ALL
            .iter()
            .map(|space| (*space, Mutex::new(())))
            .collect();

        Self {
            data_dir: data_dir.into(),
            locks: Arc::new(locks),
        }
    }

    pub fn path(&self, space: KeySpace) -> PathBuf {
        self.data_dir.join(space.file_name())
    }

    /// Loads the whole mapping. A missing file is an empty mapping.
    pub fn load<V: DeserializeOwned>(
        &self,
        space: KeySpace,
    ) -> Result<BTreeMap<String, V>, AppError> {
        let _guard = self.lock(space);
        self.read(space)
    }

    /// Replaces the whole mapping
    pub fn save<V: Serialize>(
        &self,
        space: KeySpace,
        mapping: &BTreeMap<String, V>,
    ) -> Result<(), AppError> {
        let _guard = self.lock(space);
        self.write(space, mapping)
    }

    /// Load, mutate and save under the key space lock, so concurrent
    /// read-modify-write cycles never lose each other's changes
    pub fn update<V, F, R>(&self, space: KeySpace, f: F) -> Result<R, AppError>
    where
        V: DeserializeOwned + Serialize,
        F: FnOnce(&mut BTreeMap<String, V>) -> StoreUpdate<R>,
    {
        let _guard = self.lock(space);
        let mut mapping = self.read(space)?;

        match f(&mut mapping) {
            StoreUpdate::Commit(result) => {
                self.write(space, &mapping)?;
                Ok(result)
            }
            StoreUpdate::Discard(result) => Ok(result),
        }
    }

    fn lock(&self, space: KeySpace) -> std::sync::MutexGuard<'_, ()> {
        // Every key space gets a lock in `new`
        self.locks[&space]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn read<V: DeserializeOwned>(&self, space: KeySpace) -> Result<BTreeMap<String, V>, AppError> {
        let path = self.path(space);

        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("📂 {} not found, starting empty", path.display());
                return Ok(BTreeMap::new());
            }
            Err(e) => {
                return Err(AppError::StorageError(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        serde_json::from_str(&raw).map_err(|e| {
            AppError::StorageError(format!("Corrupt JSON in {}: {}", path.display(), e))
        })
    }

    /// Writes to a sibling temp file, then renames it over the target
    fn write<V: Serialize>(
        &self,
        space: KeySpace,
        mapping: &BTreeMap<String, V>,
    ) -> Result<(), AppError> {
        fs::create_dir_all(&self.data_dir)?;

        let path = self.path(space);
        let tmp_path = self.data_dir.join(format!(".{}.tmp", space.file_name()));

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        mapping.serialize(&mut serializer)?;

        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(&buf)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp_path, &path).map_err(|e| {
            AppError::StorageError(format!("Failed to replace {}: {}", path.display(), e))
        })?;

        log::debug!("💾 Saved {} ({} keys)", path.display(), mapping.len());
        Ok(())
    }
}
