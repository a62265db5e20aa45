//! JSON persistence for destinations and the last noise configuration
//!
//! The whole document is rewritten on every change: serialized to a sibling
//! temp file, then renamed over the original. A missing file is an empty store.
//! Writes block on disk I/O, so async callers run them on the blocking pool.

use noise_core::{Destination, NoiseConfig};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoreData {
    #[serde(default)]
    pub destinations: BTreeMap<String, Destination>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noise_config: Option<NoiseConfig>,
}

#[derive(Debug)]
pub enum StoreError {
    Io { path: PathBuf, source: std::io::Error },
    Corrupt { path: PathBuf, source: serde_json::Error },
    Serialize(serde_json::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "store I/O on {}: {}", path.display(), source),
            Self::Corrupt { path, source } => {
                write!(f, "store file {} is not valid: {}", path.display(), source)
            }
            Self::Serialize(e) => write!(f, "store serialization failed: {}", e),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Corrupt { source, .. } => Some(source),
            Self::Serialize(e) => Some(e),
        }
    }
}

pub struct Store {
    path: PathBuf,
    data: Mutex<StoreData>,
}

impl Store {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let data = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => StoreData::default(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        debug!(
            path = %path.display(),
            destinations = data.destinations.len(),
            "Store loaded"
        );
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    pub fn destinations(&self) -> Vec<Destination> {
        self.lock().destinations.values().cloned().collect()
    }

    pub fn destination(&self, id: &str) -> Option<Destination> {
        self.lock().destinations.get(id).cloned()
    }

    /// Destinations keyed by id, as the scheduler resolves them.
    pub fn destination_map(&self) -> HashMap<String, Destination> {
        self.lock()
            .destinations
            .iter()
            .map(|(id, destination)| (id.clone(), destination.clone()))
            .collect()
    }

    /// Create or replace a destination. An empty id gets a generated one.
    pub fn upsert_destination(&self, mut destination: Destination) -> Result<Destination, StoreError> {
        if destination.id.trim().is_empty() {
            destination.id = Uuid::new_v4().to_string();
        }
        let mut data = self.lock();
        let mut next = data.clone();
        next.destinations
            .insert(destination.id.clone(), destination.clone());
        self.commit(&mut data, next)?;
        Ok(destination)
    }

    /// Returns false when no destination had this id.
    pub fn remove_destination(&self, id: &str) -> Result<bool, StoreError> {
        let mut data = self.lock();
        if !data.destinations.contains_key(id) {
            return Ok(false);
        }
        let mut next = data.clone();
        next.destinations.remove(id);
        self.commit(&mut data, next)?;
        Ok(true)
    }

    pub fn noise_config(&self) -> Option<NoiseConfig> {
        self.lock().noise_config.clone()
    }

    pub fn save_noise_config(&self, config: &NoiseConfig) -> Result<(), StoreError> {
        let mut data = self.lock();
        let mut next = data.clone();
        next.noise_config = Some(config.clone());
        self.commit(&mut data, next)
    }

    fn lock(&self) -> MutexGuard<'_, StoreData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Persist `next`, then make it current. Memory is untouched if the write fails.
    fn commit(&self, current: &mut StoreData, next: StoreData) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(&next).map_err(StoreError::Serialize)?;
        write_atomic(&self.path, &bytes).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        *current = next;
        Ok(())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let mut file = std::fs::File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    std::fs::rename(&tmp, path)
}
