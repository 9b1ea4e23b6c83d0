//! Storage layer for atarefa
//!
//! Persistent state is a set of independent keys, one JSON file each, under a
//! single store root:
//!
//! ```text
//! <root>/
//!   atarefa.toml                # Optional configuration
//!   people.json                 # people-collection: [Person]
//!   teams.json                  # teams-collection: [Team] (invitations embedded)
//!   current-team.json           # current-team-pointer: Team | null
//!   tasks.json                  # legacy ungrouped task partition
//!   tasks/
//!     <encoded team id>.json    # tasks:<teamId> partition
//!   current-user.json           # cached identity (aliases: currentUser.json, ...)
//! ```
//!
//! Collections are decoded leniently: entries that fail to decode are dropped
//! and reported, never fatal to the whole collection.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::lock::{self, KeyLock, DEFAULT_LOCK_TIMEOUT_MS};

const PEOPLE_FILE: &str = "people.json";
const TEAMS_FILE: &str = "teams.json";
const CURRENT_TEAM_FILE: &str = "current-team.json";
const LEGACY_TASKS_FILE: &str = "tasks.json";
const TASKS_DIR: &str = "tasks";
const JSON_EXT: &str = "json";

/// Task partition: one team's tasks, or the legacy ungrouped list
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Partition {
    Team(String),
    Legacy,
}

impl Partition {
    pub fn team(id: impl Into<String>) -> Self {
        Partition::Team(id.into())
    }

    /// Team id owning this partition (None for the legacy partition)
    pub fn team_id(&self) -> Option<&str> {
        match self {
            Partition::Team(id) => Some(id.as_str()),
            Partition::Legacy => None,
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Partition::Team(id) => write!(f, "tasks:{id}"),
            Partition::Legacy => write!(f, "tasks"),
        }
    }
}

/// Every persisted key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreKey {
    People,
    Teams,
    CurrentTeam,
    Tasks(Partition),
    /// Cached current-user record under one of its alias names
    CurrentUser(String),
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKey::People => write!(f, "people-collection"),
            StoreKey::Teams => write!(f, "teams-collection"),
            StoreKey::CurrentTeam => write!(f, "current-team-pointer"),
            StoreKey::Tasks(partition) => write!(f, "{partition}"),
            StoreKey::CurrentUser(alias) => write!(f, "current-user:{alias}"),
        }
    }
}

/// Result of a lenient collection read
#[derive(Debug, Clone)]
pub struct Decoded<T> {
    pub items: Vec<T>,
    /// Entries (or whole payloads) discarded because they failed to decode
    pub dropped: usize,
}

/// Storage manager rooted at one directory
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
    lock_timeout_ms: u64,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }

    pub fn with_lock_timeout(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = timeout_ms;
        self
    }

    /// Platform data directory used when no explicit store is given
    pub fn default_root() -> Result<PathBuf> {
        directories::ProjectDirs::from("", "", "atarefa")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| {
                Error::InvalidArgument(
                    "no home directory found; pass --store or set ATAREFA_STORE".to_string(),
                )
            })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the store directory structure
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(self.tasks_dir())?;
        Ok(())
    }

    // =========================================================================
    // Path accessors
    // =========================================================================

    pub fn tasks_dir(&self) -> PathBuf {
        self.root.join(TASKS_DIR)
    }

    /// File backing a key
    pub fn path_for(&self, key: &StoreKey) -> PathBuf {
        match key {
            StoreKey::People => self.root.join(PEOPLE_FILE),
            StoreKey::Teams => self.root.join(TEAMS_FILE),
            StoreKey::CurrentTeam => self.root.join(CURRENT_TEAM_FILE),
            StoreKey::Tasks(Partition::Legacy) => self.root.join(LEGACY_TASKS_FILE),
            StoreKey::Tasks(Partition::Team(id)) => self
                .tasks_dir()
                .join(format!("{}.{JSON_EXT}", encode_file_stem(id))),
            StoreKey::CurrentUser(alias) => self.root.join(format!("{alias}.{JSON_EXT}")),
        }
    }

    /// Acquire the exclusive lock serializing mutations of `key`
    pub fn lock_key(&self, key: &StoreKey) -> Result<KeyLock> {
        let path = self.path_for(key);
        KeyLock::acquire(lock::lock_path_for(&path), self.lock_timeout_ms)
    }

    // =========================================================================
    // Collections
    // =========================================================================

    /// Read a collection, dropping entries that fail to decode
    pub fn read_collection<T: DeserializeOwned>(&self, key: &StoreKey) -> Result<Decoded<T>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(Decoded {
                items: Vec::new(),
                dropped: 0,
            });
        }

        let content = fs::read_to_string(&path)?;
        let decoded = decode_entries(key, &content);
        if decoded.dropped > 0 {
            tracing::warn!(%key, dropped = decoded.dropped, "dropped malformed entries");
        }
        Ok(decoded)
    }

    /// Overwrite a collection (atomic, not locked)
    pub fn write_collection<T: Serialize>(&self, key: &StoreKey, items: &[T]) -> Result<()> {
        let json = serde_json::to_string_pretty(items)?;
        lock::write_atomic(self.path_for(key), json.as_bytes())
    }

    /// Locked read-modify-write of a collection
    ///
    /// The collection is written back only when `f` changed it or when
    /// malformed entries were dropped while reading.
    pub fn update_collection<T, R, F>(&self, key: &StoreKey, f: F) -> Result<R>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut Vec<T>) -> Result<R>,
    {
        let _lock = self.lock_key(key)?;

        let Decoded { mut items, dropped } = self.read_collection::<T>(key)?;
        let before = serde_json::to_string(&items)?;
        let result = f(&mut items)?;
        let after = serde_json::to_string(&items)?;

        if before != after || dropped > 0 {
            tracing::debug!(%key, entries = items.len(), "writing collection");
            self.write_collection(key, &items)?;
        }

        Ok(result)
    }

    // =========================================================================
    // Single values
    // =========================================================================

    /// Read a single value; an unreadable payload counts as absent
    pub fn read_value<T: DeserializeOwned>(&self, key: &StoreKey) -> Result<Option<T>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }
        match serde_json::from_str::<Option<T>>(&content) {
            Ok(value) => Ok(value),
            Err(err) => {
                tracing::warn!(%key, error = %err, "ignoring malformed value");
                Ok(None)
            }
        }
    }

    pub fn write_value<T: Serialize>(&self, key: &StoreKey, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        lock::write_atomic(self.path_for(key), json.as_bytes())
    }

    /// Delete a key; returns whether it existed
    pub fn remove_key(&self, key: &StoreKey) -> Result<bool> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        Ok(true)
    }

    // =========================================================================
    // Task partitions
    // =========================================================================

    /// Every partition present on disk, team partitions sorted by team id
    pub fn task_partitions(&self) -> Result<Vec<Partition>> {
        let mut partitions = Vec::new();

        let dir = self.tasks_dir();
        if dir.exists() {
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.extension().and_then(|ext| ext.to_str()) != Some(JSON_EXT) {
                    continue;
                }
                let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                    continue;
                };
                match decode_file_stem(stem) {
                    Some(id) => partitions.push(Partition::Team(id)),
                    None => {
                        tracing::warn!(path = %path.display(), "skipping unrecognized partition file")
                    }
                }
            }
        }
        partitions.sort();

        if self.path_for(&StoreKey::Tasks(Partition::Legacy)).exists() {
            partitions.push(Partition::Legacy);
        }

        Ok(partitions)
    }
}

fn decode_entries<T: DeserializeOwned>(key: &StoreKey, content: &str) -> Decoded<T> {
    if content.trim().is_empty() {
        return Decoded {
            items: Vec::new(),
            dropped: 0,
        };
    }

    let entries = match serde_json::from_str::<Value>(content) {
        Ok(Value::Array(entries)) => entries,
        Ok(Value::Null) => Vec::new(),
        Ok(_) => {
            tracing::warn!(%key, "collection payload is not an array");
            return Decoded {
                items: Vec::new(),
                dropped: 1,
            };
        }
        Err(err) => {
            tracing::warn!(%key, error = %err, "collection payload is not valid JSON");
            return Decoded {
                items: Vec::new(),
                dropped: 1,
            };
        }
    };

    let mut items = Vec::with_capacity(entries.len());
    let mut dropped = 0;
    for entry in entries {
        match serde_json::from_value::<T>(entry) {
            Ok(item) => items.push(item),
            Err(err) => {
                tracing::debug!(%key, error = %err, "dropping entry");
                dropped += 1;
            }
        }
    }

    Decoded { items, dropped }
}

/// Injective file-stem encoding of a team id
///
/// ASCII alphanumerics and `-` are kept; every other byte becomes `_xx`.
fn encode_file_stem(id: &str) -> String {
    let mut stem = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            stem.push(byte as char);
        } else {
            stem.push_str(&format!("_{byte:02x}"));
        }
    }
    if stem.is_empty() {
        "_".to_string()
    } else {
        stem
    }
}

fn decode_file_stem(stem: &str) -> Option<String> {
    if stem == "_" {
        return Some(String::new());
    }

    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        let byte = bytes[idx];
        if byte == b'_' {
            let hex = stem.get(idx + 1..idx + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            idx += 3;
        } else if byte.is_ascii_alphanumeric() || byte == b'-' {
            out.push(byte);
            idx += 1;
        } else {
            return None;
        }
    }
    String::from_utf8(out).ok()
}
