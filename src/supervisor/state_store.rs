//! Durable per-target state records.
//!
//! Records are the only continuity between separate host invocations. Reads
//! never fail: an absent or corrupt file is an empty record. Writes go to a
//! temporary file in the same directory and are renamed into place, so a
//! concurrent reader sees either the old or the new record.
//!
//! Concurrent writers for the same target are not serialized; the last
//! rename wins.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Mutex;

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::target::Target;
use crate::models::record::StateRecord;
use crate::{AppError, Result};

/// Storage for [`StateRecord`]s keyed by target.
pub trait StateStore: Send + Sync {
    /// Last record written for `target`, or an empty record.
    fn read(&self, target: &Target) -> StateRecord;

    /// Replace the record for `target`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the record cannot be persisted.
    fn write(&self, target: &Target, record: &StateRecord) -> Result<()>;

    /// Replace the record for `target` with an empty one.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the record cannot be persisted.
    fn clear(&self, target: &Target) -> Result<()> {
        self.write(target, &StateRecord::default())
    }
}

/// JSON files at [`Target::state_path`].
#[derive(Debug, Default, Clone, Copy)]
pub struct FileStateStore;

impl StateStore for FileStateStore {
    fn read(&self, target: &Target) -> StateRecord {
        let path = &target.state_path;
        let Ok(raw) = std::fs::read_to_string(path) else {
            return StateRecord::default();
        };
        serde_json::from_str(&raw).unwrap_or_else(|err| {
            warn!(path = %path.display(), %err, "corrupt state record treated as empty");
            StateRecord::default()
        })
    }

    fn write(&self, target: &Target, record: &StateRecord) -> Result<()> {
        let path = &target.state_path;
        let parent = path
            .parent()
            .ok_or_else(|| AppError::Io("state path has no parent directory".into()))?;
        std::fs::create_dir_all(parent).map_err(|err| {
            AppError::Io(format!(
                "failed to create state directory {}: {err}",
                parent.display()
            ))
        })?;

        let body = serde_json::to_string_pretty(record)
            .map_err(|err| AppError::Io(format!("failed to serialize state record: {err}")))?;

        let mut tmp = NamedTempFile::new_in(parent)
            .map_err(|err| AppError::Io(format!("failed to create temporary file: {err}")))?;
        tmp.write_all(body.as_bytes())
            .map_err(|err| AppError::Io(format!("failed to write temporary file: {err}")))?;
        tmp.persist(path).map_err(|err| {
            AppError::Io(format!(
                "failed to persist state to {}: {err}",
                path.display()
            ))
        })?;

        debug!(path = %path.display(), pid = ?record.pid, "state record written");
        Ok(())
    }
}

/// In-process store keyed by state path, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    records: Mutex<HashMap<std::path::PathBuf, StateRecord>>,
}

impl StateStore for MemoryStateStore {
    fn read(&self, target: &Target) -> StateRecord {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&target.state_path)
            .cloned()
            .unwrap_or_default()
    }

    fn write(&self, target: &Target, record: &StateRecord) -> Result<()> {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(target.state_path.clone(), record.clone());
        Ok(())
    }
}
