//! In-memory storage backend
//!
//! Default storage implementation using a hashmap.
//! Suitable for development and single-instance deployments.
//! Data is lost on restart.

use async_trait::async_trait;
use installgate_core::InstallationRecord;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, info};

use super::{InstallationStore, StorageError};

/// In-memory installation store
#[derive(Debug, Default)]
pub struct MemoryStore {
    installations: RwLock<HashMap<String, InstallationRecord>>,
}

impl MemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned<T>(_: T) -> StorageError {
        StorageError::Database("installation map lock poisoned".into())
    }
}

#[async_trait]
impl InstallationStore for MemoryStore {
    async fn upsert(&self, record: InstallationRecord) -> Result<(), StorageError> {
        let mut installations = self.installations.write().map_err(Self::poisoned)?;
        let replaced = installations.contains_key(&record.installation_id);
        info!(
            installation_id = %record.installation_id,
            org_id = %record.org_id,
            callback_type = %record.callback_type,
            replaced = replaced,
            "Saved installation"
        );
        installations.insert(record.installation_id.clone(), record);
        Ok(())
    }

    async fn insert_if_absent(&self, record: InstallationRecord) -> Result<bool, StorageError> {
        let mut installations = self.installations.write().map_err(Self::poisoned)?;
        match installations.entry(record.installation_id.clone()) {
            Entry::Occupied(_) => {
                debug!(installation_id = %record.installation_id, "Installation already registered");
                Ok(false)
            }
            Entry::Vacant(slot) => {
                info!(
                    installation_id = %record.installation_id,
                    org_id = %record.org_id,
                    callback_type = %record.callback_type,
                    "Registered installation"
                );
                slot.insert(record);
                Ok(true)
            }
        }
    }

    async fn get(&self, installation_id: &str) -> Result<InstallationRecord, StorageError> {
        let installations = self.installations.read().map_err(Self::poisoned)?;
        installations
            .get(installation_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(installation_id.to_string()))
    }

    async fn list(&self) -> Result<Vec<InstallationRecord>, StorageError> {
        let installations = self.installations.read().map_err(Self::poisoned)?;
        let mut records: Vec<_> = installations.values().cloned().collect();
        records.sort_by(|a, b| a.installation_id.cmp(&b.installation_id));
        Ok(records)
    }
}
