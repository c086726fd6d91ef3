//! Installation storage
//!
//! Trait-based abstraction over the keyed record store holding one
//! [`InstallationRecord`] per installation identifier, with an in-memory
//! backend (default for development and tests) and a SQLite backend
//! (feature `sqlite`) for durable deployments.
//!
//! Writes are upserts: a callback for a known identifier replaces every
//! non-key field of the existing record. First-time registration uses
//! `insert_if_absent` instead, which never replaces. There is no delete path.

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use installgate_core::InstallationRecord;
use std::fmt::Debug;

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Installation not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

impl StorageError {
    /// Whether this is an absent key rather than an I/O failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

/// Storage backend for installation records
///
/// Implementations must be thread-safe, and each call must be atomic on its
/// own: concurrent upserts for the same identifier race only inside the
/// backend. `upsert` returns only once the write is durable.
#[async_trait]
pub trait InstallationStore: Send + Sync + Debug {
    /// Insert a record, or replace every non-key field of an existing one
    async fn upsert(&self, record: InstallationRecord) -> Result<(), StorageError>;

    /// Insert a record only if its identifier is not yet stored
    ///
    /// Returns `false`, leaving the stored record untouched, when the
    /// identifier already exists. The check and the write are one step, so
    /// of two concurrent inserts for the same identifier exactly one wins.
    async fn insert_if_absent(&self, record: InstallationRecord) -> Result<bool, StorageError>;

    /// Exact-key lookup
    ///
    /// An absent key is [`StorageError::NotFound`], never an I/O error.
    async fn get(&self, installation_id: &str) -> Result<InstallationRecord, StorageError>;

    /// All records, for administrative listing
    async fn list(&self) -> Result<Vec<InstallationRecord>, StorageError>;
}
