//! # Persistence Facade
//!
//! Storage contract used by provider administration and account conversion.
//!
//! Writes follow a unit-of-work shape: `persist`, `merge` and `remove` on a
//! [`UnitOfWork`] only stage changes; `flush` applies the staged changes in
//! order, each as its own statement. There is no transaction around a flush, so a failure part-way
//! leaves the earlier writes committed. Callers that write more than one record
//! must be prepared to report that state.

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::models::{auth_provider_row, authenticated_user, builtin_user, user_lookup};

pub mod memory;
pub mod sea_orm_store;

pub use memory::MemoryStore;
pub use sea_orm_store::SeaOrmStore;

/// Errors surfaced by the persistence layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The database rejected a statement (constraint, syntax, type mismatch)
    #[error("database error: {message}")]
    Database { message: String },
    /// A unique constraint rejected the write
    #[error("conflicting record: {message}")]
    Conflict { message: String },
    /// The database could not be reached
    #[error("storage unavailable: {message}")]
    Unavailable { message: String },
    /// An update targeted a record that no longer exists
    #[error("record not found: {record}")]
    RecordNotFound { record: String },
    /// Failure raised by a test double or an injected fault
    #[error("injected storage failure: {message}")]
    Injected { message: String },
}

impl StorageError {
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn injected(message: impl Into<String>) -> Self {
        Self::Injected {
            message: message.into(),
        }
    }

    /// True when the failure came from the database engine itself rather than
    /// from connectivity or the calling code.
    pub fn is_database_failure(&self) -> bool {
        matches!(self, Self::Database { .. } | Self::Conflict { .. })
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A record that can be written through the facade
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    ProviderRow(auth_provider_row::Model),
    User(authenticated_user::Model),
    Lookup(user_lookup::Model),
    BuiltinUser(builtin_user::Model),
}

impl Record {
    pub fn key(&self) -> RecordKey {
        match self {
            Record::ProviderRow(row) => RecordKey::ProviderRow(row.id.clone()),
            Record::User(user) => RecordKey::User(user.id),
            Record::Lookup(lookup) => RecordKey::Lookup(lookup.id),
            Record::BuiltinUser(builtin) => RecordKey::BuiltinUser(builtin.user_name.clone()),
        }
    }
}

/// Identity of a stored record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKey {
    ProviderRow(String),
    User(i64),
    Lookup(i64),
    BuiltinUser(String),
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKey::ProviderRow(id) => write!(f, "AuthProviderRow[{}]", id),
            RecordKey::User(id) => write!(f, "AuthenticatedUser[{}]", id),
            RecordKey::Lookup(id) => write!(f, "AuthenticatedUserLookup[{}]", id),
            RecordKey::BuiltinUser(name) => write!(f, "BuiltinUser[{}]", name),
        }
    }
}

/// A staged change waiting for the next flush
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingWrite {
    Save(Record),
    Remove(RecordKey),
}

/// Reads and batched writes over the records this crate owns.
///
/// Writes are not staged on the store. Open a [`UnitOfWork`] per operation,
/// stage into it and flush it.
#[async_trait]
pub trait PersistenceFacade: Send + Sync {
    async fn find_provider_row(&self, id: &str) -> StorageResult<Option<auth_provider_row::Model>>;

    /// All provider rows ordered by id
    async fn list_provider_rows(&self) -> StorageResult<Vec<auth_provider_row::Model>>;

    async fn find_user(&self, id: i64) -> StorageResult<Option<authenticated_user::Model>>;

    async fn find_lookup_for_user(
        &self,
        user_id: i64,
    ) -> StorageResult<Option<user_lookup::Model>>;

    async fn find_builtin_user(
        &self,
        user_name: &str,
    ) -> StorageResult<Option<builtin_user::Model>>;

    /// Apply `writes` in order. Stops at the first failing write; writes
    /// applied before it stay committed and the rest of the batch is dropped.
    async fn apply_writes(&self, writes: Vec<PendingWrite>) -> StorageResult<()>;
}

/// Writes staged by one operation against a store
///
/// The staged queue belongs to the unit, so two operations sharing a store
/// never flush each other's writes.
pub struct UnitOfWork<'a> {
    store: &'a dyn PersistenceFacade,
    pending: Vec<PendingWrite>,
}

impl<'a> UnitOfWork<'a> {
    pub fn begin(store: &'a dyn PersistenceFacade) -> Self {
        Self {
            store,
            pending: Vec::new(),
        }
    }

    /// Stage a new or updated record.
    pub fn persist(&mut self, record: Record) {
        self.pending.push(PendingWrite::Save(record));
    }

    /// Stage a detached record and return the managed copy.
    pub fn merge(&mut self, record: Record) -> Record {
        self.pending.push(PendingWrite::Save(record.clone()));
        record
    }

    /// Stage a delete; removing an absent record is not an error.
    pub fn remove(&mut self, key: RecordKey) {
        self.pending.push(PendingWrite::Remove(key));
    }

    /// Number of writes staged since the last flush
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Apply the staged writes. The queue is empty afterwards whether or not
    /// the store accepted every write.
    pub async fn flush(&mut self) -> StorageResult<()> {
        let batch = std::mem::take(&mut self.pending);
        if batch.is_empty() {
            return Ok(());
        }
        self.store.apply_writes(batch).await
    }
}

impl Drop for UnitOfWork<'_> {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            warn!(
                discarded = self.pending_len(),
                "Unit of work dropped with unflushed writes"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64) -> authenticated_user::Model {
        authenticated_user::Model {
            id,
            user_identifier: format!("user{id}"),
            email: format!("user{id}@example.org"),
            superuser: false,
        }
    }

    #[tokio::test]
    async fn interleaved_units_flush_only_their_own_writes() {
        let store = MemoryStore::new();
        let mut first = UnitOfWork::begin(&store);
        let mut second = UnitOfWork::begin(&store);

        first.persist(Record::User(user(1)));
        second.persist(Record::User(user(2)));
        store.fail_next_flush_at(0, StorageError::database("deadlock detected"));

        // The failing flush carries only the second unit's write
        assert!(second.flush().await.is_err());
        assert_eq!(first.pending_len(), 1);
        assert!(store.user(1).is_none());

        first.flush().await.unwrap();
        assert!(store.user(1).is_some());
        assert!(store.user(2).is_none());
        assert_eq!(store.committed_writes(), 1);
    }

    #[tokio::test]
    async fn flushing_an_empty_unit_does_not_reach_the_store() {
        let store = MemoryStore::new();
        let mut unit = UnitOfWork::begin(&store);
        unit.flush().await.unwrap();
        assert_eq!(store.flush_count(), 0);
    }

    #[test]
    fn merge_returns_the_staged_record() {
        let store = MemoryStore::new();
        let mut unit = UnitOfWork::begin(&store);
        let merged = unit.merge(Record::User(user(3)));
        assert_eq!(merged.key(), RecordKey::User(3));
        assert_eq!(unit.pending_len(), 1);
        unit.remove(RecordKey::User(3));
        assert_eq!(unit.pending_len(), 2);
    }
}
