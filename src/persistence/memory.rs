//! In-process persistence facade
//!
//! Keeps committed records in ordered maps and applies flushed batches the
//! way the database store does. A fault can be armed so that the next batch
//! fails at a chosen write, which is how half-applied conversions are
//! reproduced without a database.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{PendingWrite, PersistenceFacade, Record, RecordKey, StorageError, StorageResult};
use crate::models::{auth_provider_row, authenticated_user, builtin_user, user_lookup};

#[derive(Debug, Default)]
struct MemoryState {
    provider_rows: BTreeMap<String, auth_provider_row::Model>,
    users: BTreeMap<i64, authenticated_user::Model>,
    lookups: BTreeMap<i64, user_lookup::Model>,
    builtin_users: BTreeMap<String, builtin_user::Model>,
    fault: Option<(usize, StorageError)>,
    committed_writes: usize,
    flushes: usize,
}

impl MemoryState {
    fn apply(&mut self, write: PendingWrite) {
        match write {
            PendingWrite::Save(Record::ProviderRow(row)) => {
                self.provider_rows.insert(row.id.clone(), row);
            }
            PendingWrite::Save(Record::User(user)) => {
                self.users.insert(user.id, user);
            }
            PendingWrite::Save(Record::Lookup(lookup)) => {
                self.lookups.insert(lookup.id, lookup);
            }
            PendingWrite::Save(Record::BuiltinUser(builtin)) => {
                self.builtin_users.insert(builtin.user_name.clone(), builtin);
            }
            PendingWrite::Remove(RecordKey::ProviderRow(id)) => {
                self.provider_rows.remove(&id);
            }
            PendingWrite::Remove(RecordKey::User(id)) => {
                self.users.remove(&id);
                self.lookups.retain(|_, lookup| lookup.authenticated_user_id != id);
            }
            PendingWrite::Remove(RecordKey::Lookup(id)) => {
                self.lookups.remove(&id);
            }
            PendingWrite::Remove(RecordKey::BuiltinUser(name)) => {
                self.builtin_users.remove(&name);
            }
        }
        self.committed_writes += 1;
    }
}

/// Persistence facade holding everything in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Commits a record immediately, bypassing the staged queue. Seeding
    /// does not count towards [`MemoryStore::committed_writes`].
    pub fn seed(&self, record: Record) {
        let mut state = self.state();
        state.apply(PendingWrite::Save(record));
        state.committed_writes -= 1;
    }

    /// Makes the next flushed batch fail with `error` when it reaches the write
    /// at `index` (zero based). Writes before `index` are committed.
    pub fn fail_next_flush_at(&self, index: usize, error: StorageError) {
        self.state().fault = Some((index, error));
    }

    /// Writes committed through `flush` since the store was created
    pub fn committed_writes(&self) -> usize {
        self.state().committed_writes
    }

    /// Batches handed to the store, failed ones included
    pub fn flush_count(&self) -> usize {
        self.state().flushes
    }

    pub fn user(&self, id: i64) -> Option<authenticated_user::Model> {
        self.state().users.get(&id).cloned()
    }

    pub fn lookup_for_user(&self, user_id: i64) -> Option<user_lookup::Model> {
        self.state()
            .lookups
            .values()
            .find(|lookup| lookup.authenticated_user_id == user_id)
            .cloned()
    }

    pub fn builtin_user(&self, user_name: &str) -> Option<builtin_user::Model> {
        self.state().builtin_users.get(user_name).cloned()
    }

    pub fn provider_row(&self, id: &str) -> Option<auth_provider_row::Model> {
        self.state().provider_rows.get(id).cloned()
    }
}

#[async_trait]
impl PersistenceFacade for MemoryStore {
    async fn find_provider_row(&self, id: &str) -> StorageResult<Option<auth_provider_row::Model>> {
        Ok(self.provider_row(id))
    }

    async fn list_provider_rows(&self) -> StorageResult<Vec<auth_provider_row::Model>> {
        Ok(self.state().provider_rows.values().cloned().collect())
    }

    async fn find_user(&self, id: i64) -> StorageResult<Option<authenticated_user::Model>> {
        Ok(self.user(id))
    }

    async fn find_lookup_for_user(
        &self,
        user_id: i64,
    ) -> StorageResult<Option<user_lookup::Model>> {
        Ok(self.lookup_for_user(user_id))
    }

    async fn find_builtin_user(
        &self,
        user_name: &str,
    ) -> StorageResult<Option<builtin_user::Model>> {
        Ok(self.builtin_user(user_name))
    }

    async fn apply_writes(&self, batch: Vec<PendingWrite>) -> StorageResult<()> {
        let mut state = self.state();
        state.flushes += 1;
        let fault = state.fault.take();

        for (index, write) in batch.into_iter().enumerate() {
            if let Some((fail_at, error)) = &fault
                && *fail_at == index
            {
                return Err(error.clone());
            }
            state.apply(write);
        }

        // A fault armed past the end of the batch still fires once
        match fault {
            Some((_, error)) => Err(error),
            None => Ok(()),
        }
    }
}
