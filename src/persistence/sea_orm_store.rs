//! SeaORM-backed persistence facade
//!
//! Reads go straight to the database; a flushed unit of work is applied one
//! autocommitted statement per record.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, RuntimeErr, Set,
};
use tracing::{debug, warn};

use super::{PendingWrite, PersistenceFacade, Record, RecordKey, StorageError, StorageResult};
use crate::models::{
    AuthProviderRow, AuthenticatedUser, BuiltinUser, UserLookup, auth_provider_row,
    authenticated_user, builtin_user, user_lookup,
};

/// Persistence facade over a SeaORM connection pool
#[derive(Debug)]
pub struct SeaOrmStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn apply(&self, write: PendingWrite) -> Result<(), DbErr> {
        let db = &*self.db;
        match write {
            PendingWrite::Save(Record::ProviderRow(row)) => {
                let exists = AuthProviderRow::find_by_id(row.id.clone())
                    .one(db)
                    .await?
                    .is_some();
                let active = auth_provider_row::ActiveModel {
                    id: Set(row.id),
                    factory_alias: Set(row.factory_alias),
                    title: Set(row.title),
                    subtitle: Set(row.subtitle),
                    config: Set(row.config),
                    enabled: Set(row.enabled),
                };
                if exists {
                    active.update(db).await?;
                } else {
                    AuthProviderRow::insert(active).exec(db).await?;
                }
            }
            PendingWrite::Save(Record::User(user)) => {
                let exists = AuthenticatedUser::find_by_id(user.id)
                    .one(db)
                    .await?
                    .is_some();
                let active = authenticated_user::ActiveModel {
                    id: Set(user.id),
                    user_identifier: Set(user.user_identifier),
                    email: Set(user.email),
                    superuser: Set(user.superuser),
                };
                if exists {
                    active.update(db).await?;
                } else {
                    AuthenticatedUser::insert(active).exec(db).await?;
                }
            }
            PendingWrite::Save(Record::Lookup(lookup)) => {
                let exists = UserLookup::find_by_id(lookup.id)
                    .one(db)
                    .await?
                    .is_some();
                let active = user_lookup::ActiveModel {
                    id: Set(lookup.id),
                    authenticated_user_id: Set(lookup.authenticated_user_id),
                    authentication_provider_id: Set(lookup.authentication_provider_id),
                    persistent_user_id: Set(lookup.persistent_user_id),
                };
                if exists {
                    active.update(db).await?;
                } else {
                    UserLookup::insert(active).exec(db).await?;
                }
            }
            PendingWrite::Save(Record::BuiltinUser(builtin)) => {
                let exists = BuiltinUser::find_by_id(builtin.user_name.clone())
                    .one(db)
                    .await?
                    .is_some();
                let active = builtin_user::ActiveModel {
                    user_name: Set(builtin.user_name),
                    email: Set(builtin.email),
                    password_hash: Set(builtin.password_hash),
                };
                if exists {
                    active.update(db).await?;
                } else {
                    BuiltinUser::insert(active).exec(db).await?;
                }
            }
            PendingWrite::Remove(key) => {
                let result = match key {
                    RecordKey::ProviderRow(id) => AuthProviderRow::delete_by_id(id).exec(db).await?,
                    RecordKey::User(id) => AuthenticatedUser::delete_by_id(id).exec(db).await?,
                    RecordKey::Lookup(id) => UserLookup::delete_by_id(id).exec(db).await?,
                    RecordKey::BuiltinUser(name) => BuiltinUser::delete_by_id(name).exec(db).await?,
                };
                debug!(rows_affected = result.rows_affected, "Applied staged delete");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PersistenceFacade for SeaOrmStore {
    async fn find_provider_row(&self, id: &str) -> StorageResult<Option<auth_provider_row::Model>> {
        Ok(AuthProviderRow::find_by_id(id.to_string())
            .one(&*self.db)
            .await?)
    }

    async fn list_provider_rows(&self) -> StorageResult<Vec<auth_provider_row::Model>> {
        Ok(AuthProviderRow::find()
            .order_by_asc(auth_provider_row::Column::Id)
            .all(&*self.db)
            .await?)
    }

    async fn find_user(&self, id: i64) -> StorageResult<Option<authenticated_user::Model>> {
        Ok(AuthenticatedUser::find_by_id(id).one(&*self.db).await?)
    }

    async fn find_lookup_for_user(
        &self,
        user_id: i64,
    ) -> StorageResult<Option<user_lookup::Model>> {
        Ok(UserLookup::find()
            .filter(user_lookup::Column::AuthenticatedUserId.eq(user_id))
            .one(&*self.db)
            .await?)
    }

    async fn find_builtin_user(
        &self,
        user_name: &str,
    ) -> StorageResult<Option<builtin_user::Model>> {
        Ok(BuiltinUser::find_by_id(user_name.to_string())
            .one(&*self.db)
            .await?)
    }

    async fn apply_writes(&self, batch: Vec<PendingWrite>) -> StorageResult<()> {
        let total = batch.len();

        for (index, write) in batch.into_iter().enumerate() {
            if let Err(err) = self.apply(write).await {
                warn!(
                    applied = index,
                    total,
                    error = %err,
                    "Flush stopped at failing write; earlier writes remain committed"
                );
                return Err(err.into());
            }
        }

        debug!(total, "Flushed staged writes");
        Ok(())
    }
}

fn is_unique_violation(error: &DbErr) -> bool {
    const PG_UNIQUE: &str = "23505";
    const SQLITE_DUPLICATE_CODES: &[&str] = &["1555", "2067"];

    let runtime_err = match error {
        DbErr::Query(RuntimeErr::SqlxError(sqlx_err))
        | DbErr::Exec(RuntimeErr::SqlxError(sqlx_err)) => sqlx_err,
        _ => return false,
    };

    let Some(db_error) = runtime_err.as_database_error() else {
        return false;
    };

    if db_error.is_unique_violation() {
        return true;
    }

    db_error.code().is_some_and(|code| {
        let code = code.as_ref();
        code == PG_UNIQUE || SQLITE_DUPLICATE_CODES.contains(&code)
    })
}

impl From<DbErr> for StorageError {
    fn from(error: DbErr) -> Self {
        if is_unique_violation(&error) {
            return StorageError::Conflict {
                message: error.to_string(),
            };
        }

        match error {
            DbErr::RecordNotFound(record) => StorageError::RecordNotFound { record },
            DbErr::RecordNotUpdated => StorageError::RecordNotFound {
                record: "update matched no rows".to_string(),
            },
            DbErr::Conn(err) => StorageError::Unavailable {
                message: err.to_string(),
            },
            DbErr::ConnectionAcquire(err) => StorageError::Unavailable {
                message: err.to_string(),
            },
            other => StorageError::Database {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::UnitOfWork;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;

    async fn migrated_store() -> SeaOrmStore {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        SeaOrmStore::new(Arc::new(db))
    }

    #[test]
    fn record_not_found_maps_to_storage_not_found() {
        let err: StorageError = DbErr::RecordNotFound("auth_provider_rows".to_string()).into();
        assert_eq!(
            err,
            StorageError::RecordNotFound {
                record: "auth_provider_rows".to_string()
            }
        );
        assert!(!err.is_database_failure());
    }

    #[test]
    fn custom_errors_map_to_database_failure() {
        let err: StorageError = DbErr::Custom("constraint failed".to_string()).into();
        assert!(err.is_database_failure());
        assert!(err.to_string().contains("constraint failed"));
    }

    #[tokio::test]
    async fn second_lookup_for_a_user_is_a_conflict() {
        let store = migrated_store().await;
        let mut unit = UnitOfWork::begin(&store);
        unit.persist(Record::User(authenticated_user::Model {
            id: 1,
            user_identifier: "u1".to_string(),
            email: "u1@example.org".to_string(),
            superuser: false,
        }));
        for id in [10, 11] {
            unit.persist(Record::Lookup(user_lookup::Model {
                id,
                authenticated_user_id: 1,
                authentication_provider_id: Some("shib".to_string()),
                persistent_user_id: Some(format!("p{id}")),
            }));
        }

        let err = unit.flush().await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }), "{err:?}");
        assert!(err.is_database_failure());

        // Writes before the failing one stay committed
        assert!(store.find_user(1).await.unwrap().is_some());
        assert_eq!(store.find_lookup_for_user(1).await.unwrap().map(|l| l.id), Some(10));
    }

    #[tokio::test]
    async fn saving_twice_updates_in_place() {
        let store = migrated_store().await;
        let row = auth_provider_row::Model::new("campus", "shib", false);
        let mut unit = UnitOfWork::begin(&store);
        unit.persist(Record::ProviderRow(row.clone()));
        unit.merge(Record::ProviderRow(row.with_title("Campus login")));
        unit.flush().await.unwrap();

        let rows = store.list_provider_rows().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Campus login");
    }
}
