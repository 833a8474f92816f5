//! Test utilities for database testing.
//!
//! Sets up in-memory SQLite databases with migrations applied and seeds the
//! account fixtures the workflows operate on.

use anyhow::Result;
use auth_registry::models::{authenticated_user, user_lookup};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use std::sync::Arc;

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// Sets up an in-memory SQLite database with all migrations applied and returns an Arc.
#[allow(dead_code)]
pub async fn setup_test_db_arc() -> Result<Arc<DatabaseConnection>> {
    let db = setup_test_db().await?;
    Ok(Arc::new(db))
}

/// Inserts an authenticated user and returns its generated id.
#[allow(dead_code)]
pub async fn insert_user(
    db: &DatabaseConnection,
    user_identifier: &str,
    email: &str,
    superuser: bool,
) -> Result<i64> {
    let user = authenticated_user::ActiveModel {
        user_identifier: Set(user_identifier.to_string()),
        email: Set(email.to_string()),
        superuser: Set(superuser),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(user.id)
}

/// Inserts the provider lookup of `user_id` and returns its generated id.
#[allow(dead_code)]
pub async fn insert_lookup(
    db: &DatabaseConnection,
    user_id: i64,
    provider_id: Option<&str>,
    persistent_user_id: Option<&str>,
) -> Result<i64> {
    let lookup = user_lookup::ActiveModel {
        authenticated_user_id: Set(user_id),
        authentication_provider_id: Set(provider_id.map(str::to_string)),
        persistent_user_id: Set(persistent_user_id.map(str::to_string)),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(lookup.id)
}

/// A superuser to invoke administrative operations as.
#[allow(dead_code)]
pub async fn insert_superuser(db: &DatabaseConnection) -> Result<authenticated_user::Model> {
    let id = insert_user(db, "admin", "admin@example.org", true).await?;
    Ok(authenticated_user::Model {
        id,
        user_identifier: "admin".to_string(),
        email: "admin@example.org".to_string(),
        superuser: true,
    })
}
