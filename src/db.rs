//! Database bootstrap
//!
//! Opens the SeaORM pool the [`SeaOrmStore`](crate::persistence::SeaOrmStore)
//! runs on, brings the schema up to date and checks the provider table answers
//! before any administrative command touches it.

use std::time::Duration;

use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::models::AuthProviderRow;

const CONNECT_ATTEMPTS: u32 = 5;
const FIRST_RETRY_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("database URL is empty; set AUTH_REGISTRY_DATABASE_URL")]
    MissingUrl,
    #[error("database unreachable after {attempts} attempts: {source}")]
    Unreachable {
        attempts: u32,
        #[source]
        source: DbErr,
    },
    #[error("applying schema migrations failed: {0}")]
    Migration(#[source] DbErr),
    #[error("provider table is not queryable: {0}")]
    SchemaCheck(#[source] DbErr),
}

/// Connect, migrate and verify. This is what the CLI runs at startup.
pub async fn open(cfg: &AppConfig) -> Result<DatabaseConnection, DatabaseError> {
    let db = connect(cfg).await?;
    migrate(&db).await?;
    let provider_rows = health_check(&db).await?;
    info!(provider_rows, "Database ready");
    Ok(db)
}

/// Opens the pool, retrying with a doubling delay while the server is not
/// accepting connections yet.
pub async fn connect(cfg: &AppConfig) -> Result<DatabaseConnection, DatabaseError> {
    if cfg.database_url.trim().is_empty() {
        return Err(DatabaseError::MissingUrl);
    }

    let options = connect_options(cfg);
    let mut delay = FIRST_RETRY_DELAY;
    let mut attempt = 1;
    loop {
        match Database::connect(options.clone()).await {
            Ok(db) => {
                info!(attempt, "Connected to database");
                return Ok(db);
            }
            Err(source) if attempt == CONNECT_ATTEMPTS => {
                return Err(DatabaseError::Unreachable {
                    attempts: attempt,
                    source,
                });
            }
            Err(err) => {
                warn!(attempt, error = %err, retry_in = ?delay, "Database connection failed");
                sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
        }
    }
}

fn connect_options(cfg: &AppConfig) -> ConnectOptions {
    let mut options = ConnectOptions::new(cfg.database_url.clone());
    options
        .max_connections(cfg.db_max_connections)
        .acquire_timeout(Duration::from_millis(cfg.db_acquire_timeout_ms))
        .idle_timeout(Duration::from_secs(600))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);
    options
}

pub async fn migrate(db: &DatabaseConnection) -> Result<(), DatabaseError> {
    Migrator::up(db, None).await.map_err(DatabaseError::Migration)
}

/// Counts provider rows; fails when the schema is missing or the pool is dead.
pub async fn health_check(db: &DatabaseConnection) -> Result<u64, DatabaseError> {
    AuthProviderRow::find()
        .count(db)
        .await
        .map_err(DatabaseError::SchemaCheck)
}
