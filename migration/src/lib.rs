//! Database migrations for the authentication provider registry.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2026_10_01_000001_create_auth_provider_rows;
mod m2026_10_01_000002_create_authenticated_users;
mod m2026_10_01_000003_create_builtin_users;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2026_10_01_000001_create_auth_provider_rows::Migration),
            Box::new(m2026_10_01_000002_create_authenticated_users::Migration),
            Box::new(m2026_10_01_000003_create_builtin_users::Migration),
        ]
    }
}
