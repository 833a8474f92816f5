//! Migration to create the auth_provider_rows table.
//!
//! Each row is the durable configuration of one authentication provider: the
//! factory alias used to instantiate it, its opaque factory payload and whether
//! it should be active.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AuthProviderRows::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuthProviderRows::Id)
                            .text()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AuthProviderRows::FactoryAlias)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(AuthProviderRows::Title).text().not_null())
                    .col(ColumnDef::new(AuthProviderRows::Subtitle).text().null())
                    .col(
                        ColumnDef::new(AuthProviderRows::Config)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AuthProviderRows::Enabled)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AuthProviderRows::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AuthProviderRows {
    Table,
    Id,
    FactoryAlias,
    Title,
    Subtitle,
    Config,
    Enabled,
}
