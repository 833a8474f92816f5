//! Migration to create the builtin_users table holding local credentials.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BuiltinUsers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BuiltinUsers::UserName)
                            .text()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BuiltinUsers::Email).text().not_null())
                    .col(ColumnDef::new(BuiltinUsers::PasswordHash).text().null())
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BuiltinUsers::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum BuiltinUsers {
    Table,
    UserName,
    Email,
    PasswordHash,
}
