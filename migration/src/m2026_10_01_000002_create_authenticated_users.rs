//! Migration to create the authenticated_users and authenticated_user_lookups tables.
//!
//! A lookup row binds one user to the provider that authenticates them and to
//! the user's identity inside that provider's namespace.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AuthenticatedUsers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuthenticatedUsers::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AuthenticatedUsers::UserIdentifier)
                            .text()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(AuthenticatedUsers::Email).text().not_null())
                    .col(
                        ColumnDef::new(AuthenticatedUsers::Superuser)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AuthenticatedUserLookups::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuthenticatedUserLookups::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AuthenticatedUserLookups::AuthenticatedUserId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AuthenticatedUserLookups::AuthenticationProviderId)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(AuthenticatedUserLookups::PersistentUserId)
                            .text()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_lookups_authenticated_user_id")
                            .from(
                                AuthenticatedUserLookups::Table,
                                AuthenticatedUserLookups::AuthenticatedUserId,
                            )
                            .to(AuthenticatedUsers::Table, AuthenticatedUsers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One lookup row per user
        manager
            .create_index(
                Index::create()
                    .name("idx_lookups_authenticated_user_id")
                    .table(AuthenticatedUserLookups::Table)
                    .col(AuthenticatedUserLookups::AuthenticatedUserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_lookups_authenticated_user_id")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(
                Table::drop()
                    .table(AuthenticatedUserLookups::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(AuthenticatedUsers::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AuthenticatedUsers {
    Table,
    Id,
    UserIdentifier,
    Email,
    Superuser,
}

#[derive(DeriveIden)]
enum AuthenticatedUserLookups {
    Table,
    Id,
    AuthenticatedUserId,
    AuthenticationProviderId,
    PersistentUserId,
}
