use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Transfers {
    Table,
    AccountId,
    IdempotencyKey,
}

const INDEX: &str = "uidx-transfers-account_id-idempotency_key";

/// One transfer per (account, idempotency key). SQLite treats NULL keys as
/// distinct, so unkeyed transfers are unaffected.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .name(INDEX)
                    .table(Transfers::Table)
                    .col(Transfers::AccountId)
                    .col(Transfers::IdempotencyKey)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name(INDEX).table(Transfers::Table).to_owned())
            .await
    }
}
