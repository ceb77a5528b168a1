//! Initial schema migration.
//!
//! - `funds`: pooled investments and their aggregate totals
//! - `accounts`: cash accounts, each associated with at most one fund
//! - `transfers`: append-only record of money moved from an account to its fund
//!
//! Money columns hold canonical decimal text, never floating point.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Funds {
    Table,
    Id,
    Name,
    Description,
    Category,
    Risk,
    Performance,
    Total,
    Revision,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Accounts {
    Table,
    Id,
    OwnerId,
    FundId,
    CashBalance,
    InvestedTotal,
    Revision,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Transfers {
    Table,
    Id,
    AccountId,
    FundId,
    Amount,
    IdempotencyKey,
    ExecutedAt,
    CreatedAt,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Funds
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Funds::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Funds::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Funds::Name).string().not_null())
                    .col(ColumnDef::new(Funds::Description).string().not_null())
                    .col(ColumnDef::new(Funds::Category).string().not_null())
                    .col(ColumnDef::new(Funds::Risk).string().not_null())
                    .col(
                        ColumnDef::new(Funds::Performance)
                            .string()
                            .not_null()
                            .default("0"),
                    )
                    .col(ColumnDef::new(Funds::Total).string().not_null().default("0"))
                    .col(
                        ColumnDef::new(Funds::Revision)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Funds::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Funds::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-funds-name")
                    .table(Funds::Table)
                    .col(Funds::Name)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Accounts
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Accounts::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Accounts::OwnerId).string().not_null())
                    .col(ColumnDef::new(Accounts::FundId).string())
                    .col(
                        ColumnDef::new(Accounts::CashBalance)
                            .string()
                            .not_null()
                            .default("0"),
                    )
                    .col(
                        ColumnDef::new(Accounts::InvestedTotal)
                            .string()
                            .not_null()
                            .default("0"),
                    )
                    .col(
                        ColumnDef::new(Accounts::Revision)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Accounts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Accounts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-accounts-fund_id")
                            .from(Accounts::Table, Accounts::FundId)
                            .to(Funds::Table, Funds::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-accounts-owner_id")
                    .table(Accounts::Table)
                    .col(Accounts::OwnerId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Transfers
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Transfers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transfers::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transfers::AccountId).string().not_null())
                    .col(ColumnDef::new(Transfers::FundId).string().not_null())
                    .col(ColumnDef::new(Transfers::Amount).string().not_null())
                    .col(ColumnDef::new(Transfers::IdempotencyKey).string())
                    .col(
                        ColumnDef::new(Transfers::ExecutedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transfers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transfers-account_id")
                            .from(Transfers::Table, Transfers::AccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transfers-fund_id")
                            .from(Transfers::Table, Transfers::FundId)
                            .to(Funds::Table, Funds::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transfers-account_id-executed_at")
                    .table(Transfers::Table)
                    .col(Transfers::AccountId)
                    .col(Transfers::ExecutedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Transfers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Funds::Table).to_owned())
            .await?;
        Ok(())
    }
}
