//! Transfer primitives.
//!
//! A `Transfer` is the append-only ledger entry written when cash moves from
//! an account into its fund. Once created it is never mutated or deleted.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Money, ResultEngine, util::parse_uuid};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: Uuid,
    pub account_id: Uuid,
    pub fund_id: Uuid,
    pub amount: Money,
    pub idempotency_key: Option<String>,
    pub executed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Everything the store needs to append a transfer record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewTransfer {
    pub id: Uuid,
    pub account_id: Uuid,
    pub fund_id: Uuid,
    pub amount: Money,
    pub idempotency_key: Option<String>,
    pub executed_at: DateTime<Utc>,
}

impl NewTransfer {
    pub fn new(
        id: Uuid,
        account_id: Uuid,
        fund_id: Uuid,
        amount: Money,
        idempotency_key: Option<String>,
        executed_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        if !amount.is_positive() {
            return Err(EngineError::InvalidAmount(
                "amount must be > 0".to_string(),
            ));
        }
        Ok(Self {
            id,
            account_id,
            fund_id,
            amount,
            idempotency_key,
            executed_at,
        })
    }

    /// The record as it looks once stored at `created_at`.
    pub fn into_transfer(self, created_at: DateTime<Utc>) -> Transfer {
        Transfer {
            id: self.id,
            account_id: self.account_id,
            fund_id: self.fund_id,
            amount: self.amount,
            idempotency_key: self.idempotency_key,
            executed_at: self.executed_at,
            created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "transfers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub account_id: String,
    pub fund_id: String,
    pub amount: String,
    pub idempotency_key: Option<String>,
    pub executed_at: DateTimeUtc,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::AccountId",
        to = "super::accounts::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Accounts,
    #[sea_orm(
        belongs_to = "super::funds::Entity",
        from = "Column::FundId",
        to = "super::funds::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Funds,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl Related<super::funds::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Funds.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transfer> for ActiveModel {
    fn from(transfer: &Transfer) -> Self {
        Self {
            id: ActiveValue::Set(transfer.id.to_string()),
            account_id: ActiveValue::Set(transfer.account_id.to_string()),
            fund_id: ActiveValue::Set(transfer.fund_id.to_string()),
            amount: ActiveValue::Set(transfer.amount.to_storage()),
            idempotency_key: ActiveValue::Set(transfer.idempotency_key.clone()),
            executed_at: ActiveValue::Set(transfer.executed_at),
            created_at: ActiveValue::Set(transfer.created_at),
        }
    }
}

impl TryFrom<Model> for Transfer {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "transfer")?,
            account_id: parse_uuid(&model.account_id, "account")?,
            fund_id: parse_uuid(&model.fund_id, "fund")?,
            amount: Money::from_storage(&model.amount, "amount")?,
            idempotency_key: model.idempotency_key,
            executed_at: model.executed_at,
            created_at: model.created_at,
        })
    }
}
