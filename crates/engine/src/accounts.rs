//! The module contains the `Account` struct and its persistence model.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Money, ResultEngine, util::parse_uuid};

/// A tax-advantaged cash account.
///
/// The account keeps two denormalized balances: the `cash_balance` that can
/// still be invested and the `invested_total` already moved into its fund.
/// A transfer moves money from the former to the latter, so their sum never
/// changes because of a transfer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Stable identifier for this account.
    pub id: Uuid,
    pub owner_id: String,
    /// At most one fund per account.
    pub fund_id: Option<Uuid>,
    pub cash_balance: Money,
    pub invested_total: Money,
    /// Bumped on every write. Updates are conditioned on it.
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Opens a new account with `cash_balance` and nothing invested.
    pub fn open(
        id: Uuid,
        owner_id: &str,
        cash_balance: Money,
        now: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        let owner_id = owner_id.trim();
        if owner_id.is_empty() {
            return Err(EngineError::InvalidInput(
                "owner id must not be empty".to_string(),
            ));
        }
        if cash_balance.is_negative() {
            return Err(EngineError::InvalidAmount(
                "opening cash balance must be >= 0".to_string(),
            ));
        }
        Ok(Self {
            id,
            owner_id: owner_id.to_string(),
            fund_id: None,
            cash_balance,
            invested_total: Money::ZERO,
            revision: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Sum of cash and invested money.
    pub fn holdings(&self) -> Money {
        self.cash_balance + self.invested_total
    }

    pub fn is_associated_with(&self, fund_id: Uuid) -> bool {
        self.fund_id == Some(fund_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub owner_id: String,
    pub fund_id: Option<String>,
    pub cash_balance: String,
    pub invested_total: String,
    pub revision: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::transfers::Entity")]
    Transfers,
    #[sea_orm(
        belongs_to = "super::funds::Entity",
        from = "Column::FundId",
        to = "super::funds::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Funds,
}

impl Related<super::transfers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transfers.def()
    }
}

impl Related<super::funds::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Funds.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Account> for ActiveModel {
    fn from(value: &Account) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            owner_id: ActiveValue::Set(value.owner_id.clone()),
            fund_id: ActiveValue::Set(value.fund_id.map(|id| id.to_string())),
            cash_balance: ActiveValue::Set(value.cash_balance.to_storage()),
            invested_total: ActiveValue::Set(value.invested_total.to_storage()),
            revision: ActiveValue::Set(value.revision),
            created_at: ActiveValue::Set(value.created_at),
            updated_at: ActiveValue::Set(value.updated_at),
        }
    }
}

impl TryFrom<Model> for Account {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "account")?,
            owner_id: model.owner_id,
            fund_id: model
                .fund_id
                .as_deref()
                .map(|id| parse_uuid(id, "fund"))
                .transpose()?,
            cash_balance: Money::from_storage(&model.cash_balance, "cash_balance")?,
            invested_total: Money::from_storage(&model.invested_total, "invested_total")?,
            revision: model.revision,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
