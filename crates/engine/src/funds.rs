//! The module contains the `Fund` struct, its fixed enumerations and its
//! persistence model.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, Money, ResultEngine,
    util::{normalize_required_text, parse_uuid},
};

/// Kind of pooled investment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FundCategory {
    Equity,
    Bond,
    Index,
    Mixed,
}

impl FundCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equity => "Equity",
            Self::Bond => "Bond",
            Self::Index => "Index",
            Self::Mixed => "Mixed",
        }
    }
}

impl TryFrom<&str> for FundCategory {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim() {
            "Equity" => Ok(Self::Equity),
            "Bond" => Ok(Self::Bond),
            "Index" => Ok(Self::Index),
            "Mixed" => Ok(Self::Mixed),
            other => Err(EngineError::InvalidInput(format!(
                "invalid fund category: {other}"
            ))),
        }
    }
}

/// Risk tier advertised for a fund.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl TryFrom<&str> for RiskTier {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim() {
            "Low" => Ok(Self::Low),
            "Medium" => Ok(Self::Medium),
            "High" => Ok(Self::High),
            other => Err(EngineError::InvalidInput(format!(
                "invalid risk tier: {other}"
            ))),
        }
    }
}

/// A managed pooled investment.
///
/// `total` is a bookkeeping aggregate: the opening total plus every transfer
/// ever made into the fund. It is not a priced position, and `performance`
/// is informational only (transfers never touch it).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fund {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category: FundCategory,
    pub risk: RiskTier,
    pub performance: Money,
    pub total: Money,
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Fund {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: Uuid,
        name: &str,
        description: &str,
        category: FundCategory,
        risk: RiskTier,
        performance: Money,
        total: Money,
        now: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        let name = normalize_required_text(name, "fund name")?;
        let description = normalize_required_text(description, "fund description")?;
        if total.is_negative() {
            return Err(EngineError::InvalidAmount(
                "fund total must be >= 0".to_string(),
            ));
        }
        Ok(Self {
            id,
            name,
            description,
            category,
            risk,
            performance,
            total,
            revision: 0,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "funds")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub risk: String,
    pub performance: String,
    pub total: String,
    pub revision: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::accounts::Entity")]
    Accounts,
    #[sea_orm(has_many = "super::transfers::Entity")]
    Transfers,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl Related<super::transfers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transfers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Fund> for ActiveModel {
    fn from(value: &Fund) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            name: ActiveValue::Set(value.name.clone()),
            description: ActiveValue::Set(value.description.clone()),
            category: ActiveValue::Set(value.category.as_str().to_string()),
            risk: ActiveValue::Set(value.risk.as_str().to_string()),
            performance: ActiveValue::Set(value.performance.to_storage()),
            total: ActiveValue::Set(value.total.to_storage()),
            revision: ActiveValue::Set(value.revision),
            created_at: ActiveValue::Set(value.created_at),
            updated_at: ActiveValue::Set(value.updated_at),
        }
    }
}

impl TryFrom<Model> for Fund {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "fund")?,
            category: FundCategory::try_from(model.category.as_str())?,
            risk: RiskTier::try_from(model.risk.as_str())?,
            performance: Money::from_storage(&model.performance, "performance")?,
            total: Money::from_storage(&model.total, "total")?,
            name: model.name,
            description: model.description,
            revision: model.revision,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
