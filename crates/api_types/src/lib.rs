//! Request and response bodies shared by the HTTP gateway and its clients.
//!
//! Money travels as decimal text (`"1234.56"`) so no client round-trips it
//! through binary floating point.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod account {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountNew {
        pub owner_id: String,
        /// Opening cash balance, decimal text. Defaults to zero.
        #[serde(default)]
        pub cash_balance: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountView {
        pub id: Uuid,
        pub owner_id: String,
        pub fund_id: Option<Uuid>,
        pub cash_balance: String,
        pub invested_total: String,
        pub revision: i64,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
    }
}

pub mod fund {
    use super::*;

    /// Kind of pooled investment.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub enum FundCategory {
        Equity,
        Bond,
        Index,
        Mixed,
    }

    impl FundCategory {
        /// Returns the canonical name used by the engine.
        pub fn as_str(self) -> &'static str {
            match self {
                Self::Equity => "Equity",
                Self::Bond => "Bond",
                Self::Index => "Index",
                Self::Mixed => "Mixed",
            }
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
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

    #[derive(Debug, Serialize, Deserialize)]
    pub struct FundNew {
        pub name: String,
        pub description: String,
        pub category: FundCategory,
        pub risk: RiskTier,
        /// Informational performance figure, decimal text.
        #[serde(default)]
        pub performance: Option<String>,
        /// Opening aggregate total, decimal text.
        #[serde(default)]
        pub total: Option<String>,
    }

    /// Name and description edit. Totals cannot be changed this way.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct FundUpdate {
        pub name: String,
        pub description: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct FundView {
        pub id: Uuid,
        pub name: String,
        pub description: String,
        pub category: FundCategory,
        pub risk: RiskTier,
        pub performance: String,
        pub total: String,
        pub revision: i64,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct FundList {
        pub funds: Vec<FundView>,
    }
}

pub mod transfer {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct InvestNew {
        pub fund_id: Uuid,
        pub amount: String,
        /// Repeating a request with the same key returns the first transfer.
        #[serde(default)]
        pub idempotency_key: Option<String>,
        /// Give up before any write once this many milliseconds have passed.
        #[serde(default)]
        pub timeout_ms: Option<u64>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransferView {
        pub id: Uuid,
        pub account_id: Uuid,
        pub fund_id: Uuid,
        pub amount: String,
        pub idempotency_key: Option<String>,
        pub executed_at: DateTime<Utc>,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct InvestResponse {
        pub transfer: TransferView,
        /// `true` when an earlier transfer with the same key was returned.
        pub replayed: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransferList {
        pub transfers: Vec<TransferView>,
    }
}

/// Error body returned with every non-2xx response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable machine readable code, e.g. `INSUFFICIENT_BALANCE`.
    pub code: String,
    pub error: String,
}
