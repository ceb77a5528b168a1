//! Command structs for engine operations.
//!
//! These types group parameters for write operations (open account, create
//! and edit funds, invest), keeping call sites readable and avoiding long
//! argument lists.

use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use crate::{FundCategory, Money, RiskTier};

/// Move `amount` of an account's cash into its fund.
#[derive(Clone, Debug)]
pub struct ExecuteTransferCmd {
    pub account_id: Uuid,
    pub fund_id: Uuid,
    pub amount: Money,
    /// Caller-chosen key; a repeated key returns the first transfer.
    pub idempotency_key: Option<String>,
    /// Give up with `DeadlineExceeded` if writes have not started by then.
    pub deadline: Option<Instant>,
}

impl ExecuteTransferCmd {
    #[must_use]
    pub fn new(account_id: Uuid, fund_id: Uuid, amount: Money) -> Self {
        Self {
            account_id,
            fund_id,
            amount,
            idempotency_key: None,
            deadline: None,
        }
    }

    #[must_use]
    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deadline `timeout` from now.
    #[must_use]
    pub fn timeout(self, timeout: Duration) -> Self {
        self.deadline(Instant::now() + timeout)
    }
}

/// Open a new account.
#[derive(Clone, Debug)]
pub struct OpenAccountCmd {
    pub owner_id: String,
    pub cash_balance: Money,
}

impl OpenAccountCmd {
    #[must_use]
    pub fn new(owner_id: impl Into<String>, cash_balance: Money) -> Self {
        Self {
            owner_id: owner_id.into(),
            cash_balance,
        }
    }
}

/// Create a fund. Performance and opening total default to zero.
#[derive(Clone, Debug)]
pub struct NewFundCmd {
    pub name: String,
    pub description: String,
    pub category: FundCategory,
    pub risk: RiskTier,
    pub performance: Money,
    pub total: Money,
}

impl NewFundCmd {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        category: FundCategory,
        risk: RiskTier,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            category,
            risk,
            performance: Money::ZERO,
            total: Money::ZERO,
        }
    }

    #[must_use]
    pub fn performance(mut self, performance: Money) -> Self {
        self.performance = performance;
        self
    }

    #[must_use]
    pub fn total(mut self, total: Money) -> Self {
        self.total = total;
        self
    }
}

/// Rename a fund or change its description.
#[derive(Clone, Debug)]
pub struct UpdateFundCmd {
    pub fund_id: Uuid,
    pub name: String,
    pub description: String,
}

impl UpdateFundCmd {
    #[must_use]
    pub fn new(fund_id: Uuid, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            fund_id,
            name: name.into(),
            description: description.into(),
        }
    }
}
