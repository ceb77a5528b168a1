//! Business rules a transfer must satisfy before anything is written.

use uuid::Uuid;

use crate::{Account, EngineError, Money, ResultEngine};

/// Validate a proposed transfer of `amount` from `account` into `fund_id`.
///
/// Rules are evaluated in order and the first failure wins:
///
/// 1. `amount` must be strictly positive ([`EngineError::InvalidAmount`]);
/// 2. `amount` must not exceed the cash balance ([`EngineError::InsufficientBalance`]);
/// 3. `fund_id` must be the fund associated with the account
///    ([`EngineError::FundNotAssociated`]).
///
/// The one-fund-per-account rule belongs to association and is not checked
/// here.
pub fn check_eligibility(account: &Account, fund_id: Uuid, amount: Money) -> ResultEngine<()> {
    if !amount.is_positive() {
        return Err(EngineError::InvalidAmount(format!(
            "amount must be > 0, got {amount}"
        )));
    }
    if amount > account.cash_balance {
        return Err(EngineError::InsufficientBalance(format!(
            "account {} has {} available, requested {amount}",
            account.id, account.cash_balance
        )));
    }
    if !account.is_associated_with(fund_id) {
        return Err(EngineError::FundNotAssociated(format!(
            "fund {fund_id} is not associated with account {}",
            account.id
        )));
    }
    Ok(())
}
