//! Balance arithmetic for a transfer.
//!
//! Everything here is pure: callers pass current values and get the new ones
//! back. A result the underlying decimal cannot hold exactly, by overflow or
//! by lost precision, is an [`EngineError::InvalidAmount`], never a wrap, a
//! clamp or a rounding.

use crate::{Account, EngineError, Fund, Money, ResultEngine};

/// Cash and invested total of one account.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccountBalances {
    pub cash_balance: Money,
    pub invested_total: Money,
}

impl AccountBalances {
    pub fn of(account: &Account) -> Self {
        Self {
            cash_balance: account.cash_balance,
            invested_total: account.invested_total,
        }
    }

    /// Move `amount` from cash to invested.
    pub fn debit(self, amount: Money) -> ResultEngine<Self> {
        Ok(Self {
            cash_balance: checked_sub(self.cash_balance, amount, "cash balance")?,
            invested_total: checked_add(self.invested_total, amount, "invested total")?,
        })
    }

    /// Move `amount` back from invested to cash.
    pub fn refund(self, amount: Money) -> ResultEngine<Self> {
        Ok(Self {
            cash_balance: checked_add(self.cash_balance, amount, "cash balance")?,
            invested_total: checked_sub(self.invested_total, amount, "invested total")?,
        })
    }
}

/// New values for the three balances a transfer touches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BalanceUpdate {
    pub account: AccountBalances,
    pub fund_total: Money,
}

/// Compute `(cash - amount, invested + amount, fund total + amount)`.
///
/// `amount` is expected to have passed
/// [`check_eligibility`](crate::check_eligibility) already; no business rule
/// is re-checked here.
pub fn apply_transfer(account: &Account, fund: &Fund, amount: Money) -> ResultEngine<BalanceUpdate> {
    Ok(BalanceUpdate {
        account: AccountBalances::of(account).debit(amount)?,
        fund_total: credit_fund(fund.total, amount)?,
    })
}

pub fn credit_fund(total: Money, amount: Money) -> ResultEngine<Money> {
    checked_add(total, amount, "fund total")
}

pub fn debit_fund(total: Money, amount: Money) -> ResultEngine<Money> {
    checked_sub(total, amount, "fund total")
}

fn checked_add(value: Money, amount: Money, label: &str) -> ResultEngine<Money> {
    value
        .checked_add(amount)
        .ok_or_else(|| EngineError::InvalidAmount(format!("{label} not representable")))
}

fn checked_sub(value: Money, amount: Money, label: &str) -> ResultEngine<Money> {
    value
        .checked_sub(amount)
        .ok_or_else(|| EngineError::InvalidAmount(format!("{label} not representable")))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use super::*;
    use crate::{FundCategory, RiskTier};

    fn fixtures(cash: Money, fund_total: Money) -> (Account, Fund) {
        let now = Utc::now();
        let account = Account::open(Uuid::new_v4(), "alice", cash, now).unwrap();
        let fund = Fund::new(
            Uuid::new_v4(),
            "World",
            "Global equity",
            FundCategory::Equity,
            RiskTier::High,
            Money::ZERO,
            fund_total,
            now,
        )
        .unwrap();
        (account, fund)
    }

    #[test]
    fn transfer_moves_full_cash() {
        let (account, fund) = fixtures(Money::from_units(25_000), Money::from_units(10_000));
        let update = apply_transfer(&account, &fund, Money::from_units(25_000)).unwrap();

        assert_eq!(update.account.cash_balance, Money::ZERO);
        assert_eq!(update.account.invested_total, Money::from_units(25_000));
        assert_eq!(update.fund_total, Money::from_units(35_000));
    }

    #[test]
    fn holdings_are_conserved() {
        let (account, fund) = fixtures("1000.10".parse().unwrap(), Money::ZERO);
        let amount: Money = "0.10".parse().unwrap();
        let update = apply_transfer(&account, &fund, amount).unwrap();

        assert_eq!(
            update.account.cash_balance + update.account.invested_total,
            account.holdings()
        );
        assert_eq!(update.account.cash_balance, Money::from_units(1000));
    }

    #[test]
    fn refund_undoes_debit() {
        let (account, _) = fixtures(Money::from_units(300), Money::ZERO);
        let before = AccountBalances::of(&account);
        let amount = Money::from_units(120);
        assert_eq!(before.debit(amount).unwrap().refund(amount).unwrap(), before);
    }

    #[test]
    fn overflow_is_invalid_amount() {
        let max = Money::new(Decimal::MAX);
        assert!(matches!(
            credit_fund(max, Money::from_units(1)),
            Err(EngineError::InvalidAmount(_))
        ));
        assert_eq!(
            debit_fund(Money::from_units(10), Money::from_units(4)).unwrap(),
            Money::from_units(6)
        );
    }

    #[test]
    fn rounding_amount_is_invalid_amount() {
        let big: Money = "100000000000000000000".parse().unwrap();
        let tiny = Money::new(Decimal::new(1, 28));
        let (account, fund) = fixtures(big, big);

        assert!(matches!(
            apply_transfer(&account, &fund, tiny),
            Err(EngineError::InvalidAmount(_))
        ));
        assert!(matches!(
            AccountBalances::of(&account).refund(tiny),
            Err(EngineError::InvalidAmount(_))
        ));
        assert!(matches!(debit_fund(big, tiny), Err(EngineError::InvalidAmount(_))));
    }
}
