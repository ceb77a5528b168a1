use chrono::Utc;
use uuid::Uuid;

use crate::{
    Account, EngineError, ResultEngine, StoreError, Transfer, commands::OpenAccountCmd,
};

use super::{Engine, account_error, fund_error, transfer_error};

impl Engine {
    /// Open an account with its opening cash balance and nothing invested.
    pub async fn open_account(&self, cmd: OpenAccountCmd) -> ResultEngine<Account> {
        let account = Account::open(
            self.ids.generate(),
            &cmd.owner_id,
            cmd.cash_balance,
            Utc::now(),
        )?;
        self.store.insert_account(&account).await?;
        Ok(account)
    }

    pub async fn account(&self, id: Uuid) -> ResultEngine<Account> {
        self.read(id, "get_account", || self.store.get_account(id))
            .await
            .map_err(|err| account_error(err, id))
    }

    /// Attach `fund_id` to an account that has no fund yet.
    ///
    /// An account holds at most one fund: asking again, even for the same
    /// fund, is [`EngineError::FundAlreadyAssociated`].
    pub async fn associate_fund(&self, account_id: Uuid, fund_id: Uuid) -> ResultEngine<Account> {
        let mut attempt = 1;
        loop {
            let account = self.account(account_id).await?;
            if let Some(current) = account.fund_id {
                return Err(EngineError::FundAlreadyAssociated(format!(
                    "account {account_id} is already associated with fund {current}"
                )));
            }
            self.fund(fund_id).await?;

            match self
                .store
                .set_account_fund(account_id, account.revision, fund_id, Utc::now())
                .await
            {
                Ok(account) => {
                    tracing::info!(%account_id, %fund_id, "fund associated");
                    return Ok(account);
                }
                // Re-read: the concurrent writer may have associated a fund.
                Err(StoreError::Conflict(_)) if self.retry.allows_retry(attempt) => {
                    attempt += 1;
                }
                Err(err @ StoreError::NotFound(_)) => return Err(fund_error(err, fund_id)),
                Err(err) => return Err(account_error(err, account_id)),
            }
        }
    }

    /// Transfers of an account, oldest execution first.
    pub async fn transfers(&self, account_id: Uuid) -> ResultEngine<Vec<Transfer>> {
        self.account(account_id).await?;
        self.read(account_id, "list_transfers", || {
            self.store.list_transfers(account_id)
        })
        .await
        .map_err(EngineError::from)
    }

    pub async fn transfer(&self, id: Uuid) -> ResultEngine<Transfer> {
        self.read(id, "get_transfer", || self.store.get_transfer(id))
            .await
            .map_err(|err| transfer_error(err, id))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{FundCategory, MemoryStore, Money, RetryPolicy, RiskTier, commands::NewFundCmd};

    async fn engine() -> Engine {
        Engine::builder()
            .store(Arc::new(MemoryStore::new()))
            .retry_policy(RetryPolicy::immediate(3))
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn associate_once() {
        let engine = engine().await;
        let account = engine
            .open_account(OpenAccountCmd::new("alice", Money::from_units(100)))
            .await
            .unwrap();
        let fund = engine
            .create_fund(NewFundCmd::new(
                "World",
                "Global equity",
                FundCategory::Equity,
                RiskTier::High,
            ))
            .await
            .unwrap();

        let associated = engine.associate_fund(account.id, fund.id).await.unwrap();
        assert_eq!(associated.fund_id, Some(fund.id));
        assert_eq!(associated.revision, account.revision + 1);

        let err = engine
            .associate_fund(account.id, fund.id)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::FundAlreadyAssociated(_)));
    }

    #[tokio::test]
    async fn unknown_records() {
        let engine = engine().await;
        let account = engine
            .open_account(OpenAccountCmd::new("bob", Money::ZERO))
            .await
            .unwrap();

        assert!(matches!(
            engine.associate_fund(account.id, Uuid::new_v4()).await,
            Err(EngineError::FundNotFound(_))
        ));
        assert!(matches!(
            engine.account(Uuid::new_v4()).await,
            Err(EngineError::AccountNotFound(_))
        ));
        assert!(matches!(
            engine.transfers(Uuid::new_v4()).await,
            Err(EngineError::AccountNotFound(_))
        ));
        assert!(matches!(
            engine.transfer(Uuid::new_v4()).await,
            Err(EngineError::TransferNotFound(_))
        ));
        assert!(engine.transfers(account.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn open_rejects_negative_cash() {
        let engine = engine().await;
        let err = engine
            .open_account(OpenAccountCmd::new("carol", Money::from_units(-1)))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(_)));
    }
}
