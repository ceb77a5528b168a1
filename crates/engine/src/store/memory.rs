use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{Account, Fund, Money, NewTransfer, StoreError, Transfer, balances::AccountBalances};

use super::{RecordStore, StoreResult};

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<Uuid, Account>,
    funds: HashMap<Uuid, Fund>,
    transfers: HashMap<Uuid, Transfer>,
    keys: HashMap<(Uuid, String), Uuid>,
}

/// Process-local store.
///
/// Each call is atomic on its own but there is no way to group calls, so
/// [`RecordStore::atomic`] is `None` and transfers go through the
/// compensating path.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> StoreResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

fn account_not_found(id: Uuid) -> StoreError {
    StoreError::NotFound(format!("account {id}"))
}

fn fund_not_found(id: Uuid) -> StoreError {
    StoreError::NotFound(format!("fund {id}"))
}

fn check_revision(kind: &str, id: Uuid, stored: i64, expected: i64) -> StoreResult<()> {
    if stored != expected {
        return Err(StoreError::Conflict(format!(
            "{kind} {id} is at revision {stored}, expected {expected}"
        )));
    }
    Ok(())
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_account(&self, id: Uuid) -> StoreResult<Account> {
        self.state()?
            .accounts
            .get(&id)
            .cloned()
            .ok_or_else(|| account_not_found(id))
    }

    async fn get_fund(&self, id: Uuid) -> StoreResult<Fund> {
        self.state()?
            .funds
            .get(&id)
            .cloned()
            .ok_or_else(|| fund_not_found(id))
    }

    async fn update_account(
        &self,
        id: Uuid,
        expected_revision: i64,
        balances: AccountBalances,
        now: DateTime<Utc>,
    ) -> StoreResult<Account> {
        let mut state = self.state()?;
        let account = state
            .accounts
            .get_mut(&id)
            .ok_or_else(|| account_not_found(id))?;
        check_revision("account", id, account.revision, expected_revision)?;
        if balances.cash_balance.is_negative() || balances.invested_total.is_negative() {
            return Err(StoreError::Invalid(format!(
                "account {id} balances must be >= 0"
            )));
        }
        account.cash_balance = balances.cash_balance;
        account.invested_total = balances.invested_total;
        account.revision += 1;
        account.updated_at = now;
        Ok(account.clone())
    }

    async fn update_fund_total(
        &self,
        id: Uuid,
        expected_revision: i64,
        total: Money,
        now: DateTime<Utc>,
    ) -> StoreResult<Fund> {
        let mut state = self.state()?;
        let fund = state.funds.get_mut(&id).ok_or_else(|| fund_not_found(id))?;
        check_revision("fund", id, fund.revision, expected_revision)?;
        if total.is_negative() {
            return Err(StoreError::Invalid(format!("fund {id} total must be >= 0")));
        }
        fund.total = total;
        fund.revision += 1;
        fund.updated_at = now;
        Ok(fund.clone())
    }

    async fn create_transfer(&self, transfer: NewTransfer) -> StoreResult<Transfer> {
        let mut state = self.state()?;
        if state.transfers.contains_key(&transfer.id) {
            return Err(StoreError::Duplicate(format!("transfer {}", transfer.id)));
        }
        if let Some(key) = &transfer.idempotency_key {
            let slot = (transfer.account_id, key.clone());
            if state.keys.contains_key(&slot) {
                return Err(StoreError::Duplicate(format!(
                    "idempotency key {key} for account {}",
                    transfer.account_id
                )));
            }
            state.keys.insert(slot, transfer.id);
        }
        let stored = transfer.into_transfer(Utc::now());
        state.transfers.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_transfer_by_key(
        &self,
        account_id: Uuid,
        key: &str,
    ) -> StoreResult<Option<Transfer>> {
        let state = self.state()?;
        Ok(state
            .keys
            .get(&(account_id, key.to_string()))
            .and_then(|id| state.transfers.get(id))
            .cloned())
    }

    async fn get_transfer(&self, id: Uuid) -> StoreResult<Transfer> {
        self.state()?
            .transfers
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("transfer {id}")))
    }

    async fn list_transfers(&self, account_id: Uuid) -> StoreResult<Vec<Transfer>> {
        let mut transfers: Vec<Transfer> = self
            .state()?
            .transfers
            .values()
            .filter(|t| t.account_id == account_id)
            .cloned()
            .collect();
        transfers.sort_by(|a, b| {
            a.executed_at
                .cmp(&b.executed_at)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(transfers)
    }

    async fn insert_account(&self, account: &Account) -> StoreResult<()> {
        let mut state = self.state()?;
        if state.accounts.contains_key(&account.id) {
            return Err(StoreError::Duplicate(format!("account {}", account.id)));
        }
        state.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn insert_fund(&self, fund: &Fund) -> StoreResult<()> {
        let mut state = self.state()?;
        if state.funds.contains_key(&fund.id) {
            return Err(StoreError::Duplicate(format!("fund {}", fund.id)));
        }
        state.funds.insert(fund.id, fund.clone());
        Ok(())
    }

    async fn list_funds(&self) -> StoreResult<Vec<Fund>> {
        let mut funds: Vec<Fund> = self.state()?.funds.values().cloned().collect();
        funds.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(funds)
    }

    async fn update_fund_details(
        &self,
        id: Uuid,
        name: &str,
        description: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Fund> {
        let mut state = self.state()?;
        let fund = state.funds.get_mut(&id).ok_or_else(|| fund_not_found(id))?;
        fund.name = name.to_string();
        fund.description = description.to_string();
        fund.revision += 1;
        fund.updated_at = now;
        Ok(fund.clone())
    }

    async fn set_account_fund(
        &self,
        id: Uuid,
        expected_revision: i64,
        fund_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Account> {
        let mut state = self.state()?;
        if !state.funds.contains_key(&fund_id) {
            return Err(fund_not_found(fund_id));
        }
        let account = state
            .accounts
            .get_mut(&id)
            .ok_or_else(|| account_not_found(id))?;
        check_revision("account", id, account.revision, expected_revision)?;
        account.fund_id = Some(fund_id);
        account.revision += 1;
        account.updated_at = now;
        Ok(account.clone())
    }
}
