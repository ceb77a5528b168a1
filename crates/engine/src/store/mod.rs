//! Keyed storage for accounts, funds and transfers.
//!
//! The orchestrator only talks to a [`RecordStore`]. Every balance update is
//! conditioned on the revision the caller read: a mismatch is reported as
//! [`StoreError::Conflict`] and nothing is written. Stores that can commit
//! several records at once expose it through [`RecordStore::atomic`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{Account, Fund, Money, NewTransfer, StoreError, Transfer, balances::AccountBalances};

mod database;
mod memory;

pub use database::DatabaseStore;
pub use memory::MemoryStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_account(&self, id: Uuid) -> StoreResult<Account>;

    async fn get_fund(&self, id: Uuid) -> StoreResult<Fund>;

    /// Overwrite both balances when the stored revision is `expected_revision`.
    async fn update_account(
        &self,
        id: Uuid,
        expected_revision: i64,
        balances: AccountBalances,
        now: DateTime<Utc>,
    ) -> StoreResult<Account>;

    /// Overwrite the fund total when the stored revision is `expected_revision`.
    async fn update_fund_total(
        &self,
        id: Uuid,
        expected_revision: i64,
        total: Money,
        now: DateTime<Utc>,
    ) -> StoreResult<Fund>;

    /// Append a transfer. An existing `(account_id, idempotency_key)` pair
    /// yields [`StoreError::Duplicate`].
    async fn create_transfer(&self, transfer: NewTransfer) -> StoreResult<Transfer>;

    async fn find_transfer_by_key(
        &self,
        account_id: Uuid,
        key: &str,
    ) -> StoreResult<Option<Transfer>>;

    async fn get_transfer(&self, id: Uuid) -> StoreResult<Transfer>;

    /// Transfers of one account, oldest execution first.
    async fn list_transfers(&self, account_id: Uuid) -> StoreResult<Vec<Transfer>>;

    async fn insert_account(&self, account: &Account) -> StoreResult<()>;

    async fn insert_fund(&self, fund: &Fund) -> StoreResult<()>;

    /// Every fund, ordered by name.
    async fn list_funds(&self) -> StoreResult<Vec<Fund>>;

    async fn update_fund_details(
        &self,
        id: Uuid,
        name: &str,
        description: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Fund>;

    async fn set_account_fund(
        &self,
        id: Uuid,
        expected_revision: i64,
        fund_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Account>;

    /// Multi-record writer, when the backend has transactions.
    fn atomic(&self) -> Option<&dyn AtomicWriter> {
        None
    }
}

/// The three writes of one transfer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferWrite {
    pub account_id: Uuid,
    /// Revision of the account snapshot the balances were computed from.
    pub account_revision: i64,
    pub balances: AccountBalances,
    pub transfer: NewTransfer,
    pub now: DateTime<Utc>,
}

/// Commits a whole transfer or nothing.
#[async_trait]
pub trait AtomicWriter: Send + Sync {
    /// Debit the account, increment the fund total by the transfer amount and
    /// append the transfer in a single unit of work.
    ///
    /// A stale account revision is a [`StoreError::Conflict`]; the fund is
    /// read inside the unit so concurrent investors never lose an increment.
    async fn commit_transfer(&self, write: &TransferWrite) -> StoreResult<Transfer>;
}
