use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, TransactionTrait, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    Account, EngineError, Fund, Money, NewTransfer, StoreError, Transfer, accounts,
    balances::AccountBalances, funds, transfers,
};

use super::{AtomicWriter, RecordStore, StoreResult, TransferWrite};

/// Relational store backed by sea-orm.
///
/// Transfers are committed inside one database transaction, see
/// [`AtomicWriter`].
#[derive(Debug, Clone)]
pub struct DatabaseStore {
    database: DatabaseConnection,
}

impl DatabaseStore {
    pub fn new(database: DatabaseConnection) -> Self {
        Self { database }
    }

    pub fn database(&self) -> &DatabaseConnection {
        &self.database
    }
}

/// Rows that no longer parse are corrupted, not an outage: never retried.
fn decode<M, T>(model: M) -> StoreResult<T>
where
    T: TryFrom<M, Error = EngineError>,
{
    T::try_from(model).map_err(|err| StoreError::Corrupted(err.to_string()))
}

async fn get_account_on<C: ConnectionTrait>(conn: &C, id: Uuid) -> StoreResult<Account> {
    let model = accounts::Entity::find_by_id(id.to_string())
        .one(conn)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("account {id}")))?;
    decode(model)
}

async fn get_fund_on<C: ConnectionTrait>(conn: &C, id: Uuid) -> StoreResult<Fund> {
    let model = funds::Entity::find_by_id(id.to_string())
        .one(conn)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("fund {id}")))?;
    decode(model)
}

/// Conditional update touched no row: tell a missing row from a stale one.
async fn missing_or_conflict<C: ConnectionTrait>(
    conn: &C,
    kind: &str,
    id: Uuid,
    expected_revision: i64,
) -> StoreError {
    let exists = match kind {
        "fund" => funds::Entity::find_by_id(id.to_string())
            .one(conn)
            .await
            .map(|m| m.is_some()),
        _ => accounts::Entity::find_by_id(id.to_string())
            .one(conn)
            .await
            .map(|m| m.is_some()),
    };
    match exists {
        Ok(true) => StoreError::Conflict(format!(
            "{kind} {id} is no longer at revision {expected_revision}"
        )),
        Ok(false) => StoreError::NotFound(format!("{kind} {id}")),
        Err(err) => err.into(),
    }
}

async fn update_account_on<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    expected_revision: i64,
    balances: AccountBalances,
    now: DateTime<Utc>,
) -> StoreResult<Account> {
    if balances.cash_balance.is_negative() || balances.invested_total.is_negative() {
        return Err(StoreError::Invalid(format!(
            "account {id} balances must be >= 0"
        )));
    }
    let result = accounts::Entity::update_many()
        .col_expr(
            accounts::Column::CashBalance,
            Expr::value(balances.cash_balance.to_storage()),
        )
        .col_expr(
            accounts::Column::InvestedTotal,
            Expr::value(balances.invested_total.to_storage()),
        )
        .col_expr(accounts::Column::Revision, Expr::value(expected_revision + 1))
        .col_expr(accounts::Column::UpdatedAt, Expr::value(now))
        .filter(accounts::Column::Id.eq(id.to_string()))
        .filter(accounts::Column::Revision.eq(expected_revision))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(missing_or_conflict(conn, "account", id, expected_revision).await);
    }
    get_account_on(conn, id).await
}

async fn update_fund_total_on<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    expected_revision: i64,
    total: Money,
    now: DateTime<Utc>,
) -> StoreResult<Fund> {
    if total.is_negative() {
        return Err(StoreError::Invalid(format!("fund {id} total must be >= 0")));
    }
    let result = funds::Entity::update_many()
        .col_expr(funds::Column::Total, Expr::value(total.to_storage()))
        .col_expr(funds::Column::Revision, Expr::value(expected_revision + 1))
        .col_expr(funds::Column::UpdatedAt, Expr::value(now))
        .filter(funds::Column::Id.eq(id.to_string()))
        .filter(funds::Column::Revision.eq(expected_revision))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(missing_or_conflict(conn, "fund", id, expected_revision).await);
    }
    get_fund_on(conn, id).await
}

async fn insert_transfer_on<C: ConnectionTrait>(
    conn: &C,
    transfer: NewTransfer,
    created_at: DateTime<Utc>,
) -> StoreResult<Transfer> {
    let transfer = transfer.into_transfer(created_at);
    let model = transfers::ActiveModel::from(&transfer)
        .insert(conn)
        .await
        .map_err(|err| match StoreError::from(err) {
            StoreError::Duplicate(_) => StoreError::Duplicate(format!(
                "transfer {} or its idempotency key already exists",
                transfer.id
            )),
            other => other,
        })?;
    decode(model)
}

#[async_trait]
impl RecordStore for DatabaseStore {
    async fn get_account(&self, id: Uuid) -> StoreResult<Account> {
        get_account_on(&self.database, id).await
    }

    async fn get_fund(&self, id: Uuid) -> StoreResult<Fund> {
        get_fund_on(&self.database, id).await
    }

    async fn update_account(
        &self,
        id: Uuid,
        expected_revision: i64,
        balances: AccountBalances,
        now: DateTime<Utc>,
    ) -> StoreResult<Account> {
        update_account_on(&self.database, id, expected_revision, balances, now).await
    }

    async fn update_fund_total(
        &self,
        id: Uuid,
        expected_revision: i64,
        total: Money,
        now: DateTime<Utc>,
    ) -> StoreResult<Fund> {
        update_fund_total_on(&self.database, id, expected_revision, total, now).await
    }

    async fn create_transfer(&self, transfer: NewTransfer) -> StoreResult<Transfer> {
        insert_transfer_on(&self.database, transfer, Utc::now()).await
    }

    async fn find_transfer_by_key(
        &self,
        account_id: Uuid,
        key: &str,
    ) -> StoreResult<Option<Transfer>> {
        transfers::Entity::find()
            .filter(transfers::Column::AccountId.eq(account_id.to_string()))
            .filter(transfers::Column::IdempotencyKey.eq(key))
            .one(&self.database)
            .await?
            .map(decode)
            .transpose()
    }

    async fn get_transfer(&self, id: Uuid) -> StoreResult<Transfer> {
        let model = transfers::Entity::find_by_id(id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("transfer {id}")))?;
        decode(model)
    }

    async fn list_transfers(&self, account_id: Uuid) -> StoreResult<Vec<Transfer>> {
        transfers::Entity::find()
            .filter(transfers::Column::AccountId.eq(account_id.to_string()))
            .order_by_asc(transfers::Column::ExecutedAt)
            .order_by_asc(transfers::Column::CreatedAt)
            .order_by_asc(transfers::Column::Id)
            .all(&self.database)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    async fn insert_account(&self, account: &Account) -> StoreResult<()> {
        accounts::ActiveModel::from(account)
            .insert(&self.database)
            .await?;
        Ok(())
    }

    async fn insert_fund(&self, fund: &Fund) -> StoreResult<()> {
        funds::ActiveModel::from(fund).insert(&self.database).await?;
        Ok(())
    }

    async fn list_funds(&self) -> StoreResult<Vec<Fund>> {
        funds::Entity::find()
            .order_by_asc(funds::Column::Name)
            .order_by_asc(funds::Column::Id)
            .all(&self.database)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    async fn update_fund_details(
        &self,
        id: Uuid,
        name: &str,
        description: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Fund> {
        let model = funds::Entity::find_by_id(id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("fund {id}")))?;
        let revision = model.revision;
        let mut active: funds::ActiveModel = model.into();
        active.name = ActiveValue::Set(name.to_string());
        active.description = ActiveValue::Set(description.to_string());
        active.revision = ActiveValue::Set(revision + 1);
        active.updated_at = ActiveValue::Set(now);
        decode(active.update(&self.database).await?)
    }

    async fn set_account_fund(
        &self,
        id: Uuid,
        expected_revision: i64,
        fund_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Account> {
        get_fund_on(&self.database, fund_id).await?;
        let result = accounts::Entity::update_many()
            .col_expr(accounts::Column::FundId, Expr::value(fund_id.to_string()))
            .col_expr(accounts::Column::Revision, Expr::value(expected_revision + 1))
            .col_expr(accounts::Column::UpdatedAt, Expr::value(now))
            .filter(accounts::Column::Id.eq(id.to_string()))
            .filter(accounts::Column::Revision.eq(expected_revision))
            .exec(&self.database)
            .await?;
        if result.rows_affected == 0 {
            return Err(missing_or_conflict(&self.database, "account", id, expected_revision).await);
        }
        get_account_on(&self.database, id).await
    }

    fn atomic(&self) -> Option<&dyn AtomicWriter> {
        Some(self)
    }
}

#[async_trait]
impl AtomicWriter for DatabaseStore {
    async fn commit_transfer(&self, write: &TransferWrite) -> StoreResult<Transfer> {
        let txn = self.database.begin().await?;

        update_account_on(
            &txn,
            write.account_id,
            write.account_revision,
            write.balances,
            write.now,
        )
        .await?;

        let fund = get_fund_on(&txn, write.transfer.fund_id).await?;
        let total = fund
            .total
            .checked_add(write.transfer.amount)
            .ok_or_else(|| StoreError::Invalid(format!("fund {} total overflow", fund.id)))?;
        update_fund_total_on(&txn, fund.id, fund.revision, total, write.now).await?;

        let transfer = insert_transfer_on(&txn, write.transfer.clone(), write.now).await?;

        // Dropping `txn` on any early return above rolls everything back.
        txn.commit().await?;
        Ok(transfer)
    }
}
