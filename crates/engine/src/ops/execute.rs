//! The transfer orchestrator.
//!
//! One call goes through: load account → idempotency lookup → eligibility →
//! load fund → compute balances → persist. Persisting either commits the three
//! writes in one store transaction or, when the store has none, runs them in
//! order and reverses the ones already applied if a later one fails.

use std::{fmt, future::Future, sync::Arc};

use chrono::Utc;
use serde::Serialize;
use tokio::time::Instant;
use uuid::Uuid;

use crate::{
    EngineError, EventSink, Fund, Money, NewTransfer, ResultEngine, StoreError, Transfer,
    TransferEvent, TransferStage,
    balances::{AccountBalances, apply_transfer, credit_fund, debit_fund},
    check_eligibility,
    commands::ExecuteTransferCmd,
    store::{AtomicWriter, TransferWrite},
    util::normalize_optional_text,
};

use super::{Engine, account_error, fund_error};

/// Outcome of a successful `execute_transfer`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExecutedTransfer {
    pub transfer: Transfer,
    /// `true` when the idempotency key matched an earlier transfer and nothing
    /// new was written.
    pub replayed: bool,
}

/// Why one attempt stopped.
#[derive(Debug)]
struct Failure {
    error: EngineError,
    /// Terminal stage to report if the call ends here.
    stage: TransferStage,
    /// A fresh attempt from step 1 may succeed.
    retry: bool,
}

impl Failure {
    fn rejected(error: EngineError) -> Self {
        Self {
            error,
            stage: TransferStage::Rejected,
            retry: false,
        }
    }

    fn rolled_back(error: EngineError) -> Self {
        Self {
            error,
            stage: TransferStage::RolledBack,
            retry: false,
        }
    }

    fn conflict(what: String, stage: TransferStage) -> Self {
        Self {
            error: EngineError::ConcurrencyConflict(what),
            stage,
            retry: true,
        }
    }
}

enum Prepared {
    Replay(Transfer),
    Write {
        write: TransferWrite,
        fund: Fund,
        fund_total: Money,
    },
}

enum Persisted {
    Created(Transfer),
    /// A concurrent call with the same idempotency key won.
    Existing(Transfer),
}

/// Publishes events for one call.
#[derive(Clone)]
struct Trace {
    events: Arc<dyn EventSink>,
    account_id: Uuid,
    fund_id: Uuid,
    amount: Money,
}

impl Trace {
    fn stage(&self, stage: TransferStage) {
        self.finish(stage, None, None);
    }

    fn finish(
        &self,
        stage: TransferStage,
        transfer_id: Option<Uuid>,
        error: Option<&EngineError>,
    ) {
        self.events.publish(&TransferEvent::Stage {
            account_id: self.account_id,
            fund_id: self.fund_id,
            amount: self.amount,
            stage,
            transfer_id,
            reason: error.map(|err| err.code().to_string()),
        });
    }

    fn replayed(&self, transfer_id: Uuid, key: &str) {
        self.events.publish(&TransferEvent::Replayed {
            account_id: self.account_id,
            transfer_id,
            idempotency_key: key.to_string(),
        });
    }

    fn retry(
        &self,
        record_id: Uuid,
        operation: &'static str,
        attempt: u32,
        error: &dyn fmt::Display,
    ) {
        self.events.publish(&TransferEvent::Retry {
            record_id,
            operation,
            attempt,
            error: error.to_string(),
        });
    }

    fn compensation_failed(&self, record: &'static str, error: &dyn fmt::Display) {
        self.events.publish(&TransferEvent::CompensationFailed {
            account_id: self.account_id,
            fund_id: self.fund_id,
            amount: self.amount,
            record,
            error: error.to_string(),
        });
    }
}

/// Map a store failure during the writes.
fn write_error(err: StoreError) -> EngineError {
    match err {
        // Records are never deleted, so a miss here means the store lost one.
        StoreError::NotFound(what) => {
            EngineError::StorageUnavailable(format!("{what} vanished during transfer"))
        }
        other => other.into(),
    }
}

impl Engine {
    /// Move `cmd.amount` from the account's cash into its associated fund.
    ///
    /// On success the account was debited, the fund total incremented and a
    /// transfer appended, all exactly once. Any error means none of the three
    /// writes is visible (writes already applied were rolled back first).
    ///
    /// Optimistic-lock conflicts restart the call from the account read, up
    /// to the retry policy's attempts, then surface as
    /// [`EngineError::ConcurrencyConflict`].
    ///
    /// Dropping the returned future or hitting `cmd.deadline` only aborts the
    /// call before the writes start; once started they run to a terminal
    /// state on their own task.
    pub async fn execute_transfer(
        &self,
        cmd: ExecuteTransferCmd,
    ) -> ResultEngine<ExecutedTransfer> {
        let key = normalize_optional_text(cmd.idempotency_key.as_deref());
        let trace = Trace {
            events: self.events.clone(),
            account_id: cmd.account_id,
            fund_id: cmd.fund_id,
            amount: cmd.amount,
        };
        trace.stage(TransferStage::Received);

        let mut attempt = 1;
        loop {
            match self.attempt_transfer(&cmd, key.as_deref(), &trace).await {
                Ok(executed) => {
                    trace.finish(
                        TransferStage::Committed,
                        Some(executed.transfer.id),
                        None,
                    );
                    return Ok(executed);
                }
                Err(failure) if failure.retry && self.retry.allows_retry(attempt) => {
                    trace.retry(cmd.account_id, "execute_transfer", attempt, &failure.error);
                    tokio::time::sleep(self.retry.backoff_duration(attempt - 1)).await;
                    attempt += 1;
                }
                Err(failure) => {
                    trace.finish(failure.stage, None, Some(&failure.error));
                    return Err(failure.error);
                }
            }
        }
    }

    async fn attempt_transfer(
        &self,
        cmd: &ExecuteTransferCmd,
        key: Option<&str>,
        trace: &Trace,
    ) -> Result<ExecutedTransfer, Failure> {
        let prepare = self.prepare_transfer(cmd, key, trace);
        let prepared = match cmd.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, prepare)
                .await
                .map_err(|_| Failure::rejected(deadline_exceeded()))??,
            None => prepare.await?,
        };

        let (write, fund, fund_total) = match prepared {
            Prepared::Replay(transfer) => {
                return Ok(ExecutedTransfer {
                    transfer,
                    replayed: true,
                });
            }
            Prepared::Write {
                write,
                fund,
                fund_total,
            } => (write, fund, fund_total),
        };

        if cmd.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(Failure::rejected(deadline_exceeded()));
        }

        // Writes run on their own task: dropping the caller must not stop
        // them half way.
        let engine = self.clone();
        let task_trace = trace.clone();
        let persisted = tokio::spawn(async move {
            engine
                .persist_transfer(write, fund, fund_total, &task_trace)
                .await
        })
        .await
        .map_err(|err| {
            Failure::rolled_back(EngineError::StorageUnavailable(format!(
                "transfer task failed: {err}"
            )))
        })??;

        match persisted {
            Persisted::Created(transfer) => Ok(ExecutedTransfer {
                transfer,
                replayed: false,
            }),
            Persisted::Existing(transfer) => {
                if let Some(key) = key {
                    trace.replayed(transfer.id, key);
                }
                Ok(ExecutedTransfer {
                    transfer,
                    replayed: true,
                })
            }
        }
    }

    /// Steps 1 to 4: everything before the first write.
    async fn prepare_transfer(
        &self,
        cmd: &ExecuteTransferCmd,
        key: Option<&str>,
        trace: &Trace,
    ) -> Result<Prepared, Failure> {
        let account = self
            .read(cmd.account_id, "get_account", || {
                self.store.get_account(cmd.account_id)
            })
            .await
            .map_err(|err| Failure::rejected(account_error(err, cmd.account_id)))?;

        if let Some(key) = key {
            let existing = self
                .read(cmd.account_id, "find_transfer_by_key", || {
                    self.store.find_transfer_by_key(cmd.account_id, key)
                })
                .await
                .map_err(|err| Failure::rejected(err.into()))?;
            if let Some(transfer) = existing {
                trace.replayed(transfer.id, key);
                return Ok(Prepared::Replay(transfer));
            }
        }

        check_eligibility(&account, cmd.fund_id, cmd.amount).map_err(Failure::rejected)?;
        trace.stage(TransferStage::Validated);

        let fund = self
            .read(cmd.fund_id, "get_fund", || self.store.get_fund(cmd.fund_id))
            .await
            .map_err(|err| Failure::rejected(fund_error(err, cmd.fund_id)))?;
        let update = apply_transfer(&account, &fund, cmd.amount).map_err(Failure::rejected)?;

        let now = Utc::now();
        let transfer = NewTransfer::new(
            self.ids.generate(),
            account.id,
            fund.id,
            cmd.amount,
            key.map(ToString::to_string),
            now,
        )
        .map_err(Failure::rejected)?;

        Ok(Prepared::Write {
            write: TransferWrite {
                account_id: account.id,
                account_revision: account.revision,
                balances: update.account,
                transfer,
                now,
            },
            fund,
            fund_total: update.fund_total,
        })
    }

    /// Step 5.
    async fn persist_transfer(
        &self,
        write: TransferWrite,
        fund: Fund,
        fund_total: Money,
        trace: &Trace,
    ) -> Result<Persisted, Failure> {
        match self.store.atomic() {
            Some(writer) => self.persist_atomic(writer, write, trace).await,
            None => self.persist_saga(write, fund, fund_total, trace).await,
        }
    }

    async fn persist_atomic(
        &self,
        writer: &dyn AtomicWriter,
        write: TransferWrite,
        trace: &Trace,
    ) -> Result<Persisted, Failure> {
        match writer.commit_transfer(&write).await {
            Ok(transfer) => {
                for stage in [
                    TransferStage::Debited,
                    TransferStage::Credited,
                    TransferStage::Recorded,
                ] {
                    trace.stage(stage);
                }
                Ok(Persisted::Created(transfer))
            }
            Err(StoreError::Duplicate(what)) => match &write.transfer.idempotency_key {
                Some(key) => self.existing_transfer(write.account_id, key).await,
                None => Err(Failure::rolled_back(EngineError::StorageUnavailable(
                    format!("duplicate transfer id: {what}"),
                ))),
            },
            Err(StoreError::Conflict(what)) => {
                Err(Failure::conflict(what, TransferStage::RolledBack))
            }
            Err(err) => Err(Failure::rolled_back(write_error(err))),
        }
    }

    /// Debit, credit and record one after the other, undoing the applied
    /// writes when a later one fails.
    async fn persist_saga(
        &self,
        write: TransferWrite,
        fund: Fund,
        fund_total: Money,
        trace: &Trace,
    ) -> Result<Persisted, Failure> {
        let TransferWrite {
            account_id,
            account_revision,
            balances,
            transfer,
            now,
        } = write;
        let amount = transfer.amount;
        let fund_id = fund.id;

        match self
            .store
            .update_account(account_id, account_revision, balances, now)
            .await
        {
            Ok(_) => trace.stage(TransferStage::Debited),
            Err(StoreError::Conflict(what)) => {
                return Err(Failure::conflict(what, TransferStage::Rejected));
            }
            Err(err) => return Err(Failure::rejected(write_error(err))),
        }

        if let Err(err) = self.credit_fund_total(fund, fund_total, amount, trace).await {
            self.refund_account(account_id, amount, trace).await;
            return Err(Failure::rolled_back(err));
        }
        trace.stage(TransferStage::Credited);

        let key = transfer.idempotency_key.clone();
        match self.store.create_transfer(transfer).await {
            Ok(transfer) => {
                trace.stage(TransferStage::Recorded);
                Ok(Persisted::Created(transfer))
            }
            Err(err) => {
                self.reverse_fund_total(fund_id, amount, trace).await;
                self.refund_account(account_id, amount, trace).await;
                match (err, key) {
                    (StoreError::Duplicate(_), Some(key)) => {
                        self.existing_transfer(account_id, &key).await
                    }
                    (err, _) => Err(Failure::rolled_back(write_error(err))),
                }
            }
        }
    }

    /// Increment the fund total, re-reading the fund on revision conflicts.
    async fn credit_fund_total(
        &self,
        fund: Fund,
        first_total: Money,
        amount: Money,
        trace: &Trace,
    ) -> ResultEngine<()> {
        let fund_id = fund.id;
        let mut revision = fund.revision;
        let mut total = first_total;
        let mut attempt = 1;
        loop {
            match self
                .store
                .update_fund_total(fund_id, revision, total, Utc::now())
                .await
            {
                Ok(_) => return Ok(()),
                Err(StoreError::Conflict(what)) if self.retry.allows_retry(attempt) => {
                    trace.retry(fund_id, "update_fund_total", attempt, &what);
                    attempt += 1;
                    let fund = self
                        .read(fund_id, "get_fund", || self.store.get_fund(fund_id))
                        .await
                        .map_err(|err| fund_error(err, fund_id))?;
                    revision = fund.revision;
                    total = credit_fund(fund.total, amount)?;
                }
                Err(err) => return Err(write_error(err)),
            }
        }
    }

    async fn reverse_fund_total(&self, fund_id: Uuid, amount: Money, trace: &Trace) {
        let engine = self;
        self.compensate(trace, "fund", fund_id, "reverse_fund_total", || async move {
            let fund = engine.store.get_fund(fund_id).await?;
            let total = debit_fund(fund.total, amount)?;
            engine
                .store
                .update_fund_total(fund_id, fund.revision, total, Utc::now())
                .await?;
            Ok::<(), EngineError>(())
        })
        .await;
    }

    async fn refund_account(&self, account_id: Uuid, amount: Money, trace: &Trace) {
        let engine = self;
        self.compensate(trace, "account", account_id, "refund_account", || async move {
            let account = engine.store.get_account(account_id).await?;
            let balances = AccountBalances::of(&account).refund(amount)?;
            engine
                .store
                .update_account(account_id, account.revision, balances, Utc::now())
                .await?;
            Ok::<(), EngineError>(())
        })
        .await;
    }

    /// Retry a reversal with bounded exponential backoff. Exhaustion is
    /// reported, never raised: the caller already has an error to return.
    async fn compensate<F, Fut>(
        &self,
        trace: &Trace,
        record: &'static str,
        record_id: Uuid,
        operation: &'static str,
        reverse: F,
    ) where
        F: Fn() -> Fut,
        Fut: Future<Output = ResultEngine<()>>,
    {
        let mut attempt = 1;
        loop {
            match reverse().await {
                Ok(()) => return,
                Err(err) if self.retry.allows_retry(attempt) => {
                    trace.retry(record_id, operation, attempt, &err);
                    tokio::time::sleep(self.retry.backoff_duration(attempt - 1)).await;
                    attempt += 1;
                }
                Err(err) => {
                    trace.compensation_failed(record, &err);
                    return;
                }
            }
        }
    }

    /// Look up the transfer that owns `key` after a duplicate insert.
    async fn existing_transfer(&self, account_id: Uuid, key: &str) -> Result<Persisted, Failure> {
        let existing = self
            .read(account_id, "find_transfer_by_key", || {
                self.store.find_transfer_by_key(account_id, key)
            })
            .await
            .map_err(|err| Failure::rolled_back(err.into()))?;
        existing.map(Persisted::Existing).ok_or_else(|| {
            Failure::rolled_back(EngineError::StorageUnavailable(format!(
                "idempotency key {key} reported as taken but not found"
            )))
        })
    }
}

fn deadline_exceeded() -> EngineError {
    EngineError::DeadlineExceeded("deadline passed before the transfer was written".to_string())
}
