use std::{fmt, future::Future, sync::Arc};

use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::{
    DatabaseStore, EngineError, EventSink, IdGenerator, RecordStore, ResultEngine, RetryPolicy,
    StoreError, TracingSink, TransferEvent, UuidGenerator, store::StoreResult,
};

mod accounts;
mod execute;
mod funds;

pub use execute::ExecutedTransfer;

/// Entry point for every account, fund and transfer operation.
///
/// Cloning is cheap: all collaborators are shared.
#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn RecordStore>,
    ids: Arc<dyn IdGenerator>,
    events: Arc<dyn EventSink>,
    retry: RetryPolicy,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Run a read, retrying transient store failures with backoff.
    async fn read<T, F, Fut>(&self, record_id: Uuid, operation: &'static str, op: F) -> StoreResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Err(err) if err.is_transient() && self.retry.allows_retry(attempt) => {
                    self.events.publish(&TransferEvent::Retry {
                        record_id,
                        operation,
                        attempt,
                        error: err.to_string(),
                    });
                    tokio::time::sleep(self.retry.backoff_duration(attempt - 1)).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

fn account_error(err: StoreError, id: Uuid) -> EngineError {
    match err {
        StoreError::NotFound(_) => EngineError::AccountNotFound(format!("account {id} not exists")),
        other => other.into(),
    }
}

fn fund_error(err: StoreError, id: Uuid) -> EngineError {
    match err {
        StoreError::NotFound(_) => EngineError::FundNotFound(format!("fund {id} not exists")),
        other => other.into(),
    }
}

fn transfer_error(err: StoreError, id: Uuid) -> EngineError {
    match err {
        StoreError::NotFound(_) => {
            EngineError::TransferNotFound(format!("transfer {id} not exists"))
        }
        other => other.into(),
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    store: Option<Arc<dyn RecordStore>>,
    ids: Option<Arc<dyn IdGenerator>>,
    events: Option<Arc<dyn EventSink>>,
    retry: RetryPolicy,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(self, db: DatabaseConnection) -> EngineBuilder {
        self.store(Arc::new(DatabaseStore::new(db)))
    }

    /// Use any record store, e.g. [`MemoryStore`](crate::MemoryStore).
    pub fn store<S: RecordStore + 'static>(mut self, store: Arc<S>) -> EngineBuilder {
        self.store = Some(store);
        self
    }

    pub fn ids<I: IdGenerator + 'static>(mut self, ids: Arc<I>) -> EngineBuilder {
        self.ids = Some(ids);
        self
    }

    /// Where orchestrator events go. Defaults to [`TracingSink`].
    pub fn events<E: EventSink + 'static>(mut self, events: Arc<E>) -> EngineBuilder {
        self.events = Some(events);
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> EngineBuilder {
        self.retry = retry;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        let store = self
            .store
            .ok_or_else(|| EngineError::InvalidInput("a record store is required".to_string()))?;
        Ok(Engine {
            store,
            ids: self.ids.unwrap_or_else(|| Arc::new(UuidGenerator)),
            events: self.events.unwrap_or_else(|| Arc::new(TracingSink)),
            retry: self.retry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    #[tokio::test]
    async fn build_requires_store() {
        let err = Engine::builder().build().await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));

        let engine = Engine::builder()
            .store(Arc::new(MemoryStore::new()))
            .retry_policy(RetryPolicy::immediate(2))
            .build()
            .await
            .unwrap();
        assert_eq!(engine.retry.max_attempts, 2);
    }

    #[test]
    fn not_found_maps_per_record() {
        let id = Uuid::new_v4();
        let missing = || StoreError::NotFound("x".to_string());
        assert!(matches!(
            account_error(missing(), id),
            EngineError::AccountNotFound(_)
        ));
        assert!(matches!(fund_error(missing(), id), EngineError::FundNotFound(_)));
        assert!(matches!(
            transfer_error(missing(), id),
            EngineError::TransferNotFound(_)
        ));
        assert!(matches!(
            account_error(StoreError::Unavailable("down".to_string()), id),
            EngineError::StorageUnavailable(_)
        ));
    }
}
