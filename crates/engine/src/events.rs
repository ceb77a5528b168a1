//! Structured events published by the transfer orchestrator.
//!
//! The engine never logs through a global handle: it hands every event to the
//! [`EventSink`] it was built with. [`TracingSink`] forwards them to `tracing`,
//! [`RecordingSink`] keeps them in memory so callers can assert on them.

use std::sync::Mutex;

use serde::Serialize;
use uuid::Uuid;

use crate::{Money, TransferStage};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TransferEvent {
    /// The execution entered `stage`.
    Stage {
        account_id: Uuid,
        fund_id: Uuid,
        amount: Money,
        stage: TransferStage,
        transfer_id: Option<Uuid>,
        /// Error code that caused a `Rejected`/`RolledBack` stage.
        reason: Option<String>,
    },
    /// A stored transfer with the same idempotency key was returned.
    Replayed {
        account_id: Uuid,
        transfer_id: Uuid,
        idempotency_key: String,
    },
    /// An operation on `record_id` failed and is about to be tried again.
    Retry {
        record_id: Uuid,
        operation: &'static str,
        attempt: u32,
        error: String,
    },
    /// A reversal gave up. The named record is left out of balance.
    CompensationFailed {
        account_id: Uuid,
        fund_id: Uuid,
        amount: Money,
        record: &'static str,
        error: String,
    },
}

pub trait EventSink: Send + Sync {
    fn publish(&self, event: &TransferEvent);
}

/// Forwards events to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn publish(&self, event: &TransferEvent) {
        match event {
            TransferEvent::Stage {
                account_id,
                fund_id,
                amount,
                stage,
                transfer_id,
                reason,
            } => match reason {
                Some(reason) => tracing::info!(
                    %account_id, %fund_id, %amount, %stage, ?transfer_id, reason = %reason,
                    "transfer {stage}"
                ),
                None => tracing::debug!(
                    %account_id, %fund_id, %amount, %stage, ?transfer_id,
                    "transfer {stage}"
                ),
            },
            TransferEvent::Replayed {
                account_id,
                transfer_id,
                idempotency_key,
            } => tracing::info!(
                %account_id, %transfer_id, idempotency_key = %idempotency_key,
                "transfer replayed"
            ),
            TransferEvent::Retry {
                record_id,
                operation,
                attempt,
                error,
            } => tracing::warn!(%record_id, operation, attempt, "retrying: {error}"),
            TransferEvent::CompensationFailed {
                account_id,
                fund_id,
                amount,
                record,
                error,
            } => tracing::error!(
                %account_id, %fund_id, %amount, record,
                "compensation exhausted: {error}"
            ),
        }
    }
}

/// Keeps every published event in order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<TransferEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TransferEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Only the stage transitions, in order.
    pub fn stages(&self) -> Vec<TransferStage> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                TransferEvent::Stage { stage, .. } => Some(stage),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: &TransferEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        let account_id = Uuid::new_v4();
        let fund_id = Uuid::new_v4();
        for stage in [TransferStage::Received, TransferStage::Rejected] {
            sink.publish(&TransferEvent::Stage {
                account_id,
                fund_id,
                amount: Money::from_units(1),
                stage,
                transfer_id: None,
                reason: None,
            });
        }
        sink.publish(&TransferEvent::Retry {
            record_id: account_id,
            operation: "get_account",
            attempt: 1,
            error: "down".to_string(),
        });

        assert_eq!(sink.events().len(), 3);
        assert_eq!(
            sink.stages(),
            vec![TransferStage::Received, TransferStage::Rejected]
        );
    }
}
