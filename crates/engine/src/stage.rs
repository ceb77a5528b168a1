//! Lifecycle of a single `execute_transfer` call.

use std::fmt;

use serde::Serialize;

/// Stages a transfer execution moves through.
///
/// Happy path: `Received → Validated → Debited → Credited → Recorded →
/// Committed`. A failure before `Committed` ends in `Rejected` when nothing
/// was written, or `RolledBack` when writes happened and were reversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TransferStage {
    Received,
    /// Account loaded and eligibility passed.
    Validated,
    /// Account cash moved to invested.
    Debited,
    /// Fund total incremented.
    Credited,
    /// Transfer record appended.
    Recorded,
    /// Terminal: every write landed.
    Committed,
    /// Terminal: nothing was written.
    Rejected,
    /// Terminal: writes were applied and then reversed.
    RolledBack,
}

impl TransferStage {
    /// No more transitions are possible.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferStage::Committed | TransferStage::Rejected | TransferStage::RolledBack
        )
    }

    /// Money may be out of balance between records.
    #[inline]
    pub fn is_in_flight(&self) -> bool {
        matches!(self, TransferStage::Debited | TransferStage::Credited)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStage::Received => "RECEIVED",
            TransferStage::Validated => "VALIDATED",
            TransferStage::Debited => "DEBITED",
            TransferStage::Credited => "CREDITED",
            TransferStage::Recorded => "RECORDED",
            TransferStage::Committed => "COMMITTED",
            TransferStage::Rejected => "REJECTED",
            TransferStage::RolledBack => "ROLLED_BACK",
        }
    }
}

impl fmt::Display for TransferStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
