//! Investment-execution engine for tax-advantaged cash accounts.
//!
//! An [`Account`] holds cash and may be associated with one [`Fund`]. The
//! [`Engine`] moves cash into that fund, keeping the account balances, the
//! fund total and the append-only [`Transfer`] ledger consistent.

pub use accounts::Account;
pub use balances::{AccountBalances, BalanceUpdate, apply_transfer};
pub use eligibility::check_eligibility;
pub use error::{EngineError, StoreError};
pub use events::{EventSink, RecordingSink, TracingSink, TransferEvent};
pub use funds::{Fund, FundCategory, RiskTier};
pub use ids::{IdGenerator, UuidGenerator};
pub use money::Money;
pub use ops::{Engine, EngineBuilder, ExecutedTransfer};
pub use retry::RetryPolicy;
pub use stage::TransferStage;
pub use store::{
    AtomicWriter, DatabaseStore, MemoryStore, RecordStore, StoreResult, TransferWrite,
};
pub use transfers::{NewTransfer, Transfer};

mod accounts;
mod balances;
pub mod commands;
mod eligibility;
mod error;
mod events;
mod funds;
mod ids;
mod money;
mod ops;
mod retry;
mod stage;
mod store;
mod transfers;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
