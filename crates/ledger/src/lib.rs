//! Multi-payer point ledger.
//!
//! Records signed point transactions from partner payers, reports per-payer
//! balances, and spends points oldest first across payers.
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns.

pub mod config;
pub mod ledger;
pub mod payer;
pub mod report;
pub mod shared;
pub mod spend;
pub mod timestamp;
pub mod transaction;

pub use config::{DeductionPolicy, LedgerConfig};
pub use ledger::{
    LedgerCommand, LedgerEvent, PointLedger, PointsSpent, RecordTransaction, SpendPoints,
    TransactionRecorded,
};
pub use payer::Payer;
pub use report::{Balances, RunningBalanceViolation};
pub use shared::SharedLedger;
pub use spend::{PayerDelta, SpendResult};
pub use timestamp::Timestamp;
pub use transaction::{LedgerEntry, Transaction};

pub use payerpoints_core::{Aggregate, DomainError, DomainResult};
