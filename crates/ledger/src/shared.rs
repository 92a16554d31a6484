//! Thread-safe handle to a single ledger.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use payerpoints_core::{DomainError, DomainResult};

use crate::config::LedgerConfig;
use crate::ledger::PointLedger;
use crate::report::Balances;
use crate::spend::SpendResult;
use crate::transaction::Transaction;

/// Clonable handle serializing every mutation of one [`PointLedger`].
///
/// `record` and `spend` hold the write lock for their whole decide-and-apply
/// step, so a spend never sees a record inserted mid-walk. Reads take the
/// read lock and return owned snapshots.
#[derive(Debug, Clone, Default)]
pub struct SharedLedger {
    inner: Arc<RwLock<PointLedger>>,
}

impl SharedLedger {
    pub fn new(ledger: PointLedger) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ledger)),
        }
    }

    pub fn with_config(config: LedgerConfig) -> Self {
        Self::new(PointLedger::with_config(config))
    }

    pub fn record(&self, payer: &str, points: i64, timestamp: &str) -> DomainResult<()> {
        let transaction = Transaction::new(payer, points, timestamp)?;
        self.write()?.record_transaction(transaction)
    }

    pub fn record_transaction(&self, transaction: Transaction) -> DomainResult<()> {
        self.write()?.record_transaction(transaction)
    }

    pub fn spend(&self, amount: i64) -> DomainResult<SpendResult> {
        self.write()?.spend(amount)
    }

    pub fn balances(&self) -> DomainResult<Balances> {
        Ok(self.read()?.balances())
    }

    /// Owned copy of the whole ledger, taken under the read lock.
    pub fn snapshot(&self) -> DomainResult<PointLedger> {
        Ok(self.read()?.clone())
    }

    fn read(&self) -> DomainResult<RwLockReadGuard<'_, PointLedger>> {
        self.inner
            .read()
            .map_err(|_| DomainError::invariant("ledger lock poisoned"))
    }

    fn write(&self) -> DomainResult<RwLockWriteGuard<'_, PointLedger>> {
        self.inner
            .write()
            .map_err(|_| DomainError::invariant("ledger lock poisoned"))
    }
}
