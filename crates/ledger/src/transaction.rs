use serde::{Deserialize, Serialize};

use payerpoints_core::{DomainResult, ValueObject};

use crate::payer::Payer;
use crate::timestamp::Timestamp;

/// One signed point event for one payer at one instant.
///
/// Positive `points` are earnings credited by the payer; negative `points`
/// are corrections to points the payer granted earlier.
///
/// Deserializes from the `{"payer", "points", "timestamp"}` shape, validating
/// every field on the way in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub payer: Payer,
    pub points: i64,
    pub timestamp: Timestamp,
}

impl Transaction {
    pub fn new(payer: &str, points: i64, timestamp: &str) -> DomainResult<Self> {
        Ok(Self {
            payer: Payer::new(payer)?,
            points,
            timestamp: Timestamp::parse(timestamp)?,
        })
    }
}

impl ValueObject for Transaction {}

/// A transaction as stored in the ledger.
///
/// `payer`, `timestamp` and `sequence` never change once stored. `points`
/// only moves toward zero, and only during a spend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    sequence: u64,
    payer: Payer,
    points: i64,
    timestamp: Timestamp,
}

impl LedgerEntry {
    pub(crate) fn new(sequence: u64, transaction: Transaction) -> Self {
        Self {
            sequence,
            payer: transaction.payer,
            points: transaction.points,
            timestamp: transaction.timestamp,
        }
    }

    /// Insertion order within the ledger; breaks timestamp ties.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn payer(&self) -> &Payer {
        &self.payer
    }

    /// Points not yet absorbed by a spend.
    pub fn points(&self) -> i64 {
        self.points
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Sort key: ascending timestamp, then insertion order.
    pub(crate) fn order_key(&self) -> (Timestamp, u64) {
        (self.timestamp, self.sequence)
    }

    pub(crate) fn consume(&mut self, points: i64) {
        self.points -= points;
    }
}
