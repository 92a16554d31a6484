//! Balance snapshots and history checks.

use std::collections::BTreeMap;

use serde::Serialize;

use payerpoints_core::{DomainError, DomainResult};

use crate::payer::Payer;
use crate::timestamp::Timestamp;
use crate::transaction::LedgerEntry;

/// Point balance of every payer the ledger has ever seen, sorted by payer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Balances(BTreeMap<Payer, i64>);

impl Balances {
    pub(crate) fn from_map(map: BTreeMap<Payer, i64>) -> Self {
        Self(map)
    }

    /// Balance of `payer`, or `None` if the ledger never saw it.
    pub fn get(&self, payer: &str) -> Option<i64> {
        self.0.get(payer).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Payer, i64)> {
        self.0.iter().map(|(p, points)| (p, *points))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The single merged balance the end user sees.
    ///
    /// Summed in `i128`, so payer order cannot overflow an intermediate sum.
    /// Saturates at the `i64` bounds.
    pub fn total(&self) -> i64 {
        let sum: i128 = self.0.values().map(|points| i128::from(*points)).sum();
        i64::try_from(sum).unwrap_or(if sum < 0 { i64::MIN } else { i64::MAX })
    }

    pub fn negative_payers(&self) -> Vec<&Payer> {
        self.0
            .iter()
            .filter(|(_, points)| **points < 0)
            .map(|(p, _)| p)
            .collect()
    }

    pub fn into_inner(self) -> BTreeMap<Payer, i64> {
        self.0
    }
}

impl core::fmt::Display for Balances {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("{")?;
        for (i, (payer, points)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{payer}: {points}")?;
        }
        f.write_str("}")
    }
}

/// A point in the timeline where a payer's running balance dips below zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunningBalanceViolation {
    pub payer: Payer,
    pub timestamp: Timestamp,
    pub running_balance: i64,
}

/// Read `entries` left to right in time and report every record after which
/// its payer's running balance is negative.
///
/// An empty result is the precondition under which spends never push a payer
/// negative by cancelling deductions in the walk.
pub(crate) fn running_balance_violations<'a>(
    entries: impl IntoIterator<Item = &'a LedgerEntry>,
) -> Vec<RunningBalanceViolation> {
    let mut running: BTreeMap<&Payer, i64> = BTreeMap::new();
    let mut violations = Vec::new();

    for entry in entries {
        let balance = running.entry(entry.payer()).or_insert(0);
        *balance = balance.saturating_add(entry.points());
        if *balance < 0 {
            violations.push(RunningBalanceViolation {
                payer: entry.payer().clone(),
                timestamp: entry.timestamp(),
                running_balance: *balance,
            });
        }
    }

    violations
}

pub(crate) fn check_non_negative_history<'a>(
    entries: impl IntoIterator<Item = &'a LedgerEntry>,
) -> DomainResult<()> {
    match running_balance_violations(entries).into_iter().next() {
        None => Ok(()),
        Some(v) => Err(DomainError::invariant(format!(
            "payer {} runs negative ({}) at {}",
            v.payer, v.running_balance, v.timestamp
        ))),
    }
}
