//! FIFO signed consumption: which records absorb a spend.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use payerpoints_core::{DomainError, DomainResult};

use crate::payer::Payer;
use crate::transaction::LedgerEntry;

/// Points a single payer gave up (negative) or got back (positive) in one spend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayerDelta {
    pub payer: Payer,
    pub points: i64,
}

impl core::fmt::Display for PayerDelta {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}: {}", self.payer, self.points)
    }
}

/// Per-payer outcome of one spend, in order of each payer's first appearance
/// in the chronological walk. Payers whose net delta is zero are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpendResult(Vec<PayerDelta>);

impl SpendResult {
    pub fn iter(&self) -> impl Iterator<Item = &PayerDelta> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, payer: &str) -> Option<i64> {
        self.0
            .iter()
            .find(|d| d.payer.as_str() == payer)
            .map(|d| d.points)
    }

    /// Sum of all deltas. Always `-amount` for the spend that produced it.
    pub fn net(&self) -> i64 {
        self.0.iter().map(|d| d.points).sum()
    }

    pub fn into_inner(self) -> Vec<PayerDelta> {
        self.0
    }
}

impl IntoIterator for SpendResult {
    type Item = PayerDelta;
    type IntoIter = std::vec::IntoIter<PayerDelta>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl core::fmt::Display for SpendResult {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("[")?;
        for (i, delta) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{delta}")?;
        }
        f.write_str("]")
    }
}

/// How a spend will reshape the ledger, computed without touching it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SpendPlan {
    /// Number of leading records fully absorbed (removed).
    pub drained: usize,
    /// Points taken from the record right after the drained prefix, which
    /// stays in place with a smaller balance.
    pub boundary: Option<i64>,
    pub deltas: SpendResult,
    /// Highest value `remaining` reached during the walk. Above the requested
    /// amount only when a deduction handed points back.
    pub peak_remaining: i64,
}

/// Walk `entries` oldest first and decide what absorbs `amount`.
///
/// At each record `consumed = min(points, remaining)`. For a deduction that
/// minimum is the (negative) deduction itself, so visiting it cancels the
/// deduction and raises `remaining`.
pub(crate) fn plan<'a>(
    entries: impl IntoIterator<Item = &'a LedgerEntry>,
    amount: i64,
) -> DomainResult<SpendPlan> {
    if amount <= 0 {
        return Err(DomainError::invalid_argument(format!(
            "spend amount must be positive, got {amount}"
        )));
    }

    let mut remaining = amount;
    let mut peak_remaining = amount;
    let mut drained = 0;
    let mut boundary = None;
    let mut deltas: Vec<PayerDelta> = Vec::new();
    let mut slots: HashMap<&Payer, usize> = HashMap::new();

    for entry in entries {
        if remaining <= 0 {
            break;
        }

        let consumed = entry.points().min(remaining);
        remaining = remaining
            .checked_sub(consumed)
            .ok_or_else(|| DomainError::invariant("spend walk overflowed i64"))?;
        peak_remaining = peak_remaining.max(remaining);

        let slot = *slots.entry(entry.payer()).or_insert_with(|| {
            deltas.push(PayerDelta {
                payer: entry.payer().clone(),
                points: 0,
            });
            deltas.len() - 1
        });
        deltas[slot].points = deltas[slot]
            .points
            .checked_sub(consumed)
            .ok_or_else(|| DomainError::invariant("payer delta overflowed i64"))?;

        if consumed == entry.points() {
            drained += 1;
        } else {
            boundary = Some(consumed);
        }
    }

    if remaining > 0 {
        return Err(DomainError::insufficient_points(amount, remaining));
    }

    deltas.retain(|d| d.points != 0);

    Ok(SpendPlan {
        drained,
        boundary,
        deltas: SpendResult(deltas),
        peak_remaining,
    })
}
