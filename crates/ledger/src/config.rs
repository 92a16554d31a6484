//! Ledger configuration.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use payerpoints_core::{DomainError, DomainResult};

/// Environment variable selecting the [`DeductionPolicy`].
pub const DEDUCTION_POLICY_ENV: &str = "PAYERPOINTS_DEDUCTION_POLICY";

/// What a spend does when deductions interact badly with the walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeductionPolicy {
    /// Plain FIFO signed consumption. A deduction that hands back more than
    /// was requested is logged and the spend proceeds.
    #[default]
    Compatible,
    /// Reject any spend that would leave an affected payer below zero.
    Strict,
}

impl FromStr for DeductionPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compatible" => Ok(Self::Compatible),
            "strict" => Ok(Self::Strict),
            other => Err(DomainError::invalid_argument(format!(
                "unknown deduction policy {other:?} (expected \"compatible\" or \"strict\")"
            ))),
        }
    }
}

/// Ledger configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub deduction_policy: DeductionPolicy,
}

impl LedgerConfig {
    /// Read configuration from the process environment. Unset variables keep
    /// their defaults.
    pub fn from_env() -> DomainResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DomainResult<Self> {
        let mut config = Self::default();
        if let Some(raw) = lookup(DEDUCTION_POLICY_ENV) {
            config.deduction_policy = raw.parse()?;
        }
        Ok(config)
    }

    pub fn with_deduction_policy(mut self, policy: DeductionPolicy) -> Self {
        self.deduction_policy = policy;
        self
    }
}
