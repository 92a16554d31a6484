use core::borrow::Borrow;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use payerpoints_core::{DomainError, DomainResult, ValueObject};

/// Identifier of a partner organization that grants (or corrects) points.
///
/// Never empty. Compared and ordered by its exact string value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Payer(String);

impl Payer {
    pub fn new(name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::invalid_argument("payer cannot be empty"));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for Payer {}

impl core::fmt::Display for Payer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Payer {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Payer {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Payer> for String {
    fn from(value: Payer) -> Self {
        value.0
    }
}

impl Borrow<str> for Payer {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Payer {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
