//! Second-resolution UTC instants in `YYYY-MM-DDTHH:MM:SSZ` form.

use core::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use payerpoints_core::{DomainError, ValueObject};

const FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Byte positions of the separators in `YYYY-MM-DDTHH:MM:SSZ`.
const SEPARATORS: [(usize, u8); 6] = [
    (4, b'-'),
    (7, b'-'),
    (10, b'T'),
    (13, b':'),
    (16, b':'),
    (19, b'Z'),
];

/// Business time of a transaction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Parse the strict wire form. Offsets other than `Z`, fractional seconds
    /// and unpadded fields are rejected.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        let bytes = s.as_bytes();
        let shape_ok = bytes.len() == 20
            && bytes.iter().enumerate().all(|(i, b)| {
                match SEPARATORS.iter().find(|(pos, _)| *pos == i) {
                    Some((_, sep)) => b == sep,
                    None => b.is_ascii_digit(),
                }
            });
        if !shape_ok {
            return Err(DomainError::malformed_timestamp(format!(
                "{s:?} does not match YYYY-MM-DDTHH:MM:SSZ"
            )));
        }

        let naive = NaiveDateTime::parse_from_str(s, FORMAT)
            .map_err(|e| DomainError::malformed_timestamp(format!("{s:?}: {e}")))?;
        Ok(Self(naive.and_utc()))
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl ValueObject for Timestamp {}

impl From<DateTime<Utc>> for Timestamp {
    /// Truncates sub-second precision.
    fn from(value: DateTime<Utc>) -> Self {
        Self(DateTime::from_timestamp(value.timestamp(), 0).unwrap_or(value))
    }
}

impl FromStr for Timestamp {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl core::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0.format(FORMAT))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
