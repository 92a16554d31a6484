//! Process-wide tracing setup for hosts embedding the point ledger.

/// Tracing subscriber configuration (filters, output format).
pub mod tracing;

pub use crate::tracing::{LogFormat, TracingConfig};

/// Initialize process-wide tracing with settings read from the environment.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    crate::tracing::init(&TracingConfig::from_env());
}
