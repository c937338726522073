//! Recovery configuration.

use crate::{Money, storage::config::parse_env_or};

/// Cash-out recovery configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryConfig {
    /// Shortfalls above this amount need an operator key-off before payout
    pub large_payout_limit: Money,

    /// Ledger record count that triggers a warning
    pub ledger_capacity_warning: usize,
}

impl RecoveryConfig {
    /// Create configuration from environment variables
    ///
    /// - `LARGE_PAYOUT_LIMIT`: millicents (default: 1200000)
    /// - `LEDGER_CAPACITY_WARNING`: record count (default: 200)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            large_payout_limit: parse_env_or("LARGE_PAYOUT_LIMIT", defaults.large_payout_limit),
            ledger_capacity_warning: parse_env_or(
                "LEDGER_CAPACITY_WARNING",
                defaults.ledger_capacity_warning,
            ),
        }
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            large_payout_limit: 1_200_000,
            ledger_capacity_warning: 200,
        }
    }
}
