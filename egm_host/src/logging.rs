//! Structured logging configuration.
//!
//! Library records emitted through the `log` facade are forwarded into the
//! same subscriber, so ledger and recovery logs share one output.

use egm_core::Money;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Initialize structured logging
///
/// Log levels come from the `RUST_LOG` env var, defaulting to
/// `info,sqlx=warn`.
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log a payout or lockup event with structured data
///
/// # Arguments
///
/// * `event_type` - Type of money event (e.g. `lockup`, `key_off`)
/// * `trace_id` - Cash-out trace id
/// * `amount` - Optional amount involved
/// * `message` - Event message
pub fn log_money_event(event_type: &str, trace_id: Uuid, amount: Option<Money>, message: &str) {
    tracing::warn!(
        event_type = event_type,
        trace_id = %trace_id,
        amount = amount,
        "MONEY: {}",
        message
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_money_event() {
        // Just ensure it doesn't panic
        log_money_event("lockup", Uuid::new_v4(), Some(1_500_000), "Test lockup");
        log_money_event("abort", Uuid::nil(), None, "Test abort");
    }
}
