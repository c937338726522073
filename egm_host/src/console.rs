//! Operator console relaying key-off input to the recovery engine.
//!
//! Accepts one command per line:
//! - `key-off <trace-id>` releases a payout waiting for key-off
//! - `abort <trace-id>` abandons it
//! - `pending` lists trace ids waiting for a key-off

use crate::logging::log_money_event;
use egm_core::KeyOffGate;
use log::{info, warn};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use uuid::Uuid;

/// Parsed operator command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    KeyOff(Uuid),
    Abort(Uuid),
    Pending,
}

/// Errors that can occur during command parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Unrecognized command '{0}'. Use 'key-off ID', 'abort ID' or 'pending'")]
    Unknown(String),

    #[error("'{0}' requires a trace id (e.g., '{0} 67e55044-10b1-426f-9247-bb680e5fe0c8')")]
    MissingTraceId(String),

    #[error("Invalid trace id '{0}'")]
    InvalidTraceId(String),
}

/// Parse one console line into an operator command.
///
/// Command names are case-insensitive; surrounding whitespace is ignored.
pub fn parse_command(input: &str) -> Result<OperatorCommand, CommandError> {
    let parts: Vec<&str> = input.trim().split_ascii_whitespace().collect();
    match parts.first().map(|command| command.to_lowercase()).as_deref() {
        Some("key-off") => parse_trace_id(&parts).map(OperatorCommand::KeyOff),
        Some("abort") => parse_trace_id(&parts).map(OperatorCommand::Abort),
        Some("pending") => Ok(OperatorCommand::Pending),
        _ => Err(CommandError::Unknown(input.trim().to_string())),
    }
}

/// Parse the trace id of "COMMAND ID"
fn parse_trace_id(parts: &[&str]) -> Result<Uuid, CommandError> {
    match parts.get(1) {
        Some(raw) => {
            Uuid::parse_str(raw).map_err(|_| CommandError::InvalidTraceId(raw.to_string()))
        }
        None => Err(CommandError::MissingTraceId(
            parts.first().copied().unwrap_or_default().to_lowercase(),
        )),
    }
}

/// Apply one command to the gate
pub fn apply(gate: &KeyOffGate, command: OperatorCommand) {
    match command {
        OperatorCommand::KeyOff(trace_id) => {
            if gate.key_off(trace_id) {
                log_money_event("key_off", trace_id, None, "Operator keyed off payout");
            } else {
                warn!("No payout waiting for key-off with trace id {trace_id}");
            }
        }
        OperatorCommand::Abort(trace_id) => {
            if gate.abort(trace_id) {
                log_money_event("key_off_abort", trace_id, None, "Operator aborted payout");
            } else {
                warn!("No payout waiting for key-off with trace id {trace_id}");
            }
        }
        OperatorCommand::Pending => {
            let pending = gate.pending();
            if pending.is_empty() {
                info!("No payouts waiting for key-off");
            }
            for trace_id in pending {
                info!("Waiting for key-off: {trace_id}");
            }
        }
    }
}

/// Relay commands from a line reader until it is exhausted
pub async fn run<R>(gate: Arc<KeyOffGate>, reader: R) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match parse_command(&line) {
            Ok(command) => apply(&gate, command),
            Err(e) => warn!("{e}"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        let trace = Uuid::new_v4();
        assert_eq!(
            parse_command(&format!("key-off {trace}")),
            Ok(OperatorCommand::KeyOff(trace))
        );
        assert_eq!(
            parse_command(&format!("  ABORT   {trace} ")),
            Ok(OperatorCommand::Abort(trace))
        );
        assert_eq!(parse_command("pending"), Ok(OperatorCommand::Pending));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            parse_command("key-off"),
            Err(CommandError::MissingTraceId("key-off".to_string()))
        );
        assert_eq!(
            parse_command("abort not-a-uuid"),
            Err(CommandError::InvalidTraceId("not-a-uuid".to_string()))
        );
        assert!(matches!(
            parse_command("reboot"),
            Err(CommandError::Unknown(_))
        ));
    }

    #[tokio::test]
    async fn test_run_releases_waiter() {
        let gate = Arc::new(KeyOffGate::new());
        let trace = Uuid::new_v4();
        let waiter = gate.register(trace);

        let input = format!("bogus\n\nkey-off {trace}\n");
        run(gate.clone(), input.as_bytes()).await.unwrap();

        assert!(waiter.wait().await.is_ok());
        assert!(gate.pending().is_empty());
    }
}
