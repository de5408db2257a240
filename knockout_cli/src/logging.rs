//! Structured logging configuration.

use std::time::Duration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging
///
/// `RUST_LOG` takes precedence over `default_filter`. Records emitted by the
/// library through the `log` facade are forwarded into the same subscriber.
pub fn init(default_filter: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // Logs go to stderr; stdout carries command output
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::debug!("Structured logging initialized");
}

/// Log how long a command took
///
/// # Arguments
///
/// * `command` - Subcommand name
/// * `elapsed` - Wall time spent
pub fn log_command(command: &str, elapsed: Duration) {
    let duration_ms = elapsed.as_millis() as u64;
    if duration_ms > 1000 {
        tracing::warn!(
            command = command,
            duration_ms = duration_ms,
            "Slow command"
        );
    } else {
        tracing::info!(
            command = command,
            duration_ms = duration_ms,
            "Command finished"
        );
    }
}
