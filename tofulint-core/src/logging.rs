//! Structured logging using **tracing**.
//!
//! Log lines go to stderr as JSON so stdout stays reserved for the report.

use tracing::{error, info, warn};

/// Initializes the global tracing subscriber.
///
/// Call once at startup. Filtering follows `RUST_LOG` (e.g. `RUST_LOG=tofulint_core=debug`).
/// Calling it again is a no-op.
pub fn init_structured_logging() {
    let _ = tracing_subscriber::fmt()
        .json()
        .with_ansi(false)
        .with_level(true)
        .with_target(true)
        .with_current_span(true)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

/// Logs a warning event.
pub fn log_warn(message: &str) {
    warn!(detail = %message);
}

/// Logs an info event.
pub fn log_info(message: &str) {
    info!(detail = %message);
}

/// Logs an error event.
pub fn log_error(message: &str) {
    error!(detail = %message);
}

/// Logs an event by name; the level follows the name.
pub fn log_event(event: &str, detail: &str) {
    match event.to_uppercase().as_str() {
        "ERROR" => error!(event = %event, detail = %detail),
        "WARN" | "WARNING" => warn!(event = %event, detail = %detail),
        _ => info!(event = %event, detail = %detail),
    }
}
