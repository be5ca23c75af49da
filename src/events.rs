//! Diagnostic events
//!
//! The engine reports what it is doing through an injected [`EventSink`].
//! Sinks observe; they never change what the engine does.
//!
//! ## Sinks
//! - [`TracingSink`] (default): forwards to `tracing` under the `binvault` target
//! - [`NullSink`]: discards everything

use std::fmt;

/// Severity of a diagnostic event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Trace => "trace",
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
        };
        f.write_str(name)
    }
}

/// Receiver of engine diagnostics
pub trait EventSink: Send + Sync {
    /// Record one event. `context` holds `(key, value)` pairs.
    fn emit(&self, severity: Severity, message: &str, context: &[(&'static str, String)]);

    /// Whether events of this severity are wanted at all.
    ///
    /// Call sites skip building the context when this returns false.
    fn enabled(&self, _severity: Severity) -> bool {
        true
    }
}

/// Forwards events to the `tracing` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, severity: Severity, message: &str, context: &[(&'static str, String)]) {
        let context = format_context(context);
        match severity {
            Severity::Trace => tracing::trace!(target: "binvault", context = %context, "{}", message),
            Severity::Debug => tracing::debug!(target: "binvault", context = %context, "{}", message),
            Severity::Info => tracing::info!(target: "binvault", context = %context, "{}", message),
            Severity::Warn => tracing::warn!(target: "binvault", context = %context, "{}", message),
            Severity::Error => tracing::error!(target: "binvault", context = %context, "{}", message),
        }
    }

    fn enabled(&self, severity: Severity) -> bool {
        match severity {
            Severity::Trace => tracing::enabled!(target: "binvault", tracing::Level::TRACE),
            Severity::Debug => tracing::enabled!(target: "binvault", tracing::Level::DEBUG),
            Severity::Info => tracing::enabled!(target: "binvault", tracing::Level::INFO),
            Severity::Warn => tracing::enabled!(target: "binvault", tracing::Level::WARN),
            Severity::Error => tracing::enabled!(target: "binvault", tracing::Level::ERROR),
        }
    }
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _severity: Severity, _message: &str, _context: &[(&'static str, String)]) {}

    fn enabled(&self, _severity: Severity) -> bool {
        false
    }
}

/// Render context pairs as `key=value key=value`
pub fn format_context(context: &[(&'static str, String)]) -> String {
    context
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Emit an event through a sink, building the context only when enabled.
///
/// ```ignore
/// emit!(sink, Severity::Debug, "collection relocated", name = name, offset = offset);
/// ```
macro_rules! emit {
    ($sink:expr, $severity:expr, $message:expr $(, $key:ident = $value:expr)* $(,)?) => {{
        let sink: &dyn $crate::events::EventSink = &*$sink;
        let severity = $severity;
        if sink.enabled(severity) {
            sink.emit(
                severity,
                $message,
                &[$((stringify!($key), ($value).to_string())),*],
            );
        }
    }};
}

pub(crate) use emit;
