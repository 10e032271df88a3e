//! Self-reporting channel for connection status.
//!
//! The sink never logs through the records it forwards. Status changes,
//! transport errors and drop summaries go to a [`Diagnostics`]
//! implementation instead. [`LogDiagnostics`] forwards to the `log` facade;
//! leaving diagnostics unset silences the sink entirely.

use log::Level;

/// Receiver for the sink's status messages.
pub trait Diagnostics: Send + Sync {
    /// Emit `message` at `level`.
    fn report(&self, level: Level, message: &str);

    fn debug(&self, message: &str) {
        self.report(Level::Debug, message);
    }

    fn info(&self, message: &str) {
        self.report(Level::Info, message);
    }

    fn warn(&self, message: &str) {
        self.report(Level::Warn, message);
    }

    fn error(&self, message: &str) {
        self.report(Level::Error, message);
    }
}

/// Default target used by [`LogDiagnostics`].
pub const DEFAULT_TARGET: &str = "fluent_sink";

/// Diagnostics forwarded to whichever `log` backend the host installed.
#[derive(Clone, Debug)]
pub struct LogDiagnostics {
    target: String,
}

impl LogDiagnostics {
    /// Report under the default `fluent_sink` target.
    pub fn new() -> Self {
        Self::with_target(DEFAULT_TARGET)
    }

    /// Report under a custom `log` target.
    pub fn with_target(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    /// The `log` target messages are emitted under.
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl Default for LogDiagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagnostics for LogDiagnostics {
    fn report(&self, level: Level, message: &str) {
        log::log!(target: self.target.as_str(), level, "{message}");
    }
}
