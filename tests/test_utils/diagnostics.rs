//! In-memory diagnostics receiver so integration tests can assert on the
//! sink's status messages without installing a global logger.

use std::sync::Arc;

use fluent_sink::Diagnostics;
use log::Level;
use parking_lot::Mutex;

/// Records every status message reported by a sink.
#[derive(Clone, Default)]
pub struct CollectingDiagnostics {
    messages: Arc<Mutex<Vec<(Level, String)>>>,
}

impl CollectingDiagnostics {
    /// Clone behind the trait object the builder expects.
    pub fn shared(&self) -> Arc<dyn Diagnostics> {
        Arc::new(self.clone())
    }

    /// Messages containing `needle`, in arrival order.
    pub fn matching(&self, needle: &str) -> Vec<(Level, String)> {
        self.messages
            .lock()
            .iter()
            .filter(|(_, msg)| msg.contains(needle))
            .cloned()
            .collect()
    }
}

impl Diagnostics for CollectingDiagnostics {
    fn report(&self, level: Level, message: &str) {
        self.messages.lock().push((level, message.to_owned()));
    }
}
