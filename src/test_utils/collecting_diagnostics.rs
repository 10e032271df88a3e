//! Diagnostics sink that accumulates messages in memory for test assertions.

use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use log::Level;
use parking_lot::Mutex;

use crate::diagnostics::Diagnostics;

/// Diagnostics implementation that stores every message it receives.
#[derive(Clone, Default)]
pub struct CollectingDiagnostics {
    messages: Arc<Mutex<Vec<(Level, String)>>>,
}

impl CollectingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

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

    /// Poll until at least `count` messages contain `needle`.
    pub fn wait_for(&self, needle: &str, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.matching(needle).len() >= count {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        self.matching(needle).len() >= count
    }
}

impl Diagnostics for CollectingDiagnostics {
    fn report(&self, level: Level, message: &str) {
        self.messages.lock().push((level, message.to_owned()));
    }
}
