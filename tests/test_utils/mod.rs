pub mod collector;

pub mod diagnostics;

pub use collector::{accept, listener, read_packet, unused_addr, wait_until};
pub use diagnostics::CollectingDiagnostics;
