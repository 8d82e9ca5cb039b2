//! Event types and the bounded drop-oldest event queue.

pub mod event_types;
pub mod queue;

pub use event_types::{EventKind, MarketDataEvent};
pub use queue::{EventQueue, QueueStats};
