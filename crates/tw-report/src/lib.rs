//! Delivery scheduling and transport for timewell.
//!
//! This crate owns everything between the mark log and the collector:
//! - The [`Reporter`]: a debounced flush state machine with forced delivery
//!   on host unload
//! - The [`Transport`]: best-effort HTTP delivery behind the [`Sink`] seam
//! - The [`timing`] readiness gate that defers acquisition until the host
//!   says its data is complete

pub mod gate;
pub mod payload;
pub mod reporter;
pub mod transport;

pub use gate::{TimingData, TimingSource, ready_signal, timing};
pub use payload::Payload;
pub use reporter::{
    DEFAULT_POLLING_INTERVAL, DataHandler, ReportOptions, Reporter, SharedLog, default_handler,
};
pub use transport::{ReportError, Sink, Strategy, Transport, TransportOptions};

/// Lock acquisition that shrugs off poisoning; the protected state stays
/// usable because every critical section leaves it consistent.
pub(crate) fn lock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
