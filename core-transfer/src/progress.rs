//! Progress Reporting
//!
//! Progress is a synchronous per-chunk callback on the transferring task,
//! not an event bus: each event carries only that chunk's byte count, and a
//! consumer that wants a running total accumulates it itself.

/// Receives one event per transferred chunk with the chunk's byte count.
///
/// Invoked synchronously on the calling flow of control. Implementations
/// must be cheap — they run between chunk I/Os.
pub trait ProgressSink: Send + Sync {
    fn on_chunk(&self, bytes: u64);
}

/// Closures are progress sinks.
impl<F> ProgressSink for F
where
    F: Fn(u64) + Send + Sync,
{
    fn on_chunk(&self, bytes: u64) {
        self(bytes)
    }
}

/// A sink that discards all progress events.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn on_chunk(&self, _bytes: u64) {}
}
