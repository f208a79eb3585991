//! # Transfer Engine Module
//!
//! Chunked, cancellable file transfers over any provider's
//! [`StorageAdapter`](bridge_traits::storage::StorageAdapter).
//!
//! ## Overview
//!
//! - Downloads stream into a caller-supplied sink in fixed-size chunks,
//!   polling cancellation once per chunk and emitting one progress event
//!   per chunk with that chunk's byte count.
//! - Uploads go single-shot when the payload fits in one chunk, and
//!   otherwise drive the provider's resumable Start/Append/Finish session
//!   protocol; the final chunk always rides the finish call together with
//!   the destination metadata.
//!
//! Cancellation is cooperative: its latency is bounded below by one
//! chunk's I/O time, not by byte. Two cleanup gaps are deliberate,
//! documented behavior: a cancelled download leaves the partially written
//! sink in place, and a cancelled resumable upload abandons the remote
//! session without an abort call.

pub mod engine;
pub mod error;
pub mod progress;

pub use engine::TransferEngine;
pub use error::TransferError;
pub use progress::{NullProgress, ProgressSink};
