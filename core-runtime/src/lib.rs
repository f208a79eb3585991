//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the storage core:
//! - Logging and tracing bootstrap
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the other core crates depend
//! on. It establishes the logging conventions (structured `tracing` with
//! sensitive-field redaction) and the event broadcasting mechanism used to
//! surface auth and transfer state changes to the host application.

pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
