//! Payload assembly core
//!
//! The common engine behind every tracked event: persistent context
//! entries, per-event field stamping, timestamp normalization, and
//! event-id generation. Higher layers (session, consent, identity, the
//! orchestrator) refresh the context; this crate turns it into finished
//! payloads.

pub mod context;
mod core;
mod error;
mod payload;
mod timestamp;

pub use crate::core::{CallbackResult, Payload, PayloadCore, PayloadHook, TrackCallback};
pub use error::{PayloadError, Result};
pub use payload::{strip_empty_properties, PayloadBuilder};
pub use timestamp::{now_iso8601, EventTimestamp};
