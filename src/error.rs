//! Error types for the mount input core.
//!
//! Timeouts are not errors: an `update` that observes nothing returns
//! `Ok(None)` and the caller keeps the previous control record.

use thiserror::Error;

/// Errors from topic bus operations.
#[derive(Debug, Error)]
pub enum BusError {
    /// A topic name was reused with a different message type.
    #[error("topic '{0}' already carries a different message type")]
    TypeMismatch(&'static str),

    /// A bus lock was poisoned by a panicking publisher or subscriber.
    #[error("bus lock poisoned")]
    Poisoned,
}

/// Errors surfaced by the mount input adapters.
#[derive(Debug, Error)]
pub enum MountInputError {
    /// Subscription or startup publication failed; fatal to the adapter.
    #[error("input setup failed: {0}")]
    Setup(#[source] BusError),

    /// The bounded wait failed; aborts the current update cycle.
    #[error("bounded wait failed: {0}")]
    Wait(#[source] BusError),

    /// `update` was called before `initialize`.
    #[error("input adapter not initialized")]
    NotInitialized,
}
