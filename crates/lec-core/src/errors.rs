//! Cross-cutting error types for Lectern.
//!
//! Domain-specific errors (e.g., `StoreError`, `SyncError`) are defined in
//! their respective crates. Errors crossing the store boundary use
//! [`GatewayError`](crate::gateway::GatewayError).

use thiserror::Error;

/// Errors that can be raised by any Lectern crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Entity lookup returned no result.
    #[error("Entity not found: {entity_type} {id}")]
    NotFound { entity_type: String, id: String },

    /// A state machine transition was attempted that is not allowed.
    #[error("Invalid state transition: {entity_type} {id} from {from} to {to}")]
    InvalidTransition {
        entity_type: String,
        id: String,
        from: String,
        to: String,
    },

    /// Data failed validation (schema, format, constraints).
    #[error("Validation error: {0}")]
    Validation(String),

    /// The OS random source could not produce bytes for an ID.
    #[error("ID generation failed: {0}")]
    IdGeneration(String),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
