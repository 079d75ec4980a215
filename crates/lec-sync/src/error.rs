//! Sync core error types.

use lec_core::enums::Collection;
use lec_core::errors::CoreError;
use lec_core::gateway::GatewayError;
use thiserror::Error;

use crate::subscriptions::SlotKind;

/// Errors produced or observed by the sync core.
///
/// Only surfaced errors reach the error sink and the view; conflicts and stale
/// callbacks are expected outcomes of concurrent operation and are dropped.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    /// The store could not be reached. Never retried by the core.
    #[error("Transport error ({context}): {message}")]
    Transport { context: String, message: String },

    /// Another writer already created the document.
    #[error("Conflict on {collection} {id}")]
    Conflict { collection: Collection, id: String },

    /// A creation batch was rejected as a whole; none of it was applied.
    #[error("Batch of {attempted} creations rejected: {reason}")]
    PartialBatchFailure { attempted: usize, reason: String },

    /// A delivery or completion arrived for a superseded generation.
    #[error("Stale callback for {slot} generation {generation}")]
    StaleCallback { slot: SlotKind, generation: u64 },

    /// A stored document did not match its entity shape.
    #[error("Decode error: {0}")]
    Decode(String),

    /// No instance exists for the pairing.
    #[error("No instance for assignment {assignment_id} and student {student_id}")]
    NotFound {
        assignment_id: String,
        student_id: String,
    },

    /// No student is signed in.
    #[error("No student signed in")]
    NoSession,

    /// The controller has shut down.
    #[error("Sync controller stopped")]
    Closed,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Map a gateway error raised while reading or subscribing.
    #[must_use]
    pub fn from_read(context: impl Into<String>, e: GatewayError) -> Self {
        match e {
            GatewayError::Conflict { collection, id } => Self::Conflict { collection, id },
            GatewayError::Decode(msg) => Self::Decode(msg),
            GatewayError::Transport(message) | GatewayError::Rejected(message) => Self::Transport {
                context: context.into(),
                message,
            },
        }
    }

    /// Map a gateway error raised by a creation batch of `attempted` operations.
    #[must_use]
    pub fn from_batch(attempted: usize, e: GatewayError) -> Self {
        match e {
            GatewayError::Conflict { collection, id } => Self::Conflict { collection, id },
            GatewayError::Transport(message) => Self::Transport {
                context: "batch write".to_string(),
                message,
            },
            GatewayError::Rejected(reason) | GatewayError::Decode(reason) => {
                Self::PartialBatchFailure { attempted, reason }
            }
        }
    }

    /// Whether this error goes to the error sink and the view.
    #[must_use]
    pub const fn is_surfaced(&self) -> bool {
        !matches!(
            self,
            Self::Conflict { .. } | Self::StaleCallback { .. } | Self::Closed
        )
    }
}

impl From<CoreError> for SyncError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Validation(msg) => Self::Decode(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(GatewayError::Transport("down".into()), true)]
    #[case(GatewayError::Rejected("bad".into()), true)]
    #[case(GatewayError::Conflict { collection: Collection::AssignmentInstances, id: "ins-1".into() }, false)]
    fn batch_errors_surface_except_conflicts(#[case] e: GatewayError, #[case] surfaced: bool) {
        assert_eq!(SyncError::from_batch(2, e).is_surfaced(), surfaced);
    }

    #[test]
    fn rejected_batch_is_partial_failure() {
        let err = SyncError::from_batch(2, GatewayError::Rejected("nope".into()));
        assert_eq!(
            err,
            SyncError::PartialBatchFailure {
                attempted: 2,
                reason: "nope".into()
            }
        );
    }

    #[test]
    fn stale_callbacks_are_silent() {
        let err = SyncError::StaleCallback {
            slot: SlotKind::Instances,
            generation: 3,
        };
        assert!(!err.is_surfaced());
    }
}
