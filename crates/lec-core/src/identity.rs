use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Session state reported by the identity provider.
///
/// Produced outside Lectern (authentication is not part of the sync core) and
/// consumed by `lec-sync`. No known student identity is a reason to stay idle,
/// never an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    SignedOut,
    Loading,
    SignedIn { student_id: String },
}

impl SessionState {
    #[must_use]
    pub fn signed_in(student_id: impl Into<String>) -> Self {
        Self::SignedIn {
            student_id: student_id.into(),
        }
    }

    /// The current student, if signed in.
    #[must_use]
    pub fn student_id(&self) -> Option<&str> {
        match self {
            Self::SignedIn { student_id } => Some(student_id),
            Self::SignedOut | Self::Loading => None,
        }
    }

    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}
