use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::documents::Entity;
use crate::enums::Collection;

/// Per-student tracking record for one assignment.
///
/// At most one instance exists per `(assignment_id, student_id)`. Instances
/// are created by reconciliation with `is_submitted = false` and mutated
/// later by submission and grading workflows outside the sync core.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct AssignmentInstance {
    pub id: String,
    pub assignment_id: String,
    pub student_id: String,
    #[serde(default)]
    pub is_submitted: bool,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub mark: Option<f64>,
}

impl AssignmentInstance {
    /// A fresh, unsubmitted instance for the pairing.
    #[must_use]
    pub fn unsubmitted(id: String, assignment_id: &str, student_id: &str) -> Self {
        Self {
            id,
            assignment_id: assignment_id.to_string(),
            student_id: student_id.to_string(),
            is_submitted: false,
            submitted_at: None,
            mark: None,
        }
    }

    /// The `(assignment_id, student_id)` pairing this instance tracks.
    #[must_use]
    pub fn pairing(&self) -> (&str, &str) {
        (&self.assignment_id, &self.student_id)
    }
}

impl Entity for AssignmentInstance {
    const COLLECTION: Collection = Collection::AssignmentInstances;

    fn id(&self) -> &str {
        &self.id
    }
}
