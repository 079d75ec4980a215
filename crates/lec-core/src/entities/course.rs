use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::documents::Entity;
use crate::enums::Collection;

/// A course with its enrolled students and associated assignments.
///
/// Membership and assignment sets are unordered; `BTreeSet` keeps the
/// serialized form deterministic.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Course {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub student_ids: BTreeSet<String>,
    #[serde(default)]
    pub assignment_ids: BTreeSet<String>,
}

impl Course {
    /// Whether the student is enrolled in this course.
    #[must_use]
    pub fn has_student(&self, student_id: &str) -> bool {
        self.student_ids.contains(student_id)
    }
}

impl Entity for Course {
    const COLLECTION: Collection = Collection::Courses;

    fn id(&self) -> &str {
        &self.id
    }
}
